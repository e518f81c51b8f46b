pub mod appointment;
pub mod doctor;
pub mod finance;
pub mod flexible_date;
pub mod odontogram;
pub mod patient;
pub mod patient_file;
pub mod subscription;
pub mod user;

pub use appointment::{Appointment, AppointmentStatus};
pub use doctor::Doctor;
pub use finance::Finance;
pub use odontogram::{OdontogramTreatment, ToothState};
pub use patient::{Patient, PatientDetails, PatientDoctor};
pub use patient_file::{PatientDoc, PatientImage};
pub use subscription::Subscription;
pub use user::User;

/// Deserializers that read JSON `null` as the type's default, for columns the
/// hosted schema leaves nullable
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(Option::<bool>::deserialize(d)?.unwrap_or_default())
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
        Ok(Option::<i32>::deserialize(d)?.unwrap_or_default())
    }

    pub fn decimal<'de, D: Deserializer<'de>>(d: D) -> Result<rust_decimal::Decimal, D::Error> {
        Ok(Option::<rust_decimal::Decimal>::deserialize(d)?.unwrap_or_default())
    }
}
