use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::warn;

use crate::auth::TokenVerifier;
use crate::billing::BillingProvider;
use crate::config::{AppConfig, ServerConfig};
use crate::handlers::{protected, public};
use crate::identity::IdentityProvider;
use crate::middleware::{jwt_auth_middleware, resolve_tenant_middleware};
use crate::services::account_service::AccountService;
use crate::services::appointment_service::AppointmentService;
use crate::services::billing_service::BillingService;
use crate::services::document_service::DocumentService;
use crate::services::finance_service::FinanceService;
use crate::services::odontogram_service::OdontogramService;
use crate::services::patient_service::PatientService;
use crate::services::report_service::ReportService;
use crate::services::search_service::SearchService;
use crate::services::subscription_service::SubscriptionService;
use crate::services::upload_service::UploadService;
use crate::services::TenantService;
use crate::store::RecordStore;

/// Multipart framing allowance on top of the configured file size cap
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Process-wide handles, built once in `main` and cloned into every request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RecordStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub billing: Arc<dyn BillingProvider>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        billing: Arc<dyn BillingProvider>,
    ) -> Self {
        let verifier = TokenVerifier::from_config(&config.auth);
        Self {
            config: Arc::new(config),
            store,
            identity,
            billing,
            verifier: Arc::new(verifier),
        }
    }

    pub fn tenants(&self) -> TenantService {
        TenantService::new(self.store.clone())
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.store.clone(), self.identity.clone(), self.config.auth.admin_seed_token.clone())
    }

    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.store.clone())
    }

    pub fn billing_service(&self) -> BillingService {
        BillingService::new(self.store.clone(), self.billing.clone(), &self.config)
    }

    pub fn patients(&self) -> PatientService {
        PatientService::new(self.store.clone(), self.config.access.clone())
    }

    pub fn odontogram(&self) -> OdontogramService {
        OdontogramService::new(self.store.clone(), self.config.access.clone())
    }

    pub fn documents(&self) -> DocumentService {
        DocumentService::new(self.store.clone(), self.config.access.clone())
    }

    pub fn uploads(&self) -> UploadService {
        UploadService::new(self.store.clone(), self.config.access.clone(), &self.config.server)
    }

    pub fn appointments(&self) -> AppointmentService {
        AppointmentService::new(self.store.clone())
    }

    pub fn finances(&self) -> FinanceService {
        FinanceService::new(self.store.clone())
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(self.store.clone())
    }

    pub fn search(&self) -> SearchService {
        SearchService::new(self.store.clone())
    }
}

/// Full router: public routes, bearer-authenticated routes and tenant-scoped routes
pub fn app(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_bytes + MULTIPART_OVERHEAD;

    let tenant_scoped = Router::new()
        // Patients and sharing
        .route("/api/patients", post(protected::patients::create))
        .route("/api/patients/my", get(protected::patients::my_patients))
        .route("/api/patients/assign", post(protected::patients::assign))
        .route("/api/patients/assignments/:id", delete(protected::patients::unassign))
        .route(
            "/api/patients/:id",
            get(protected::patients::get).put(protected::patients::update).delete(protected::patients::delete),
        )
        .route("/api/patients/:id/doctors", get(protected::patients::doctors))
        // Odontogram
        .route(
            "/api/patients/:id/treatments",
            get(protected::odontogram::list_treatments).post(protected::odontogram::create_treatment),
        )
        .route(
            "/api/treatments/:id",
            get(protected::odontogram::get_treatment)
                .put(protected::odontogram::update_treatment)
                .delete(protected::odontogram::delete_treatment),
        )
        .route(
            "/api/patients/:id/tooth-states",
            get(protected::odontogram::list_tooth_states).post(protected::odontogram::create_tooth_state),
        )
        .route("/api/patients/:id/tooth-states/odontogram", post(protected::odontogram::replace_odontogram))
        .route(
            "/api/patients/:id/tooth-states/:item_id",
            get(protected::odontogram::get_tooth_state)
                .put(protected::odontogram::update_tooth_state)
                .delete(protected::odontogram::delete_tooth_state),
        )
        // Documents, images and uploads
        .route(
            "/api/patients/:id/documents",
            get(protected::documents::list_docs).post(protected::documents::create_doc),
        )
        .route(
            "/api/patients/:id/documents/:item_id",
            get(protected::documents::get_doc)
                .put(protected::documents::update_doc)
                .delete(protected::documents::delete_doc),
        )
        .route(
            "/api/patients/:id/images",
            get(protected::documents::list_images).post(protected::documents::create_image),
        )
        .route(
            "/api/patients/:id/images/:item_id",
            get(protected::documents::get_image)
                .put(protected::documents::update_image)
                .delete(protected::documents::delete_image),
        )
        .route(
            "/api/patients/:id/upload",
            post(protected::upload::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Appointments
        .route(
            "/api/appointments",
            get(protected::appointments::list).post(protected::appointments::create),
        )
        .route(
            "/api/appointments/:id",
            get(protected::appointments::get)
                .put(protected::appointments::update)
                .delete(protected::appointments::delete),
        )
        .route("/api/appointments/:id/:action", post(protected::appointments::action))
        // Finances
        .route("/api/finances", get(protected::finances::list).post(protected::finances::create))
        .route(
            "/api/finances/:id",
            get(protected::finances::get)
                .put(protected::finances::update)
                .delete(protected::finances::delete),
        )
        // Reports, settings, search
        .route("/api/reports/dashboard-stats", get(protected::reports::dashboard_stats))
        .route("/api/reports/financial", get(protected::reports::financial))
        .route("/api/reports/appointments", get(protected::reports::appointments))
        .route("/api/reports/daily-appointments", get(protected::reports::daily_appointments))
        .route(
            "/api/settings/clinic",
            get(protected::settings::clinic).put(protected::settings::update_clinic),
        )
        .route("/api/settings/user", get(protected::settings::user).put(protected::settings::update_user))
        .route("/api/search", get(protected::search::global))
        .route("/api/search/patients", get(protected::search::patients))
        .route("/api/search/appointments", get(protected::search::appointments))
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant_middleware));

    let authenticated = Router::new()
        .route("/api/protected", get(protected::account::protected))
        .route("/api/auth/me", get(protected::account::me))
        .route("/api/auth/signout", post(protected::account::signout))
        .route("/api/doctors/me", get(protected::account::doctor_me))
        .route("/api/subscriptions", post(protected::subscriptions::create))
        .route("/api/subscriptions/me", get(protected::subscriptions::me))
        .route(
            "/api/subscriptions/:id",
            get(protected::subscriptions::get).put(protected::subscriptions::update),
        )
        .route("/api/stripe/create-checkout-session", post(protected::billing::create_checkout_session))
        .route("/api/stripe/create-portal-session", post(protected::billing::create_portal_session))
        .merge(tenant_scoped)
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let public = Router::new()
        .route("/api/health", get(public::health::health))
        .route("/api/login", post(public::auth::login))
        .route("/api/signup", post(public::auth::signup))
        .route("/api/resend-confirmation", post(public::auth::resend_confirmation))
        .route("/api/admin/seed", post(public::auth::seed_admin))
        .route("/api/stripe/prices", get(public::billing::prices))
        .route("/api/stripe/products", get(public::billing::products))
        .route("/api/stripe/webhook", post(public::billing::webhook))
        .route("/api/stripe/checkout-success", get(public::billing::checkout_success));

    let uploads = ServeDir::new(&state.config.server.upload_dir);
    let cors = cors_layer(&state.config.server);

    Router::new()
        .merge(public)
        .merge(authenticated)
        .nest_service("/uploads", uploads)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// Configured origins with credentials; unparseable origins are skipped
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

