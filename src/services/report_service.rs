use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AccessConfig;
use crate::database::models::{AppointmentStatus, Finance};
use crate::error::ApiError;
use crate::store::{decode_all, Query, RecordStore, Table};

use super::appointment_service::{AppointmentRow, AppointmentService};
use super::patient_service::PatientService;
use super::{day_start, non_empty, parse_day, Tenant};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportParams {
    pub period: Option<String>,
    pub date: Option<String>,
}

/// Reporting window anchored on a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Year,
}

impl Period {
    pub fn parse(value: Option<&str>) -> Result<Self, ApiError> {
        match value.unwrap_or("month") {
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            _ => Err(ApiError::bad_request("Invalid period. Use week, month or year")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// `[first day, first day of the next window)` around `day`; weeks start on Monday
    pub fn bounds(&self, day: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Week => {
                let monday = day - Duration::days(day.weekday().num_days_from_monday() as i64);
                (monday, monday + Duration::days(7))
            }
            Period::Month => {
                let first = day.with_day(1).unwrap_or(day);
                let next = if first.month() == 12 {
                    NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
                };
                (first, next.unwrap_or(first + Duration::days(31)))
            }
            Period::Year => {
                let first = NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(day);
                let next = NaiveDate::from_ymd_opt(day.year() + 1, 1, 1).unwrap_or(first + Duration::days(366));
                (first, next)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub total_patients: i64,
    pub total_appointments: i64,
    pub today_appointments: i64,
    pub week_appointments: i64,
    pub month_revenue: Decimal,
    pub pending_payments: Decimal,
    pub completed_appointments: i64,
    pub cancelled_appointments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub period: &'static str,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    pub pending_payments: Decimal,
    pub completed_payments: Decimal,
    pub transaction_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentReport {
    pub period: &'static str,
    pub total_appointments: i64,
    pub completed_appointments: i64,
    pub cancelled_appointments: i64,
    pub no_show_appointments: i64,
    pub completion_rate: f64,
}

fn is_outstanding(f: &Finance) -> bool {
    matches!(f.status.as_str(), "pending" | "overdue" | "partial")
}

/// Day a finance record is reported under
fn finance_day(f: &Finance) -> NaiveDate {
    f.due_at.unwrap_or(f.created_at).date_naive()
}

pub struct ReportService {
    store: Arc<dyn RecordStore>,
    appointments: AppointmentService,
    patients: PatientService,
}

impl ReportService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            appointments: AppointmentService::new(store.clone()),
            patients: PatientService::new(store.clone(), AccessConfig::default()),
            store,
        }
    }

    fn appointments_of(tenant: &Tenant) -> Query {
        Query::from(Table::Appointments).eq("doctor_id", tenant.doctor_id).live()
    }

    async fn finances(&self, tenant: &Tenant) -> Result<Vec<Finance>, ApiError> {
        let query = Query::from(Table::Finances).eq("doctor_id", tenant.doctor_id).live();
        Ok(decode_all(self.store.select(&query).await?)?)
    }

    async fn count_between(&self, tenant: &Tenant, start: NaiveDate, end: NaiveDate) -> Result<i64, ApiError> {
        let query = Self::appointments_of(tenant)
            .gte("date_time", day_start(start))
            .lt("date_time", day_start(end));
        Ok(self.store.count(&query).await?)
    }

    pub async fn dashboard_stats(&self, tenant: &Tenant) -> Result<DashboardStats, ApiError> {
        self.dashboard_stats_on(tenant, Utc::now().date_naive()).await
    }

    pub async fn dashboard_stats_on(&self, tenant: &Tenant, today: NaiveDate) -> Result<DashboardStats, ApiError> {
        let mut stats = DashboardStats::default();

        let assigned = self.patients.assigned_patient_ids(tenant.doctor_id).await?;
        if !assigned.is_empty() {
            let query = Query::from(Table::Patients).one_of("id", assigned).live();
            stats.total_patients = self.store.count(&query).await?;
        }

        stats.total_appointments = self.store.count(&Self::appointments_of(tenant)).await?;
        stats.today_appointments = self.count_between(tenant, today, today + Duration::days(1)).await?;
        let (week_start, week_end) = Period::Week.bounds(today);
        stats.week_appointments = self.count_between(tenant, week_start, week_end).await?;
        stats.completed_appointments = self
            .store
            .count(&Self::appointments_of(tenant).eq("status", AppointmentStatus::Completed.as_str()))
            .await?;
        stats.cancelled_appointments = self
            .store
            .count(&Self::appointments_of(tenant).one_of(
                "status",
                [AppointmentStatus::Cancelled.as_str(), AppointmentStatus::NoShow.as_str()],
            ))
            .await?;

        let (month_start, month_end) = Period::Month.bounds(today);
        for finance in self.finances(tenant).await? {
            let day = finance_day(&finance);
            if finance.kind == "income" && finance.status == "paid" && day >= month_start && day < month_end {
                stats.month_revenue = stats.month_revenue.saturating_add(finance.amount);
            }
            if finance.status == "pending" {
                stats.pending_payments = stats.pending_payments.saturating_add(finance.balance);
            }
        }

        info!(
            "Dashboard stats for doctor {}: {} patients, {} appointments",
            tenant.doctor_id, stats.total_patients, stats.total_appointments
        );
        Ok(stats)
    }

    pub async fn financial(&self, tenant: &Tenant, period: Period) -> Result<FinancialReport, ApiError> {
        self.financial_on(tenant, period, Utc::now().date_naive()).await
    }

    pub async fn financial_on(&self, tenant: &Tenant, period: Period, today: NaiveDate) -> Result<FinancialReport, ApiError> {
        let (start, end) = period.bounds(today);
        let mut report = FinancialReport {
            period: period.as_str(),
            total_income: Decimal::ZERO,
            total_expenses: Decimal::ZERO,
            net_profit: Decimal::ZERO,
            pending_payments: Decimal::ZERO,
            completed_payments: Decimal::ZERO,
            transaction_count: 0,
        };

        for f in self.finances(tenant).await? {
            let day = finance_day(&f);
            if day < start || day >= end {
                continue;
            }
            report.transaction_count += 1;
            if f.status == "cancelled" {
                continue;
            }
            match f.kind.as_str() {
                "expense" => report.total_expenses = report.total_expenses.saturating_add(f.amount),
                _ => {
                    report.total_income = report.total_income.saturating_add(f.amount);
                    if f.status == "paid" {
                        report.completed_payments = report.completed_payments.saturating_add(f.amount);
                    } else if is_outstanding(&f) {
                        report.pending_payments = report.pending_payments.saturating_add(f.balance);
                    }
                }
            }
        }
        report.net_profit = report.total_income.saturating_sub(report.total_expenses);
        Ok(report)
    }

    pub async fn appointments(&self, tenant: &Tenant, period: Period) -> Result<AppointmentReport, ApiError> {
        self.appointments_on(tenant, period, Utc::now().date_naive()).await
    }

    pub async fn appointments_on(&self, tenant: &Tenant, period: Period, today: NaiveDate) -> Result<AppointmentReport, ApiError> {
        let (start, end) = period.bounds(today);
        let list = self.appointments.between(tenant, day_start(start), day_start(end)).await?;

        let count = |status: AppointmentStatus| list.iter().filter(|a| a.status == status.as_str()).count() as i64;
        let total = list.len() as i64;
        let completed = count(AppointmentStatus::Completed);
        let completion_rate = if total == 0 {
            0.0
        } else {
            ((completed as f64 / total as f64) * 10000.0).round() / 100.0
        };

        Ok(AppointmentReport {
            period: period.as_str(),
            total_appointments: total,
            completed_appointments: completed,
            cancelled_appointments: count(AppointmentStatus::Cancelled),
            no_show_appointments: count(AppointmentStatus::NoShow),
            completion_rate,
        })
    }

    /// Appointments of one day in list-row shape; `date` defaults to today
    pub async fn daily(&self, tenant: &Tenant, params: &ReportParams) -> Result<Vec<AppointmentRow>, ApiError> {
        let day = match non_empty(&params.date) {
            Some(raw) => parse_day(raw).ok_or_else(|| ApiError::bad_request("Invalid date format. Use YYYY-MM-DD"))?,
            None => Utc::now().date_naive(),
        };
        let start = day_start(day);
        let list = self.appointments.between(tenant, start, start + Duration::days(1)).await?;
        Ok(self.appointments.rows(list).await?)
    }
}
