use clap::ValueEnum;
use serde::Serialize;
use sqlx::PgPool;

use crate::analytics::{
    admission_view, enrollment_view, performance_view, utilization_view, AdmissionView,
    EnrollmentView, PerformanceView, UtilizationView,
};
use crate::db;
use crate::error::FetchError;
use crate::models::Filters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DashboardKind {
    Admissions,
    Enrollment,
    Performance,
    Utilization,
}

impl DashboardKind {
    pub fn title(self) -> &'static str {
        match self {
            DashboardKind::Admissions => "Admission Analytics",
            DashboardKind::Enrollment => "Enrollment Analytics",
            DashboardKind::Performance => "Performance Analytics",
            DashboardKind::Utilization => "Utilization Analytics",
        }
    }

    /// Table whose changes should trigger a refresh of this dashboard.
    pub fn source_table(self) -> &'static str {
        match self {
            DashboardKind::Admissions => "applications",
            DashboardKind::Enrollment => "students",
            DashboardKind::Performance => "marks",
            DashboardKind::Utilization => "resources",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dashboard", rename_all = "lowercase")]
pub enum DashboardView {
    Admissions(AdmissionView),
    Enrollment(EnrollmentView),
    Performance(PerformanceView),
    Utilization(UtilizationView),
}

impl DashboardView {
    pub fn kind(&self) -> DashboardKind {
        match self {
            DashboardView::Admissions(_) => DashboardKind::Admissions,
            DashboardView::Enrollment(_) => DashboardKind::Enrollment,
            DashboardView::Performance(_) => DashboardKind::Performance,
            DashboardView::Utilization(_) => DashboardKind::Utilization,
        }
    }
}

/// Fetches the dashboard's rows and reduces them to a chart-ready view.
pub async fn load(
    pool: &PgPool,
    kind: DashboardKind,
    filters: &Filters,
) -> Result<DashboardView, FetchError> {
    let view = match kind {
        DashboardKind::Admissions => {
            let (applications, course_names) = tokio::try_join!(
                db::fetch_applications(pool, filters),
                db::fetch_course_names(pool)
            )?;
            DashboardView::Admissions(admission_view(&applications, &course_names))
        }
        DashboardKind::Enrollment => {
            let (enrollments, course_names) = tokio::try_join!(
                db::fetch_enrollments(pool, filters),
                db::fetch_course_names(pool)
            )?;
            DashboardView::Enrollment(enrollment_view(&enrollments, &course_names))
        }
        DashboardKind::Performance => {
            let marks = db::fetch_marks(pool, filters).await?;
            DashboardView::Performance(performance_view(&marks))
        }
        DashboardKind::Utilization => {
            let resources = db::fetch_resources(pool).await?;
            DashboardView::Utilization(utilization_view(&resources))
        }
    };
    Ok(view)
}

/// Loads every dashboard in turn, stopping at the first failure.
pub async fn load_all(pool: &PgPool, filters: &Filters) -> Result<Vec<DashboardView>, FetchError> {
    let mut views = Vec::new();
    for kind in DashboardKind::value_variants() {
        views.push(load(pool, *kind, filters).await?);
    }
    Ok(views)
}
