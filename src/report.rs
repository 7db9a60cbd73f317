use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::analytics::{AdmissionView, EnrollmentView, PerformanceView, UtilizationView};
use crate::dashboard::DashboardView;
use crate::error::{FetchError, FetchErrorKind};
use crate::models::Filters;
use crate::present::{BarEntry, LinePoint, PieSlice, TrendPoint};

/// One-line message shown in place of a dashboard that failed to load.
pub fn banner(error: &FetchError) -> String {
    let hint = match error.kind {
        FetchErrorKind::Connection => "Could not reach the data store",
        FetchErrorKind::Auth => "The data store rejected our credentials",
        FetchErrorKind::Query => "The data store rejected the query",
        FetchErrorKind::Decode => "The data store returned rows in an unexpected shape",
        FetchErrorKind::Other => "Loading failed",
    };
    format!("Error: {hint} ({})", error.message)
}

fn write_slices(output: &mut String, heading: &str, slices: &[PieSlice]) {
    let _ = writeln!(output, "### {heading}");
    if slices.is_empty() {
        let _ = writeln!(output, "No records for this window.");
    }
    for slice in slices {
        let _ = writeln!(
            output,
            "- {}: {} ({:.0}%)",
            slice.name, slice.value, slice.percentage
        );
    }
    let _ = writeln!(output);
}

fn write_bars(output: &mut String, heading: &str, bars: &[BarEntry], unit: &str) {
    let _ = writeln!(output, "### {heading}");
    if bars.is_empty() {
        let _ = writeln!(output, "No records for this window.");
    }
    for bar in bars {
        let _ = writeln!(output, "- {}: {}{unit}", bar.name, bar.value);
    }
    let _ = writeln!(output);
}

fn write_line(output: &mut String, heading: &str, points: &[LinePoint]) {
    let _ = writeln!(output, "### {heading}");
    if points.is_empty() {
        let _ = writeln!(output, "No records for this window.");
    }
    for point in points {
        let _ = writeln!(output, "- {}: {}", point.month, point.count);
    }
    let _ = writeln!(output);
}

fn write_trend(output: &mut String, heading: &str, points: &[TrendPoint]) {
    let _ = writeln!(output, "### {heading}");
    if points.is_empty() {
        let _ = writeln!(output, "No dated records for this window.");
    }
    for point in points {
        let _ = writeln!(output, "- {}: {:.1}%", point.month, point.average);
    }
    let _ = writeln!(output);
}

fn write_admissions(output: &mut String, view: &AdmissionView) {
    let _ = writeln!(
        output,
        "{} applications, approval rate {:.0}%",
        view.total, view.approval_rate
    );
    let _ = writeln!(output);
    write_slices(output, "By Status", &view.by_status);
    write_bars(output, "By Course", &view.by_course, "");
    write_slices(output, "By Gender", &view.by_gender);
    write_slices(output, "By Category", &view.by_category);
    write_bars(output, "By State", &view.by_state, "");
    write_line(output, "Applications per Month", &view.monthly);
    let _ = writeln!(output, "### Recent Applications");
    if view.recent.is_empty() {
        let _ = writeln!(output, "No applications recorded for this window.");
    }
    for row in &view.recent {
        let _ = writeln!(
            output,
            "- {} ({}) on {}: {}",
            row.name, row.email, row.applied_on, row.status
        );
    }
    let _ = writeln!(output);
}

fn write_enrollment(output: &mut String, view: &EnrollmentView) {
    let _ = writeln!(output, "{} students enrolled", view.total);
    let _ = writeln!(output);
    write_bars(output, "By Department", &view.by_department, "");
    write_bars(output, "By Academic Year", &view.by_academic_year, "");
    write_bars(output, "By Course", &view.by_course, "");
    write_line(output, "Enrollments per Month", &view.monthly);
}

fn write_performance(output: &mut String, view: &PerformanceView) {
    let _ = writeln!(
        output,
        "{} marks recorded for {} students, average {:.1}%, pass rate {:.0}%",
        view.total, view.students_assessed, view.average_percentage, view.pass_rate
    );
    let _ = writeln!(output);
    write_slices(output, "Grade Distribution", &view.grade_distribution);
    write_bars(output, "Average by Subject", &view.subject_averages, "%");
    let _ = writeln!(output, "### Score Range by Subject");
    for range in &view.subject_ranges {
        let _ = writeln!(
            output,
            "- {}: {:.1}% to {:.1}% (avg {:.1}%)",
            range.name, range.min, range.max, range.average
        );
    }
    let _ = writeln!(output);
    write_bars(output, "Average by Exam", &view.exam_averages, "%");
    write_trend(output, "Monthly Average", &view.monthly_trend);
}

fn write_utilization(output: &mut String, view: &UtilizationView) {
    let _ = writeln!(
        output,
        "{} resources, {} of {} in use ({:.0}%), {} near capacity",
        view.total_resources,
        view.total_in_use,
        view.total_capacity,
        view.overall_percentage,
        view.near_capacity
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "### By Resource Type");
    if view.by_type.is_empty() {
        let _ = writeln!(output, "No resources recorded.");
    }
    for bar in &view.by_type {
        let _ = writeln!(
            output,
            "- {}: {}/{} ({:.0}%)",
            bar.name, bar.in_use, bar.capacity, bar.percentage
        );
    }
    let _ = writeln!(output);
}

pub fn render_view(view: &DashboardView) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {}", view.kind().title());
    match view {
        DashboardView::Admissions(v) => write_admissions(&mut output, v),
        DashboardView::Enrollment(v) => write_enrollment(&mut output, v),
        DashboardView::Performance(v) => write_performance(&mut output, v),
        DashboardView::Utilization(v) => write_utilization(&mut output, v),
    }
    output
}

pub fn build_report(filters: &Filters, generated_at: DateTime<Utc>, views: &[DashboardView]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# College Analytics Report");
    let _ = writeln!(
        output,
        "Generated {} for {}",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        filters.describe()
    );
    let _ = writeln!(output);

    for view in views {
        output.push_str(&render_view(view));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{admission_view, utilization_view};
    use crate::models::{ApplicationRecord, ApplicationStatus, ResourceRecord};
    use chrono::TimeZone;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[test]
    fn banner_depends_on_error_kind() {
        let auth = banner(&FetchError::new(FetchErrorKind::Auth, "role denied"));
        assert_eq!(
            auth,
            "Error: The data store rejected our credentials (role denied)"
        );
        let connection = banner(&FetchError::new(FetchErrorKind::Connection, "timed out"));
        assert!(connection.starts_with("Error: Could not reach"));
    }

    #[test]
    fn report_lists_each_dashboard() {
        let applications = vec![ApplicationRecord {
            id: Uuid::new_v4(),
            applicant_name: "Rahul Joshi".to_string(),
            email: "rahul.joshi@example.edu".to_string(),
            status: Some(ApplicationStatus::Approved),
            course_id: None,
            gender: None,
            category: None,
            state: None,
            created_at: Utc.with_ymd_and_hms(2026, 2, 3, 10, 0, 0).unwrap(),
        }];
        let resources = vec![ResourceRecord {
            name: "Library".to_string(),
            resource_type: Some("library".to_string()),
            capacity: 50,
            in_use: 25,
        }];
        let views = vec![
            DashboardView::Admissions(admission_view(&applications, &HashMap::new())),
            DashboardView::Utilization(utilization_view(&resources)),
        ];
        let generated_at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let report = build_report(&Filters::default(), generated_at, &views);

        assert!(report.starts_with("# College Analytics Report\nGenerated 2026-03-01 08:00 UTC for all records\n"));
        assert!(report.contains("## Admission Analytics"));
        assert!(report.contains("- approved: 1 (100%)"));
        assert!(report.contains("- Not Specified: 1"));
        assert!(report.contains("- 2026-02: 1"));
        assert!(report.contains("- Rahul Joshi (rahul.joshi@example.edu) on 2026-02-03: approved"));
        assert!(report.contains("## Utilization Analytics"));
        assert!(report.contains("- library: 25/50 (50%)"));
    }

    #[test]
    fn empty_sections_say_so() {
        let rendered = render_view(&DashboardView::Utilization(utilization_view(&[])));
        assert!(rendered.contains("No resources recorded."));
    }
}
