use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{
    fold_by, group_by, group_by_value, label_or, month_key, percentage_of, round_1, BucketOrder,
    NOT_SPECIFIED, UNKNOWN,
};
use crate::grade::{score_percentage, GradeBand, PASS_PERCENTAGE};
use crate::models::{
    ApplicationRecord, ApplicationStatus, EnrollmentRecord, MarkRecord, ResourceRecord,
};
use crate::present::{
    count_bars, mean_bars, monthly_counts, monthly_means, pie, range_bars, BarEntry, LinePoint,
    PieSlice, RangeBar, RecentRow, TrendPoint, UtilizationBar,
};

/// Resources at or above this occupancy are reported as near capacity.
pub const NEAR_CAPACITY_PERCENTAGE: f64 = 90.0;

pub const RECENT_APPLICATIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionView {
    pub total: u64,
    pub approval_rate: f64,
    pub by_status: Vec<PieSlice>,
    pub by_course: Vec<BarEntry>,
    pub by_gender: Vec<PieSlice>,
    pub by_category: Vec<PieSlice>,
    pub by_state: Vec<BarEntry>,
    pub monthly: Vec<LinePoint>,
    pub recent: Vec<RecentRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    pub total: u64,
    pub by_department: Vec<BarEntry>,
    pub by_academic_year: Vec<BarEntry>,
    pub by_course: Vec<BarEntry>,
    pub monthly: Vec<LinePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceView {
    pub total: u64,
    pub students_assessed: u64,
    pub average_percentage: f64,
    pub pass_rate: f64,
    pub grade_distribution: Vec<PieSlice>,
    pub subject_averages: Vec<BarEntry>,
    pub subject_ranges: Vec<RangeBar>,
    pub exam_averages: Vec<BarEntry>,
    pub monthly_trend: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationView {
    pub total_resources: u64,
    pub total_capacity: i64,
    pub total_in_use: i64,
    pub overall_percentage: f64,
    pub near_capacity: u64,
    pub by_type: Vec<UtilizationBar>,
}

/// Name of a referenced course. A NULL reference and a dangling one get different labels.
pub fn course_label(course_id: Option<Uuid>, course_names: &HashMap<Uuid, String>) -> String {
    match course_id {
        None => NOT_SPECIFIED.to_string(),
        Some(id) => course_names
            .get(&id)
            .map(|name| label_or(Some(name.as_str()), UNKNOWN))
            .unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

fn status_label(status: Option<ApplicationStatus>) -> String {
    status
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn admission_view(
    applications: &[ApplicationRecord],
    course_names: &HashMap<Uuid, String>,
) -> AdmissionView {
    let by_status = group_by(applications, |a| status_label(a.status));
    let approved = by_status.count_of(ApplicationStatus::Approved.as_str());
    let decided = approved + by_status.count_of(ApplicationStatus::Rejected.as_str());

    AdmissionView {
        total: by_status.total(),
        approval_rate: if decided == 0 {
            0.0
        } else {
            percentage_of(approved as f64, decided as f64)
        },
        by_status: pie(by_status.summarize(BucketOrder::ByCountDesc)),
        by_course: count_bars(
            group_by(applications, |a| course_label(a.course_id, course_names))
                .summarize(BucketOrder::ByCountDesc),
        ),
        by_gender: pie(
            group_by(applications, |a| label_or(a.gender.as_deref(), NOT_SPECIFIED))
                .summarize(BucketOrder::ByCountDesc),
        ),
        by_category: pie(
            group_by(applications, |a| label_or(a.category.as_deref(), NOT_SPECIFIED))
                .summarize(BucketOrder::ByCountDesc),
        ),
        by_state: count_bars(
            group_by(applications, |a| label_or(a.state.as_deref(), NOT_SPECIFIED))
                .summarize(BucketOrder::ByCountDesc),
        ),
        monthly: monthly_counts(&group_by(applications, |a| {
            month_key(a.created_at.date_naive())
        })),
        recent: recent_applications(applications),
    }
}

/// Latest applications first; ties keep a stable order by email.
fn recent_applications(applications: &[ApplicationRecord]) -> Vec<RecentRow> {
    let mut latest: Vec<&ApplicationRecord> = applications.iter().collect();
    latest.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.email.cmp(&b.email))
    });
    latest
        .into_iter()
        .take(RECENT_APPLICATIONS)
        .map(|a| RecentRow {
            name: label_or(Some(a.applicant_name.as_str()), UNKNOWN),
            email: a.email.clone(),
            status: status_label(a.status),
            applied_on: a.created_at.date_naive(),
        })
        .collect()
}

pub fn enrollment_view(
    enrollments: &[EnrollmentRecord],
    course_names: &HashMap<Uuid, String>,
) -> EnrollmentView {
    let by_department = group_by(enrollments, |e| {
        label_or(e.department.as_deref(), NOT_SPECIFIED)
    });

    EnrollmentView {
        total: by_department.total(),
        by_department: count_bars(by_department.summarize(BucketOrder::ByCountDesc)),
        by_academic_year: count_bars(
            group_by(enrollments, |e| {
                label_or(e.academic_year.as_deref(), NOT_SPECIFIED)
            })
            .summarize(BucketOrder::ByKey),
        ),
        by_course: count_bars(
            group_by(enrollments, |e| course_label(e.course_id, course_names))
                .summarize(BucketOrder::ByCountDesc),
        ),
        monthly: monthly_counts(&group_by(enrollments, |e| month_key(e.enrolled_on))),
    }
}

fn subject_label(mark: &MarkRecord) -> String {
    match mark.subject_id {
        None => NOT_SPECIFIED.to_string(),
        Some(_) => label_or(mark.subject_name.as_deref(), UNKNOWN),
    }
}

fn mark_percentage(mark: &MarkRecord) -> f64 {
    score_percentage(mark.marks_obtained, mark.max_marks)
}

pub fn performance_view(marks: &[MarkRecord]) -> PerformanceView {
    let grades = group_by(marks, |m| {
        GradeBand::from_score(m.marks_obtained, m.max_marks)
            .label()
            .to_string()
    });
    let total = grades.total();
    let percentage_sum: f64 = marks.iter().map(mark_percentage).sum();
    let by_subject = group_by_value(marks, subject_label, |m| Some(mark_percentage(m)));
    let passed = marks
        .iter()
        .filter(|m| mark_percentage(m) >= PASS_PERCENTAGE)
        .count();

    // Undated marks cannot sit on a time axis, so the trend only covers dated ones.
    let dated: Vec<&MarkRecord> = marks.iter().filter(|m| m.exam_date.is_some()).collect();
    let monthly = group_by_value(
        &dated,
        |m| m.exam_date.map(month_key).unwrap_or_default(),
        |m| Some(mark_percentage(m)),
    );

    let students_assessed = marks
        .iter()
        .map(|m| m.student_id)
        .collect::<HashSet<_>>()
        .len() as u64;

    PerformanceView {
        total,
        students_assessed,
        average_percentage: if total == 0 {
            0.0
        } else {
            round_1(percentage_sum / total as f64)
        },
        pass_rate: percentage_of(passed as f64, total as f64),
        grade_distribution: pie(grades.summarize(BucketOrder::Ranked(&GradeBand::LABELS))),
        subject_averages: mean_bars(by_subject.means(BucketOrder::ByKey)),
        subject_ranges: range_bars(&by_subject),
        exam_averages: mean_bars(
            group_by_value(
                marks,
                |m| label_or(m.exam_name.as_deref(), NOT_SPECIFIED),
                |m| Some(mark_percentage(m)),
            )
            .means(BucketOrder::ByKey),
        ),
        monthly_trend: monthly_means(&monthly),
    }
}

#[derive(Debug, Default)]
struct Usage {
    resources: u64,
    capacity: i64,
    in_use: i64,
}

fn is_near_capacity(resource: &ResourceRecord) -> bool {
    resource.capacity > 0
        && f64::from(resource.in_use) * 100.0 / f64::from(resource.capacity)
            >= NEAR_CAPACITY_PERCENTAGE
}

fn occupancy(in_use: i64, capacity: i64) -> f64 {
    if capacity <= 0 {
        0.0
    } else {
        percentage_of(in_use as f64, capacity as f64)
    }
}

pub fn utilization_view(resources: &[ResourceRecord]) -> UtilizationView {
    let by_type = fold_by(
        resources,
        |r| label_or(r.resource_type.as_deref(), NOT_SPECIFIED),
        |usage: &mut Usage, r| {
            usage.resources += 1;
            usage.capacity += i64::from(r.capacity.max(0));
            usage.in_use += i64::from(r.in_use.max(0));
        },
    );

    let total_capacity: i64 = by_type.values().map(|u| u.capacity).sum();
    let total_in_use: i64 = by_type.values().map(|u| u.in_use).sum();
    let near_capacity = resources.iter().filter(|r| is_near_capacity(r)).count() as u64;

    UtilizationView {
        total_resources: by_type.values().map(|u| u.resources).sum(),
        total_capacity,
        total_in_use,
        overall_percentage: occupancy(total_in_use, total_capacity),
        near_capacity,
        by_type: by_type
            .into_iter()
            .map(|(name, usage)| UtilizationBar {
                name,
                capacity: usage.capacity,
                in_use: usage.in_use,
                percentage: occupancy(usage.in_use, usage.capacity),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn application(status: Option<ApplicationStatus>, course_id: Option<Uuid>) -> ApplicationRecord {
        ApplicationRecord {
            id: Uuid::new_v4(),
            applicant_name: "Priya Nair".to_string(),
            email: format!("{}@example.edu", Uuid::new_v4()),
            status,
            course_id,
            gender: Some("Female".to_string()),
            category: None,
            state: Some("Kerala".to_string()),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap(),
        }
    }

    fn mark(obtained: f64, max: f64, subject: Option<&str>, date: Option<(i32, u32, u32)>) -> MarkRecord {
        MarkRecord {
            student_id: Uuid::new_v4(),
            subject_id: subject.map(|_| Uuid::new_v4()),
            subject_name: subject.map(str::to_string),
            exam_name: Some("Midterm".to_string()),
            marks_obtained: obtained,
            max_marks: max,
            exam_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        }
    }

    fn slice<'a>(slices: &'a [PieSlice], name: &str) -> &'a PieSlice {
        slices
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("missing slice {name}"))
    }

    #[test]
    fn status_breakdown_of_ten_applications() {
        let mut rows = Vec::new();
        rows.extend((0..4).map(|_| application(Some(ApplicationStatus::Pending), None)));
        rows.extend((0..3).map(|_| application(Some(ApplicationStatus::Approved), None)));
        rows.extend((0..3).map(|_| application(Some(ApplicationStatus::Rejected), None)));

        let view = admission_view(&rows, &HashMap::new());
        assert_eq!(view.total, 10);
        assert_eq!(view.by_status.len(), 3);
        assert_eq!(slice(&view.by_status, "pending").value, 4);
        assert_eq!(slice(&view.by_status, "pending").percentage, 40.0);
        assert_eq!(slice(&view.by_status, "approved").percentage, 30.0);
        assert_eq!(slice(&view.by_status, "rejected").percentage, 30.0);
        assert_eq!(view.by_status[0].name, "pending");
        assert_eq!(view.approval_rate, 50.0);
        assert_eq!(view.recent.len(), RECENT_APPLICATIONS);
    }

    #[test]
    fn recent_applications_are_newest_first() {
        let mut older = application(Some(ApplicationStatus::Pending), None);
        older.email = "older@example.edu".to_string();
        let mut newer = application(None, None);
        newer.email = "newer@example.edu".to_string();
        newer.created_at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();

        let view = admission_view(&[older, newer], &HashMap::new());
        assert_eq!(view.recent[0].email, "newer@example.edu");
        assert_eq!(view.recent[0].status, UNKNOWN);
        assert_eq!(view.recent[1].status, "pending");
        assert_eq!(
            view.recent[1].applied_on,
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
    }

    #[test]
    fn empty_input_produces_empty_views() {
        let admissions = admission_view(&[], &HashMap::new());
        assert_eq!(admissions.total, 0);
        assert!(admissions.by_status.is_empty());
        assert!(admissions.monthly.is_empty());
        assert_eq!(admissions.approval_rate, 0.0);

        let performance = performance_view(&[]);
        assert_eq!(performance.total, 0);
        assert_eq!(performance.average_percentage, 0.0);
        assert_eq!(performance.pass_rate, 0.0);
        assert!(performance.grade_distribution.is_empty());

        let enrollment = enrollment_view(&[], &HashMap::new());
        assert_eq!(enrollment.total, 0);
        assert!(enrollment.by_department.is_empty());

        let utilization = utilization_view(&[]);
        assert_eq!(utilization.overall_percentage, 0.0);
        assert!(utilization.by_type.is_empty());
    }

    #[test]
    fn null_course_references_share_one_bucket() {
        let rows = vec![application(None, None), application(None, None)];
        let view = admission_view(&rows, &HashMap::new());
        assert_eq!(
            view.by_course,
            vec![BarEntry {
                name: NOT_SPECIFIED.to_string(),
                value: 2.0
            }]
        );
        assert_eq!(slice(&view.by_status, UNKNOWN).value, 2);
        assert_eq!(slice(&view.by_category, NOT_SPECIFIED).value, 2);
    }

    #[test]
    fn dangling_course_reference_is_unknown() {
        let known = Uuid::new_v4();
        let names = HashMap::from([(known, "B.Sc Physics".to_string())]);
        assert_eq!(course_label(Some(known), &names), "B.Sc Physics");
        assert_eq!(course_label(Some(Uuid::new_v4()), &names), UNKNOWN);
        assert_eq!(course_label(None, &names), NOT_SPECIFIED);
    }

    #[test]
    fn eighty_five_percent_lands_in_a_band() {
        let view = performance_view(&[mark(85.0, 100.0, Some("Physics"), None)]);
        assert_eq!(view.grade_distribution.len(), 1);
        assert_eq!(view.grade_distribution[0].name, "A");
        assert_eq!(view.grade_distribution[0].percentage, 100.0);
        assert!(view.monthly_trend.is_empty());
    }

    #[test]
    fn performance_summarises_grades_subjects_and_trend() {
        let marks = vec![
            mark(95.0, 100.0, Some("Physics"), Some((2026, 1, 10))),
            mark(30.0, 100.0, Some("Physics"), Some((2026, 1, 20))),
            mark(36.0, 50.0, Some("Chemistry"), Some((2026, 2, 5))),
            mark(10.0, 0.0, None, None),
        ];
        let view = performance_view(&marks);
        let grade_names: Vec<&str> = view.grade_distribution.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(grade_names, vec!["A+", "B+", "F"]);
        let grade_total: u64 = view.grade_distribution.iter().map(|s| s.value).sum();
        assert_eq!(grade_total, 4);
        assert_eq!(view.students_assessed, 4);
        assert_eq!(view.pass_rate, 50.0);
        assert_eq!(view.average_percentage, 49.3);
        assert_eq!(
            view.subject_averages,
            vec![
                BarEntry { name: "Chemistry".to_string(), value: 72.0 },
                BarEntry { name: NOT_SPECIFIED.to_string(), value: 0.0 },
                BarEntry { name: "Physics".to_string(), value: 62.5 },
            ]
        );
        assert_eq!(view.subject_ranges[2].min, 30.0);
        assert_eq!(view.subject_ranges[2].max, 95.0);
        assert_eq!(
            view.monthly_trend,
            vec![
                TrendPoint { month: "2026-01".to_string(), average: 62.5 },
                TrendPoint { month: "2026-02".to_string(), average: 72.0 },
            ]
        );
    }

    #[test]
    fn utilization_groups_by_resource_type() {
        let resources = vec![
            ResourceRecord { name: "Block A".into(), resource_type: Some("hostel".into()), capacity: 100, in_use: 95 },
            ResourceRecord { name: "Block B".into(), resource_type: Some("hostel".into()), capacity: 100, in_use: 45 },
            ResourceRecord { name: "Lab 1".into(), resource_type: Some("lab".into()), capacity: 40, in_use: 10 },
            ResourceRecord { name: "Spare".into(), resource_type: None, capacity: 0, in_use: 0 },
        ];
        let view = utilization_view(&resources);
        assert_eq!(view.total_resources, 4);
        assert_eq!(view.total_capacity, 240);
        assert_eq!(view.total_in_use, 150);
        assert_eq!(view.overall_percentage, 63.0);
        assert_eq!(view.near_capacity, 1);
        assert_eq!(view.by_type[0].name, NOT_SPECIFIED);
        assert_eq!(view.by_type[0].percentage, 0.0);
        assert_eq!(view.by_type[1].name, "hostel");
        assert_eq!(view.by_type[1].percentage, 70.0);
        assert_eq!(view.by_type[2].percentage, 25.0);
    }

    #[test]
    fn grades_and_pass_rate_use_the_exact_percentage() {
        let view = performance_view(&[
            mark(89.96, 100.0, Some("Physics"), None),
            mark(39.96, 100.0, Some("Physics"), None),
        ]);
        let grade_names: Vec<&str> = view.grade_distribution.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(grade_names, vec!["A", "F"]);
        assert_eq!(view.pass_rate, 50.0);
        assert_eq!(view.subject_ranges[0].max, 90.0);
    }

    #[test]
    fn occupancy_just_under_ninety_percent_is_not_near_capacity() {
        let resource = |in_use| ResourceRecord {
            name: "Hall".into(),
            resource_type: Some("auditorium".into()),
            capacity: 200,
            in_use,
        };
        let view = utilization_view(&[resource(179)]);
        assert_eq!(view.near_capacity, 0);
        assert_eq!(utilization_view(&[resource(180)]).near_capacity, 1);
    }

    #[test]
    fn views_are_idempotent() {
        let rows = vec![
            application(Some(ApplicationStatus::Waitlisted), None),
            application(None, Some(Uuid::new_v4())),
        ];
        let names = HashMap::new();
        assert_eq!(admission_view(&rows, &names), admission_view(&rows, &names));
    }
}
