use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Waitlisted,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Waitlisted,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Waitlisted => "waitlisted",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown application status: {value}"))
    }
}

#[derive(Debug, Clone)]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub applicant_name: String,
    pub email: String,
    /// `None` when the stored value is NULL or not one of the known statuses.
    pub status: Option<ApplicationStatus>,
    pub course_id: Option<Uuid>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EnrollmentRecord {
    pub student_id: Uuid,
    pub full_name: String,
    pub course_id: Option<Uuid>,
    pub department: Option<String>,
    pub academic_year: Option<String>,
    pub enrolled_on: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct MarkRecord {
    pub student_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub subject_name: Option<String>,
    pub exam_name: Option<String>,
    pub marks_obtained: f64,
    pub max_marks: f64,
    pub exam_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub name: String,
    pub resource_type: Option<String>,
    pub capacity: i32,
    pub in_use: i32,
}

/// Optional narrowing applied by every fetcher. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub statuses: Vec<ApplicationStatus>,
    pub course_id: Option<Uuid>,
}

impl Filters {
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(since) = self.since {
            parts.push(format!("since {since}"));
        }
        if let Some(until) = self.until {
            parts.push(format!("until {until}"));
        }
        if !self.statuses.is_empty() {
            let statuses: Vec<&str> = self.statuses.iter().map(|s| s.as_str()).collect();
            parts.push(format!("status {}", statuses.join("/")));
        }
        if let Some(course_id) = self.course_id {
            parts.push(format!("course {course_id}"));
        }
        if parts.is_empty() {
            "all records".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            " Approved ".parse::<ApplicationStatus>(),
            Ok(ApplicationStatus::Approved)
        );
        assert_eq!(
            "WAITLISTED".parse::<ApplicationStatus>(),
            Ok(ApplicationStatus::Waitlisted)
        );
        assert!("enrolled".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn filters_describe_lists_active_constraints() {
        assert_eq!(Filters::default().describe(), "all records");
        let filters = Filters {
            since: NaiveDate::from_ymd_opt(2026, 1, 1),
            statuses: vec![ApplicationStatus::Pending, ApplicationStatus::Approved],
            ..Filters::default()
        };
        assert_eq!(filters.describe(), "since 2026-01-01, status pending/approved");
    }
}
