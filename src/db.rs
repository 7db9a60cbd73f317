use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::FetchError;
use crate::models::{
    ApplicationRecord, ApplicationStatus, EnrollmentRecord, Filters, MarkRecord, ResourceRecord,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn push_date_range<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    column: &str,
    filters: &Filters,
) {
    if let Some(since) = filters.since {
        builder.push(format!(" AND {column} >= ")).push_bind(since);
    }
    if let Some(until) = filters.until {
        builder.push(format!(" AND {column} <= ")).push_bind(until);
    }
}

fn push_course<'a>(builder: &mut QueryBuilder<'a, Postgres>, column: &str, filters: &Filters) {
    if let Some(course_id) = filters.course_id {
        builder.push(format!(" AND {column} = ")).push_bind(course_id);
    }
}

fn applications_query(filters: &Filters) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT a.id, a.applicant_name, a.email, a.status, a.course_id, a.gender, \
         a.category, a.state, a.created_at \
         FROM college_analytics.applications a \
         WHERE TRUE",
    );
    push_date_range(&mut builder, "a.created_at::date", filters);
    if !filters.statuses.is_empty() {
        let statuses: Vec<String> = filters
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        builder
            .push(" AND lower(btrim(a.status)) = ANY(")
            .push_bind(statuses)
            .push(")");
    }
    push_course(&mut builder, "a.course_id", filters);
    builder.push(" ORDER BY a.created_at");
    builder
}

fn enrollments_query(filters: &Filters) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT st.id, st.full_name, st.course_id, st.department, st.academic_year, st.enrolled_on \
         FROM college_analytics.students st \
         WHERE TRUE",
    );
    push_date_range(&mut builder, "st.enrolled_on", filters);
    push_course(&mut builder, "st.course_id", filters);
    builder.push(" ORDER BY st.enrolled_on");
    builder
}

fn marks_query(filters: &Filters) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT m.student_id, m.subject_id, sub.name AS subject_name, m.exam_name, \
         m.marks_obtained, m.max_marks, m.exam_date \
         FROM college_analytics.marks m \
         LEFT JOIN college_analytics.subjects sub ON sub.id = m.subject_id \
         WHERE TRUE",
    );
    push_date_range(&mut builder, "m.exam_date", filters);
    push_course(&mut builder, "sub.course_id", filters);
    builder.push(" ORDER BY m.exam_date NULLS LAST");
    builder
}

pub async fn fetch_applications(
    pool: &PgPool,
    filters: &Filters,
) -> Result<Vec<ApplicationRecord>, FetchError> {
    let rows = applications_query(filters).build().fetch_all(pool).await?;
    let mut applications = Vec::with_capacity(rows.len());

    for row in rows {
        let status: Option<String> = row.try_get("status")?;
        applications.push(ApplicationRecord {
            id: row.try_get("id")?,
            applicant_name: row.try_get("applicant_name")?,
            email: row.try_get("email")?,
            status: status.and_then(|value| value.parse().ok()),
            course_id: row.try_get("course_id")?,
            gender: row.try_get("gender")?,
            category: row.try_get("category")?,
            state: row.try_get("state")?,
            created_at: row.try_get("created_at")?,
        });
    }

    tracing::debug!(rows = applications.len(), "fetched applications");
    Ok(applications)
}

pub async fn fetch_enrollments(
    pool: &PgPool,
    filters: &Filters,
) -> Result<Vec<EnrollmentRecord>, FetchError> {
    let rows = enrollments_query(filters).build().fetch_all(pool).await?;
    let mut enrollments = Vec::with_capacity(rows.len());

    for row in rows {
        enrollments.push(EnrollmentRecord {
            student_id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            course_id: row.try_get("course_id")?,
            department: row.try_get("department")?,
            academic_year: row.try_get("academic_year")?,
            enrolled_on: row.try_get("enrolled_on")?,
        });
    }

    tracing::debug!(rows = enrollments.len(), "fetched enrollments");
    Ok(enrollments)
}

pub async fn fetch_marks(pool: &PgPool, filters: &Filters) -> Result<Vec<MarkRecord>, FetchError> {
    let rows = marks_query(filters).build().fetch_all(pool).await?;
    let mut marks = Vec::with_capacity(rows.len());

    for row in rows {
        marks.push(MarkRecord {
            student_id: row.try_get("student_id")?,
            subject_id: row.try_get("subject_id")?,
            subject_name: row.try_get("subject_name")?,
            exam_name: row.try_get("exam_name")?,
            marks_obtained: row.try_get("marks_obtained")?,
            max_marks: row.try_get("max_marks")?,
            exam_date: row.try_get("exam_date")?,
        });
    }

    tracing::debug!(rows = marks.len(), "fetched marks");
    Ok(marks)
}

pub async fn fetch_resources(pool: &PgPool) -> Result<Vec<ResourceRecord>, FetchError> {
    let rows = sqlx::query(
        "SELECT name, resource_type, capacity, in_use \
         FROM college_analytics.resources ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    let mut resources = Vec::with_capacity(rows.len());

    for row in rows {
        resources.push(ResourceRecord {
            name: row.try_get("name")?,
            resource_type: row.try_get("resource_type")?,
            capacity: row.try_get("capacity")?,
            in_use: row.try_get("in_use")?,
        });
    }

    tracing::debug!(rows = resources.len(), "fetched resources");
    Ok(resources)
}

/// Course id to display name, used to label foreign keys.
pub async fn fetch_course_names(pool: &PgPool) -> Result<HashMap<Uuid, String>, FetchError> {
    let rows = sqlx::query("SELECT id, name FROM college_analytics.courses")
        .fetch_all(pool)
        .await?;
    let mut names = HashMap::with_capacity(rows.len());
    for row in rows {
        names.insert(row.try_get("id")?, row.try_get("name")?);
    }
    Ok(names)
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub applicant_name: String,
    pub email: String,
    pub status: Option<ApplicationStatus>,
    pub course_id: Option<Uuid>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Returns `false` when an application with the same email already exists.
pub async fn insert_application(
    pool: &PgPool,
    application: &NewApplication,
) -> Result<bool, FetchError> {
    let result = sqlx::query(
        r#"
        INSERT INTO college_analytics.applications
        (id, applicant_name, email, status, course_id, gender, category, state, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&application.applicant_name)
    .bind(&application.email)
    .bind(application.status.map(|s| s.as_str()))
    .bind(application.course_id)
    .bind(&application.gender)
    .bind(&application.category)
    .bind(&application.state)
    .bind(application.created_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_application_status(
    pool: &PgPool,
    id: Uuid,
    status: ApplicationStatus,
) -> Result<u64, FetchError> {
    let result = sqlx::query("UPDATE college_analytics.applications SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_application(pool: &PgPool, id: Uuid) -> Result<u64, FetchError> {
    let result = sqlx::query("DELETE FROM college_analytics.applications WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

async fn course_id_by_code(pool: &PgPool, code: &str) -> anyhow::Result<Option<Uuid>> {
    let id: Option<Uuid> = sqlx::query("SELECT id FROM college_analytics.courses WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?
        .map(|row| row.try_get("id"))
        .transpose()?;
    Ok(id)
}

fn midnight_utc(date: NaiveDate) -> anyhow::Result<DateTime<Utc>> {
    Ok(date
        .and_hms_opt(0, 0, 0)
        .context("invalid date")?
        .and_utc())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let courses = vec![
        ("BSC-CS", "B.Sc Computer Science", "Computer Science"),
        ("BCOM", "B.Com General", "Commerce"),
        ("BA-ENG", "B.A English Literature", "Humanities"),
    ];

    let mut course_ids: HashMap<&str, Uuid> = HashMap::new();
    for (code, name, department) in courses {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO college_analytics.courses (id, code, name, department)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, department = EXCLUDED.department
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(name)
        .bind(department)
        .fetch_one(pool)
        .await?
        .get("id");
        course_ids.insert(code, id);
    }

    let applications = vec![
        ("Aarav Sharma", "aarav.sharma@example.edu", Some("pending"), Some("BSC-CS"), Some("Male"), Some("General"), Some("Karnataka"), (2026, 1, 6)),
        ("Diya Menon", "diya.menon@example.edu", Some("approved"), Some("BSC-CS"), Some("Female"), Some("OBC"), Some("Kerala"), (2026, 1, 9)),
        ("Kabir Singh", "kabir.singh@example.edu", Some("rejected"), Some("BCOM"), Some("Male"), Some("General"), Some("Punjab"), (2026, 1, 14)),
        ("Ananya Iyer", "ananya.iyer@example.edu", Some("approved"), Some("BA-ENG"), Some("Female"), Some("General"), Some("Tamil Nadu"), (2026, 1, 21)),
        ("Rohan Das", "rohan.das@example.edu", Some("waitlisted"), Some("BSC-CS"), Some("Male"), Some("SC"), Some("West Bengal"), (2026, 2, 2)),
        ("Meera Pillai", "meera.pillai@example.edu", Some("pending"), Some("BCOM"), Some("Female"), None, Some("Kerala"), (2026, 2, 11)),
        ("Vivaan Rao", "vivaan.rao@example.edu", Some("approved"), Some("BCOM"), Some("Male"), Some("OBC"), None, (2026, 2, 17)),
        ("Ishita Ghosh", "ishita.ghosh@example.edu", Some("withdrawn"), Some("BA-ENG"), Some("Female"), Some("General"), Some("West Bengal"), (2026, 2, 25)),
        ("Arjun Nair", "arjun.nair@example.edu", Some("pending"), None, None, Some("ST"), Some("Kerala"), (2026, 3, 3)),
        ("Sara Khan", "sara.khan@example.edu", None, Some("BSC-CS"), Some("Female"), Some("General"), Some("Maharashtra"), (2026, 3, 8)),
    ];

    for (name, email, status, course, gender, category, state, (y, m, d)) in applications {
        let created_on = NaiveDate::from_ymd_opt(y, m, d).context("invalid date")?;
        insert_application(
            pool,
            &NewApplication {
                applicant_name: name.to_string(),
                email: email.to_string(),
                status: status.and_then(|s| s.parse().ok()),
                course_id: course.and_then(|code| course_ids.get(code).copied()),
                gender: gender.map(str::to_string),
                category: category.map(str::to_string),
                state: state.map(str::to_string),
                created_at: midnight_utc(created_on)?,
            },
        )
        .await?;
    }

    let students = vec![
        ("Neha Kulkarni", "neha.kulkarni@example.edu", "BSC-CS", "2025-26", (2025, 7, 14)),
        ("Aditya Verma", "aditya.verma@example.edu", "BSC-CS", "2025-26", (2025, 7, 15)),
        ("Pooja Reddy", "pooja.reddy@example.edu", "BCOM", "2025-26", (2025, 7, 21)),
        ("Farhan Ali", "farhan.ali@example.edu", "BCOM", "2024-25", (2024, 7, 12)),
        ("Lakshmi Nair", "lakshmi.nair@example.edu", "BA-ENG", "2024-25", (2024, 8, 2)),
    ];

    let mut student_ids: HashMap<&str, Uuid> = HashMap::new();
    for (name, email, course, year, (y, m, d)) in students {
        let course_id = course_ids.get(course).copied();
        let department: Option<String> =
            sqlx::query("SELECT department FROM college_analytics.courses WHERE code = $1")
                .bind(course)
                .fetch_one(pool)
                .await?
                .get("department");
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO college_analytics.students
            (id, full_name, email, course_id, department, academic_year, enrolled_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, course_id = EXCLUDED.course_id
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(course_id)
        .bind(department)
        .bind(year)
        .bind(NaiveDate::from_ymd_opt(y, m, d).context("invalid date")?)
        .fetch_one(pool)
        .await?
        .get("id");
        student_ids.insert(email, id);
    }

    let subjects = vec![
        ("CS101", "Programming Fundamentals", "BSC-CS"),
        ("CS102", "Discrete Mathematics", "BSC-CS"),
        ("COM101", "Financial Accounting", "BCOM"),
        ("ENG101", "British Poetry", "BA-ENG"),
    ];

    let mut subject_ids: HashMap<&str, Uuid> = HashMap::new();
    for (code, name, course) in subjects {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO college_analytics.subjects (id, course_id, code, name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_ids.get(course).copied())
        .bind(code)
        .bind(name)
        .fetch_one(pool)
        .await?
        .get("id");
        subject_ids.insert(code, id);
    }

    let marks = vec![
        ("seed-mark-001", "neha.kulkarni@example.edu", "CS101", "Internal 1", 92.0, 100.0, (2025, 9, 12)),
        ("seed-mark-002", "neha.kulkarni@example.edu", "CS102", "Internal 1", 41.0, 50.0, (2025, 9, 15)),
        ("seed-mark-003", "aditya.verma@example.edu", "CS101", "Internal 1", 58.0, 100.0, (2025, 9, 12)),
        ("seed-mark-004", "aditya.verma@example.edu", "CS102", "Internal 1", 17.0, 50.0, (2025, 9, 15)),
        ("seed-mark-005", "pooja.reddy@example.edu", "COM101", "Internal 1", 76.0, 100.0, (2025, 9, 18)),
        ("seed-mark-006", "farhan.ali@example.edu", "COM101", "Semester End", 64.0, 100.0, (2025, 11, 24)),
        ("seed-mark-007", "lakshmi.nair@example.edu", "ENG101", "Semester End", 83.0, 100.0, (2025, 11, 26)),
        ("seed-mark-008", "neha.kulkarni@example.edu", "CS101", "Semester End", 88.0, 100.0, (2025, 11, 28)),
        ("seed-mark-009", "aditya.verma@example.edu", "CS101", "Semester End", 35.0, 100.0, (2025, 11, 28)),
    ];

    for (source_key, email, subject, exam, obtained, max, (y, m, d)) in marks {
        let student_id = student_ids
            .get(email)
            .copied()
            .with_context(|| format!("seed student {email} missing"))?;
        sqlx::query(
            r#"
            INSERT INTO college_analytics.marks
            (id, student_id, subject_id, exam_name, marks_obtained, max_marks, exam_date, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(subject_ids.get(subject).copied())
        .bind(exam)
        .bind(obtained)
        .bind(max)
        .bind(NaiveDate::from_ymd_opt(y, m, d).context("invalid date")?)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let resources = vec![
        ("Central Library Reading Hall", "library", 120, 87),
        ("Boys Hostel Block A", "hostel", 200, 188),
        ("Girls Hostel Block B", "hostel", 180, 142),
        ("Computer Lab 1", "lab", 60, 41),
        ("Faculty Laptops", "it_asset", 45, 44),
    ];

    for (name, resource_type, capacity, in_use) in resources {
        sqlx::query(
            r#"
            INSERT INTO college_analytics.resources (id, resource_type, name, capacity, in_use)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET resource_type = EXCLUDED.resource_type,
                capacity = EXCLUDED.capacity,
                in_use = EXCLUDED.in_use
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resource_type)
        .bind(name)
        .bind(capacity)
        .bind(in_use)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        applicant_name: String,
        email: String,
        status: Option<String>,
        course_code: Option<String>,
        gender: Option<String>,
        category: Option<String>,
        state: Option<String>,
        applied_on: Option<NaiveDate>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let status = match row.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<ApplicationStatus>() {
                Ok(status) => Some(status),
                Err(error) => {
                    tracing::warn!(email = %row.email, %error, "importing with unknown status");
                    None
                }
            },
        };
        let course_id = match row.course_code.as_deref() {
            Some(code) if !code.trim().is_empty() => course_id_by_code(pool, code.trim()).await?,
            _ => None,
        };
        let created_at = match row.applied_on {
            Some(date) => midnight_utc(date)?,
            None => Utc::now(),
        };

        let application = NewApplication {
            applicant_name: row.applicant_name,
            email: row.email,
            status,
            course_id,
            gender: row.gender,
            category: row.category,
            state: row.state,
            created_at,
        };
        if insert_application(pool, &application).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_application_query_has_no_binds() {
        let builder = applications_query(&Filters::default());
        assert_eq!(
            builder.sql(),
            "SELECT a.id, a.applicant_name, a.email, a.status, a.course_id, a.gender, \
             a.category, a.state, a.created_at \
             FROM college_analytics.applications a \
             WHERE TRUE ORDER BY a.created_at"
        );
    }

    #[test]
    fn application_filters_bind_in_order() {
        let filters = Filters {
            since: NaiveDate::from_ymd_opt(2026, 1, 1),
            until: NaiveDate::from_ymd_opt(2026, 3, 31),
            statuses: vec![ApplicationStatus::Approved],
            course_id: Some(Uuid::new_v4()),
        };
        let builder = applications_query(&filters);
        let sql = builder.sql();
        assert!(sql.contains("a.created_at::date >= $1"));
        assert!(sql.contains("a.created_at::date <= $2"));
        assert!(sql.contains("lower(btrim(a.status)) = ANY($3)"));
        assert!(sql.contains("a.course_id = $4"));
    }

    #[test]
    fn marks_filter_by_course_through_subject() {
        let filters = Filters {
            course_id: Some(Uuid::new_v4()),
            statuses: vec![ApplicationStatus::Pending],
            ..Filters::default()
        };
        let builder = marks_query(&filters);
        let sql = builder.sql();
        assert!(sql.contains("LEFT JOIN college_analytics.subjects sub"));
        assert!(sql.contains("sub.course_id = $1"));
        assert!(!sql.contains("status"));
    }

    #[test]
    fn enrollment_dates_use_enrolled_on() {
        let filters = Filters {
            since: NaiveDate::from_ymd_opt(2025, 6, 1),
            ..Filters::default()
        };
        let builder = enrollments_query(&filters);
        assert!(builder.sql().contains("st.enrolled_on >= $1"));
    }
}
