use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ApplicationStatus, Filters};

#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Postgres connection string of the college data store
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    pub database_url: Option<String>,
    #[arg(
        long,
        env = "COLLEGE_ANALYTICS_MAX_CONNECTIONS",
        default_value_t = 5,
        global = true
    )]
    pub max_connections: u32,
}

impl ConnectionArgs {
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to the college Postgres instance")?;

        PgPoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only records on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,
    /// Only records on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<NaiveDate>,
    /// Application statuses to include, comma separated
    #[arg(long = "status", value_delimiter = ',')]
    pub statuses: Vec<ApplicationStatus>,
    #[arg(long)]
    pub course_id: Option<Uuid>,
}

impl FilterArgs {
    pub fn into_filters(self) -> anyhow::Result<Filters> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            anyhow::ensure!(since <= until, "--since {since} is after --until {until}");
        }
        Ok(Filters {
            since: self.since,
            until: self.until,
            statuses: self.statuses,
            course_id: self.course_id,
        })
    }
}

/// Loads `.env` from the working directory or its parents. A missing file is not an error.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(error),
    }
}
