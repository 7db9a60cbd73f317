pub mod aggregate;
pub mod analytics;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod grade;
pub mod live;
pub mod models;
pub mod present;
pub mod report;
