use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{round_1, BucketSet, BucketSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub name: String,
    pub value: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarEntry {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePoint {
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: String,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRow {
    pub name: String,
    pub email: String,
    pub status: String,
    pub applied_on: NaiveDate,
}

/// Spread of a numeric value inside one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeBar {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationBar {
    pub name: String,
    pub capacity: i64,
    pub in_use: i64,
    pub percentage: f64,
}

pub fn pie(summaries: Vec<BucketSummary>) -> Vec<PieSlice> {
    summaries
        .into_iter()
        .map(|s| PieSlice {
            name: s.name,
            value: s.value,
            percentage: s.percentage,
        })
        .collect()
}

pub fn count_bars(summaries: Vec<BucketSummary>) -> Vec<BarEntry> {
    summaries
        .into_iter()
        .map(|s| BarEntry {
            name: s.name,
            value: s.value as f64,
        })
        .collect()
}

pub fn mean_bars(means: Vec<(String, f64)>) -> Vec<BarEntry> {
    means
        .into_iter()
        .map(|(name, mean)| BarEntry {
            name,
            value: round_1(mean),
        })
        .collect()
}

/// Month-keyed buckets as a chronological line; keys are `YYYY-MM`.
pub fn monthly_counts(months: &BucketSet) -> Vec<LinePoint> {
    months
        .iter()
        .map(|(month, bucket)| LinePoint {
            month: month.clone(),
            count: bucket.count,
        })
        .collect()
}

pub fn monthly_means(months: &BucketSet) -> Vec<TrendPoint> {
    months
        .iter()
        .map(|(month, bucket)| TrendPoint {
            month: month.clone(),
            average: round_1(bucket.mean()),
        })
        .collect()
}

/// Buckets without any numeric sample are left out.
pub fn range_bars(buckets: &BucketSet) -> Vec<RangeBar> {
    buckets
        .iter()
        .filter_map(|(name, bucket)| {
            Some(RangeBar {
                name: name.clone(),
                min: round_1(bucket.min?),
                max: round_1(bucket.max?),
                average: round_1(bucket.mean()),
            })
        })
        .collect()
}
