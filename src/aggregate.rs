use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

pub const UNKNOWN: &str = "Unknown";
pub const NOT_SPECIFIED: &str = "Not Specified";

/// Trimmed label, or `fallback` when the field is missing or blank.
pub fn label_or(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => fallback.to_string(),
    }
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// `part / whole * 100`, rounded to a whole number. A zero `whole` divides by 1.
pub fn percentage_of(part: f64, whole: f64) -> f64 {
    let denominator = if whole == 0.0 { 1.0 } else { whole };
    (part / denominator * 100.0).round()
}

pub fn round_1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    pub count: u64,
    pub samples: u64,
    pub total: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bucket {
    /// Counts the row and, when present and finite, accumulates its value.
    pub fn absorb(&mut self, value: Option<f64>) {
        self.count += 1;
        let Some(value) = value.filter(|v| v.is_finite()) else {
            return;
        };
        self.samples += 1;
        self.total += value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
    }

    pub fn mean(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total / self.samples as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BucketOrder<'a> {
    /// Largest bucket first, ties broken by name.
    ByCountDesc,
    ByKey,
    /// Keys in the given order; keys not listed follow alphabetically.
    Ranked(&'a [&'a str]),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    pub name: String,
    pub value: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketSet {
    buckets: BTreeMap<String, Bucket>,
}

impl BucketSet {
    pub fn total(&self) -> u64 {
        self.buckets.values().map(|b| b.count).sum()
    }

    pub fn get(&self, key: &str) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn count_of(&self, key: &str) -> u64 {
        self.get(key).map_or(0, |b| b.count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bucket)> {
        self.buckets.iter()
    }

    fn ordered(&self, order: BucketOrder<'_>) -> Vec<(&String, &Bucket)> {
        let mut entries: Vec<(&String, &Bucket)> = self.buckets.iter().collect();
        match order {
            BucketOrder::ByKey => {}
            BucketOrder::ByCountDesc => {
                entries.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
            }
            BucketOrder::Ranked(rank) => {
                let position = |key: &str| rank.iter().position(|r| *r == key);
                entries.sort_by(|a, b| match (position(a.0), position(b.0)) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => a.0.cmp(b.0),
                });
            }
        }
        entries
    }

    pub fn summarize(&self, order: BucketOrder<'_>) -> Vec<BucketSummary> {
        let total = self.total() as f64;
        self.ordered(order)
            .into_iter()
            .map(|(name, bucket)| BucketSummary {
                name: name.clone(),
                value: bucket.count,
                percentage: percentage_of(bucket.count as f64, total),
            })
            .collect()
    }

    /// Mean of the accumulated values per bucket.
    pub fn means(&self, order: BucketOrder<'_>) -> Vec<(String, f64)> {
        self.ordered(order)
            .into_iter()
            .map(|(name, bucket)| (name.clone(), bucket.mean()))
            .collect()
    }
}

impl From<BTreeMap<String, Bucket>> for BucketSet {
    fn from(buckets: BTreeMap<String, Bucket>) -> Self {
        Self { buckets }
    }
}

/// Groups rows by `key_of` and folds each group with `reduce`.
pub fn fold_by<T, A, K, R>(rows: &[T], mut key_of: K, mut reduce: R) -> BTreeMap<String, A>
where
    A: Default,
    K: FnMut(&T) -> String,
    R: FnMut(&mut A, &T),
{
    let mut groups: BTreeMap<String, A> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(key_of(row)).or_default();
        reduce(entry, row);
    }
    groups
}

pub fn group_by<T, K>(rows: &[T], key_of: K) -> BucketSet
where
    K: FnMut(&T) -> String,
{
    fold_by(rows, key_of, |bucket: &mut Bucket, _| bucket.absorb(None)).into()
}

pub fn group_by_value<T, K, V>(rows: &[T], key_of: K, mut value_of: V) -> BucketSet
where
    K: FnMut(&T) -> String,
    V: FnMut(&T) -> Option<f64>,
{
    fold_by(rows, key_of, |bucket: &mut Bucket, row| {
        bucket.absorb(value_of(row))
    })
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn bucket_counts_sum_to_input_length() {
        let rows = labels(&[Some("a"), Some("b"), None, Some("a"), Some(" "), Some("c")]);
        let set = group_by(&rows, |r| label_or(r.as_deref(), UNKNOWN));
        assert_eq!(set.total(), rows.len() as u64);
        assert_eq!(set.count_of("a"), 2);
        assert_eq!(set.count_of(UNKNOWN), 2);
    }

    #[test]
    fn percentages_sum_close_to_hundred() {
        let rows = labels(&[Some("x"), Some("y"), Some("y"), Some("z"), Some("z"), Some("z")]);
        let summaries = group_by(&rows, |r| label_or(r.as_deref(), UNKNOWN))
            .summarize(BucketOrder::ByCountDesc);
        let sum: f64 = summaries.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() <= summaries.len() as f64 * 0.5);
        assert_eq!(summaries[0].name, "z");
        assert_eq!(summaries[0].percentage, 50.0);
    }

    #[test]
    fn zero_total_is_guarded() {
        assert_eq!(percentage_of(0.0, 0.0), 0.0);
        let empty: Vec<Option<String>> = Vec::new();
        let set = group_by(&empty, |r| label_or(r.as_deref(), UNKNOWN));
        assert_eq!(set.total(), 0);
        assert!(set.summarize(BucketOrder::ByCountDesc).is_empty());
    }

    #[test]
    fn value_accumulators_track_min_max_and_mean() {
        let rows = vec![("a", Some(10.0)), ("a", Some(30.0)), ("a", None), ("b", Some(f64::NAN))];
        let set = group_by_value(&rows, |r| r.0.to_string(), |r| r.1);
        let a = set.get("a").unwrap();
        assert_eq!(a.count, 3);
        assert_eq!(a.samples, 2);
        assert_eq!(a.min, Some(10.0));
        assert_eq!(a.max, Some(30.0));
        assert_eq!(a.mean(), 20.0);
        let b = set.get("b").unwrap();
        assert_eq!(b.count, 1);
        assert_eq!(b.mean(), 0.0);
        assert_eq!(b.min, None);
    }

    #[test]
    fn ranked_order_puts_unlisted_keys_last() {
        let rows = vec!["C", "zeta", "A", "C", "alpha"];
        let set = group_by(&rows, |r| r.to_string());
        let names: Vec<String> = set
            .summarize(BucketOrder::Ranked(&["A", "B", "C"]))
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["A", "C", "alpha", "zeta"]);
    }

    #[test]
    fn grouping_is_idempotent() {
        let rows = labels(&[Some("p"), Some("q"), None, Some("p")]);
        let first = group_by(&rows, |r| label_or(r.as_deref(), NOT_SPECIFIED));
        let second = group_by(&rows, |r| label_or(r.as_deref(), NOT_SPECIFIED));
        assert_eq!(first, second);
        assert_eq!(
            first.summarize(BucketOrder::ByKey),
            second.summarize(BucketOrder::ByKey)
        );
    }

    #[test]
    fn month_key_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(month_key(date), "2026-03");
    }
}
