use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::balance::sanitized;
use crate::schemas::{ExpenseRecord, Group, MemberId, RecordKind, Split};

const TOP_CATEGORIES: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

/// Aggregated spend for one calendar month, newest first in the output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub total: f64,
    pub viewer_share: f64,
    pub top_categories: Vec<CategoryTotal>,
}

#[derive(Default)]
struct MonthBucket {
    total: f64,
    viewer_share: f64,
    categories: BTreeMap<String, f64>,
}

/// The viewer's share of a single expense, using the same canonical split
/// rule as the aggregator: equal splits divide by the current group size and
/// cover every current member, explicit splits assign exactly what they list.
fn viewer_share(amount: f64, split: &Split, group: &Group, viewer: &MemberId) -> f64 {
    match split {
        Split::Equal => {
            if group.members.contains(viewer) {
                amount / group.members.len() as f64
            } else {
                0.0
            }
        }
        Split::Explicit { shares } => sanitized(shares.get(viewer).copied().unwrap_or(0.0)),
    }
}

/// Buckets shared expenses (settlements excluded) by calendar month of their
/// creation timestamp, in UTC for deterministic results, and reports each
/// month's total, the viewer's aggregate share and the top spend categories.
pub fn monthly_summary(
    records: &[ExpenseRecord],
    group: &Group,
    viewer: &MemberId,
) -> Vec<MonthlySummary> {
    let mut buckets: BTreeMap<(i32, u32), MonthBucket> = BTreeMap::new();

    for record in records {
        let split = match &record.kind {
            RecordKind::Expense { split } => split,
            RecordKind::Settlement { .. } => continue,
        };
        let amount = sanitized(record.amount);
        let key = (record.created_at.year(), record.created_at.month());
        let bucket = buckets.entry(key).or_default();
        bucket.total += amount;
        bucket.viewer_share += viewer_share(amount, split, group, viewer);
        *bucket.categories.entry(record.category.clone()).or_insert(0.0) += amount;
    }

    buckets
        .into_iter()
        .rev()
        .map(|((year, month), bucket)| {
            let mut top_categories: Vec<CategoryTotal> = bucket
                .categories
                .into_iter()
                .map(|(category, total)| CategoryTotal { category, total })
                .collect();
            top_categories.sort_by(|a, b| {
                b.total
                    .partial_cmp(&a.total)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.category.cmp(&b.category))
            });
            top_categories.truncate(TOP_CATEGORIES);
            MonthlySummary {
                year,
                month,
                label: month_label(year, month),
                total: bucket.total,
                viewer_share: bucket.viewer_share,
                top_categories,
            }
        })
        .collect()
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|date| date.format("%B %Y").to_string())
        .unwrap_or_default()
}
