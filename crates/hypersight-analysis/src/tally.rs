use std::collections::HashMap;

use hypersight_core::{SortDirection, Ticket};
use serde::Serialize;

use crate::filter::sort_by_count;

/// One chart segment: a label and its ticket count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelTally {
    pub name: String,
    pub count: usize,
}

/// The side panel shown for the selected chart segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryFocus {
    pub category: String,
    pub count: usize,
    pub share_percent: f64,
    pub top_issue: Option<String>,
}

/// Count tickets per category in discovery order, skipping absent categories.
pub fn tally_categories<'a>(rows: impl IntoIterator<Item = &'a Ticket>) -> Vec<LabelTally> {
    tally_labels(rows.into_iter().map(|ticket| ticket.category.as_deref()))
}

/// Every category with its count, as fed to the distribution pie chart.
pub fn category_distribution<'a>(
    rows: impl IntoIterator<Item = &'a Ticket>,
) -> Vec<(LabelTally, f64)> {
    let tallies = tally_categories(rows);
    let total = tallies.iter().map(|tally| tally.count).sum();
    tallies
        .into_iter()
        .map(|tally| {
            let share = share_percent(tally.count, total);
            (tally, share)
        })
        .collect()
}

/// The `limit` largest categories, largest first; ties keep discovery order.
pub fn top_categories<'a>(
    rows: impl IntoIterator<Item = &'a Ticket>,
    limit: usize,
) -> Vec<LabelTally> {
    let mut tallies = tally_categories(rows);
    sort_by_count(&mut tallies, SortDirection::Descending, |tally| tally.count);
    tallies.truncate(limit);
    tallies
}

/// Most frequent issue among tickets in `category`; the first label to reach
/// the highest count wins.
pub fn top_issue_for_category<'a>(
    rows: impl IntoIterator<Item = &'a Ticket>,
    category: &str,
) -> Option<String> {
    top_issue(
        rows.into_iter()
            .filter(|ticket| ticket.category.as_deref() == Some(category)),
    )
}

/// Most frequent issue label across `rows`, for rows already scoped to one
/// category (such as an issue-only store query).
pub fn top_issue<'a>(rows: impl IntoIterator<Item = &'a Ticket>) -> Option<String> {
    let issues = tally_labels(rows.into_iter().map(|ticket| ticket.issue.as_deref()));

    let mut best: Option<LabelTally> = None;
    for tally in issues {
        if best.as_ref().is_none_or(|current| tally.count > current.count) {
            best = Some(tally);
        }
    }
    best.map(|tally| tally.name)
}

/// Build the side panel for `segment`. The share is relative to the sum of
/// the displayed segments, not the whole table.
pub fn focus_category(
    segments: &[LabelTally],
    segment: &LabelTally,
    top_issue: Option<String>,
) -> CategoryFocus {
    let total = segments.iter().map(|tally| tally.count).sum();
    CategoryFocus {
        category: segment.name.clone(),
        count: segment.count,
        share_percent: share_percent(segment.count, total),
        top_issue,
    }
}

pub fn share_percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / total as f64
}

fn tally_labels<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> Vec<LabelTally> {
    let mut positions: HashMap<&'a str, usize> = HashMap::new();
    let mut tallies: Vec<LabelTally> = Vec::new();

    for label in labels.flatten() {
        let position = *positions.entry(label).or_insert_with(|| {
            tallies.push(LabelTally {
                name: label.to_owned(),
                count: 0,
            });
            tallies.len() - 1
        });
        tallies[position].count += 1;
    }

    tallies
}
