use std::cmp::Ordering;
use std::collections::HashMap;

use hypersight_core::{
    DepartmentFilter, FilterSelection, PINNED_FIRST_CATEGORY, PINNED_LAST_CATEGORY, SortDirection,
    Ticket,
};
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// A distinct label and how many filtered tickets carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub name: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FilterOptions {
    pub periods: Vec<Option<String>>,
    pub categories: Vec<LabelCount>,
    pub subcategories: Vec<LabelCount>,
    pub departments: Vec<DepartmentFilter>,
}

pub fn matches_selection(ticket: &Ticket, selection: &FilterSelection) -> bool {
    if let Some(period) = selection.period.as_deref()
        && ticket.report_period.as_deref() != Some(period)
    {
        return false;
    }
    if let Some(category) = selection.category.as_deref()
        && ticket.category.as_deref() != Some(category)
    {
        return false;
    }
    if let Some(subcategory) = selection.subcategory.as_deref()
        && ticket.subcategory.as_deref() != Some(subcategory)
    {
        return false;
    }
    match &selection.department {
        DepartmentFilter::All => true,
        DepartmentFilter::Only(department) => ticket.responsible_department == *department,
    }
}

/// Tickets satisfying every active predicate, in input order.
pub fn apply_filter<'a>(rows: &'a [Ticket], selection: &FilterSelection) -> Vec<&'a Ticket> {
    rows.iter()
        .filter(|ticket| matches_selection(ticket, selection))
        .collect()
}

/// Option lists for the four filter dropdowns.
///
/// Report periods come from the full row set; the other lists are derived
/// from the filtered subset. Themes are only listed once a category is
/// selected and follow the same count direction as the issue groups.
pub fn compute_options(
    rows: &[Ticket],
    selection: &FilterSelection,
    sort: SortDirection,
) -> FilterOptions {
    let mut periods: Vec<Option<String>> = Vec::new();
    for ticket in rows {
        if !periods.contains(&ticket.report_period) {
            periods.push(ticket.report_period.clone());
        }
    }

    let filtered = apply_filter(rows, selection);

    let mut categories = count_distinct(filtered.iter().map(|ticket| ticket.category.as_deref()));
    categories.sort_by(|left, right| {
        compare_category_labels(left.name.as_deref(), right.name.as_deref())
    });

    let subcategories = match selection.category.as_deref() {
        Some(category) => {
            let themes = count_distinct(
                filtered
                    .iter()
                    .filter(|ticket| ticket.category.as_deref() == Some(category))
                    .map(|ticket| ticket.subcategory.as_deref()),
            );
            let mut themes: Vec<LabelCount> = themes
                .into_iter()
                .map(|theme| LabelCount {
                    count: filtered
                        .iter()
                        .filter(|ticket| ticket.subcategory == theme.name)
                        .count(),
                    name: theme.name,
                })
                .collect();
            sort_by_count(&mut themes, sort, |theme| theme.count);
            themes
        }
        None => Vec::new(),
    };

    let mut departments = vec![DepartmentFilter::All];
    for ticket in &filtered {
        let department = DepartmentFilter::Only(ticket.responsible_department.clone());
        if !departments.contains(&department) {
            departments.push(department);
        }
    }

    FilterOptions {
        periods,
        categories,
        subcategories,
        departments,
    }
}

/// Category dropdown order: the pinned-first label, then everything else
/// alphabetically (absent labels after named ones), then the pinned-last label.
pub fn compare_category_labels(left: Option<&str>, right: Option<&str>) -> Ordering {
    category_band(left)
        .cmp(&category_band(right))
        .then_with(|| match (left, right) {
            (Some(left), Some(right)) => collate_labels(left, right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Collation in the usual three strengths: base letters first, then accents,
/// then case with lowercase ahead of uppercase. "Övrigt" lands beside "Ost",
/// not after "Zeta".
fn collate_labels(left: &str, right: &str) -> Ordering {
    base_letters(left)
        .cmp(base_letters(right))
        .then_with(|| accented_letters(left).cmp(accented_letters(right)))
        .then_with(|| case_swapped(left).cmp(case_swapped(right)))
        .then_with(|| left.cmp(right))
}

fn base_letters(label: &str) -> impl Iterator<Item = char> + '_ {
    label
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
}

fn accented_letters(label: &str) -> impl Iterator<Item = char> + '_ {
    label.nfd().flat_map(char::to_lowercase)
}

fn case_swapped(label: &str) -> impl Iterator<Item = char> + '_ {
    label.chars().map(|ch| {
        if ch.is_uppercase() {
            ch.to_lowercase().next().unwrap_or(ch)
        } else {
            ch.to_uppercase().next().unwrap_or(ch)
        }
    })
}

fn category_band(label: Option<&str>) -> u8 {
    match label {
        Some(PINNED_FIRST_CATEGORY) => 0,
        Some(PINNED_LAST_CATEGORY) => 2,
        _ => 1,
    }
}

/// Stable sort by count so equal counts keep discovery order.
pub(crate) fn sort_by_count<T>(items: &mut [T], sort: SortDirection, count: impl Fn(&T) -> usize) {
    match sort {
        SortDirection::Ascending => items.sort_by_key(|item| count(item)),
        SortDirection::Descending => items.sort_by(|left, right| count(right).cmp(&count(left))),
    }
}

fn count_distinct<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> Vec<LabelCount> {
    let mut positions: HashMap<Option<&'a str>, usize> = HashMap::new();
    let mut counts: Vec<LabelCount> = Vec::new();

    for label in labels {
        let position = *positions.entry(label).or_insert_with(|| {
            counts.push(LabelCount {
                name: label.map(str::to_owned),
                count: 0,
            });
            counts.len() - 1
        });
        counts[position].count += 1;
    }

    counts
}
