use hypersight_core::{FilterSelection, SortDirection, Ticket};
use serde::{Deserialize, Serialize};

use crate::expansion::ExpansionState;
use crate::filter::{FilterOptions, apply_filter, compute_options};
use crate::grouping::{IssueGroup, group_by_common_issue};

/// Transient session state for the ticket table.
///
/// The view layer owns one instance and re-derives everything else from it
/// with [`DashboardState::view`] after each change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardState {
    pub selection: FilterSelection,
    pub sort: SortDirection,
    pub expanded: ExpansionState,
}

/// Everything the table needs for one render pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView<'a> {
    pub total_tickets: usize,
    pub options: FilterOptions,
    pub filtered: Vec<&'a Ticket>,
    pub groups: Vec<IssueGroup<'a>>,
    /// Heading shown above the groups once a theme is selected.
    pub heading: Option<String>,
}

impl DashboardState {
    pub fn new(selection: FilterSelection, sort: SortDirection) -> Self {
        Self {
            selection,
            sort,
            expanded: ExpansionState::default(),
        }
    }

    pub fn set_period(&mut self, period: Option<String>) {
        self.selection.period = period.filter(|value| !value.is_empty());
    }

    /// Leaves the subcategory selection untouched.
    pub fn set_category(&mut self, category: Option<String>) {
        self.selection.category = category.filter(|value| !value.is_empty());
    }

    pub fn set_subcategory(&mut self, subcategory: Option<String>) {
        self.selection.subcategory = subcategory.filter(|value| !value.is_empty());
    }

    pub fn toggle_expanded(&mut self, issue: &str) -> bool {
        self.expanded.toggle(issue)
    }

    pub fn view<'a>(&self, rows: &'a [Ticket]) -> DashboardView<'a> {
        let options = compute_options(rows, &self.selection, self.sort);
        let filtered = apply_filter(rows, &self.selection);
        let groups = group_by_common_issue(filtered.iter().copied(), self.sort);
        let heading = self
            .selection
            .subcategory
            .as_ref()
            .map(|theme| format!("{theme} ({} total tickets)", filtered.len()));

        tracing::debug!(
            rows = rows.len(),
            filtered = filtered.len(),
            groups = groups.len(),
            sort = self.sort.as_str(),
            "derived dashboard view"
        );

        DashboardView {
            total_tickets: rows.len(),
            options,
            filtered,
            groups,
            heading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(category: &str, subcategory: &str, common_issue: &str) -> Ticket {
        Ticket {
            category: Some(category.to_owned()),
            subcategory: Some(subcategory.to_owned()),
            common_issue: Some(common_issue.to_owned()),
            ..Ticket::default()
        }
    }

    #[test]
    fn changing_category_keeps_theme_selected() {
        let rows = vec![
            ticket("Batterier", "Range", "Range loss"),
            ticket("Andra", "Billing", "Double charge"),
        ];
        let mut state = DashboardState::default();
        state.set_category(Some("Batterier".to_owned()));
        state.set_subcategory(Some("Range".to_owned()));
        assert_eq!(state.view(&rows).filtered.len(), 1);

        state.set_category(Some("Andra".to_owned()));
        let view = state.view(&rows);

        assert_eq!(state.selection.subcategory.as_deref(), Some("Range"));
        assert!(view.filtered.is_empty());
        assert!(view.groups.is_empty());
        assert_eq!(view.heading.as_deref(), Some("Range (0 total tickets)"));
    }

    #[test]
    fn view_groups_only_filtered_rows() {
        let rows = vec![
            ticket("Batterier", "Range", "Range loss"),
            ticket("Batterier", "Range", "Range loss"),
            ticket("Andra", "Billing", "Double charge"),
        ];
        let mut state = DashboardState::default();
        state.set_category(Some("Batterier".to_owned()));
        state.set_period(Some(String::new()));

        let view = state.view(&rows);

        assert_eq!(view.total_tickets, 3);
        assert!(state.selection.period.is_none());
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].issue, "Range loss");
        assert_eq!(view.groups[0].count, 2);
        assert!(view.heading.is_none());
    }
}
