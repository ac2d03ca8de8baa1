//! Client-side ticket analytics: filtering, common-issue grouping and the
//! category tallies behind the charts. Everything here is a pure function of
//! an in-memory row slice; fetching rows is the store crate's job.

mod expansion;
mod filter;
mod grouping;
mod state;
mod tally;

pub use expansion::ExpansionState;
pub use filter::{
    FilterOptions, LabelCount, apply_filter, compare_category_labels, compute_options,
    matches_selection,
};
pub use grouping::{IssueGroup, group_by_common_issue};
pub use state::{DashboardState, DashboardView};
pub use tally::{
    CategoryFocus, LabelTally, category_distribution, focus_category, share_percent,
    tally_categories, top_categories, top_issue, top_issue_for_category,
};
