use std::collections::HashMap;

use hypersight_core::{SortDirection, Ticket};
use serde::Serialize;

use crate::filter::sort_by_count;

/// Tickets sharing one common-issue key.
///
/// `summary` and `department` are taken from the first ticket seen for the
/// key and are never overwritten by later members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueGroup<'a> {
    pub issue: &'a str,
    pub tickets: Vec<&'a Ticket>,
    pub count: usize,
    pub summary: Option<&'a str>,
    pub department: Option<&'a str>,
}

/// Partition `rows` by [`Ticket::issue_key`] and order the groups by size.
///
/// Groups with equal counts keep the order in which their key first appeared.
pub fn group_by_common_issue<'a>(
    rows: impl IntoIterator<Item = &'a Ticket>,
    sort: SortDirection,
) -> Vec<IssueGroup<'a>> {
    let mut positions: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<IssueGroup<'a>> = Vec::new();

    for ticket in rows {
        let issue = ticket.issue_key();
        let position = *positions.entry(issue).or_insert_with(|| {
            groups.push(IssueGroup {
                issue,
                tickets: Vec::new(),
                count: 0,
                summary: ticket.issue_summary.as_deref(),
                department: ticket.responsible_department.as_deref(),
            });
            groups.len() - 1
        });

        let group = &mut groups[position];
        group.tickets.push(ticket);
        group.count += 1;
    }

    sort_by_count(&mut groups, sort, |group| group.count);
    groups
}
