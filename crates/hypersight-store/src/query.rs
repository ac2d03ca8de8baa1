use std::cmp::Ordering;

use hypersight_core::{Ticket, TicketColumn};

/// A conjunctive row predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq(TicketColumn, String),
    NotNull(TicketColumn),
}

impl Predicate {
    pub fn column(&self) -> TicketColumn {
        match self {
            Self::Eq(column, _) | Self::NotNull(column) => *column,
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            Self::Eq(column, value) => ticket.get(*column) == Some(value.as_str()),
            Self::NotNull(column) => ticket.get(*column).is_some(),
        }
    }
}

/// A read against the ticket table: projection, predicates, ordering and cap.
///
/// Every backend gives these the same meaning. Tickets without a creation
/// time come first under the descending order, as they do in PostgreSQL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    columns: Option<Vec<TicketColumn>>,
    predicates: Vec<Predicate>,
    order_created_desc: bool,
    limit: Option<usize>,
}

impl TicketQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(columns: impl IntoIterator<Item = TicketColumn>) -> Self {
        Self {
            columns: Some(columns.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn eq(mut self, column: TicketColumn, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Eq(column, value.into()));
        self
    }

    pub fn not_null(mut self, column: TicketColumn) -> Self {
        self.predicates.push(Predicate::NotNull(column));
        self
    }

    pub fn order_by_created_desc(mut self) -> Self {
        self.order_created_desc = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `None` means every column.
    pub fn projection(&self) -> Option<&[TicketColumn]> {
        self.columns.as_deref()
    }

    pub fn selected_columns(&self) -> &[TicketColumn] {
        self.columns.as_deref().unwrap_or(&TicketColumn::ALL)
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_ordered_by_created_desc(&self) -> bool {
        self.order_created_desc
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(ticket))
    }

    /// Evaluate the query against rows already in memory.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Ticket>) -> Vec<Ticket> {
        let mut matched: Vec<&Ticket> = rows.into_iter().filter(|row| self.matches(row)).collect();

        if self.order_created_desc {
            matched.sort_by(|left, right| {
                compare_created_desc(left.created_at.as_deref(), right.created_at.as_deref())
            });
        }
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }

        match self.columns.as_deref() {
            Some(columns) => matched.into_iter().map(|row| row.project(columns)).collect(),
            None => matched.into_iter().cloned().collect(),
        }
    }
}

fn compare_created_desc(left: Option<&str>, right: Option<&str>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => right.cmp(left),
    }
}
