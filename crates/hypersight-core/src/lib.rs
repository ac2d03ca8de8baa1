use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Group key used for tickets whose common issue is absent or empty.
pub const UNCATEGORIZED: &str = "Uncategorized";
/// Department option meaning "no department constraint".
pub const ALL_DEPARTMENTS: &str = "All";
/// Category that always sorts first in the category option list.
pub const PINNED_FIRST_CATEGORY: &str = "Batterier";
/// Category that always sorts last in the category option list.
pub const PINNED_LAST_CATEGORY: &str = "Andra";
/// Rendering of an absent label.
pub const UNDEFINED_LABEL: &str = "undefined";
/// Name of the hosted ticket table.
pub const DEFAULT_TICKET_TABLE: &str = "ticket_analysis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum TicketColumn {
    Id,
    ReportPeriod,
    Category,
    Subcategory,
    Issue,
    Summary,
    CommonIssue,
    IssueSummary,
    ResponsibleDepartment,
    ResponsibleDepartmentJustification,
    Link,
    CreatedAt,
}

impl TicketColumn {
    pub const ALL: [TicketColumn; 12] = [
        Self::Id,
        Self::ReportPeriod,
        Self::Category,
        Self::Subcategory,
        Self::Issue,
        Self::Summary,
        Self::CommonIssue,
        Self::IssueSummary,
        Self::ResponsibleDepartment,
        Self::ResponsibleDepartmentJustification,
        Self::Link,
        Self::CreatedAt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::ReportPeriod => "report_period",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Issue => "issue",
            Self::Summary => "summary",
            Self::CommonIssue => "common_issue",
            Self::IssueSummary => "issue_summary",
            Self::ResponsibleDepartment => "responsible_department",
            Self::ResponsibleDepartmentJustification => "responsible_department_justification",
            Self::Link => "link",
            Self::CreatedAt => "created_at",
        }
    }
}

impl std::str::FromStr for TicketColumn {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == value)
            .ok_or_else(|| format!("unknown ticket column '{value}'"))
    }
}

/// One analyzed support ticket row.
///
/// Every field is optional because column-scoped queries only return the
/// selected columns, and the hosted table allows nulls everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub report_period: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub common_issue: Option<String>,
    #[serde(default)]
    pub issue_summary: Option<String>,
    #[serde(default)]
    pub responsible_department: Option<String>,
    #[serde(default)]
    pub responsible_department_justification: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Ticket {
    /// The common-issue group key; absent or empty values collapse to [`UNCATEGORIZED`].
    pub fn issue_key(&self) -> &str {
        match self.common_issue.as_deref() {
            Some(issue) if !issue.is_empty() => issue,
            _ => UNCATEGORIZED,
        }
    }

    pub fn get(&self, column: TicketColumn) -> Option<&str> {
        match column {
            TicketColumn::Id => self.id.as_deref(),
            TicketColumn::ReportPeriod => self.report_period.as_deref(),
            TicketColumn::Category => self.category.as_deref(),
            TicketColumn::Subcategory => self.subcategory.as_deref(),
            TicketColumn::Issue => self.issue.as_deref(),
            TicketColumn::Summary => self.summary.as_deref(),
            TicketColumn::CommonIssue => self.common_issue.as_deref(),
            TicketColumn::IssueSummary => self.issue_summary.as_deref(),
            TicketColumn::ResponsibleDepartment => self.responsible_department.as_deref(),
            TicketColumn::ResponsibleDepartmentJustification => {
                self.responsible_department_justification.as_deref()
            }
            TicketColumn::Link => self.link.as_deref(),
            TicketColumn::CreatedAt => self.created_at.as_deref(),
        }
    }

    pub fn set(&mut self, column: TicketColumn, value: Option<String>) {
        let slot = match column {
            TicketColumn::Id => &mut self.id,
            TicketColumn::ReportPeriod => &mut self.report_period,
            TicketColumn::Category => &mut self.category,
            TicketColumn::Subcategory => &mut self.subcategory,
            TicketColumn::Issue => &mut self.issue,
            TicketColumn::Summary => &mut self.summary,
            TicketColumn::CommonIssue => &mut self.common_issue,
            TicketColumn::IssueSummary => &mut self.issue_summary,
            TicketColumn::ResponsibleDepartment => &mut self.responsible_department,
            TicketColumn::ResponsibleDepartmentJustification => {
                &mut self.responsible_department_justification
            }
            TicketColumn::Link => &mut self.link,
            TicketColumn::CreatedAt => &mut self.created_at,
        };
        *slot = value;
    }

    /// Copy of this ticket holding only the given columns.
    pub fn project(&self, columns: &[TicketColumn]) -> Ticket {
        let mut projected = Ticket::default();
        for column in columns {
            projected.set(*column, self.get(*column).map(str::to_owned));
        }
        projected
    }
}

/// Department constraint. `Only(None)` matches tickets with no department,
/// mirroring how an absent label is still a selectable bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentFilter {
    #[default]
    All,
    Only(Option<String>),
}

impl DepartmentFilter {
    pub fn from_label(label: &str) -> Self {
        match label {
            ALL_DEPARTMENTS => Self::All,
            UNDEFINED_LABEL => Self::Only(None),
            _ => Self::Only(Some(label.to_owned())),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL_DEPARTMENTS,
            Self::Only(department) => display_label(department.as_deref()),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Self::Ascending
        } else {
            Self::Descending
        }
    }

    pub fn is_ascending(self) -> bool {
        matches!(self, Self::Ascending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "ascending" | "asc" => Ok(Self::Ascending),
            "descending" | "desc" => Ok(Self::Descending),
            other => Err(format!(
                "invalid sort direction '{other}', expected one of: ascending, descending"
            )),
        }
    }
}

/// The four independent table filters.
///
/// Changing the category does not clear the subcategory: a theme that no
/// longer exists under the new category simply matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub department: DepartmentFilter,
}

impl FilterSelection {
    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = non_empty(period.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_empty(category.into());
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = non_empty(subcategory.into());
        self
    }

    pub fn with_department(mut self, department: DepartmentFilter) -> Self {
        self.department = department;
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.period.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.department.is_all()
    }
}

pub fn display_label(label: Option<&str>) -> &str {
    label.unwrap_or(UNDEFINED_LABEL)
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn issue_key_falls_back_to_uncategorized() {
        let mut ticket = Ticket::default();
        assert_eq!(ticket.issue_key(), UNCATEGORIZED);

        ticket.common_issue = Some(String::new());
        assert_eq!(ticket.issue_key(), UNCATEGORIZED);

        ticket.common_issue = Some("Charger offline".to_owned());
        assert_eq!(ticket.issue_key(), "Charger offline");
    }

    #[test]
    fn ticket_deserializes_partial_rows_and_numeric_ids() {
        let ticket: Ticket = serde_json::from_value(json!({
            "id": 42,
            "category": "Batterier",
            "common_issue": null
        }))
        .expect("deserialize ticket");

        assert_eq!(ticket.id.as_deref(), Some("42"));
        assert_eq!(ticket.category.as_deref(), Some("Batterier"));
        assert!(ticket.common_issue.is_none());
        assert!(ticket.summary.is_none());
    }

    #[test]
    fn project_keeps_only_requested_columns() {
        let ticket = Ticket {
            id: Some("t-1".to_owned()),
            category: Some("Andra".to_owned()),
            issue: Some("Broken cable".to_owned()),
            ..Ticket::default()
        };

        let projected = ticket.project(&[TicketColumn::Issue]);
        assert_eq!(projected.issue.as_deref(), Some("Broken cable"));
        assert!(projected.id.is_none());
        assert!(projected.category.is_none());
    }

    #[test]
    fn column_names_round_trip_through_from_str() {
        for column in TicketColumn::ALL {
            let parsed: TicketColumn = column.as_str().parse().expect("parse column");
            assert_eq!(parsed, column);
        }
        assert!("nope".parse::<TicketColumn>().is_err());
    }

    #[test]
    fn department_filter_treats_all_as_unconstrained() {
        assert_eq!(DepartmentFilter::from_label("All"), DepartmentFilter::All);
        assert_eq!(
            DepartmentFilter::from_label("Support"),
            DepartmentFilter::Only(Some("Support".to_owned()))
        );
        assert_eq!(DepartmentFilter::Only(None).label(), UNDEFINED_LABEL);
        assert_eq!(
            DepartmentFilter::from_label(UNDEFINED_LABEL),
            DepartmentFilter::Only(None)
        );
    }

    #[test]
    fn selection_builders_ignore_empty_values() {
        let selection = FilterSelection::default()
            .with_period("")
            .with_category("Batterier");

        assert!(selection.period.is_none());
        assert_eq!(selection.category.as_deref(), Some("Batterier"));
        assert!(!selection.is_unconstrained());
        assert!(FilterSelection::default().is_unconstrained());
    }
}
