use serde::{Deserialize, Serialize};

/// Which issue groups are expanded to show their member tickets.
///
/// Keyed by the group key itself, so every ticket that resolves to the same
/// key (including the "Uncategorized" bucket) shares one toggle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpansionState {
    expanded: Vec<String>,
}

impl ExpansionState {
    /// Flip `issue` and return whether it is now expanded.
    pub fn toggle(&mut self, issue: &str) -> bool {
        if let Some(position) = self.expanded.iter().position(|key| key == issue) {
            self.expanded.remove(position);
            false
        } else {
            self.expanded.push(issue.to_owned());
            true
        }
    }

    pub fn is_expanded(&self, issue: &str) -> bool {
        self.expanded.iter().any(|key| key == issue)
    }

    pub fn expand_all<'a>(&mut self, issues: impl IntoIterator<Item = &'a str>) {
        for issue in issues {
            if !self.is_expanded(issue) {
                self.expanded.push(issue.to_owned());
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.expanded.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    pub fn clear(&mut self) {
        self.expanded.clear();
    }
}
