//! Filter value object and the predicate it compiles to.

use crate::error::{Result, SyncError};
use crate::types::{Resource, Status};
use serde::Deserialize;

/// Filter criteria for a query. Empty filter matches every resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryFilter {
    /// Exact match on status (None = any status).
    pub status: Option<Status>,

    /// Case-insensitive substring of `name` (None or empty = any name).
    pub search: Option<String>,
}

/// Raw read-request arguments as they arrive at the boundary.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterArgs {
    #[serde(default, alias = "filter")]
    status: Option<String>,

    #[serde(default)]
    search: Option<String>,
}

impl QueryFilter {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Parse boundary arguments such as `{"status": "active", "search": "aws"}`.
    ///
    /// `filter` is accepted as a synonym for `status`. An empty status string
    /// means "any status". Unknown keys and unknown status values are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::all());
        }

        let args: FilterArgs = serde_json::from_value(value.clone())
            .map_err(|e| SyncError::InvalidFilter(e.to_string()))?;

        let status = match args.status.as_deref() {
            None | Some("") => None,
            Some(s) => Some(
                Status::parse(s)
                    .ok_or_else(|| SyncError::InvalidFilter(format!("unknown status '{}'", s)))?,
            ),
        };

        Ok(Self {
            status,
            search: args.search,
        })
    }

    /// True if this filter constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.search.as_deref().map_or(true, str::is_empty)
    }

    /// Compile into a predicate.
    pub fn predicate(&self) -> Predicate {
        let mut clauses = Vec::with_capacity(2);

        if let Some(status) = self.status {
            clauses.push(Clause::Status(status));
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            clauses.push(Clause::NameContains(search.to_lowercase()));
        }

        Predicate { clauses }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Clause {
    Status(Status),
    /// Needle is stored lowercased.
    NameContains(String),
}

impl Clause {
    fn matches(&self, resource: &Resource) -> bool {
        match self {
            Clause::Status(status) => resource.status == *status,
            Clause::NameContains(needle) => resource.name.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Conjunction of filter clauses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn matches(&self, resource: &Resource) -> bool {
        self.clauses.iter().all(|c| c.matches(resource))
    }

    /// True if the predicate accepts every resource.
    pub fn is_trivial(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bigquery() -> Resource {
        Resource::new("8", "Google BigQuery", "Database", Status::Inactive)
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let p = QueryFilter::all().predicate();
        assert!(p.is_trivial());
        assert!(p.matches(&bigquery()));
    }

    #[test]
    fn test_status_clause() {
        assert!(QueryFilter::all()
            .with_status(Status::Inactive)
            .predicate()
            .matches(&bigquery()));
        assert!(!QueryFilter::all()
            .with_status(Status::Active)
            .predicate()
            .matches(&bigquery()));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        for needle in ["google", "GOOGLE", "gOoGlE bIg", "query"] {
            let p = QueryFilter::all().with_search(needle).predicate();
            assert!(p.matches(&bigquery()), "needle {:?}", needle);
        }
        assert!(!QueryFilter::all().with_search("aws").predicate().matches(&bigquery()));
    }

    #[test]
    fn test_empty_search_is_ignored() {
        let filter = QueryFilter::all().with_search("");
        assert!(filter.is_empty());
        assert!(filter.predicate().is_trivial());
    }

    #[test]
    fn test_clauses_are_conjunctive() {
        let p = QueryFilter::all()
            .with_status(Status::Active)
            .with_search("google")
            .predicate();
        assert!(!p.matches(&bigquery()));
    }

    #[test]
    fn test_from_json() {
        let f = QueryFilter::from_json(&json!({"status": "active", "search": "aws"})).unwrap();
        assert_eq!(f, QueryFilter::all().with_status(Status::Active).with_search("aws"));

        let f = QueryFilter::from_json(&json!({"filter": "inactive"})).unwrap();
        assert_eq!(f.status, Some(Status::Inactive));

        let f = QueryFilter::from_json(&json!({"filter": "", "search": ""})).unwrap();
        assert!(f.is_empty());

        assert_eq!(QueryFilter::from_json(&json!(null)).unwrap(), QueryFilter::all());
        assert_eq!(QueryFilter::from_json(&json!({})).unwrap(), QueryFilter::all());
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        for bad in [
            json!({"kind": "Compute"}),
            json!({"status": "paused"}),
            json!({"search": 5}),
            json!("active"),
        ] {
            let result = QueryFilter::from_json(&bad);
            assert!(
                matches!(result, Err(SyncError::InvalidFilter(_))),
                "{:?} gave {:?}",
                bad,
                result
            );
        }
    }
}
