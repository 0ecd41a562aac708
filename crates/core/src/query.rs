//! List query and page value types.
//!
//! A [`ListQuery`] is created per list view, mutated by user interaction and
//! discarded on navigation away. A [`ListPage`] is produced fresh on every
//! fetch and immediately superseded by the next one; nothing is cached.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Server-side sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    #[default]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Query state owned by one list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    /// Page size; always positive.
    pub limit: u32,
    /// Free-form search text; empty means no search.
    pub search: String,
    /// Entity-specific filters, forwarded verbatim to the server.
    pub filters: BTreeMap<String, String>,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl ListQuery {
    pub fn new(sort_by: impl Into<String>) -> Self {
        Self {
            page: 1,
            limit: 10,
            search: String::new(),
            filters: BTreeMap::new(),
            sort_by: sort_by.into(),
            sort_order: SortOrder::Ascending,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Encodes the query as request parameters, omitting empty values so
    /// the server sees only what the user actually set.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("page".into(), self.page.to_string()),
            ("limit".into(), self.limit.to_string()),
        ];
        if !self.search.trim().is_empty() {
            params.push(("search".into(), self.search.trim().to_string()));
        }
        for (key, value) in &self.filters {
            if !value.is_empty() {
                params.push((key.clone(), value.clone()));
            }
        }
        if !self.sort_by.is_empty() {
            params.push(("sort_by".into(), self.sort_by.clone()));
            params.push(("sort_order".into(), self.sort_order.as_str().into()));
        }
        params
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new("")
    }
}

/// One page of list results.
///
/// `total` is the server's count of all matching records, not just this
/// page; `rows.len()` never exceeds `limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    pub rows: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> ListPage<T> {
    pub fn empty(limit: u32) -> Self {
        Self {
            rows: Vec::new(),
            total: 0,
            page: 1,
            limit: limit.max(1),
        }
    }

    /// Maps each row, dropping rows the mapper rejects.
    ///
    /// Used by typed wrappers to skip malformed records without failing the
    /// whole page.
    pub fn filter_map_rows<U>(self, f: impl FnMut(T) -> Option<U>) -> ListPage<U> {
        ListPage {
            rows: self.rows.into_iter().filter_map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }

    /// 1-based index range of the rows shown on this page, or `None` when
    /// the page is empty.
    pub fn display_range(&self) -> Option<(u64, u64)> {
        if self.rows.is_empty() {
            return None;
        }
        let first = u64::from(self.page.saturating_sub(1)) * u64::from(self.limit) + 1;
        let last = first + self.rows.len() as u64 - 1;
        Some((first, last))
    }

    /// Pagination caption, e.g. `Showing 1-10 of 37`.
    pub fn summary(&self) -> String {
        match self.display_range() {
            Some((first, last)) => format!("Showing {}-{} of {}", first, last, self.total),
            None => format!("Showing 0 of {}", self.total),
        }
    }
}
