//! Paging and column sorting for list views

use serde::Deserialize;
use std::collections::BTreeMap;
use voipbill_core::types::{RateSortField, SortOrder};

/// Query-string parameters of a paged list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub sort_by: Option<String>,
}

impl PageParams {
    /// Whether the request navigates an existing listing (paging or sorting)
    pub fn is_navigation(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.page) || set(&self.sort_by)
    }
}

/// Split a `sort_by` value into column and direction
///
/// A leading `-` means descending. Unknown columns fall back to `prefix`.
pub fn parse_sort_by(raw: &str) -> (RateSortField, SortOrder) {
    let raw = raw.trim();
    let (name, order) = match raw.strip_prefix('-') {
        Some(name) => (name, SortOrder::Desc),
        None => (raw, SortOrder::Asc),
    };
    match name.parse::<RateSortField>() {
        Ok(field) => (field, order),
        Err(_) => (RateSortField::default(), SortOrder::Asc),
    }
}

/// Resolved paging state of a list request
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationVars {
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
    pub sort_field: RateSortField,
    pub sort_order: SortOrder,
    /// Column name to the `sort_by` value its header link should carry;
    /// the active column links to the opposite direction
    pub col_name_with_order: BTreeMap<String, String>,
}

impl PaginationVars {
    pub fn from_params(params: &PageParams, page_size: usize) -> Self {
        let page = params
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);

        let (sort_field, sort_order) = params
            .sort_by
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_sort_by)
            .unwrap_or_default();

        let col_name_with_order = RateSortField::ALL
            .iter()
            .map(|field| {
                let name = field.as_str();
                let link = if *field == sort_field && sort_order == SortOrder::Asc {
                    format!("-{name}")
                } else {
                    name.to_string()
                };
                (name.to_string(), link)
            })
            .collect();

        Self {
            page,
            page_size,
            sort_field,
            sort_order,
            col_name_with_order,
        }
    }

    /// Index of the first item on this page
    pub fn start(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// The items shown on this page; past the end yields an empty slice
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.start().min(items.len());
        let end = start.saturating_add(self.page_size).min(items.len());
        &items[start..end]
    }
}
