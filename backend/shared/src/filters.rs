//! Listing filters, sort resolution and pagination metadata.
//!
//! The sort column handed to a query is always a `&'static str` taken from
//! the endpoint's safelist, never the caller's string.

use serde::Serialize;

use crate::validator::Validator;

pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub direction: SortDirection,
}

#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// Resolve the requested sort against the safelist.
    ///
    /// A value matches if it is itself a safelist entry, or if it is a bare
    /// (unprefixed) entry with a single `-` in front. Returns `None` for
    /// anything else, including `--year`.
    pub fn order_by(&self) -> Option<OrderBy> {
        let requested = self.sort.as_str();
        let bare = requested.strip_prefix('-').unwrap_or(requested);

        let entry = self
            .sort_safelist
            .iter()
            .copied()
            .find(|entry| *entry == requested || (!entry.starts_with('-') && *entry == bare))?;

        let column = entry.strip_prefix('-').unwrap_or(entry);
        let direction = if requested.starts_with('-') {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };

        Some(OrderBy { column, direction })
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.page_size)
    }
}

pub fn validate_filters(v: &mut Validator, filters: &Filters) {
    v.check(filters.page > 0, "page", "must be greater than zero");
    v.check(filters.page_size > 0, "page_size", "must be greater than zero");
    v.check(
        filters.page_size <= MAX_PAGE_SIZE,
        "page_size",
        format!("must be a maximum of {MAX_PAGE_SIZE}"),
    );
    v.check(filters.order_by().is_some(), "sort", "invalid sort value");
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Summary of one page of a listing. Renders as `{}` for an empty result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records <= 0 || page_size <= 0 {
            return Self::default();
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}
