//! Response envelope and pagination types shared by all handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;

/// Uniform success envelope: `{ "success": true, "message"?, "data", "pagination"? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, message: None, data, pagination: None, status: StatusCode::OK }
    }

    pub fn created(data: T) -> Self {
        Self { status: StatusCode::CREATED, ..Self::ok(data) }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self { pagination: Some(pagination), ..Self::ok(data) }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: Page, total: i64) -> Self {
        let pages = if total == 0 { 0 } else { (total + page.limit - 1) / page.limit };
        Self { page: page.page, limit: page.limit, total, pages }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Raw pagination/sorting query parameters accepted by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    #[serde(default)]
    pub order: SortOrder,
}

/// Clamped page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl PageQuery {
    pub fn page(&self, cfg: &PaginationConfig) -> Page {
        let limit = self.limit.unwrap_or(cfg.default_limit).clamp(1, cfg.max_limit);
        // Keep offsets bounded
        let page = self.page.unwrap_or(1).clamp(1, 100_000);
        Page { page, limit }
    }

    /// Resolves `sort_by` against a whitelist of `(param, column)` pairs; the first entry is the default.
    pub fn sort_column(&self, allowed: &[(&str, &'static str)]) -> &'static str {
        let default = allowed.first().map(|(_, col)| *col).unwrap_or("created_at");
        match self.sort_by.as_deref() {
            Some(requested) => {
                allowed.iter().find(|(name, _)| *name == requested).map(|(_, col)| *col).unwrap_or(default)
            }
            None => default,
        }
    }
}

/// `?limit=` for endpoints that return a bounded, unpaginated list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn limit(&self, cfg: &PaginationConfig) -> i64 {
        self.limit.unwrap_or(cfg.default_limit).clamp(1, cfg.max_limit)
    }
}

pub const LIKE_ESCAPE: char = '!';

fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

/// Builds a `%term%` pattern for `LIKE ... ESCAPE '!'`. Blank terms yield `None`.
pub fn contains_pattern(term: Option<&str>) -> Option<String> {
    let trimmed: String = term?.trim().chars().filter(|c| !c.is_control()).take(200).collect();
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("%{}%", escape_like_pattern(&trimmed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PaginationConfig {
        PaginationConfig { default_limit: 20, max_limit: 100 }
    }

    #[test]
    fn test_page_defaults_and_clamping() {
        let q = PageQuery::default();
        assert_eq!(q.page(&cfg()), Page { page: 1, limit: 20 });

        let q = PageQuery { page: Some(0), limit: Some(1000), ..Default::default() };
        let p = q.page(&cfg());
        assert_eq!(p, Page { page: 1, limit: 100 });
        assert_eq!(p.offset(), 0);

        let q = PageQuery { page: Some(3), limit: Some(10), ..Default::default() };
        assert_eq!(q.page(&cfg()).offset(), 20);
    }

    #[test]
    fn test_pagination_pages() {
        let page = Page { page: 1, limit: 10 };
        assert_eq!(Pagination::new(page, 0).pages, 0);
        assert_eq!(Pagination::new(page, 10).pages, 1);
        assert_eq!(Pagination::new(page, 11).pages, 2);
    }

    #[test]
    fn test_sort_column_whitelist() {
        let allowed = [("created_at", "created_at"), ("name", "name")];
        let q = PageQuery { sort_by: Some("name".into()), ..Default::default() };
        assert_eq!(q.sort_column(&allowed), "name");
        let q = PageQuery { sort_by: Some("password_hash; DROP".into()), ..Default::default() };
        assert_eq!(q.sort_column(&allowed), "created_at");
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(Some("50%_off")).unwrap(), "%50!%!_off%");
        assert_eq!(contains_pattern(Some("a!b")).unwrap(), "%a!!b%");
        assert!(contains_pattern(Some("   ")).is_none());
        assert!(contains_pattern(None).is_none());
    }
}
