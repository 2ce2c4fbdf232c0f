//! Page-number pagination for list endpoints
//!
//! Query parameters: `page` (1-indexed, or `last`) and `limit`. Responses
//! carry absolute `next`/`previous` links built from the request URL.
//!
//! A malformed `page` is only reported once the window is resolved, so
//! handlers can reject bad filters first.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, Uri},
};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;

use crate::{error::ApiError, AppState};

/// Requested page, before the total is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(i64),
    Last,
    Invalid,
}

/// Pagination metadata calculated from total results and requested page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages (at least 1)
    pub pages: i64,
    /// Rows per page
    pub limit: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Calculate pagination metadata, rejecting pages past the end
///
/// An empty result set is page 1 of 1.
///
/// ```
/// use fieldnet_api::pagination::{calculate_pagination, PageNumber};
///
/// // 25 total results = 3 pages (10 + 10 + 5)
/// let p = calculate_pagination(25, PageNumber::Number(2), 10).unwrap();
/// assert_eq!(p.pages, 3);
/// assert_eq!(p.offset, 10);
///
/// assert!(calculate_pagination(25, PageNumber::Number(4), 10).is_none());
/// ```
pub fn calculate_pagination(total: i64, requested: PageNumber, limit: i64) -> Option<Pagination> {
    let pages = if total > 0 { (total - 1) / limit + 1 } else { 1 };
    let page = match requested {
        PageNumber::Number(n) if (1..=pages).contains(&n) => n,
        PageNumber::Number(_) | PageNumber::Invalid => return None,
        PageNumber::Last => pages,
    };

    Some(Pagination {
        page,
        pages,
        limit,
        offset: (page - 1) * limit,
    })
}

/// Paginated response body
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub next: Option<String>,
    pub next_page: Option<i64>,
    pub previous: Option<String>,
    pub previous_page: Option<i64>,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
    pub results: Vec<T>,
}

/// Pagination parameters of one request
///
/// A malformed `limit` falls back to the configured page size.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub requested: PageNumber,
    pub limit: i64,
    base_url: String,
    query: String,
}

impl PageRequest {
    pub fn from_uri(uri: &Uri, host: Option<&str>, default_limit: i64) -> Self {
        let params: HashMap<String, String> = Query::try_from_uri(uri)
            .map(|Query(p)| p)
            .unwrap_or_default();

        let requested = match params.get("page").map(String::as_str) {
            None | Some("") => PageNumber::Number(1),
            Some("last") => PageNumber::Last,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => PageNumber::Number(n),
                _ => PageNumber::Invalid,
            },
        };

        let limit = params
            .get("limit")
            .and_then(|l| l.parse::<i64>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(default_limit);

        Self {
            requested,
            limit,
            base_url: format!("http://{}{}", host.unwrap_or("localhost"), uri.path()),
            query: uri.query().unwrap_or("").to_string(),
        }
    }

    /// Resolve the window for `total` rows
    pub fn window(&self, total: i64) -> Result<Pagination, ApiError> {
        calculate_pagination(total, self.requested, self.limit).ok_or(ApiError::InvalidPage)
    }

    /// Assemble the response body for one window of results
    pub fn page<T>(&self, window: Pagination, total: i64, results: Vec<T>) -> Page<T> {
        let next_page = (window.page < window.pages).then_some(window.page + 1);
        let previous_page = (window.page > 1).then_some(window.page - 1);

        Page {
            total,
            next: next_page.map(|n| self.link(Some(n))),
            next_page,
            // The first page is linked without a page parameter
            previous: previous_page.map(|n| self.link((n > 1).then_some(n))),
            previous_page,
            page: window.page,
            limit: window.limit,
            pages: window.pages,
            results,
        }
    }

    /// Current URL with the `page` parameter replaced or removed
    fn link(&self, page: Option<i64>) -> String {
        let mut pairs: Vec<String> = self
            .query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| pair.split('=').next() != Some("page"))
            .map(str::to_string)
            .collect();
        if let Some(n) = page {
            pairs.push(format!("page={}", n));
        }

        if pairs.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}?{}", self.base_url, pairs.join("&"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for PageRequest {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok());
        Ok(PageRequest::from_uri(&parts.uri, host, state.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(query: &str) -> Uri {
        format!("/api/nodes/storage/?{}", query).parse().unwrap()
    }

    fn request(query: &str) -> PageRequest {
        PageRequest::from_uri(&uri(query), Some("testserver"), 10)
    }

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(25, PageNumber::Number(2), 10).unwrap();
        assert_eq!(p.page, 2);
        assert_eq!(p.pages, 3);
        assert_eq!(p.offset, 10);
    }

    #[test]
    fn test_pagination_last_page() {
        let p = calculate_pagination(25, PageNumber::Last, 10).unwrap();
        assert_eq!(p.page, 3);
        assert_eq!(p.offset, 20);
    }

    #[test]
    fn test_pagination_out_of_bounds_high() {
        assert!(calculate_pagination(25, PageNumber::Number(4), 10).is_none());
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, PageNumber::Number(1), 10).unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.pages, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_exact_page_boundary() {
        let p = calculate_pagination(20, PageNumber::Number(2), 10).unwrap();
        assert_eq!(p.pages, 2);
        assert_eq!(p.offset, 10);
    }

    #[test]
    fn test_pagination_huge_limit() {
        let p = calculate_pagination(2, PageNumber::Number(1), i64::MAX).unwrap();
        assert_eq!(p.pages, 1);
        assert_eq!(p.offset, 0);

        let p = calculate_pagination(i64::MAX, PageNumber::Last, i64::MAX).unwrap();
        assert_eq!(p.pages, 1);
    }

    #[test]
    fn test_invalid_page_values_rejected() {
        for query in ["page=0", "page=-1", "page=abc"] {
            let req = PageRequest::from_uri(&uri(query), None, 10);
            assert_eq!(req.requested, PageNumber::Invalid);
            assert!(matches!(req.window(5), Err(ApiError::InvalidPage)));
        }
    }

    #[test]
    fn test_bad_limit_falls_back_to_default() {
        assert_eq!(request("limit=abc").limit, 10);
        assert_eq!(request("limit=0").limit, 10);
        assert_eq!(request("limit=3").limit, 3);
    }

    #[test]
    fn test_links_replace_page_and_keep_filters() {
        let req = request("node_id=2&page=2&limit=5");
        let window = req.window(12).unwrap();
        let page = req.page(window, 12, vec![0; 5]);

        assert_eq!(page.page, 2);
        assert_eq!(page.pages, 3);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
        assert_eq!(
            page.next.as_deref(),
            Some("http://testserver/api/nodes/storage/?node_id=2&limit=5&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://testserver/api/nodes/storage/?node_id=2&limit=5")
        );
    }

    #[test]
    fn test_single_page_has_no_links() {
        let req = PageRequest::from_uri(&"/api/nodes/".parse().unwrap(), Some("testserver"), 10);
        let window = req.window(3).unwrap();
        let page = req.page(window, 3, vec![1, 2, 3]);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
        assert_eq!(page.limit, 10);
    }
}
