//! Pagination helpers for the control plane's `listResults` envelope shape.
//!
//! List endpoints wrap their payload as
//! `{ "results": [...], "totalCount": N, "resultsPerPage": M }` (or the
//! `itemsPerPage` alias some endpoints use). When `totalCount` is present,
//! the page count is `ceil(totalCount / resultsPerPage)`; when the control
//! plane omits totals, the caller instead keeps requesting pages while the
//! last page returned came back full.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ControlPlaneError;

/// One page of a `listResults`-shaped response.
pub struct Page<T> {
    pub results: Vec<T>,
    pub total_count: Option<u64>,
    pub results_per_page: Option<u64>,
}

/// Parses one page of a `listResults` envelope from raw JSON.
pub fn parse_page<T: DeserializeOwned>(endpoint: &str, body: &Value) -> Result<Page<T>, ControlPlaneError> {
    let results_value = body.get("results").ok_or_else(|| ControlPlaneError::Decode {
        endpoint: endpoint.to_string(),
        message: "missing \"results\" array".to_string(),
    })?;

    let results: Vec<T> = serde_json::from_value(results_value.clone()).map_err(|e| ControlPlaneError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;

    let total_count = body.get("totalCount").and_then(Value::as_u64);
    let results_per_page = body
        .get("resultsPerPage")
        .or_else(|| body.get("itemsPerPage"))
        .and_then(Value::as_u64);

    Ok(Page { results, total_count, results_per_page })
}

/// Decides whether another page should be fetched after this one.
///
/// Prefers the exact `ceil(totalCount / resultsPerPage)` page count when
/// both fields are present; otherwise falls back to "keep going while the
/// page we just got was full", for control-plane endpoints that omit
/// totals.
pub fn has_next_page<T>(page: &Page<T>, current_page_number: u64, requested_page_size: u64) -> bool {
    match (page.total_count, page.results_per_page.or(Some(requested_page_size))) {
        (Some(total), Some(per_page)) if per_page > 0 => {
            let total_pages = total.div_ceil(per_page).max(1);
            current_page_number < total_pages
        }
        _ => page.results.len() as u64 >= requested_page_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn parses_results_and_totals() {
        let body = json!({
            "results": [{"name": "a"}, {"name": "b"}],
            "totalCount": 5,
            "resultsPerPage": 2,
        });
        let page: Page<Item> = parse_page("listClusters", &body).unwrap();
        assert_eq!(page.results, vec![Item { name: "a".into() }, Item { name: "b".into() }]);
        assert_eq!(page.total_count, Some(5));
        assert_eq!(page.results_per_page, Some(2));
    }

    #[test]
    fn rejects_a_missing_results_array() {
        let body = json!({ "totalCount": 5 });
        let err = parse_page::<Item>("listClusters", &body).unwrap_err();
        assert!(matches!(err, ControlPlaneError::Decode { .. }));
    }

    #[test]
    fn computes_has_next_page_from_totals() {
        let page: Page<Item> = Page { results: vec![], total_count: Some(5), results_per_page: Some(2) };
        assert!(has_next_page(&page, 1, 2));
        assert!(has_next_page(&page, 2, 2));
        assert!(!has_next_page(&page, 3, 2));
    }

    #[test]
    fn falls_back_to_full_page_heuristic_without_totals() {
        let full_page: Page<Item> = Page {
            results: vec![Item { name: "a".into() }, Item { name: "b".into() }],
            total_count: None,
            results_per_page: None,
        };
        assert!(has_next_page(&full_page, 1, 2));

        let short_page: Page<Item> = Page { results: vec![Item { name: "a".into() }], total_count: None, results_per_page: None };
        assert!(!has_next_page(&short_page, 1, 2));
    }
}
