//! Snapshot and status-page rendering

use crate::state::StateStores;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Layout of the start time on the status page
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Point-in-time copy of the server state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub server_start_time: NaiveDateTime,
    pub total_request_count: u64,
    pub total_error_count: u64,
    pub interval_request_data: BTreeMap<String, u64>,
    pub detail_request_page_data: BTreeMap<String, u64>,
    pub interval_error_data: BTreeMap<String, u64>,
    pub detail_error_page_data: BTreeMap<String, u64>,
    pub detail_error_data: BTreeMap<String, u64>,
    pub detail_http_code_data: BTreeMap<String, u64>,
}

impl StateSnapshot {
    pub(crate) fn capture(
        start_time: NaiveDateTime,
        total_request_count: u64,
        total_error_count: u64,
        stores: &StateStores,
    ) -> Self {
        Self {
            server_start_time: start_time,
            total_request_count,
            total_error_count,
            interval_request_data: stores.interval_request.snapshot(),
            detail_request_page_data: stores.detail_request_page.snapshot(),
            interval_error_data: stores.interval_error.snapshot(),
            detail_error_page_data: stores.detail_error_page.snapshot(),
            detail_error_data: stores.detail_error.snapshot(),
            detail_http_code_data: stores.detail_http_code.snapshot(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Render totals and every store as `Label : {json}` lines of a minimal HTML page.
///
/// Stores are read one at a time, each under its own shared lock.
pub(crate) fn render_html(
    start_time: NaiveDateTime,
    total_request_count: u64,
    total_error_count: u64,
    stores: &StateStores,
) -> String {
    let mut page = String::with_capacity(1024);
    page.push_str("<html><body><div>");
    // Writing into a String cannot fail.
    let _ = write!(
        page,
        "ServerStartTime : {}<br>TotalRequestCount : {}<br>TotalErrorCount : {}",
        start_time.format(DATE_TIME_FORMAT),
        total_request_count,
        total_error_count
    );

    for store in stores.all() {
        let json = {
            let entries = store.read();
            serde_json::to_string(&entries).unwrap_or_else(|_| "{}".to_string())
        };
        let _ = write!(page, "<br>{} : ", store.name());
        push_escaped(&mut page, &json);
    }

    page.push_str("</div></body></html>");
    page
}

fn push_escaped(page: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => page.push_str("&lt;"),
            '>' => page.push_str("&gt;"),
            '&' => page.push_str("&amp;"),
            _ => page.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 15, 42)
            .unwrap()
    }

    const LABELS: [&str; 6] = [
        "IntervalRequestData",
        "DetailRequestPageData",
        "IntervalErrorData",
        "DetailErrorPageData",
        "DetailErrorData",
        "DetailHttpCodeData",
    ];

    #[test]
    fn test_empty_report_has_every_label() {
        let stores = StateStores::new();
        let html = render_html(start(), 0, 0, &stores);

        assert!(html.starts_with("<html><body><div>"));
        assert!(html.ends_with("</div></body></html>"));
        assert!(html.contains("ServerStartTime : 2024-05-01 08:15:42"));
        assert!(html.contains("TotalRequestCount : 0"));
        assert!(html.contains("TotalErrorCount : 0"));
        for label in LABELS {
            assert!(html.contains(&format!("{label} : {{}}")), "missing {label}");
        }
    }

    #[test]
    fn test_labels_in_fixed_order() {
        let stores = StateStores::new();
        let html = render_html(start(), 0, 0, &stores);
        let positions: Vec<usize> = LABELS
            .iter()
            .map(|label| html.find(&format!("<br>{label} :")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_report_serializes_store_contents() {
        let stores = StateStores::new();
        stores.detail_request_page.set("/b", 2);
        stores.detail_request_page.set("/a", 1);
        stores.detail_http_code.set("404", 3);

        let html = render_html(start(), 3, 0, &stores);
        assert!(html.contains(r#"DetailRequestPageData : {"/a":1,"/b":2}"#));
        assert!(html.contains(r#"DetailHttpCodeData : {"404":3}"#));
        assert!(html.contains("TotalRequestCount : 3"));
    }

    #[test]
    fn test_markup_in_keys_is_escaped() {
        let stores = StateStores::new();
        stores.detail_error.set("<script>alert(1)</script> & co", 1);

        let html = render_html(start(), 0, 1, &stores);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; co"));
    }

    #[test]
    fn test_snapshot_copies_every_store() {
        let stores = StateStores::new();
        stores.interval_request.set("202405011230", 4);
        stores.detail_error.set("boom", 1);

        let snapshot = StateSnapshot::capture(start(), 4, 1, &stores);
        stores.interval_request.set("202405011230", 100);

        assert_eq!(snapshot.interval_request_data["202405011230"], 4);
        assert_eq!(snapshot.detail_error_data["boom"], 1);
        assert!(snapshot.detail_http_code_data.is_empty());

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["total_request_count"], 4);
        assert_eq!(json["interval_request_data"]["202405011230"], 4);
        assert_eq!(json["server_start_time"], "2024-05-01T08:15:42");
    }
}
