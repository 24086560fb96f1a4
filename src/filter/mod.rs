use url::{Position, Url};

use crate::log_parser::log_events::AccessLogRecord;

/// Base the recorded paths are resolved against when rewriting queries.
const REWRITE_BASE: &str = "http://localhost";

#[derive(PartialEq, Debug, Clone)]
pub struct FilterConditions {
    pub include_terms: Option<Vec<String>>,
    pub exclude_terms: Option<Vec<String>>,
    /// Only records strictly newer than this epoch millisecond value pass
    pub start_timestamp: i64,
    pub param_rewrites: Vec<(String, String)>,
}

impl Default for FilterConditions {
    fn default() -> FilterConditions {
        FilterConditions {
            include_terms: None,
            exclude_terms: None,
            start_timestamp: 0,
            param_rewrites: Vec::new(),
        }
    }
}

/// A record scheduled for replay, with its path+query already rewritten.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayEvent {
    pub record: AccessLogRecord,
    pub url: String,
}

fn matches_filter(record: &AccessLogRecord, conditions: &FilterConditions) -> bool {
    let matches_include_terms: bool = match conditions.include_terms {
        Some(ref include_terms) if !include_terms.is_empty() => include_terms
            .iter()
            .fold(false, |result, include_term| {
                result || record.request_line.contains(include_term.as_str())
            }),
        _ => true,
    };

    let matches_exclude_terms: bool = match conditions.exclude_terms {
        Some(ref exclude_terms) => !exclude_terms.iter().fold(false, |result, exclude_term| {
            result || record.request_line.contains(exclude_term.as_str())
        }),
        None => true,
    };

    let matches_time = record.timestamp > conditions.start_timestamp;

    matches_include_terms && matches_exclude_terms && matches_time
}

/// Drops every named parameter from the query and appends it again with the
/// configured value.
pub fn rewrite_query(path: &str, rewrites: &[(String, String)]) -> Result<String, url::ParseError> {
    let mut url = Url::parse(REWRITE_BASE)?.join(path)?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !rewrites.iter().any(|(name, _)| name == key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(kept);
        for (name, value) in rewrites {
            pairs.append_pair(name, value);
        }
    }

    Ok(url[Position::BeforePath..].to_string())
}

fn resolve_url(record: &AccessLogRecord, conditions: &FilterConditions) -> String {
    if conditions.param_rewrites.is_empty() {
        return record.path.clone();
    }

    match rewrite_query(&record.path, &conditions.param_rewrites) {
        Ok(url) => url,
        Err(err) => {
            warn!("Could not rewrite query of {}: {}", record.path, err);
            record.path.clone()
        }
    }
}

/// Builds the replay list in read order. No sorting happens here, pacing
/// relies on the log being chronological.
pub fn build_events<I>(records: I, conditions: &FilterConditions) -> Vec<ReplayEvent>
where
    I: IntoIterator<Item = AccessLogRecord>,
{
    records
        .into_iter()
        .filter(|record| matches_filter(record, conditions))
        .map(|record| {
            let url = resolve_url(&record, conditions);
            ReplayEvent { record, url }
        })
        .collect()
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn record(timestamp: i64, method: &str, path: &str, status: &str) -> AccessLogRecord {
        AccessLogRecord {
            timestamp,
            method: method.to_string(),
            path: path.to_string(),
            request_line: format!("{} {} HTTP/1.1", method, path),
            request_headers: r#"{"host":"api.local","authorization":"Bearer abc"}"#.to_string(),
            request_body: "-".to_string(),
            response_headers: r#"{"content-type":"application/json"}"#.to_string(),
            response_body: "{}".to_string(),
            status: status.to_string(),
            body_bytes_sent: 2,
            request_time: "0.010".to_string(),
        }
    }

    pub fn event(timestamp: i64, method: &str, path: &str, status: &str) -> ReplayEvent {
        ReplayEvent {
            record: record(timestamp, method, path, status),
            url: path.to_string(),
        }
    }

    fn get_fixture() -> Vec<AccessLogRecord> {
        vec![
            record(1000, "GET", "/content/some/page.html", "200"),
            record(2000, "GET", "/content/some/other.html", "200"),
            record(3000, "POST", "/content/some/third.html", "201"),
        ]
    }

    #[test]
    fn test_filter_none() {
        let result = build_events(get_fixture(), &FilterConditions::default());

        assert_eq!(result.len(), 3);
        assert_eq!(result[2].url, "/content/some/third.html");
    }

    #[test]
    fn test_filter_include_exclude() {
        let conditions = FilterConditions {
            include_terms: Some(vec!["GET".to_string()]),
            exclude_terms: Some(vec!["other.html".to_string()]),
            ..FilterConditions::default()
        };

        let result = build_events(get_fixture(), &conditions);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].record.timestamp, 1000);
    }

    #[test]
    fn test_filter_include_multiple() {
        let conditions = FilterConditions {
            include_terms: Some(vec!["page.html".to_string(), "third.html".to_string()]),
            ..FilterConditions::default()
        };

        let result = build_events(get_fixture(), &conditions);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].record.timestamp, 1000);
        assert_eq!(result[1].record.timestamp, 3000);
    }

    #[test]
    fn test_filter_empty_include_list_matches_everything() {
        let conditions = FilterConditions {
            include_terms: Some(vec![]),
            ..FilterConditions::default()
        };

        assert_eq!(build_events(get_fixture(), &conditions).len(), 3);
    }

    #[test]
    fn test_filter_exclude_multiple() {
        let conditions = FilterConditions {
            exclude_terms: Some(vec!["page.html".to_string(), "third.html".to_string()]),
            ..FilterConditions::default()
        };

        let result = build_events(get_fixture(), &conditions);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].record.timestamp, 2000);
    }

    #[test]
    fn test_filter_start_timestamp_is_exclusive() {
        let conditions = FilterConditions {
            start_timestamp: 2000,
            ..FilterConditions::default()
        };

        let result = build_events(get_fixture(), &conditions);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].record.timestamp, 3000);
    }

    #[test]
    fn test_filter_keeps_read_order() {
        let records = vec![
            record(3000, "GET", "/c", "200"),
            record(1000, "GET", "/a", "200"),
            record(2000, "GET", "/b", "200"),
        ];

        let result = build_events(records, &FilterConditions::default());

        let urls: Vec<&str> = result.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["/c", "/a", "/b"]);
    }

    #[test]
    fn test_rewrite_query() {
        let rewrites = vec![("token".to_string(), "replay".to_string())];

        assert_eq!(
            rewrite_query("/a/b?token=secret&page=2", &rewrites).unwrap(),
            "/a/b?page=2&token=replay"
        );
        assert_eq!(rewrite_query("/a/b", &rewrites).unwrap(), "/a/b?token=replay");
    }

    #[test]
    fn test_build_events_applies_rewrites() {
        let conditions = FilterConditions {
            param_rewrites: vec![("limit".to_string(), "5".to_string())],
            ..FilterConditions::default()
        };

        let result = build_events(vec![record(1000, "GET", "/list?limit=100", "200")], &conditions);

        assert_eq!(result[0].url, "/list?limit=5");
        assert_eq!(result[0].record.path, "/list?limit=100");
    }
}
