use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use super::log_format::LogFormat;

#[derive(PartialEq, Clone, Debug)]
pub struct AccessLogRecord {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub method: String,
    pub path: String,
    pub request_line: String,
    pub request_headers: String,
    pub request_body: String,
    pub response_headers: String,
    pub response_body: String,
    pub status: String,
    pub body_bytes_sent: u64,
    pub request_time: String,
}

impl AccessLogRecord {
    pub fn new_from_log_line(
        log_line: &str,
        format: &LogFormat,
        time_format: &str,
    ) -> Result<AccessLogRecord, &'static str> {
        let captures = match format.captures(log_line) {
            Some(captures) => captures,
            None => return Err("Uncomprehensible access logline"),
        };

        let field = |name: &str| -> String {
            captures
                .name(name)
                .map(|m| unescape(m.as_str()))
                .unwrap_or_default()
        };

        let timestamp = if format.has_variable("msec") {
            parse_msec(&field("msec"))?
        } else {
            parse_time_local(&field("time_local"), time_format)?
        };

        let request_line = field("request");
        let mut request_parts = request_line.split_whitespace();

        let method = match request_parts.next() {
            Some(method) => method.to_string(),
            None => return Err("Uncomprehensible request line"),
        };

        let path = match request_parts.next() {
            Some(path) => path.to_string(),
            None => return Err("Uncomprehensible request line"),
        };

        let status = field("status");
        if status.is_empty() {
            return Err("Missing status code");
        }

        Ok(AccessLogRecord {
            timestamp,
            method,
            path,
            request_line,
            request_headers: field("req_headers"),
            request_body: field("request_body"),
            response_headers: field("resp_headers"),
            response_body: field("resp_body"),
            status,
            body_bytes_sent: field("body_bytes_sent").parse().unwrap_or(0),
            request_time: field("request_time"),
        })
    }

    pub fn request_header_map(&self) -> BTreeMap<String, String> {
        parse_header_blob(&self.request_headers)
    }

    pub fn response_header_map(&self) -> BTreeMap<String, String> {
        parse_header_blob(&self.response_headers)
    }
}

/// nginx writes `-` for empty variables.
pub fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "-"
}

/// Header blobs are JSON objects; names are lowercased, non-string values
/// are kept in their JSON form. Anything unparseable counts as no headers.
pub fn parse_header_blob(blob: &str) -> BTreeMap<String, String> {
    if is_blank(blob) {
        return BTreeMap::new();
    }

    match serde_json::from_str::<Value>(blob) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                (name.to_lowercase(), value)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn parse_time_local(value: &str, time_format: &str) -> Result<i64, &'static str> {
    if let Ok(date_time) = DateTime::parse_from_str(value, time_format) {
        return Ok(date_time.timestamp_millis());
    }

    // Formats without an offset are read as UTC
    match NaiveDateTime::parse_from_str(value, time_format) {
        Ok(naive) => Ok(Utc.from_utc_datetime(&naive).timestamp_millis()),
        Err(_) => Err("Uncomprehensible timestamp"),
    }
}

fn parse_msec(value: &str) -> Result<i64, &'static str> {
    match value.parse::<f64>() {
        Ok(seconds) => Ok((seconds * 1000.0).round() as i64),
        Err(_) => Err("Uncomprehensible timestamp"),
    }
}

/// Reverses nginx's `\xHH` escaping of string variables.
fn unescape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut unescaped: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1] == b'x' {
            let high = (bytes[i + 2] as char).to_digit(16);
            let low = (bytes[i + 3] as char).to_digit(16);
            if let (Some(high), Some(low)) = (high, low) {
                unescaped.push((high * 16 + low) as u8);
                i += 4;
                continue;
            }
        }
        unescaped.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&unescaped).into_owned()
}
