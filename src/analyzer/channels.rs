use serde_json::Value;

/// Sub-timings the target reports under `debug` in its JSON responses.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Channel {
    Datastore,
    Transaction,
    TransactionReadOnly,
    Columnar,
    Runtime,
    CacheReadCount,
    CacheReadTime,
    CacheWriteCount,
    CacheWriteTime,
    NodeCount,
    NodeTime,
}

impl Channel {
    pub const ALL: [Channel; 11] = [
        Channel::Datastore,
        Channel::Transaction,
        Channel::TransactionReadOnly,
        Channel::Columnar,
        Channel::Runtime,
        Channel::CacheReadCount,
        Channel::CacheReadTime,
        Channel::CacheWriteCount,
        Channel::CacheWriteTime,
        Channel::NodeCount,
        Channel::NodeTime,
    ];

    pub fn name(&self) -> &'static str {
        match *self {
            Channel::Datastore => "datastore",
            Channel::Transaction => "transaction",
            Channel::TransactionReadOnly => "transaction_readonly",
            Channel::Columnar => "columnar",
            Channel::Runtime => "runtime",
            Channel::CacheReadCount => "cache_read_count",
            Channel::CacheReadTime => "cache_read_time",
            Channel::CacheWriteCount => "cache_write_count",
            Channel::CacheWriteTime => "cache_write_time",
            Channel::NodeCount => "node_count",
            Channel::NodeTime => "node_time",
        }
    }

    fn path(&self) -> &'static [&'static str] {
        match *self {
            Channel::Datastore => &["db"],
            Channel::Transaction => &["transaction"],
            Channel::TransactionReadOnly => &["transactionReadOnly"],
            Channel::Columnar => &["clickhouse"],
            Channel::Runtime => &["runtime"],
            Channel::CacheReadCount => &["cache", "readCount"],
            Channel::CacheReadTime => &["cache", "readTime"],
            Channel::CacheWriteCount => &["cache", "writeCount"],
            Channel::CacheWriteTime => &["cache", "writeTime"],
            Channel::NodeCount => &["node", "count"],
            Channel::NodeTime => &["node", "time"],
        }
    }

    fn read(&self, debug: &Value) -> Option<f64> {
        let value = self
            .path()
            .iter()
            .try_fold(debug, |value, key| value.get(*key))?;

        let number = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }?;

        if number == 0.0 || !number.is_finite() {
            None
        } else {
            Some(number)
        }
    }
}

/// Channels present and non-zero in a response body. Bodies that are not
/// JSON or carry no `debug` object yield nothing.
pub fn extract(body: &str) -> Vec<(Channel, f64)> {
    let payload: Value = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(_) => return Vec::new(),
    };

    let debug = match payload.get("debug") {
        Some(debug) if debug.is_object() => debug,
        _ => return Vec::new(),
    };

    Channel::ALL
        .iter()
        .filter_map(|channel| channel.read(debug).map(|value| (*channel, value)))
        .collect()
}
