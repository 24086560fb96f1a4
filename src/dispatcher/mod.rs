use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use failure::Fail;
use serde_json::Value;

use crate::classifier::{self, Classification, Discrepancy, DiscrepancyKind};
use crate::filter::ReplayEvent;
use crate::log_parser::log_events::{is_blank, AccessLogRecord};
use crate::scheduler::{Sleeper, WaitResult};

pub mod transport;

/// Carries the transmitted body length so the target can tell replayed
/// requests apart from live traffic.
pub const MARKER_HEADER: &str = "x-replay-content-length";

const RETRY_STATUS: u16 = 503;

#[derive(Debug, Fail)]
pub enum ReplayError {
    #[fail(display = "recorded request body is not valid JSON: {}", _0)]
    RequestBodyParse(String),
    #[fail(display = "no response: {}", _0)]
    Network(String),
}

impl ReplayError {
    pub fn kind(&self) -> DiscrepancyKind {
        match *self {
            ReplayError::RequestBodyParse(_) => DiscrepancyKind::RequestBodyParseError,
            ReplayError::Network(_) => DiscrepancyKind::NetworkError,
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RetryPolicy {
    /// The n-th retry waits n times this long. Retries are not capped.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            backoff_step: Duration::from_millis(2000),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct DispatchConfig {
    pub prefix: String,
    pub credentials: Option<Credentials>,
    pub retry: RetryPolicy,
}

#[derive(PartialEq, Debug, Clone)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub basic_auth: Option<Credentials>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ReplayResponse {
    pub status: u16,
    /// Lowercased names
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub trait Transport {
    fn send(&self, request: &OutboundRequest) -> Result<ReplayResponse, ReplayError>;
}

#[derive(PartialEq, Debug, Clone)]
pub struct ReplayOutcome {
    pub classification: Classification,
    pub discrepancy: Discrepancy,
    pub latency_ms: Option<f64>,
    pub response: Option<ReplayResponse>,
}

impl ReplayOutcome {
    pub fn skipped() -> ReplayOutcome {
        ReplayOutcome {
            classification: Classification::Skipped,
            discrepancy: Discrepancy::none(),
            latency_ms: None,
            response: None,
        }
    }

    pub fn failed(error: &ReplayError) -> ReplayOutcome {
        ReplayOutcome {
            classification: Classification::Failed,
            discrepancy: Discrepancy::new(error.kind(), vec![error.to_string()]),
            latency_ms: None,
            response: None,
        }
    }
}

/// Recorded 404s of anonymous clients and recorded server errors are not
/// worth sending again.
pub fn should_skip(record: &AccessLogRecord) -> bool {
    if record.status.starts_with("50") {
        return true;
    }

    if record.status != "404" {
        return false;
    }

    match record.request_header_map().get("authorization") {
        Some(value) => value.trim().eq_ignore_ascii_case("bearer"),
        None => true,
    }
}

pub struct Dispatcher<T: Transport> {
    transport: T,
    config: DispatchConfig,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T, config: DispatchConfig) -> Dispatcher<T> {
        Dispatcher { transport, config }
    }

    pub fn target(&self, event: &ReplayEvent) -> String {
        format!("{}{}", self.config.prefix, event.url)
    }

    pub fn prepare(&self, event: &ReplayEvent) -> Result<OutboundRequest, ReplayError> {
        let record = &event.record;

        let body = if is_blank(&record.request_body) {
            None
        } else {
            let parsed: Value = serde_json::from_str(&record.request_body)
                .map_err(|err| ReplayError::RequestBodyParse(err.to_string()))?;
            Some(parsed.to_string())
        };

        let mut headers = record.request_header_map();
        headers.remove("host");

        if self.config.credentials.is_some() {
            headers.remove("authorization");
        }

        let content_length = body.as_ref().map(|b| b.len()).unwrap_or(0).to_string();
        headers.insert("content-length".to_string(), content_length.clone());
        headers.insert(MARKER_HEADER.to_string(), content_length);

        Ok(OutboundRequest {
            method: record.method.clone(),
            url: self.target(event),
            headers,
            body,
            basic_auth: self.config.credentials.clone(),
        })
    }

    /// Sends the request again for as long as the target answers 503. The
    /// returned duration covers the final attempt only, backoff excluded.
    fn send_with_retry(
        &self,
        request: &OutboundRequest,
        sleeper: &Sleeper,
    ) -> Result<(ReplayResponse, Duration), ReplayError> {
        let mut attempt: u32 = 0;

        loop {
            let started = Instant::now();
            let response = self.transport.send(request)?;
            let elapsed = started.elapsed();

            if response.status != RETRY_STATUS {
                return Ok((response, elapsed));
            }

            attempt += 1;
            let backoff = self.config.retry.backoff_step * attempt;
            warn!(
                "{} {} answered {}, retry #{} in {:?}",
                request.method, request.url, RETRY_STATUS, attempt, backoff
            );

            if sleeper.wait(backoff.as_secs_f64() * 1000.0) == WaitResult::Interrupted {
                return Err(ReplayError::Network(format!(
                    "interrupted while retrying after {} x {}",
                    attempt, RETRY_STATUS
                )));
            }
        }
    }

    /// An interrupt on `sleeper` ends a 503 retry loop early.
    pub fn dispatch(&self, event: &ReplayEvent, sleeper: &Sleeper) -> ReplayOutcome {
        let request = match self.prepare(event) {
            Ok(request) => request,
            Err(err) => return ReplayOutcome::failed(&err),
        };

        if should_skip(&event.record) {
            return ReplayOutcome::skipped();
        }

        match self.send_with_retry(&request, sleeper) {
            Ok((response, elapsed)) => {
                let discrepancy = classifier::classify(&event.record, &response);

                ReplayOutcome {
                    classification: discrepancy.classification(),
                    discrepancy,
                    latency_ms: Some(elapsed.as_secs_f64() * 1000.0),
                    response: Some(response),
                }
            }
            Err(err) => ReplayOutcome::failed(&err),
        }
    }
}
