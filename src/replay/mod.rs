use std::io::prelude::*;

use failure::Error;

use crate::analyzer::ReplayAnalyzer;
use crate::dispatcher::{Dispatcher, ReplayOutcome, Transport};
use crate::filter::ReplayEvent;
use crate::scheduler::{self, Pacer, Sleeper, WaitResult};

const NOT_SENT: &str = "-";
const EMPTY_BODY: &str = "<empty>";

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

/// What happened to a single event.
#[derive(PartialEq, Debug, Clone)]
pub enum EventState {
    Excluded,
    Processed(ReplayOutcome),
}

pub struct Replayer<'a, T: Transport> {
    dispatcher: &'a Dispatcher<T>,
    pacer: &'a Pacer,
    sleeper: &'a Sleeper,
    results: &'a mut dyn Write,
}

impl<'a, T: Transport> Replayer<'a, T> {
    pub fn new(
        dispatcher: &'a Dispatcher<T>,
        pacer: &'a Pacer,
        sleeper: &'a Sleeper,
        results: &'a mut dyn Write,
    ) -> Replayer<'a, T> {
        Replayer {
            dispatcher,
            pacer,
            sleeper,
            results,
        }
    }

    pub fn process(&mut self, event: &ReplayEvent, analyzer: &mut ReplayAnalyzer) -> Result<EventState, Error> {
        if scheduler::is_excluded(event) {
            debug!(
                "Excluded {} {} (recorded {})",
                event.record.method, event.url, event.record.status
            );
            return Ok(EventState::Excluded);
        }

        let outcome = self.dispatcher.dispatch(event, self.sleeper);
        analyzer.add_outcome(event, &outcome);

        let line = result_line(event, &self.dispatcher.target(event), &outcome);
        info!("{}", line);
        writeln!(self.results, "{}", line)?;

        Ok(EventState::Processed(outcome))
    }

    /// Replays the events one after another. An interrupt ends the run at
    /// the next pacing wait or 503 backoff, a request in flight is finished
    /// first.
    pub fn run(&mut self, events: &[ReplayEvent], analyzer: &mut ReplayAnalyzer) -> Result<RunStatus, Error> {
        for (index, event) in events.iter().enumerate() {
            if self.sleeper.interrupted() {
                return Ok(RunStatus::Interrupted);
            }

            if self.process(event, analyzer)? == EventState::Excluded {
                continue;
            }

            if self.sleeper.interrupted() {
                return Ok(RunStatus::Interrupted);
            }

            let next = events.get(index + 1).map(|next| next.record.timestamp);
            let delay_ms = self.pacer.delay_ms(event.record.timestamp, next);
            analyzer.add_sleep(delay_ms);
            debug!("Waiting {:.1}ms before the next request", delay_ms);

            if self.sleeper.wait(delay_ms) == WaitResult::Interrupted {
                return Ok(RunStatus::Interrupted);
            }
        }

        self.results.flush()?;
        Ok(RunStatus::Completed)
    }
}

fn single_line(text: &str) -> String {
    text.replace('\r', "\\r").replace('\n', "\\n")
}

/// original status | replay status | discrepancy | original duration |
/// replay seconds | url | method | original body | replay body |
/// original headers | replay headers
pub fn result_line(event: &ReplayEvent, url: &str, outcome: &ReplayOutcome) -> String {
    let record = &event.record;

    let original_body = if record.response_body.is_empty() {
        EMPTY_BODY.to_string()
    } else {
        single_line(&record.response_body)
    };

    let (replay_status, replay_body, replay_headers) = match outcome.response {
        Some(ref response) => (
            response.status.to_string(),
            single_line(&response.body),
            serde_json::to_string(&response.headers).unwrap_or_else(|_| NOT_SENT.to_string()),
        ),
        None => (NOT_SENT.to_string(), NOT_SENT.to_string(), NOT_SENT.to_string()),
    };

    let replay_duration = match outcome.latency_ms {
        Some(latency_ms) => format!("{:.3}", latency_ms / 1000.0),
        None => NOT_SENT.to_string(),
    };

    vec![
        record.status.clone(),
        replay_status,
        outcome.discrepancy.to_string(),
        record.request_time.clone(),
        replay_duration,
        url.to_string(),
        record.method.clone(),
        original_body,
        replay_body,
        single_line(&record.response_headers),
        replay_headers,
    ]
    .join("|")
}
