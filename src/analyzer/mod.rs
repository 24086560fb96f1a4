use std::collections::BTreeMap;
use std::time::Duration;

use crate::dispatcher::ReplayOutcome;
use crate::filter::ReplayEvent;
use crate::result;

pub mod aggregated_outcomes;
pub mod channels;
pub mod endpoints;
pub mod percentile;
pub mod series;

use self::aggregated_outcomes::AggregatedOutcomes;
use self::channels::Channel;
use self::endpoints::{EndpointConfig, EndpointCounter};
use self::series::StatisticSeries;

const MILLISECONDS_TO_SECONDS: f64 = 0.001;

/// First and last timestamp of the replay list, used for the recorded rate.
#[derive(PartialEq, Debug, Clone, Copy)]
struct RecordingSpan {
    events: usize,
    first_ms: i64,
    last_ms: i64,
}

impl RecordingSpan {
    fn from_events(events: &[ReplayEvent]) -> Option<RecordingSpan> {
        match (events.first(), events.last()) {
            (Some(first), Some(last)) => Some(RecordingSpan {
                events: events.len(),
                first_ms: first.record.timestamp,
                last_ms: last.record.timestamp,
            }),
            _ => None,
        }
    }

    fn rate(&self) -> Option<f64> {
        let seconds = (self.last_ms - self.first_ms) as f64 / 1000.0;
        if seconds <= 0.0 {
            return None;
        }
        Some(self.events as f64 / seconds)
    }
}

/// All statistics of one replay run.
pub struct ReplayAnalyzer {
    response_times: StatisticSeries,
    channels: BTreeMap<Channel, StatisticSeries>,
    outcomes: AggregatedOutcomes,
    endpoints: Option<EndpointCounter>,
    slept_ms: f64,
    recording: Option<RecordingSpan>,
    ratio: f64,
}

impl ReplayAnalyzer {
    pub fn new(
        events: &[ReplayEvent],
        ratio: f64,
        endpoints: Option<EndpointConfig>,
    ) -> ReplayAnalyzer {
        ReplayAnalyzer {
            response_times: StatisticSeries::new(),
            channels: BTreeMap::new(),
            outcomes: AggregatedOutcomes::new(),
            endpoints: endpoints.map(EndpointCounter::new),
            slept_ms: 0.0,
            recording: RecordingSpan::from_events(events),
            ratio,
        }
    }

    pub fn add_outcome(&mut self, event: &ReplayEvent, outcome: &ReplayOutcome) {
        self.outcomes.add(outcome);

        if let Some(latency_ms) = outcome.latency_ms {
            self.response_times.add(latency_ms);
        }

        if let Some(ref response) = outcome.response {
            for (channel, value) in channels::extract(&response.body) {
                self.channels
                    .entry(channel)
                    .or_insert_with(StatisticSeries::new)
                    .add(value);
            }
        }

        if let Some(ref mut endpoints) = self.endpoints {
            endpoints.add(&event.url);
        }
    }

    /// Negative scale-mode delays are never waited and not accounted.
    pub fn add_sleep(&mut self, delay_ms: f64) {
        if delay_ms > 0.0 {
            self.slept_ms += delay_ms;
        }
    }

    pub fn result(&self, elapsed: Duration) -> result::ReplayResult {
        let outcomes = self.outcomes.result();

        let elapsed_seconds = elapsed.as_secs_f64();
        let replay_rate = if elapsed_seconds > 0.0 && outcomes.total() > 0 {
            Some(outcomes.total() as f64 / elapsed_seconds)
        } else {
            None
        };

        result::ReplayResult {
            outcomes,
            response_time: self.response_times.summary(MILLISECONDS_TO_SECONDS),
            channels: self
                .channels
                .iter()
                .filter_map(|(channel, series)| series.summary(1.0).map(|s| (*channel, s)))
                .collect(),
            elapsed,
            slept_ms: self.slept_ms,
            original_rate: self.recording.and_then(|span| span.rate()),
            replay_rate,
            ratio: self.ratio,
            endpoints: self.endpoints.as_ref().map(|e| e.table()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::classifier::{Classification, Discrepancy};
    use crate::dispatcher::ReplayResponse;
    use crate::filter::tests::event;

    fn responded(latency_ms: f64, body: &str) -> ReplayOutcome {
        ReplayOutcome {
            classification: Classification::Success,
            discrepancy: Discrepancy::none(),
            latency_ms: Some(latency_ms),
            response: Some(ReplayResponse {
                status: 200,
                headers: BTreeMap::new(),
                body: body.to_string(),
            }),
        }
    }

    #[test]
    fn test_analyze_outcomes() {
        let events = vec![
            event(1000, "GET", "/a?x=1", "200"),
            event(2000, "GET", "/a?x=2", "200"),
            event(5000, "GET", "/gone", "404"),
        ];
        let mut analyzer = ReplayAnalyzer::new(
            &events,
            2.0,
            Some(EndpointConfig {
                path_only: true,
                strip_keys: vec![],
                threshold: 1,
            }),
        );

        analyzer.add_outcome(&events[0], &responded(100.0, r#"{"debug":{"db":4}}"#));
        analyzer.add_sleep(500.0);
        analyzer.add_outcome(&events[1], &responded(300.0, r#"{"debug":{"db":6,"node":{"count":1}}}"#));
        analyzer.add_sleep(-20.0);
        analyzer.add_outcome(&events[2], &ReplayOutcome::skipped());

        let result = analyzer.result(Duration::from_secs(2));

        assert_eq!(result.outcomes.total(), 3);
        assert_eq!(result.outcomes.skipped, 1);

        let response_time = result.response_time.unwrap();
        assert_eq!(response_time.count, 2);
        assert!((response_time.avg - 0.2).abs() < 1e-9);

        assert_eq!(result.channels.len(), 2);
        assert_eq!(result.channels[0].0, Channel::Datastore);
        assert_eq!(result.channels[0].1.sum, 10.0);
        assert_eq!(result.channels[1].0, Channel::NodeCount);

        assert_eq!(result.slept_ms, 500.0);
        assert_eq!(result.original_rate, Some(0.75));
        assert_eq!(result.replay_rate, Some(1.5));
        assert_eq!(result.ratio, 2.0);

        let endpoints = result.endpoints.unwrap();
        assert_eq!(endpoints.visible, vec![("/a".to_string(), 2)]);
    }

    #[test]
    fn test_analyze_empty() {
        let analyzer = ReplayAnalyzer::new(&[], 1.0, None);

        let result = analyzer.result(Duration::from_secs(0));

        assert_eq!(result.outcomes.total(), 0);
        assert_eq!(result.outcomes.success_percent(), 0.0);
        assert_eq!(result.response_time, None);
        assert!(result.channels.is_empty());
        assert_eq!(result.original_rate, None);
        assert_eq!(result.replay_rate, None);
        assert_eq!(result.endpoints, None);
    }

    #[test]
    fn test_skipped_adds_no_latency() {
        let events = vec![event(1000, "GET", "/gone", "404")];
        let mut analyzer = ReplayAnalyzer::new(&events, 1.0, None);

        analyzer.add_outcome(&events[0], &ReplayOutcome::skipped());

        let result = analyzer.result(Duration::from_secs(1));
        assert_eq!(result.outcomes.skipped, 1);
        assert_eq!(result.response_time, None);
    }
}
