use std::io::prelude::*;

use failure::Error;

use crate::analyzer::endpoints::EndpointTable;
use crate::analyzer::series::SeriesSummary;
use crate::result;

pub mod condensed;
pub mod prometheus;
pub mod terminal;

pub trait Renderer {
    fn render(&mut self, result: &result::ReplayResult) -> Result<(), Error>;
}

fn write_counts(stream: &mut dyn Write, result: &result::ReplayResult) -> Result<(), Error> {
    let outcomes = &result.outcomes;

    writeln!(stream, "count:\t{}", outcomes.total())?;
    writeln!(stream, "count.success:\t{}", outcomes.success)?;
    writeln!(stream, "count.failed:\t{}", outcomes.failed)?;
    writeln!(stream, "count.skipped:\t{}", outcomes.skipped)?;
    writeln!(stream, "success.percent:\t{:.3}", outcomes.success_percent())?;

    for (kind, count) in &outcomes.discrepancies {
        writeln!(stream, "discrepancy.{}:\t{}", kind.name(), count)?;
    }

    Ok(())
}

fn write_summary(stream: &mut dyn Write, prefix: &str, summary: &SeriesSummary) -> Result<(), Error> {
    writeln!(stream, "{}.count:\t{}", prefix, summary.count)?;
    writeln!(stream, "{}.sum:\t{:.3}", prefix, summary.sum)?;
    writeln!(stream, "{}.avg:\t{:.3}", prefix, summary.avg)?;
    writeln!(stream, "{}.min:\t{:.3}", prefix, summary.min)?;
    writeln!(stream, "{}.max:\t{:.3}", prefix, summary.max)?;

    for (rank, value) in &summary.percentiles {
        writeln!(stream, "{}.p{}:\t{:.3}", prefix, rank, value)?;
    }

    Ok(())
}

fn write_response_time(stream: &mut dyn Write, result: &result::ReplayResult) -> Result<(), Error> {
    match result.response_time {
        Some(ref response_time) => write_summary(stream, "time", response_time),
        None => {
            warn!("No replayed responses for timing results.");
            Ok(())
        }
    }
}

fn write_rates(stream: &mut dyn Write, result: &result::ReplayResult) -> Result<(), Error> {
    let format_rate = |rate: Option<f64>| match rate {
        Some(rate) => format!("{:.3}", rate),
        None => String::from("-"),
    };

    writeln!(stream, "rate.original:\t{}", format_rate(result.original_rate))?;
    writeln!(stream, "rate.replay:\t{}", format_rate(result.replay_rate))?;
    writeln!(stream, "rate.ratio:\t{}", result.ratio)?;

    Ok(())
}

fn write_endpoints(stream: &mut dyn Write, endpoints: &Option<EndpointTable>) -> Result<(), Error> {
    let endpoints = match endpoints {
        Some(endpoints) => endpoints,
        None => return Ok(()),
    };

    for (endpoint, count) in &endpoints.visible {
        writeln!(stream, "endpoint:\t{}\t{}", count, endpoint)?;
    }

    for (count, endpoint_count) in &endpoints.hidden {
        writeln!(stream, "endpoint.hidden.{}:\t{}", count, endpoint_count)?;
    }

    Ok(())
}

#[cfg(test)]
pub mod tests {
    use std::collections::BTreeMap;
    use std::io;
    use std::str;
    use std::time::Duration;

    use super::*;
    use crate::analyzer::aggregated_outcomes::OutcomeCounts;
    use crate::analyzer::channels::Channel;
    use crate::classifier::DiscrepancyKind;

    pub struct MockWrite {
        pub write_calls: Vec<String>,
    }

    impl Write for MockWrite {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.write_calls.push(str::from_utf8(buf).unwrap().to_string());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl MockWrite {
        pub fn new() -> MockWrite {
            MockWrite { write_calls: vec![] }
        }

        pub fn lines(&self) -> Vec<String> {
            self.write_calls
                .concat()
                .lines()
                .map(|line| line.to_string())
                .collect()
        }
    }

    fn summary(scale: f64) -> SeriesSummary {
        SeriesSummary {
            count: 3,
            sum: 0.6 * scale,
            avg: 0.2 * scale,
            min: 0.1 * scale,
            max: 0.3 * scale,
            percentiles: vec![(1, 0.1 * scale), (50, 0.2 * scale), (99, 0.3 * scale)],
        }
    }

    pub fn get_result_fixture() -> result::ReplayResult {
        let mut discrepancies = BTreeMap::new();
        discrepancies.insert(DiscrepancyKind::Status, 1);

        let mut hidden = BTreeMap::new();
        hidden.insert(1, 4);

        result::ReplayResult {
            outcomes: OutcomeCounts {
                success: 2,
                failed: 1,
                skipped: 1,
                discrepancies,
            },
            response_time: Some(summary(1.0)),
            channels: vec![(Channel::Datastore, summary(100.0))],
            elapsed: Duration::from_millis(12500),
            slept_ms: 10000.0,
            original_rate: Some(0.8),
            replay_rate: Some(0.32),
            ratio: 2.0,
            endpoints: Some(EndpointTable {
                visible: vec![("/api/items".to_string(), 3)],
                hidden,
            }),
        }
    }

    pub fn get_empty_result_fixture() -> result::ReplayResult {
        result::ReplayResult {
            outcomes: OutcomeCounts {
                success: 0,
                failed: 0,
                skipped: 0,
                discrepancies: BTreeMap::new(),
            },
            response_time: None,
            channels: vec![],
            elapsed: Duration::from_millis(0),
            slept_ms: 0.0,
            original_rate: None,
            replay_rate: None,
            ratio: 1.0,
            endpoints: None,
        }
    }

    #[test]
    fn test_write_counts_guards_empty_run() {
        let mut mock_write = MockWrite::new();

        write_counts(&mut mock_write, &get_empty_result_fixture()).unwrap();

        assert!(mock_write.lines().contains(&String::from("success.percent:\t0.000")));
    }
}
