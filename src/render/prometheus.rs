use failure::Error;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

use crate::analyzer::series::SeriesSummary;
use crate::render::Renderer;
use crate::result;

/// Final statistics in the Prometheus text format, e.g. for the node
/// exporter's textfile collector.
pub struct PrometheusRenderer {
    pub buffer: Vec<u8>,
    registry: Registry,
    encoder: TextEncoder,
    requests: GaugeVec,
    discrepancies: GaugeVec,
    response_time: GaugeVec,
    channels: GaugeVec,
    rates: GaugeVec,
    elapsed: Gauge,
    slept: Gauge,
}

impl PrometheusRenderer {
    pub fn new() -> Result<PrometheusRenderer, Error> {
        let registry = Registry::new();

        let requests = GaugeVec::new(
            Opts::new("replay_requests", "Replayed requests by classification"),
            &["classification"],
        )?;
        let discrepancies = GaugeVec::new(
            Opts::new("replay_discrepancies", "Failed replays by discrepancy kind"),
            &["kind"],
        )?;
        let response_time = GaugeVec::new(
            Opts::new("replay_response_time_seconds", "Replayed response times"),
            &["stat"],
        )?;
        let channels = GaugeVec::new(
            Opts::new("replay_channel", "Sub-timings reported by the target"),
            &["channel", "stat"],
        )?;
        let rates = GaugeVec::new(
            Opts::new("replay_rate", "Requests per second"),
            &["source"],
        )?;
        let elapsed = Gauge::new("replay_elapsed_seconds", "Wall clock duration of the replay")?;
        let slept = Gauge::new("replay_slept_seconds", "Scheduled pacing delay")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(discrepancies.clone()))?;
        registry.register(Box::new(response_time.clone()))?;
        registry.register(Box::new(channels.clone()))?;
        registry.register(Box::new(rates.clone()))?;
        registry.register(Box::new(elapsed.clone()))?;
        registry.register(Box::new(slept.clone()))?;

        Ok(PrometheusRenderer {
            buffer: Vec::new(),
            registry,
            encoder: TextEncoder::new(),
            requests,
            discrepancies,
            response_time,
            channels,
            rates,
            elapsed,
            slept,
        })
    }
}

fn set_summary(gauges: &GaugeVec, labels: &[&str], summary: &SeriesSummary) {
    let mut stats: Vec<(String, f64)> = vec![
        (String::from("count"), summary.count as f64),
        (String::from("sum"), summary.sum),
        (String::from("avg"), summary.avg),
        (String::from("min"), summary.min),
        (String::from("max"), summary.max),
    ];
    stats.extend(
        summary
            .percentiles
            .iter()
            .map(|(rank, value)| (format!("p{}", rank), *value)),
    );

    for (stat, value) in stats {
        let mut label_values: Vec<&str> = labels.to_vec();
        label_values.push(&stat);
        gauges.with_label_values(&label_values).set(value);
    }
}

impl Renderer for PrometheusRenderer {
    fn render(&mut self, result: &result::ReplayResult) -> Result<(), Error> {
        let outcomes = &result.outcomes;
        self.requests.with_label_values(&["success"]).set(outcomes.success as f64);
        self.requests.with_label_values(&["failed"]).set(outcomes.failed as f64);
        self.requests.with_label_values(&["skipped"]).set(outcomes.skipped as f64);

        for (kind, count) in &outcomes.discrepancies {
            self.discrepancies.with_label_values(&[kind.name()]).set(*count as f64);
        }

        if let Some(ref response_time) = result.response_time {
            set_summary(&self.response_time, &[], response_time);
        }

        for (channel, summary) in &result.channels {
            set_summary(&self.channels, &[channel.name()], summary);
        }

        if let Some(rate) = result.original_rate {
            self.rates.with_label_values(&["original"]).set(rate);
        }
        if let Some(rate) = result.replay_rate {
            self.rates.with_label_values(&["replay"]).set(rate);
        }

        self.elapsed.set(result.elapsed.as_secs_f64());
        self.slept.set(result.slept_ms / 1000.0);

        let metric_families = self.registry.gather();
        self.buffer.clear();
        self.encoder.encode(&metric_families, &mut self.buffer)?;

        Ok(())
    }
}
