use std::time::Duration;

use crate::analyzer::aggregated_outcomes::OutcomeCounts;
use crate::analyzer::channels::Channel;
use crate::analyzer::endpoints::EndpointTable;
use crate::analyzer::series::SeriesSummary;

#[derive(PartialEq, Debug, Clone)]
pub struct ReplayResult {
    pub outcomes: OutcomeCounts,
    /// In seconds
    pub response_time: Option<SeriesSummary>,
    /// Native units of each channel, empty channels left out
    pub channels: Vec<(Channel, SeriesSummary)>,
    pub elapsed: Duration,
    pub slept_ms: f64,
    /// Requests per second in the recording and during the replay
    pub original_rate: Option<f64>,
    pub replay_rate: Option<f64>,
    pub ratio: f64,
    pub endpoints: Option<EndpointTable>,
}
