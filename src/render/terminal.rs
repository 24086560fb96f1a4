use std::io::prelude::*;

use failure::Error;

use crate::render::{write_counts, write_endpoints, write_rates, write_response_time, write_summary, Renderer};
use crate::result;

/// The full report: counts, response times in seconds, every non-empty
/// channel in its own unit, run timing, rates and endpoints.
pub struct TerminalRenderer<'a> {
    stream: &'a mut dyn Write,
}

impl<'a> TerminalRenderer<'a> {
    pub fn new(stream: &'a mut dyn Write) -> TerminalRenderer<'a> {
        TerminalRenderer { stream }
    }
}

impl<'a> Renderer for TerminalRenderer<'a> {
    fn render(&mut self, result: &result::ReplayResult) -> Result<(), Error> {
        write_counts(self.stream, result)?;
        write_response_time(self.stream, result)?;

        for (channel, summary) in &result.channels {
            write_summary(self.stream, &format!("channel.{}", channel.name()), summary)?;
        }

        writeln!(self.stream, "run.elapsed:\t{:.3}", result.elapsed.as_secs_f64())?;
        writeln!(self.stream, "run.slept:\t{:.3}", result.slept_ms / 1000.0)?;

        write_rates(self.stream, result)?;
        write_endpoints(self.stream, &result.endpoints)?;

        Ok(())
    }
}
