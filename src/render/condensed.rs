use std::io::prelude::*;

use failure::Error;

use crate::render::{write_counts, write_endpoints, write_rates, write_response_time, Renderer};
use crate::result;

/// Short report for a secondary sink, without per-channel breakdowns.
pub struct CondensedRenderer<'a> {
    stream: &'a mut dyn Write,
}

impl<'a> CondensedRenderer<'a> {
    pub fn new(stream: &'a mut dyn Write) -> CondensedRenderer<'a> {
        CondensedRenderer { stream }
    }
}

impl<'a> Renderer for CondensedRenderer<'a> {
    fn render(&mut self, result: &result::ReplayResult) -> Result<(), Error> {
        write_counts(self.stream, result)?;
        write_response_time(self.stream, result)?;
        write_rates(self.stream, result)?;
        write_endpoints(self.stream, &result.endpoints)?;

        self.stream.flush()?;
        Ok(())
    }
}
