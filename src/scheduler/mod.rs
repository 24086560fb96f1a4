use std::cell::Cell;
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::filter::ReplayEvent;

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum PacingMode {
    /// Wait the recorded gap between two requests
    Normal,
    /// Spread requests sharing a timestamp evenly across their second
    Scale,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PacingConfig {
    pub mode: PacingMode,
    pub ratio: f64,
    pub skip_sleep: bool,
}

impl Default for PacingConfig {
    fn default() -> PacingConfig {
        PacingConfig {
            mode: PacingMode::Normal,
            ratio: 1.0,
            skip_sleep: false,
        }
    }
}

/// Events that are neither sent, counted nor paced.
///
/// Dropping the slot's delay shortens the replayed timeline by the gap that
/// followed the excluded request.
pub fn is_excluded(event: &ReplayEvent) -> bool {
    event.record.status == "500" || event.record.status == "499" || event.url.contains("artifacts")
}

pub struct Pacer {
    config: PacingConfig,
    burst_sizes: HashMap<i64, usize>,
}

impl Pacer {
    pub fn new(config: PacingConfig, events: &[ReplayEvent]) -> Pacer {
        let mut burst_sizes: HashMap<i64, usize> = HashMap::new();

        if config.mode == PacingMode::Scale {
            for event in events {
                *burst_sizes.entry(event.record.timestamp).or_insert(0) += 1;
            }
        }

        Pacer { config, burst_sizes }
    }

    /// Milliseconds to wait after the event at `current` before the one at
    /// `next`. Scale mode can come out negative when a second was overfull.
    pub fn delay_ms(&self, current: i64, next: Option<i64>) -> f64 {
        let next = match next {
            Some(next) if !self.config.skip_sleep => next,
            _ => return 0.0,
        };

        match self.config.mode {
            PacingMode::Normal => {
                if next == current {
                    0.0
                } else {
                    (next - current) as f64 / self.config.ratio
                }
            }
            PacingMode::Scale => {
                let burst = *self.burst_sizes.get(&current).unwrap_or(&1) as f64;
                let base = (1000.0 / burst).round();
                let addend = if next != current {
                    (next - current - 1000) as f64
                } else {
                    0.0
                };

                (base + addend) / self.config.ratio
            }
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum WaitResult {
    Elapsed,
    Interrupted,
}

/// Sleeps that end early when anything arrives on the interrupt channel.
/// Once seen, an interrupt stays set for every later check.
pub struct Sleeper {
    interrupt: Receiver<()>,
    seen: Cell<bool>,
}

impl Sleeper {
    pub fn new(interrupt: Receiver<()>) -> Sleeper {
        Sleeper {
            interrupt,
            seen: Cell::new(false),
        }
    }

    pub fn interrupted(&self) -> bool {
        if self.seen.get() {
            return true;
        }

        match self.interrupt.try_recv() {
            Ok(()) => {
                self.seen.set(true);
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    pub fn wait(&self, delay_ms: f64) -> WaitResult {
        if self.interrupted() {
            return WaitResult::Interrupted;
        }

        if delay_ms <= 0.0 {
            return WaitResult::Elapsed;
        }

        let delay = Duration::from_micros((delay_ms * 1000.0) as u64);

        match self.interrupt.recv_timeout(delay) {
            Ok(()) => {
                self.seen.set(true);
                WaitResult::Interrupted
            }
            Err(RecvTimeoutError::Timeout) => WaitResult::Elapsed,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(delay);
                WaitResult::Elapsed
            }
        }
    }
}
