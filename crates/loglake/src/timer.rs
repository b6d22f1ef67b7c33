//! Scoped run timer: logs start and end times plus total duration.

use std::time::Instant;

use chrono::{Local, SecondsFormat};

use diagnostics::*;

/// Logs when a run scope starts and, on drop, when it ended and how
/// long it took.
pub struct ScopedTimer {
    label: &'static str,
    started: Instant,
}

impl ScopedTimer {
    pub fn start(label: &'static str) -> Self {
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        info!("{label} started at {now}", label, now);
        Self {
            label,
            started: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let label = self.label;
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        let elapsed = format!("{:.2?}", self.started.elapsed());
        info!("{label} ended at {now}", label, now);
        info!("Total run time: {elapsed}", elapsed);
    }
}
