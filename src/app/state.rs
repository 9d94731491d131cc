use std::fmt;

use crate::fetch::RateLimit;
use crate::records::UpsertOutcome;

/// Per-record counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    /// Records dropped because they had no usable `guid`.
    pub skipped: usize,
    /// Null or empty thot items.
    pub discarded: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Replaced => self.replaced += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// State threaded through one sync run in place of a process-wide rate-limit flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub requests: usize,
    pub last_rate_limit: Option<RateLimit>,
    /// Set once the server reports fewer remaining requests than the configured floor.
    pub rate_limited: bool,
    pub tally: Tally,
}

impl RunState {
    pub fn observe(&mut self, rate_limit: RateLimit, floor: u32) {
        self.requests += 1;
        self.last_rate_limit = Some(rate_limit);
        if rate_limit.is_exhausted(floor) {
            self.rate_limited = true;
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.tally;
        write!(
            f,
            "{} requests, {} inserted, {} replaced, {} unchanged, {} skipped, {} discarded",
            self.requests, t.inserted, t.replaced, t.unchanged, t.skipped, t.discarded
        )?;
        if self.rate_limited {
            f.write_str(" (stopped at rate limit)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn limit(remaining: u32) -> RateLimit {
        RateLimit {
            remaining,
            reset_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn rate_limit_flag_latches() {
        let mut state = RunState::default();
        state.observe(limit(10), 5);
        assert!(!state.rate_limited);

        state.observe(limit(3), 5);
        state.observe(limit(60), 5);

        assert!(state.rate_limited);
        assert_eq!(state.requests, 3);
        assert_eq!(state.last_rate_limit.map(|l| l.remaining), Some(60));
    }
}
