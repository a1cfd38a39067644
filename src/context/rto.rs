//! The adaptive retransmission timeout.
//!
//! Exponentially smoothed round-trip estimation in the style of
//! [RFC 6298](https://www.rfc-editor.org/rfc/rfc6298): `SRTT` and `RTTVAR`
//! fold in one measurement per acknowledged first-transmission segment, and
//! the timeout doubles on every retransmission. Measurements from
//! retransmitted segments are never fed in (Karn's algorithm); that
//! filtering is the caller's job, since only the caller knows a segment's
//! transmission count.

use std::time::Duration;

/// Bootstrap timeout used until the first round-trip measurement.
pub const INIT_RTO: Duration = Duration::from_secs(1);
/// Lower clamp on the computed timeout.
pub const MIN_RTO: Duration = Duration::from_millis(100);
/// Upper clamp on the computed timeout and on backoff.
pub const MAX_RTO: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RtoEstimator {
    srtt: Duration,
    rttvar: Duration,
    rto: Duration,
    /// Whether any measurement has been folded in. Backoff can inflate
    /// `rto` before the first sample, so the bootstrap state needs its own
    /// flag rather than a sentinel value.
    sampled: bool,
}

impl Default for RtoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl RtoEstimator {
    pub fn new() -> Self {
        Self {
            srtt: Duration::ZERO,
            rttvar: Duration::ZERO,
            rto: INIT_RTO,
            sampled: false,
        }
    }

    /// Folds in one round-trip measurement from a segment that was
    /// transmitted exactly once.
    pub fn sample(&mut self, r: Duration) {
        if self.sampled {
            let deviation = if self.srtt > r {
                self.srtt - r
            } else {
                r - self.srtt
            };
            self.rttvar = self.rttvar * 3 / 4 + deviation / 4;
            self.srtt = self.srtt * 7 / 8 + r / 8;
        } else {
            self.srtt = r;
            self.rttvar = r / 2;
            self.sampled = true;
        }
        let margin = (self.rttvar * 4).max(Duration::from_nanos(1));
        self.rto = (self.srtt + margin).clamp(MIN_RTO, MAX_RTO);
    }

    /// Doubles the timeout after a retransmission round.
    pub fn backoff(&mut self) {
        self.rto = (self.rto * 2).min(MAX_RTO);
    }

    /// The current timeout.
    pub fn timeout(&self) -> Duration {
        self.rto
    }

    #[cfg(test)]
    pub fn has_sample(&self) -> bool {
        self.sampled
    }
}
