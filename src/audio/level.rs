use std::time::Duration;

/// A single normalized audio energy reading in `[0.0, 1.0]`.
///
/// Timestamped implicitly by arrival order; consumed by the endpointer and
/// the status snapshot, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSample(pub f32);

/// Power of a sample buffer in dBFS, from its mean square.
///
/// Silence is floored well below any usable threshold instead of producing
/// `-inf`.
#[must_use]
pub fn power_dbfs(mean_square: f32) -> f32 {
    10.0 * mean_square.max(1e-10).log10()
}

/// Mean square of a capture buffer, the quantity the stream callback
/// publishes for the sampling loop.
#[must_use]
pub fn mean_square(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = samples.len() as f32;
    samples.iter().map(|&s| s * s).sum::<f32>() / len
}

/// Maps dBFS power onto the `[0.0, 1.0]` meter range.
///
/// This scale exists for presentation; the endpointer compares raw dBFS
/// against its own threshold and must not share these bounds.
#[derive(Debug, Clone, Copy)]
pub struct LevelScale {
    floor_db: f32,
    ceiling_db: f32,
}

impl Default for LevelScale {
    fn default() -> Self {
        Self {
            floor_db: -60.0,
            ceiling_db: -10.0,
        }
    }
}

impl LevelScale {
    /// Creates a scale with explicit dBFS bounds.
    #[must_use]
    pub const fn new(floor_db: f32, ceiling_db: f32) -> Self {
        Self { floor_db, ceiling_db }
    }

    /// Normalizes a dBFS power reading, clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn normalize(&self, power_db: f32) -> LevelSample {
        let span = self.ceiling_db - self.floor_db;
        let value = if span <= 0.0 {
            0.0
        } else {
            ((power_db - self.floor_db) / span).clamp(0.0, 1.0)
        };
        LevelSample(value)
    }
}

/// Live trailing-silence detector.
///
/// Tracks consecutive silence across the fixed-cadence level readings taken
/// during capture and reports the auto-stop decision exactly once per
/// recording. Distinct from the offline trimmer: this trades precision for
/// low latency, deciding *when the speaker has finished* from coarse power
/// readings.
#[derive(Debug)]
pub struct Endpointer {
    silence_threshold_db: f32,
    trailing_silence: Duration,
    interval: Duration,
    tally: Duration,
    fired: bool,
}

impl Endpointer {
    /// Creates an endpointer for one recording.
    #[must_use]
    pub const fn new(
        silence_threshold_db: f32,
        trailing_silence: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            silence_threshold_db,
            trailing_silence,
            interval,
            tally: Duration::ZERO,
            fired: false,
        }
    }

    /// Feeds one pre-normalization power reading.
    ///
    /// Returns `true` the single time the consecutive-silence tally first
    /// exceeds the trailing-silence duration; `false` forever after.
    pub fn observe(&mut self, power_db: f32) -> bool {
        if self.fired {
            return false;
        }

        if power_db < self.silence_threshold_db {
            self.tally += self.interval;
        } else {
            self.tally = Duration::ZERO;
        }

        if self.tally > self.trailing_silence {
            self.fired = true;
            return true;
        }
        false
    }

    /// Whether the auto-stop has already been reported.
    #[must_use]
    pub const fn fired(&self) -> bool {
        self.fired
    }
}
