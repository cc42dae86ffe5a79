//! Scoped timing for pipeline stages.
//!
//! A [`StageTimer`] records when a stage began and, when dropped, logs the
//! elapsed time under the `outfit::telemetry` target. Timers only log when
//! telemetry has been switched on through [`configure`] and the logger accepts
//! the requested level, so leaving them in hot paths costs one atomic load.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicU8, Ordering},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, log, log_enabled};

/// Log target used for every timing line.
pub const TELEMETRY_TARGET: &str = "outfit::telemetry";

/// 0 means disabled, otherwise the maximum `Level` as `usize`.
static THRESHOLD: AtomicU8 = AtomicU8::new(0);

/// Logs how long a stage took when it goes out of scope.
pub struct StageTimer {
    stage: Cow<'static, str>,
    level: Level,
    started: Instant,
    armed: bool,
}

impl StageTimer {
    /// Returns `true` when the timer will log on drop.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Stop the timer without logging and return the elapsed time.
    pub fn stop(mut self) -> Duration {
        self.armed = false;
        self.started.elapsed()
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        if self.armed {
            log!(
                target: TELEMETRY_TARGET,
                self.level,
                "{} took {:.2?}",
                self.stage,
                self.started.elapsed()
            );
        }
    }
}

/// Start timing `stage`; the result is logged at `level` on drop.
pub fn stage_timer(stage: impl Into<Cow<'static, str>>, level: Level) -> StageTimer {
    let armed = telemetry_allows(level) && log_enabled!(target: TELEMETRY_TARGET, level);
    StageTimer {
        stage: stage.into(),
        level,
        started: Instant::now(),
        armed,
    }
}

/// Enable or disable telemetry and set its verbosity.
pub fn configure(enabled: bool, level: LevelFilter) {
    let value = if enabled {
        level.to_level().map_or(0, |lvl| lvl as u8)
    } else {
        0
    };
    THRESHOLD.store(value, Ordering::Relaxed);
}

/// Whether telemetry is currently switched on.
pub fn telemetry_enabled() -> bool {
    THRESHOLD.load(Ordering::Relaxed) != 0
}

/// Whether a timer at `level` would pass the telemetry threshold.
pub fn telemetry_allows(level: Level) -> bool {
    let threshold = THRESHOLD.load(Ordering::Relaxed);
    threshold != 0 && (level as u8) <= threshold
}
