//! Tick period enforcement and timing statistics

use std::thread;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Statistics for the control loop
///
/// Execution times use Welford's online algorithm for numerically stable
/// variance computation. Paused ticks are counted but not timed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    /// Number of timed ticks (actuated, skipped or failed)
    pub iterations: u64,
    /// Number of ticks that exceeded the period
    pub overruns: u64,
    /// Ticks skipped because a sensor had no fresh value
    pub skipped: u64,
    /// Ticks spent paused
    pub paused: u64,
    /// Ticks whose inference or write failed
    pub failed: u64,
    /// Total execution time
    pub total_execution_time: Duration,
    /// Maximum tick time
    pub max_execution_time: Duration,
    /// Minimum tick time
    pub min_execution_time: Duration,
    /// Last tick time
    pub last_execution_time: Duration,
    welford_mean: f64,
    welford_m2: f64,
}

impl TickStats {
    /// Record one timed tick, returning whether it overran `period`
    pub fn record(&mut self, execution_time: Duration, period: Duration) -> bool {
        self.iterations += 1;
        self.total_execution_time += execution_time;
        self.last_execution_time = execution_time;

        let secs = execution_time.as_secs_f64();
        if self.iterations == 1 {
            self.min_execution_time = execution_time;
            self.max_execution_time = execution_time;
            self.welford_mean = secs;
            self.welford_m2 = 0.0;
        } else {
            self.min_execution_time = self.min_execution_time.min(execution_time);
            self.max_execution_time = self.max_execution_time.max(execution_time);

            let delta = secs - self.welford_mean;
            self.welford_mean += delta / self.iterations as f64;
            let delta2 = secs - self.welford_mean;
            self.welford_m2 += delta * delta2;
        }

        let overrun = execution_time > period;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_paused(&mut self) {
        self.paused += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// Mean tick time
    pub fn mean_execution_time(&self) -> Duration {
        Duration::from_secs_f64(self.welford_mean.max(0.0))
    }

    /// Get the overrun ratio (0.0 to 1.0)
    pub fn overrun_ratio(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.overruns as f64 / self.iterations as f64
        }
    }

    /// Timing jitter as standard deviation in seconds, 0.0 before two ticks
    pub fn jitter_std_dev(&self) -> f64 {
        if self.iterations < 2 {
            0.0
        } else {
            (self.welford_m2 / (self.iterations - 1) as f64).sqrt()
        }
    }

    /// Emit a one-line summary at info level
    pub fn log_summary(&self) {
        tracing::info!(
            iterations = self.iterations,
            overruns = self.overruns,
            skipped = self.skipped,
            paused = self.paused,
            failed = self.failed,
            "Control loop stats: mean {:?}, min {:?}, max {:?}, jitter {:.3} ms, overrun ratio {:.3}",
            self.mean_execution_time(),
            self.min_execution_time,
            self.max_execution_time,
            self.jitter_std_dev() * 1e3,
            self.overrun_ratio()
        );
    }
}

/// What to do once a tick's work is done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickTiming {
    /// Within budget: sleep the remainder of the period
    Sleep(Duration),
    /// Over budget by this much: start the next tick immediately
    Overrun(Duration),
}

/// Period of a loop running at `rate_hz`
///
/// `what` names the rate in the error. Rates that are not positive, or so
/// small that the period does not fit a [`Duration`], are rejected.
pub fn period_from_rate(what: &str, rate_hz: f64) -> Result<Duration> {
    if rate_hz <= 0.0 || !rate_hz.is_finite() {
        return Err(Error::Config(format!("{} must be positive, got {}", what, rate_hz)));
    }
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .map_err(|e| Error::Config(format!("{} of {} Hz has no valid period: {}", what, rate_hz, e)))
}

/// Measures each tick against a fixed period
#[derive(Debug, Clone)]
pub struct TickTimer {
    period: Duration,
    tick_start: Option<Instant>,
    stats: TickStats,
}

impl TickTimer {
    /// Create a timer for `rate_hz` ticks per second
    pub fn new(rate_hz: f64) -> Result<Self> {
        Ok(Self::with_period(period_from_rate("control frequency", rate_hz)?))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            tick_start: None,
            stats: TickStats::default(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut TickStats {
        &mut self.stats
    }

    /// Mark the start of a tick
    pub fn begin(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// Mark the end of a tick and record its duration
    ///
    /// Overruns are logged at warn level.
    pub fn finish(&mut self) -> TickTiming {
        let execution_time = self
            .tick_start
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        self.finish_with(execution_time)
    }

    /// Record a tick of known duration
    pub fn finish_with(&mut self, execution_time: Duration) -> TickTiming {
        self.stats.record(execution_time, self.period);
        match self.period.checked_sub(execution_time) {
            Some(remaining) => TickTiming::Sleep(remaining),
            None => {
                let excess = execution_time - self.period;
                tracing::warn!("Policy control budget exceeded by {:?}", excess);
                TickTiming::Overrun(excess)
            }
        }
    }

    /// Sleep out the remainder of the period; returns immediately on overrun
    pub fn pace(&self, timing: TickTiming) {
        if let TickTiming::Sleep(remaining) = timing {
            if !remaining.is_zero() {
                thread::sleep(remaining);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stats_welford() {
        let mut stats = TickStats::default();
        let period = Duration::from_millis(20);
        for ms in [2, 4, 6] {
            stats.record(Duration::from_millis(ms), period);
        }
        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.overruns, 0);
        assert_eq!(stats.min_execution_time, Duration::from_millis(2));
        assert_eq!(stats.max_execution_time, Duration::from_millis(6));
        assert_relative_eq!(stats.mean_execution_time().as_secs_f64(), 0.004, epsilon = 1e-9);
        assert_relative_eq!(stats.jitter_std_dev(), 0.002, epsilon = 1e-9);
    }

    #[test]
    fn test_overrun_counted() {
        let mut stats = TickStats::default();
        let period = Duration::from_millis(20);
        assert!(!stats.record(Duration::from_millis(19), period));
        assert!(stats.record(Duration::from_millis(25), period));
        assert_relative_eq!(stats.overrun_ratio(), 0.5);
    }

    #[test]
    fn test_timer_sleeps_remainder() {
        let mut timer = TickTimer::new(50.0).unwrap();
        let timing = timer.finish_with(Duration::from_millis(5));
        assert_eq!(timing, TickTiming::Sleep(Duration::from_millis(15)));
    }

    #[test]
    fn test_timer_reports_overrun_without_sleeping() {
        let mut timer = TickTimer::new(100.0).unwrap();
        timer.begin();
        thread::sleep(Duration::from_millis(15));
        let timing = timer.finish();
        assert!(matches!(timing, TickTiming::Overrun(excess) if excess >= Duration::from_millis(5)));
        assert_eq!(timer.stats().overruns, 1);

        let start = Instant::now();
        timer.pace(timing);
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn test_timer_rejects_bad_rate() {
        assert!(TickTimer::new(0.0).is_err());
        assert!(TickTimer::new(f64::INFINITY).is_err());
        // Positive but with a period far beyond Duration::MAX
        assert!(matches!(TickTimer::new(1e-300), Err(Error::Config(_))));
        assert!(period_from_rate("rate", f64::MIN_POSITIVE).is_err());
        assert_eq!(
            period_from_rate("rate", 50.0).unwrap(),
            Duration::from_millis(20)
        );
    }
}
