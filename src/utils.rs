use std::time::{Duration, Instant};

/// Rate limiter for repeated triggers of the same thing
pub struct Cooldown {
    last_trigger: Option<Instant>,
    duration: Duration,
}

impl Cooldown {
    pub fn new(duration: Duration) -> Self {
        Self {
            last_trigger: None,
            duration,
        }
    }

    /// Returns true and restarts the cooldown if it has expired at `now`.
    pub fn trigger_at(&mut self, now: Instant) -> bool {
        match self.last_trigger {
            Some(last) if now.saturating_duration_since(last) < self.duration => false,
            _ => {
                self.last_trigger = Some(now);
                true
            }
        }
    }

    pub fn should_trigger(&mut self) -> bool {
        self.trigger_at(Instant::now())
    }

    pub fn is_cooling(&self, now: Instant) -> bool {
        self.last_trigger
            .is_some_and(|last| now.saturating_duration_since(last) < self.duration)
    }

    pub fn reset(&mut self) {
        self.last_trigger = None;
    }
}

/// Sleep stretching for a signal that keeps finding nothing
///
/// After `absent_ticks` consecutive empty ticks the cadence is multiplied by
/// `multiplier` until something is seen again.
#[derive(Debug, Clone)]
pub struct Backoff {
    multiplier: f32,
    absent_ticks: u32,
    absent: u32,
}

impl Backoff {
    pub fn new(multiplier: f32, absent_ticks: u32) -> Self {
        Self {
            multiplier: multiplier.max(1.0),
            absent_ticks,
            absent: 0,
        }
    }

    pub fn record(&mut self, seen: bool) {
        if seen {
            self.absent = 0;
        } else {
            self.absent = self.absent.saturating_add(1);
        }
    }

    pub fn is_backing_off(&self) -> bool {
        self.absent_ticks > 0 && self.absent >= self.absent_ticks
    }

    pub fn delay(&self, cadence: Duration) -> Duration {
        if self.is_backing_off() {
            let nanos = cadence.as_nanos() as f64 * f64::from(self.multiplier);
            Duration::from_nanos(nanos.round() as u64)
        } else {
            cadence
        }
    }

    pub fn reset(&mut self) {
        self.absent = 0;
    }
}

/// Timing measurements for a single detection tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickTiming {
    pub capture_us: f64,
    pub match_us: f64,
    pub total_us: f64,
}

impl TickTiming {
    pub fn total_ms(&self) -> f64 {
        self.total_us / 1000.0
    }
}

/// Mean and percentiles of one stage, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageStats {
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Statistics collector for tick latency
///
/// Keeps the most recent `capacity` ticks.
pub struct LatencyStats {
    timings: Vec<TickTiming>,
    capacity: usize,
    next: usize,
}

impl LatencyStats {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timings: Vec::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            next: 0,
        }
    }

    pub fn add(&mut self, timing: TickTiming) {
        if self.timings.len() < self.capacity {
            self.timings.push(timing);
        } else {
            self.timings[self.next] = timing;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx]
    }

    fn stage(&self, extract: impl Fn(&TickTiming) -> f64) -> StageStats {
        if self.timings.is_empty() {
            return StageStats::default();
        }

        let mut values: Vec<f64> = self.timings.iter().map(&extract).collect();
        values.sort_by(|a, b| a.total_cmp(b));

        StageStats {
            mean: values.iter().sum::<f64>() / values.len() as f64,
            p50: Self::percentile(&values, 50.0),
            p95: Self::percentile(&values, 95.0),
            p99: Self::percentile(&values, 99.0),
        }
    }

    pub fn capture(&self) -> StageStats {
        self.stage(|t| t.capture_us)
    }

    pub fn matching(&self) -> StageStats {
        self.stage(|t| t.match_us)
    }

    pub fn total(&self) -> StageStats {
        self.stage(|t| t.total_us)
    }

    pub fn log_report(&self, signal: &str) {
        if self.timings.is_empty() {
            tracing::info!("{}: no timing data collected", signal);
            return;
        }

        for (stage, s) in [
            ("capture", self.capture()),
            ("match", self.matching()),
            ("total", self.total()),
        ] {
            tracing::info!(
                "{:<14} {:<8} mean {:>8.0} µs  p50 {:>8.0} µs  p95 {:>8.0} µs  p99 {:>8.0} µs",
                signal,
                stage,
                s.mean,
                s.p50,
                s.p95,
                s.p99
            );
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::with_capacity(512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown() {
        let mut cooldown = Cooldown::new(Duration::from_secs(2));
        let t0 = Instant::now();

        assert!(cooldown.trigger_at(t0));
        assert!(!cooldown.trigger_at(t0 + Duration::from_millis(500)));
        assert!(cooldown.is_cooling(t0 + Duration::from_millis(1999)));
        assert!(cooldown.trigger_at(t0 + Duration::from_secs(2)));

        cooldown.reset();
        assert!(cooldown.trigger_at(t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn test_backoff() {
        let cadence = Duration::from_millis(100);
        let mut backoff = Backoff::new(4.0, 3);

        for _ in 0..2 {
            backoff.record(false);
        }
        assert_eq!(backoff.delay(cadence), cadence);

        backoff.record(false);
        assert!(backoff.is_backing_off());
        assert_eq!(backoff.delay(cadence), Duration::from_millis(400));

        backoff.record(true);
        assert_eq!(backoff.delay(cadence), cadence);
    }

    #[test]
    fn test_backoff_fractional_multiplier_is_exact() {
        let mut backoff = Backoff::new(2.5, 1);
        backoff.record(false);
        assert_eq!(backoff.delay(Duration::from_millis(250)), Duration::from_micros(625_000));
        assert_eq!(backoff.delay(Duration::from_secs(2)), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_disabled() {
        let mut backoff = Backoff::new(4.0, 0);
        for _ in 0..100 {
            backoff.record(false);
        }
        assert!(!backoff.is_backing_off());
    }

    #[test]
    fn test_tick_timing_total_ms() {
        let timing = TickTiming {
            total_us: 50000.0,
            ..TickTiming::default()
        };
        assert_eq!(timing.total_ms(), 50.0);
    }

    #[test]
    fn test_latency_percentiles() {
        let mut stats = LatencyStats::with_capacity(200);
        assert!(stats.is_empty());

        for i in 1..=100 {
            stats.add(TickTiming {
                capture_us: i as f64,
                match_us: 0.0,
                total_us: i as f64 * 2.0,
            });
        }

        let capture = stats.capture();
        assert_eq!(capture.mean, 50.5);
        assert_eq!(capture.p50, 51.0);
        assert_eq!(capture.p95, 95.0);
        assert_eq!(capture.p99, 99.0);
        assert_eq!(stats.total().p99, 198.0);
    }

    #[test]
    fn test_latency_window() {
        let mut stats = LatencyStats::with_capacity(3);
        for i in 0..10 {
            stats.add(TickTiming {
                total_us: i as f64,
                ..TickTiming::default()
            });
        }
        assert_eq!(stats.len(), 3);
        assert_eq!(stats.total().mean, 8.0);
    }
}
