/// One signal loop
///
/// Owns a detector plus its back-off and latency bookkeeping. `step` is one
/// tick; `run` repeats it at the signal's cadence until the context stops.
use image::imageops;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::utils::{Backoff, LatencyStats, TickTiming};

/// Sleep granularity, bounds how long a stop or resume takes to be noticed.
const SLICE: Duration = Duration::from_millis(50);

/// Poll period while paused.
const PAUSE_POLL: Duration = Duration::from_millis(250);

/// Ticks between latency log lines.
const REPORT_EVERY: u64 = 100;

pub struct SignalRunner {
    detector: Box<dyn Detector>,
    backoff: Backoff,
    latency: LatencyStats,
    /// Last resume generation this loop reset for.
    resumes: u64,
    /// Last match generation this loop reset for.
    matches: u64,
    ticks: u64,
}

impl SignalRunner {
    pub fn new(detector: Box<dyn Detector>, ctx: &DetectionContext) -> Self {
        Self {
            detector,
            backoff: Backoff::new(ctx.config.backoff.multiplier, ctx.config.backoff.absent_ticks),
            latency: LatencyStats::default(),
            resumes: ctx.resume_generation(),
            matches: ctx.match_generation(),
            ticks: 0,
        }
    }

    pub fn signal(&self) -> Signal {
        self.detector.signal()
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.latency
    }

    pub fn is_backing_off(&self) -> bool {
        self.backoff.is_backing_off()
    }

    /// Sleep before the next tick.
    pub fn delay(&self, ctx: &DetectionContext) -> Duration {
        if ctx.is_paused() {
            return PAUSE_POLL;
        }
        self.backoff.delay(ctx.config.cadence(self.signal()))
    }

    /// Run a single tick.
    pub fn step(&mut self, ctx: &Arc<DetectionContext>) -> TickOutcome {
        if ctx.is_paused() {
            return TickOutcome::Skipped;
        }
        let resumes = ctx.resume_generation();
        if resumes != self.resumes {
            tracing::debug!("{} resumed, clearing debounce state", self.detector.name());
            self.detector.reset();
            self.backoff.reset();
            self.resumes = resumes;
        }
        let matches = ctx.match_generation();
        if matches != self.matches {
            tracing::debug!("{} match phase changed, clearing debounce state", self.detector.name());
            self.detector.reset();
            self.matches = matches;
        }
        if !self.detector.wants_frame(ctx) {
            return TickOutcome::Skipped;
        }

        let tick_start = Instant::now();
        let region = self.detector.region(ctx);
        let frame = match ctx.frames.capture_region(region) {
            Ok(frame) => imageops::grayscale(&frame),
            Err(e) => {
                tracing::warn!("{} capture failed: {}", self.detector.name(), e);
                return TickOutcome::Skipped;
            }
        };
        let capture_us = tick_start.elapsed().as_secs_f64() * 1_000_000.0;

        let match_start = Instant::now();
        let outcome = self.detector.tick(ctx, &frame);
        let timing = TickTiming {
            capture_us,
            match_us: match_start.elapsed().as_secs_f64() * 1_000_000.0,
            total_us: tick_start.elapsed().as_secs_f64() * 1_000_000.0,
        };
        self.latency.add(timing);

        match outcome {
            TickOutcome::Seen => self.backoff.record(true),
            TickOutcome::Absent => self.backoff.record(false),
            TickOutcome::Skipped => {}
        }

        self.ticks += 1;
        if self.ticks % REPORT_EVERY == 0 {
            let total = self.latency.total();
            tracing::debug!(
                "{} tick {}: {:.1}ms (p95 {:.1}ms){}",
                self.detector.name(),
                self.ticks,
                timing.total_ms(),
                total.p95 / 1000.0,
                if self.backoff.is_backing_off() { " backing off" } else { "" }
            );
        }
        outcome
    }

    /// Tick until the context stops running.
    pub fn run(mut self, ctx: Arc<DetectionContext>) {
        tracing::info!("{} loop started", self.detector.name());
        while ctx.is_running() {
            let started = Instant::now();
            self.step(&ctx);
            let delay = self.delay(&ctx).saturating_sub(started.elapsed());
            sleep_while_running(&ctx, delay);
        }
        self.latency.log_report(self.detector.name());
        tracing::info!("{} loop stopped", self.detector.name());
    }
}

fn sleep_while_running(ctx: &DetectionContext, duration: Duration) {
    let deadline = Instant::now() + duration;
    while ctx.is_running() {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        thread::sleep(left.min(SLICE));
    }
}
