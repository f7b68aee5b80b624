/// Knock-out banner detector
use image::GrayImage;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::duplicate::SIMILARITY_THRESHOLD;
use crate::matching::{similarity, MatchResult};
use crate::state::{EventKind, StateSink};
use crate::team::Team;
use crate::template::Category;

/// A banner this similar to the last one within the window is the same KO.
const REPEAT_WINDOW: Duration = Duration::from_secs(10);

#[derive(Default)]
pub struct KnockOutDetector {
    last: Option<(Instant, GrayImage)>,
}

impl KnockOutDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_repeat(&self, frame: &GrayImage, now: Instant) -> bool {
        match &self.last {
            Some((at, previous)) => {
                now.saturating_duration_since(*at) < REPEAT_WINDOW
                    && previous.dimensions() == frame.dimensions()
                    && similarity(previous, frame) > SIMILARITY_THRESHOLD
            }
            None => false,
        }
    }
}

impl Detector for KnockOutDetector {
    fn signal(&self) -> Signal {
        Signal::KnockOuts
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome {
        let templates = ctx.templates(Category::Ko, Team::Game);
        if templates.is_empty() {
            return TickOutcome::Skipped;
        }

        let (result, m) = ctx
            .matcher
            .match_symbol(frame, &templates, ctx.acceptance(Team::Game));
        match result {
            MatchResult::Found => {}
            MatchResult::Invalid => return TickOutcome::Skipped,
            _ => return TickOutcome::Absent,
        }

        let (kind, side, streak) = match m.template.as_ref().and_then(|t| t.event) {
            Some(kind @ EventKind::KnockOut(side)) => (kind, side, false),
            Some(kind @ EventKind::KnockOutStreak(side)) => (kind, side, true),
            _ => {
                tracing::warn!("KO template {} names no side", m.template_name());
                return TickOutcome::Skipped;
            }
        };

        let now = Instant::now();
        if self.is_repeat(frame, now) {
            tracing::debug!("Same {} banner as before, skipping", kind);
            return TickOutcome::Seen;
        }
        self.last = Some((now, frame.clone()));

        let clock = ctx.clock();
        ctx.state.set_knockout(side, streak);
        ctx.log.add(kind, &clock, -1);
        ctx.notifier.status(format!("[{}] [{}] {}", clock, side, kind));
        TickOutcome::Seen
    }

    fn reset(&mut self) {
        self.last = None;
    }
}
