/// Held-energy detector and self-score confirmation
///
/// A drop in held energy may be a self score, a defeat, or a misread. The
/// drop schedules a confirmation that runs after `confirm_delay` on its own
/// thread and commits the score only when the event log backs it up.
use image::GrayImage;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::matching::MatchResult;
use crate::state::game_state::is_final_stretch;
use crate::state::{Defeat, EventKind, StateSink};
use crate::team::Team;
use crate::template::Category;

/// Defeats this close before the drop explain it.
const DEFEAT_WINDOW: Duration = Duration::from_secs(2);

/// A score prompt must have been shown this close before the drop.
const PROMPT_WINDOW: Duration = Duration::from_secs(5);

/// A self score waiting for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingScore {
    pub points: u32,
    /// When the drop was committed.
    pub at: Instant,
    /// Clock at the drop, decides final-stretch doubling.
    pub seconds_left: u32,
}

/// Commit or reject a pending self score. Returns the points published.
///
/// Rejected when a defeat was logged between `DEFEAT_WINDOW` before the drop
/// and now, or when no unclaimed score prompt precedes the drop.
pub fn confirm_self_score(ctx: &DetectionContext, pending: PendingScore) -> Option<u32> {
    let now = Instant::now();
    let clock = ctx.clock();
    let defeat_window = now.saturating_duration_since(pending.at) + DEFEAT_WINDOW;

    let defeated = [Defeat::Plain, Defeat::WithPoints, Defeat::WithoutPoints]
        .into_iter()
        .any(|d| {
            ctx.log
                .occurred_before(EventKind::Defeated(d), defeat_window, now)
                .is_some()
        });
    if defeated {
        ctx.log
            .add(EventKind::ScoreMissed(Team::Player), &clock, pending.points as i32);
        ctx.notifier.warn(format!(
            "[{}] [Self] [Missed] +{} Defeated before scoring",
            clock, pending.points
        ));
        return None;
    }

    if ctx
        .log
        .verify(EventKind::PressButtonToScore, PROMPT_WINDOW, pending.at)
        .is_none()
    {
        ctx.log
            .add(EventKind::ScoreMissed(Team::Player), &clock, pending.points as i32);
        ctx.notifier.warn(format!(
            "[{}] [Self] [Missed] +{} Failed to find self-score option",
            clock, pending.points
        ));
        return None;
    }

    let mut points = pending.points;
    if is_final_stretch(pending.seconds_left) {
        points *= 2;
    }

    ctx.set_first_counted();
    ctx.state.set_score(Team::Player, points as i32);
    ctx.log.add(EventKind::PostScore, &clock, points as i32);
    ctx.notifier
        .status(format!("[{}] [Purple] [Self] +{}", clock, points));
    Some(points)
}

/// Held-energy detector
#[derive(Default)]
pub struct EnergyDetector {
    /// Last committed value.
    holding: u32,
    /// Changed value waiting for a second read.
    candidate: Option<u32>,
    /// Match generation `holding` belongs to.
    matches: u64,
    /// Confirmations run inline instead of on a thread.
    inline_confirm: bool,
}

impl EnergyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn inline() -> Self {
        Self {
            inline_confirm: true,
            ..Self::default()
        }
    }

    /// Consecutive reads needed before `value` is committed.
    fn reads_needed(&self, value: u32) -> u32 {
        if value == self.holding {
            1
        } else {
            2
        }
    }

    fn commit(&mut self, ctx: &Arc<DetectionContext>, value: u32) {
        let before = self.holding;
        self.holding = value;
        if before == value {
            return;
        }

        let clock = ctx.clock();
        ctx.set_holding(value);
        ctx.state.set_energy(value);
        ctx.log.add(EventKind::HoldingEnergy, &clock, value as i32);
        tracing::debug!("[{}] [Self] Holding {} points", clock, value);

        if before > 0 && value < before {
            self.schedule(
                ctx,
                PendingScore {
                    points: before - value,
                    at: Instant::now(),
                    seconds_left: ctx.state.seconds_left(),
                },
            );
        }
    }

    fn schedule(&self, ctx: &Arc<DetectionContext>, pending: PendingScore) {
        ctx.notifier.status(format!(
            "[{}] [Self] +{} Confirming points scored",
            ctx.clock(),
            pending.points
        ));

        if self.inline_confirm {
            confirm_self_score(ctx, pending);
            return;
        }

        let ctx = Arc::clone(ctx);
        let delay = ctx.config.confirm_delay();
        let spawned = thread::Builder::new()
            .name("confirm-score".to_string())
            .spawn(move || {
                thread::sleep(delay);
                confirm_self_score(&ctx, pending);
            });
        if let Err(e) = spawned {
            tracing::error!("Failed to start self-score confirmation: {}", e);
        }
    }
}

impl Detector for EnergyDetector {
    fn signal(&self) -> Signal {
        Signal::Energy
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome {
        let matches = ctx.match_generation();
        if matches != self.matches {
            // A match reset zeroed the shared holding; drop ours with it.
            self.holding = ctx.holding();
            self.candidate = None;
            self.matches = matches;
        }

        let templates = ctx.templates(Category::Points, Team::Energy);
        if templates.is_empty() {
            return TickOutcome::Skipped;
        }

        let (result, m) =
            ctx.matcher
                .match_energy(frame, &templates, ctx.acceptance(Team::Energy));
        match result {
            MatchResult::Found => {}
            MatchResult::Invalid => return TickOutcome::Skipped,
            _ => return TickOutcome::Absent,
        }

        let value = m.value.max(0) as u32;
        if self.reads_needed(value) == 1 {
            self.candidate = None;
            self.commit(ctx, value);
        } else if self.candidate == Some(value) {
            self.candidate = None;
            self.commit(ctx, value);
        } else {
            self.candidate = Some(value);
        }
        TickOutcome::Seen
    }

    fn reset(&mut self) {
        self.candidate = None;
    }
}
