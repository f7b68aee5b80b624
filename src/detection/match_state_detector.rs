/// Match start and end detector
///
/// Watches for the start and end banners and drives the match phase on the
/// shared context. Also resets a match whose event log went idle.
use image::GrayImage;
use std::sync::Arc;

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::matching::MatchResult;
use crate::state::game_state::MATCH_SECONDS;
use crate::state::EventKind;
use crate::team::Team;
use crate::template::{Category, Template};

#[derive(Default)]
pub struct MatchStateDetector;

impl MatchStateDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for MatchStateDetector {
    fn signal(&self) -> Signal {
        Signal::MatchState
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome {
        ctx.reset_if_idle();

        let banners: Vec<Arc<Template>> = ctx
            .templates(Category::Game, Team::Game)
            .iter()
            .filter(|t| matches!(t.event, Some(EventKind::MatchStarting | EventKind::MatchEnding)))
            .cloned()
            .collect();
        if banners.is_empty() {
            return TickOutcome::Skipped;
        }

        let (result, m) = ctx
            .matcher
            .match_symbol(frame, &banners, ctx.acceptance(Team::Game));
        match result {
            MatchResult::Found => {}
            MatchResult::Invalid => return TickOutcome::Skipped,
            _ => return TickOutcome::Absent,
        }

        let active = ctx.state.is_match_active();
        match m.template.as_ref().and_then(|t| t.event) {
            Some(EventKind::MatchStarting) => {
                if active && ctx.state.seconds_left() == MATCH_SECONDS {
                    tracing::debug!("Start banner while the clock still reads 10:00");
                } else {
                    ctx.start_match();
                }
            }
            Some(EventKind::MatchEnding) if active => ctx.end_match(),
            _ => {}
        }
        TickOutcome::Seen
    }
}
