/// "Press button to score" prompt detector
///
/// The prompt shows while the player stands in a goal holding energy. Its
/// events are what the self-score confirmation looks for.
use image::GrayImage;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::matching::MatchResult;
use crate::state::EventKind;
use crate::team::Team;
use crate::template::{Category, Template};
use crate::utils::Cooldown;

const PROMPT_ACCEPTANCE: f32 = 0.85;
const PROMPT_COOLDOWN: Duration = Duration::from_secs(2);

pub struct ScoreOptionDetector {
    cooldown: Cooldown,
}

impl ScoreOptionDetector {
    pub fn new() -> Self {
        Self {
            cooldown: Cooldown::new(PROMPT_COOLDOWN),
        }
    }
}

impl Default for ScoreOptionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for ScoreOptionDetector {
    fn signal(&self) -> Signal {
        Signal::ScoreOption
    }

    fn wants_frame(&self, ctx: &DetectionContext) -> bool {
        ctx.holding() > 0
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome {
        let prompts: Vec<Arc<Template>> = ctx
            .templates(Category::Scoring, Team::Game)
            .iter()
            .filter(|t| t.event == Some(EventKind::PressButtonToScore))
            .cloned()
            .collect();
        if prompts.is_empty() {
            return TickOutcome::Skipped;
        }

        let (result, _) = ctx.matcher.match_symbol(frame, &prompts, PROMPT_ACCEPTANCE);
        match result {
            MatchResult::Found => {}
            MatchResult::Invalid => return TickOutcome::Skipped,
            _ => return TickOutcome::Absent,
        }

        if self.cooldown.trigger_at(Instant::now()) {
            let clock = ctx.clock();
            let holding = ctx.holding();
            ctx.log
                .add(EventKind::PressButtonToScore, &clock, holding as i32);
            ctx.notifier
                .status(format!("[{}] [Self] Score option present ({})", clock, holding));
        }
        TickOutcome::Seen
    }

    fn reset(&mut self) {
        self.cooldown.reset();
    }
}
