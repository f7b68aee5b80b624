/// Local player defeat detector
use image::GrayImage;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::matching::MatchResult;
use crate::state::{Defeat, EventKind, StateSink};
use crate::team::Team;
use crate::template::Category;
use crate::utils::Cooldown;

/// The defeat banner stays up this long; repeats inside it are the same defeat.
const REPEAT_WINDOW: Duration = Duration::from_secs(5);

pub struct DefeatDetector {
    cooldown: Cooldown,
}

impl DefeatDetector {
    pub fn new() -> Self {
        Self {
            cooldown: Cooldown::new(REPEAT_WINDOW),
        }
    }
}

impl Default for DefeatDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for DefeatDetector {
    fn signal(&self) -> Signal {
        Signal::Defeat
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome {
        let templates = ctx.templates(Category::Killed, Team::Game);
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

        let defeat = match m.template.as_ref().and_then(|t| t.event) {
            Some(EventKind::Defeated(defeat)) => defeat,
            _ => Defeat::Plain,
        };

        if !self.cooldown.trigger_at(Instant::now()) {
            return TickOutcome::Seen;
        }

        let clock = ctx.clock();
        let holding = ctx.holding();
        ctx.log
            .add(EventKind::Defeated(defeat), &clock, holding as i32);
        ctx.state.set_defeated();
        if holding > 0 {
            ctx.notifier.warn(format!(
                "[{}] [Self] Defeated with unscored points ({})",
                clock, holding
            ));
        } else {
            ctx.notifier.status(format!("[{}] [Self] Defeated", clock));
        }
        TickOutcome::Seen
    }

    fn reset(&mut self) {
        self.cooldown.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::detection::context::testing::context_with;
    use crate::matching::testing::{glyph, number_region};
    use crate::template::{Template, TemplateLibrary};
    use image::RgbaImage;

    fn context() -> Arc<DetectionContext> {
        let library = TemplateLibrary::from_templates([
            Template::new("defeated", Category::Killed, Team::Game, glyph(1))
                .with_event(EventKind::Defeated(Defeat::Plain)),
            Template::new("defeated_with_points", Category::Killed, Team::Game, glyph(2))
                .with_event(EventKind::Defeated(Defeat::WithPoints)),
        ]);
        context_with(Config::default(), library, RgbaImage::new(1, 1))
    }

    #[test]
    fn test_defeat_logs_held_energy() {
        let ctx = context();
        ctx.set_holding(9);

        let mut detector = DefeatDetector::new();
        assert_eq!(detector.tick(&ctx, &number_region(60, 30, 0, &[2])), TickOutcome::Seen);

        let event = ctx
            .log
            .occurred(EventKind::Defeated(Defeat::WithPoints), Duration::from_secs(5))
            .unwrap();
        assert_eq!(event.value, 9);
        assert_eq!(ctx.state.snapshot().defeated, 1);
    }

    #[test]
    fn test_repeats_are_ignored() {
        let ctx = context();
        let mut detector = DefeatDetector::new();
        let frame = number_region(60, 30, 0, &[1]);

        detector.tick(&ctx, &frame);
        detector.tick(&ctx, &frame);
        assert_eq!(ctx.state.snapshot().defeated, 1);
    }

    #[test]
    fn test_reset_ends_repeat_window() {
        let ctx = context();
        let mut detector = DefeatDetector::new();
        let frame = number_region(60, 30, 0, &[1]);

        detector.tick(&ctx, &frame);
        detector.reset();
        detector.tick(&ctx, &frame);
        assert_eq!(ctx.state.snapshot().defeated, 2);
    }
}
