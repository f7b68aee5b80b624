/// Objective capture detector
///
/// Objective banners name the objective and the side that secured it. Each
/// lane holds one objective at a time, so a lane accepts a single capture per
/// `LANE_COOLDOWN`.
use image::GrayImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::matching::MatchResult;
use crate::state::{EventKind, Lane, StateSink};
use crate::team::Team;
use crate::template::Category;
use crate::utils::Cooldown;

const LANE_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Default)]
pub struct ObjectiveDetector {
    lanes: HashMap<Lane, Cooldown>,
}

impl ObjectiveDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Detector for ObjectiveDetector {
    fn signal(&self) -> Signal {
        Signal::Objectives
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome {
        let templates = ctx.templates(Category::Secure, Team::Game);
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

        let Some(kind @ EventKind::ObjectiveSecured(objective, side)) =
            m.template.as_ref().and_then(|t| t.event)
        else {
            tracing::warn!("Objective template {} names no capture", m.template_name());
            return TickOutcome::Skipped;
        };

        let lane = objective.lane();
        let cooldown = self
            .lanes
            .entry(lane)
            .or_insert_with(|| Cooldown::new(LANE_COOLDOWN));
        if !cooldown.trigger_at(Instant::now()) {
            tracing::debug!("{:?} lane cooling down, ignoring {}", lane, kind);
            return TickOutcome::Seen;
        }

        let clock = ctx.clock();
        ctx.state.set_objective_secured(side, objective);
        ctx.log.add(kind, &clock, -1);
        ctx.notifier
            .status(format!("[{}] [{}] {} secured", clock, side, objective.name()));
        TickOutcome::Seen
    }

    fn reset(&mut self) {
        self.lanes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureRegion;
    use crate::config::Config;
    use crate::detection::context::testing::context_with;
    use crate::detection::runner::SignalRunner;
    use crate::matching::testing::{glyph, number_region};
    use crate::state::Objective;
    use crate::team::Side;
    use crate::template::{Template, TemplateLibrary};
    use image::{DynamicImage, RgbaImage};

    fn library() -> TemplateLibrary {
        let secure = |d: i32, objective: Objective, side: Side| {
            let name = format!("{}_{}", objective.name(), side);
            Template::new(name, Category::Secure, Team::Game, glyph(d))
                .with_event(EventKind::ObjectiveSecured(objective, side))
        };
        TemplateLibrary::from_templates([
            secure(1, Objective::Regieleki, Side::Purple),
            secure(2, Objective::Regice, Side::Orange),
            secure(3, Objective::Registeel, Side::Purple),
            secure(4, Objective::Rayquaza, Side::Orange),
        ])
    }

    fn context() -> Arc<DetectionContext> {
        context_with(Config::default(), library(), RgbaImage::new(1, 1))
    }

    #[test]
    fn test_capture_is_published() {
        let ctx = context();
        let mut detector = ObjectiveDetector::new();

        assert_eq!(detector.tick(&ctx, &number_region(60, 20, 0, &[4])), TickOutcome::Seen);
        let state = ctx.state.snapshot();
        assert_eq!(state.objectives, vec![(Objective::Rayquaza, Side::Orange)]);
        assert!(ctx
            .log
            .contains(EventKind::ObjectiveSecured(Objective::Rayquaza, Side::Orange)));
    }

    #[test]
    fn test_lane_accepts_one_capture() {
        let ctx = context();
        let mut detector = ObjectiveDetector::new();

        detector.tick(&ctx, &number_region(60, 20, 0, &[2]));
        detector.tick(&ctx, &number_region(60, 20, 0, &[3]));
        detector.tick(&ctx, &number_region(60, 20, 0, &[2]));
        assert_eq!(ctx.state.snapshot().objectives.len(), 1);

        detector.tick(&ctx, &number_region(60, 20, 0, &[1]));
        assert_eq!(ctx.state.snapshot().objectives.len(), 2);
    }

    #[test]
    fn test_reset_reopens_lanes() {
        let ctx = context();
        let mut detector = ObjectiveDetector::new();
        let regice = number_region(60, 20, 0, &[2]);

        detector.tick(&ctx, &regice);
        ctx.start_match();
        detector.reset();
        detector.tick(&ctx, &regice);
        assert_eq!(
            ctx.state.snapshot().objectives,
            vec![(Objective::Regice, Side::Orange)]
        );
    }

    #[test]
    fn test_new_match_reopens_lanes_in_loop() {
        let mut config = Config::default();
        config.regions.objectives = CaptureRegion::full(60, 20);
        let frame = DynamicImage::ImageLuma8(number_region(60, 20, 0, &[2])).to_rgba8();
        let ctx = context_with(config, library(), frame);
        let mut runner = SignalRunner::new(Box::new(ObjectiveDetector::new()), &ctx);

        runner.step(&ctx);
        ctx.start_match();
        runner.step(&ctx);
        assert_eq!(ctx.state.snapshot().objectives.len(), 1);
        assert_eq!(
            ctx.log
                .past(
                    EventKind::ObjectiveSecured(Objective::Regice, Side::Orange),
                    Duration::from_secs(5)
                )
                .len(),
            1
        );
    }

    #[test]
    fn test_nothing_on_screen_is_absent() {
        let ctx = context();
        let frame = number_region(60, 0, 0, &[]);
        assert_eq!(ObjectiveDetector::new().tick(&ctx, &frame), TickOutcome::Absent);
    }
}
