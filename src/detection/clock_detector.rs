/// Match clock detector
///
/// Reads the `MM:SS` time remaining and publishes it whenever the displayed
/// value changes.
use image::GrayImage;
use std::sync::Arc;

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::matching::{ClockReading, MatchResult};
use crate::state::{EventKind, StateSink};
use crate::team::Team;
use crate::template::Category;

#[derive(Default)]
pub struct ClockDetector {
    last: Option<ClockReading>,
}

impl ClockDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Detector for ClockDetector {
    fn signal(&self) -> Signal {
        Signal::Clock
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome {
        let templates = ctx.templates(Category::Points, Team::Time);
        if templates.is_empty() {
            return TickOutcome::Skipped;
        }

        let (result, reading, _) =
            ctx.matcher
                .match_clock(frame, &templates, ctx.acceptance(Team::Time));
        match (result, reading) {
            (MatchResult::Found, Some(reading)) => {
                if self.last != Some(reading) {
                    ctx.state.set_time(reading.minutes, reading.seconds);
                    ctx.log.add(
                        EventKind::TimeTick,
                        &reading.to_string(),
                        reading.total_seconds() as i32,
                    );
                    self.last = Some(reading);
                }
                TickOutcome::Seen
            }
            (MatchResult::Invalid, _) => TickOutcome::Skipped,
            _ => TickOutcome::Absent,
        }
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::detection::context::testing::context_with;
    use crate::matching::testing::{digit_templates, number_region};
    use crate::template::{Template, TemplateLibrary};
    use image::RgbaImage;

    fn context() -> Arc<DetectionContext> {
        let library = TemplateLibrary::from_templates(
            digit_templates(Team::Time).iter().map(|t| Template::clone(t)),
        );
        context_with(Config::default(), library, RgbaImage::new(1, 1))
    }

    #[test]
    fn test_clock_publishes_changes_only() {
        let ctx = context();
        let mut detector = ClockDetector::new();

        let frame = number_region(90, 4, 1, &[0, 5, 3, 0]);
        assert_eq!(detector.tick(&ctx, &frame), TickOutcome::Seen);
        assert_eq!(ctx.state.seconds_left(), 5 * 60 + 30);
        assert_eq!(ctx.log.past(EventKind::TimeTick, std::time::Duration::from_secs(5)).len(), 1);

        assert_eq!(detector.tick(&ctx, &frame), TickOutcome::Seen);
        assert_eq!(ctx.log.past(EventKind::TimeTick, std::time::Duration::from_secs(5)).len(), 1);

        let frame = number_region(90, 4, 1, &[0, 5, 2, 9]);
        detector.tick(&ctx, &frame);
        assert_eq!(ctx.clock(), "05:29");
    }

    #[test]
    fn test_blank_clock_is_absent() {
        let ctx = context();
        let frame = number_region(90, 0, 0, &[]);
        assert_eq!(ClockDetector::new().tick(&ctx, &frame), TickOutcome::Absent);
    }

    #[test]
    fn test_impossible_time_is_skipped() {
        let ctx = context();
        let frame = number_region(90, 4, 1, &[1, 2, 0, 0]);
        assert_eq!(ClockDetector::new().tick(&ctx, &frame), TickOutcome::Skipped);
        assert_eq!(ctx.state.seconds_left(), 0);
    }
}
