/// Team score detector
///
/// Finds a team's "scored" badge, crops the popup around it and reads the
/// points. The first-score loop does the same with the first-score badge and
/// goes quiet once the first score of the match is counted.
use image::GrayImage;
use std::sync::Arc;

use super::context::DetectionContext;
use super::detector::{Detector, Signal, TickOutcome};
use crate::capture::crop_gray;
use crate::duplicate::DuplicateRecord;
use crate::matching::{Match, MatchResult};
use crate::state::{EventKind, StateSink};
use crate::team::{Side, Team};
use crate::template::Category;

pub struct ScoreDetector {
    team: Team,
}

impl ScoreDetector {
    /// Detector for `Team::Purple`, `Team::Orange` or `Team::First`.
    pub fn new(team: Team) -> Self {
        debug_assert!(matches!(team, Team::Purple | Team::Orange | Team::First));
        Self { team }
    }

    pub fn team(&self) -> Team {
        self.team
    }

    /// Side a first-score badge belongs to.
    fn first_side(badge: &Match, frame_width: u32) -> Side {
        if let Some(side) = badge.template.as_ref().and_then(|t| t.alias) {
            return side;
        }
        if badge.location.x > frame_width / 2 {
            Side::Orange
        } else {
            Side::Purple
        }
    }

    fn label(&self, ctx: &DetectionContext) -> String {
        match self.team {
            Team::First => match ctx.state.snapshot().first {
                Some(side) => format!("{}] [First", side),
                None => "First".to_string(),
            },
            team => team.to_string(),
        }
    }

    fn publish(&self, ctx: &DetectionContext, points: i32, replaces: i32) {
        let clock = ctx.clock();
        let label = self.label(ctx);

        if replaces > 0 {
            ctx.log
                .add(EventKind::ScoreOverride(self.team), &clock, replaces);
            ctx.state.set_score(self.team, -replaces);
            ctx.notifier.warn(format!(
                "[{}] [{}] [Override] -{} replaced by +{}",
                clock, label, replaces, points
            ));
        }

        ctx.state.set_score(self.team, points);
        ctx.log.add(EventKind::Scored(self.team), &clock, points);
        ctx.set_first_counted();
        ctx.notifier
            .status(format!("[{}] [{}] +{}", clock, label, points));
    }
}

impl Detector for ScoreDetector {
    fn signal(&self) -> Signal {
        match self.team {
            Team::Orange => Signal::OrangeScore,
            Team::First => Signal::FirstScore,
            _ => Signal::PurpleScore,
        }
    }

    fn wants_frame(&self, ctx: &DetectionContext) -> bool {
        self.team != Team::First || !ctx.first_counted()
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome {
        let badges = ctx.templates(Category::Scored, self.team);
        let digits = ctx.templates(Category::Points, self.team);
        if badges.is_empty() || digits.is_empty() {
            return TickOutcome::Skipped;
        }

        let acceptance = ctx.acceptance(self.team);
        let (result, badge) = ctx.matcher.match_symbol(frame, &badges, acceptance);
        match result {
            MatchResult::Found => {}
            MatchResult::Invalid => return TickOutcome::Skipped,
            _ => return TickOutcome::Absent,
        }

        if self.team == Team::First {
            ctx.state
                .set_first_side(Self::first_side(&badge, frame.width()));
        }

        let area = self
            .team
            .crop_region(badge.location.x as i32, badge.location.y as i32);
        let Some(popup) = crop_gray(frame, area) else {
            tracing::warn!("{} score popup {:?} lies outside the capture", self.team, area);
            return TickOutcome::Skipped;
        };

        let (result, points) = ctx.matcher.match_score(&popup, &digits, acceptance);
        let clock = ctx.clock();
        match result {
            MatchResult::Found => {}
            MatchResult::Invalid => return TickOutcome::Skipped,
            _ => {
                ctx.log
                    .add(EventKind::ScoreMissed(self.team), &clock, points.value);
                ctx.notifier.warn(format!(
                    "[{}] [{}] [Missed] Badge {} without readable points ({})",
                    clock,
                    self.label(ctx),
                    badge.template_name(),
                    result
                ));
                return TickOutcome::Seen;
            }
        }

        let comparable = crop_gray(&popup, self.team.comparable_region())
            .unwrap_or_else(|| GrayImage::new(0, 0));
        let verdict = ctx
            .duplicates
            .evaluate(self.team, DuplicateRecord::new(points.value, comparable));

        match verdict.result {
            MatchResult::Found | MatchResult::Override => {
                self.publish(ctx, points.value, verdict.replaces);
            }
            _ => {
                tracing::debug!(
                    "[{}] [{}] +{} suppressed ({})",
                    clock,
                    self.team,
                    points.value,
                    verdict.reason
                );
            }
        }
        TickOutcome::Seen
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Synthetic score popups.
    use crate::matching::testing::{digit_templates, glyph, BACKGROUND};
    use crate::team::{Side, Team};
    use crate::template::{Category, Template};
    use image::{GrayImage, Luma};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    pub const FRAME_W: u32 = 400;
    pub const FRAME_H: u32 = 140;
    pub const BADGE_W: u32 = 12;
    pub const BADGE_H: u32 = 12;

    pub fn badge_image() -> GrayImage {
        let mut rng = StdRng::seed_from_u64(77);
        GrayImage::from_fn(BADGE_W, BADGE_H, |_, _| Luma([rng.gen_range(60..=255)]))
    }

    /// Badge plus digit templates for `team`.
    pub fn score_templates(team: Team, alias: Option<Side>) -> Vec<Template> {
        let mut badge = Template::new("scored", Category::Scored, team, badge_image());
        if let Some(side) = alias {
            badge = badge.with_alias(side);
        }
        let mut templates: Vec<Template> = digit_templates(team)
            .iter()
            .map(|t| Template::clone(t))
            .collect();
        templates.push(badge);
        templates
    }

    /// Frame with a badge at `(bx, by)` and `digits` drawn from `bx + dx`.
    pub fn score_frame(bx: u32, by: u32, dx: i64, digits: &[i32]) -> GrayImage {
        let mut frame = GrayImage::from_pixel(FRAME_W, FRAME_H, Luma([BACKGROUND]));
        image::imageops::replace(&mut frame, &badge_image(), bx as i64, by as i64);
        let mut x = bx as i64 + dx;
        for &d in digits {
            image::imageops::replace(&mut frame, &glyph(d), x, by as i64 + 2);
            x += 11;
        }
        frame
    }
}
