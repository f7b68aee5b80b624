//! Inset scan: numbers read left to right, one digit per round.
//!
//! Each round searches the part of the region right of the previous digit.
//! The leftmost accepted digit wins the round; digits whose x positions are
//! within `NEAR_TIE_PX` of it compete on score. The next round starts at the
//! chosen digit's right edge minus `OVERLAP_PX`.
//!
//! Known limitation: when the leading zero is excluded, a legitimate "08"
//! reads as 8.
use image::{imageops, GrayImage};
use std::sync::Arc;

use super::{compose, Candidate, Digit, Location, Match, MatchResult, Matcher};
use crate::template::Template;

const NEAR_TIE_PX: u32 = 5;
const OVERLAP_PX: u32 = 5;
const SCORE_ROUNDS: usize = 3;
const CLOCK_ROUNDS: usize = 4;

/// Match clock, time remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub minutes: u32,
    pub seconds: u32,
}

impl ClockReading {
    pub fn total_seconds(&self) -> u32 {
        self.minutes * 60 + self.seconds
    }

    pub fn from_seconds(total: u32) -> Self {
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }

    /// A HUD clock never shows more than 10:00.
    pub fn is_valid(&self) -> bool {
        self.seconds < 60 && (self.minutes < 10 || (self.minutes == 10 && self.seconds == 0))
    }
}

impl std::fmt::Display for ClockReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// How the first round treats its search area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirstRound {
    /// Left half only, no zero digit.
    LeftHalfNoZero,
    /// Whole region, every digit.
    Anywhere,
}

/// Leftmost candidate, near-ties broken by score.
fn pick_leftmost(mut candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.sort_by_key(|c| c.peak.x);
    let leftmost = candidates.first()?.peak.x;
    candidates
        .into_iter()
        .take_while(|c| c.peak.x - leftmost < NEAR_TIE_PX)
        .fold(None, |best: Option<Candidate>, c| match best {
            Some(b) if b.peak.score >= c.peak.score => Some(b),
            _ => Some(c),
        })
}

impl Matcher {
    /// Digits found by an inset scan, or the first template that does not fit.
    fn inset_scan(
        &self,
        region: &GrayImage,
        templates: &[Arc<Template>],
        acceptance: f32,
        rounds: usize,
        first: FirstRound,
    ) -> Result<Vec<Digit>, Arc<Template>> {
        if let Some(t) = Self::oversized(region, templates) {
            return Err(t);
        }

        let widest = templates.iter().map(|t| t.width()).max().unwrap_or(0);
        let (width, height) = region.dimensions();
        let mut origin = 0u32;
        let mut digits = Vec::with_capacity(rounds);

        for round in 0..rounds {
            if origin >= width {
                break;
            }

            let restrict = round == 0 && first == FirstRound::LeftHalfNoZero;
            let end = if restrict {
                (width / 2 + widest).min(width)
            } else {
                width
            };
            let area = imageops::crop_imm(region, origin, 0, end - origin, height).to_image();

            let candidates: Vec<Candidate> = templates
                .iter()
                .filter(|t| !(restrict && t.value == 0))
                .filter(|t| t.width() <= area.width() && t.height() <= area.height())
                .filter_map(|t| self.accept(&area, t, acceptance))
                .map(|mut c| {
                    c.peak.x += origin;
                    c
                })
                .collect();

            let Some(best) = pick_leftmost(candidates) else {
                break;
            };

            let w = best.template.width();
            digits.push(Digit {
                value: best.template.value,
                location: Location {
                    x: best.peak.x,
                    y: best.peak.y,
                },
                width: w,
                height: best.template.height(),
                score: best.peak.score,
            });
            origin = (best.peak.x + w.saturating_sub(OVERLAP_PX)).max(origin + 1);
        }

        Ok(digits)
    }

    fn number_match(digits: Vec<Digit>, value: i32) -> Match {
        let (location, score) = digits
            .first()
            .map(|d| (d.location, d.score))
            .unwrap_or_default();
        Match {
            template: None,
            location,
            score,
            value,
            digits,
        }
    }

    /// Read a score of up to three digits.
    ///
    /// Values outside [1, 100] are `Missed`, never `Found`.
    pub fn match_score(
        &self,
        region: &GrayImage,
        templates: &[Arc<Template>],
        acceptance: f32,
    ) -> (MatchResult, Match) {
        let digits = match self.inset_scan(
            region,
            templates,
            acceptance,
            SCORE_ROUNDS,
            FirstRound::LeftHalfNoZero,
        ) {
            Ok(digits) => digits,
            Err(t) => {
                tracing::warn!(
                    "Digit template {} does not fit the {}x{} score area",
                    t.name,
                    region.width(),
                    region.height()
                );
                return (MatchResult::Invalid, Match::default());
            }
        };

        if digits.is_empty() {
            return (MatchResult::NotFound, Match::default());
        }

        let value = compose(&digits);
        let result = if (1..=100).contains(&value) {
            MatchResult::Found
        } else {
            MatchResult::Missed
        };
        (result, Self::number_match(digits, value))
    }

    /// Read the `MM:SS` clock; `Match::value` is the total seconds left.
    pub fn match_clock(
        &self,
        region: &GrayImage,
        templates: &[Arc<Template>],
        acceptance: f32,
    ) -> (MatchResult, Option<ClockReading>, Match) {
        let digits = match self.inset_scan(
            region,
            templates,
            acceptance,
            CLOCK_ROUNDS,
            FirstRound::Anywhere,
        ) {
            Ok(digits) => digits,
            Err(t) => {
                tracing::warn!("Time template {} is outside the configured selection area", t.name);
                return (MatchResult::Invalid, None, Match::default());
            }
        };

        match digits.len() {
            0 => return (MatchResult::NotFound, None, Match::default()),
            n if n < CLOCK_ROUNDS => {
                let value = compose(&digits);
                return (MatchResult::Missed, None, Self::number_match(digits, value));
            }
            _ => {}
        }

        let reading = ClockReading {
            minutes: (digits[0].value * 10 + digits[1].value) as u32,
            seconds: (digits[2].value * 10 + digits[3].value) as u32,
        };
        let m = Self::number_match(digits, reading.total_seconds() as i32);
        if !reading.is_valid() {
            tracing::warn!("Invalid time detected {}", reading);
            return (MatchResult::Invalid, None, m);
        }
        (MatchResult::Found, Some(reading), m)
    }
}
