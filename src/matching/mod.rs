/// Template matching
///
/// `Matcher` scores captured regions against template sets. Single symbols
/// (banners, badges) pick the best template above acceptance; numbers are
/// rebuilt digit by digit (`digits` for scores and the clock, `energy` for
/// the held-energy counter).
pub mod correlation;
mod digits;
mod energy;

use image::GrayImage;
use std::fmt;
use std::sync::Arc;

use crate::stats::{SampleKind, StatsRecorder};
use crate::template::Template;

pub use correlation::{similarity, CorrelationSurface, Peak};
pub use digits::ClockReading;

/// Outcome of one matching attempt. Exactly one per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchResult {
    /// Nothing cleared the acceptance.
    NotFound,
    /// Something matched but did not form a usable value.
    Missed,
    /// A template does not fit the region (capture area mismatch).
    Invalid,
    Found,
    /// Same value as an already counted detection.
    Duplicate,
    /// Supersedes the previous counted detection.
    Override,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchResult::NotFound => "not found",
            MatchResult::Missed => "missed",
            MatchResult::Invalid => "invalid",
            MatchResult::Found => "found",
            MatchResult::Duplicate => "duplicate",
            MatchResult::Override => "override",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub x: u32,
    pub y: u32,
}

/// One recognised digit of a number.
#[derive(Debug, Clone, PartialEq)]
pub struct Digit {
    pub value: i32,
    pub location: Location,
    pub width: u32,
    pub height: u32,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct Match {
    pub template: Option<Arc<Template>>,
    pub location: Location,
    pub score: f32,
    /// Derived value; -1 when there is none.
    pub value: i32,
    pub digits: Vec<Digit>,
}

impl Default for Match {
    fn default() -> Self {
        Self {
            template: None,
            location: Location::default(),
            score: 0.0,
            value: -1,
            digits: Vec::new(),
        }
    }
}

impl Match {
    pub fn template_name(&self) -> &str {
        self.template.as_ref().map_or("", |t| t.name.as_str())
    }
}

/// Base-10 composition of digit values, most significant first.
pub fn compose(digits: &[Digit]) -> i32 {
    digits.iter().fold(0, |acc, d| acc * 10 + d.value)
}

/// Template matcher.
#[derive(Clone, Default)]
pub struct Matcher {
    stats: StatsRecorder,
}

/// Accepted peak of one template.
#[derive(Debug, Clone)]
struct Candidate {
    template: Arc<Template>,
    peak: Peak,
}

impl Matcher {
    pub fn new(stats: StatsRecorder) -> Self {
        Self { stats }
    }

    /// True when any template is wider or taller than the region.
    fn oversized(region: &GrayImage, templates: &[Arc<Template>]) -> Option<Arc<Template>> {
        templates
            .iter()
            .find(|t| t.width() > region.width() || t.height() > region.height())
            .cloned()
    }

    /// Peak of `template` over `region` if it clears the acceptance.
    fn accept(&self, region: &GrayImage, template: &Arc<Template>, acceptance: f32) -> Option<Candidate> {
        let surface = CorrelationSurface::compute(region, &template.image, template.mask.as_ref())?;
        let Some(peak) = surface.peak() else {
            tracing::warn!("Skipping non-finite correlation for template {}", template.name);
            return None;
        };

        self.stats
            .record(&template.name, peak.score, SampleKind::Observed);
        if peak.score < template.acceptance_or(acceptance) {
            return None;
        }
        self.stats
            .record(&template.name, peak.score, SampleKind::Accepted);

        Some(Candidate {
            template: Arc::clone(template),
            peak,
        })
    }

    /// Best single template above acceptance.
    pub fn match_symbol(
        &self,
        region: &GrayImage,
        templates: &[Arc<Template>],
        acceptance: f32,
    ) -> (MatchResult, Match) {
        if let Some(t) = Self::oversized(region, templates) {
            tracing::warn!(
                "Template {} ({}x{}) is larger than the {}x{} capture area",
                t.name,
                t.width(),
                t.height(),
                region.width(),
                region.height()
            );
            return (MatchResult::Invalid, Match::default());
        }

        let mut best: Option<Candidate> = None;
        for template in templates {
            if let Some(c) = self.accept(region, template, acceptance) {
                if best.as_ref().map_or(true, |b| c.peak.score > b.peak.score) {
                    best = Some(c);
                }
            }
        }

        match best {
            Some(c) => (
                MatchResult::Found,
                Match {
                    value: c.template.value,
                    location: Location {
                        x: c.peak.x,
                        y: c.peak.y,
                    },
                    score: c.peak.score,
                    template: Some(c.template),
                    digits: Vec::new(),
                },
            ),
            None => (MatchResult::NotFound, Match::default()),
        }
    }
}
