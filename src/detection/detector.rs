/// Detector trait and common types
///
/// Every signal loop owns one `Detector`. The runner captures the detector's
/// region, converts it to grayscale and hands it to `tick`; the detector
/// matches, filters and publishes through the shared `DetectionContext`.
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::context::DetectionContext;
use crate::capture::CaptureRegion;
use crate::config::Regions;

/// One independently scheduled HUD signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Clock,
    Energy,
    PurpleScore,
    OrangeScore,
    FirstScore,
    Objectives,
    Defeat,
    MatchState,
    ScoreOption,
    KnockOuts,
}

impl Signal {
    pub const ALL: [Signal; 10] = [
        Signal::Clock,
        Signal::Energy,
        Signal::PurpleScore,
        Signal::OrangeScore,
        Signal::FirstScore,
        Signal::Objectives,
        Signal::Defeat,
        Signal::MatchState,
        Signal::ScoreOption,
        Signal::KnockOuts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Signal::Clock => "clock",
            Signal::Energy => "energy",
            Signal::PurpleScore => "purple_score",
            Signal::OrangeScore => "orange_score",
            Signal::FirstScore => "first_score",
            Signal::Objectives => "objectives",
            Signal::Defeat => "defeat",
            Signal::MatchState => "match_state",
            Signal::ScoreOption => "score_option",
            Signal::KnockOuts => "knock_outs",
        }
    }

    pub fn default_cadence_ms(self) -> u64 {
        match self {
            Signal::FirstScore => 250,
            Signal::ScoreOption => 500,
            Signal::KnockOuts => 1500,
            Signal::MatchState => 2000,
            Signal::Clock
            | Signal::Energy
            | Signal::PurpleScore
            | Signal::OrangeScore
            | Signal::Objectives
            | Signal::Defeat => 1000,
        }
    }

    /// Capture rectangle watched by this signal.
    pub fn region(self, regions: &Regions) -> CaptureRegion {
        match self {
            Signal::Clock => regions.time,
            Signal::Energy => regions.energy,
            Signal::PurpleScore | Signal::OrangeScore | Signal::FirstScore => regions.scores,
            Signal::Objectives => regions.objectives,
            Signal::Defeat => regions.defeated,
            Signal::MatchState => regions.state,
            Signal::ScoreOption => regions.score_option,
            Signal::KnockOuts => regions.kos,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a single tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Something on screen matched.
    Seen,
    /// Nothing matched; counts toward back-off.
    Absent,
    /// Tick did no matching (capture failure, size mismatch, nothing to do).
    Skipped,
}

/// Detector trait
///
/// Implementations keep their debounce state privately; `reset` must drop
/// all of it so the first tick after a resume behaves like a fresh start.
pub trait Detector: Send {
    fn signal(&self) -> Signal;

    /// Region to capture for this tick.
    fn region(&self, ctx: &DetectionContext) -> CaptureRegion {
        self.signal().region(&ctx.config.regions)
    }

    /// False to skip capturing and matching this tick.
    fn wants_frame(&self, _ctx: &DetectionContext) -> bool {
        true
    }

    fn tick(&mut self, ctx: &Arc<DetectionContext>, frame: &GrayImage) -> TickOutcome;

    fn reset(&mut self) {}

    /// Get detector name (for logging)
    fn name(&self) -> &'static str {
        self.signal().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_names_are_unique() {
        let mut names: Vec<_> = Signal::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Signal::ALL.len());
    }

    #[test]
    fn test_signal_serde_uses_names() {
        for signal in Signal::ALL {
            let json = serde_json::to_string(&signal).unwrap();
            assert_eq!(json, format!("\"{}\"", signal.name()));
        }
    }

    #[test]
    fn test_cadences_within_range() {
        for signal in Signal::ALL {
            let ms = signal.default_cadence_ms();
            assert!((250..=2000).contains(&ms), "{} {}", signal, ms);
        }
    }

    #[test]
    fn test_score_signals_share_region() {
        let regions = Regions::default();
        assert_eq!(Signal::PurpleScore.region(&regions), regions.scores);
        assert_eq!(Signal::FirstScore.region(&regions), regions.scores);
        assert_eq!(Signal::Clock.region(&regions), regions.time);
    }
}
