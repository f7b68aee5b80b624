/// Detection module
///
/// One loop per HUD signal, all sharing a `DetectionContext`.
///
/// ## Architecture
///
/// ```text
/// DetectionOrchestrator
///   └── SignalRunner (one thread per signal)
///         ├── FrameSource::capture_region
///         ├── grayscale
///         └── Detector::tick
///               ├── Matcher
///               ├── DuplicateSuppressor
///               └── EventLog + GameStateAggregator + Notifier
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let ctx = Arc::new(DetectionContext::new(config, templates, frames, notifier, stats, bus));
/// let orchestrator = DetectionOrchestrator::new(ctx);
/// orchestrator.start()?;
/// // ...
/// orchestrator.stop()?;
/// ```

pub mod clock_detector;
pub mod context;
pub mod defeat_detector;
pub mod detector;
pub mod energy_detector;
pub mod knockout_detector;
pub mod match_state_detector;
pub mod objective_detector;
pub mod orchestrator;
pub mod runner;
pub mod score_detector;
pub mod score_option_detector;

// Re-export commonly used types
pub use clock_detector::ClockDetector;
pub use context::DetectionContext;
pub use defeat_detector::DefeatDetector;
pub use detector::{Detector, Signal, TickOutcome};
pub use energy_detector::{confirm_self_score, EnergyDetector, PendingScore};
pub use knockout_detector::KnockOutDetector;
pub use match_state_detector::MatchStateDetector;
pub use objective_detector::ObjectiveDetector;
pub use orchestrator::DetectionOrchestrator;
pub use runner::SignalRunner;
pub use score_detector::ScoreDetector;
pub use score_option_detector::ScoreOptionDetector;

use crate::team::Team;

/// Fresh detector for `signal`.
pub fn for_signal(signal: Signal) -> Box<dyn Detector> {
    match signal {
        Signal::Clock => Box::new(ClockDetector::new()),
        Signal::Energy => Box::new(EnergyDetector::new()),
        Signal::PurpleScore => Box::new(ScoreDetector::new(Team::Purple)),
        Signal::OrangeScore => Box::new(ScoreDetector::new(Team::Orange)),
        Signal::FirstScore => Box::new(ScoreDetector::new(Team::First)),
        Signal::Objectives => Box::new(ObjectiveDetector::new()),
        Signal::Defeat => Box::new(DefeatDetector::new()),
        Signal::MatchState => Box::new(MatchStateDetector::new()),
        Signal::ScoreOption => Box::new(ScoreOptionDetector::new()),
        Signal::KnockOuts => Box::new(KnockOutDetector::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_matches_signal() {
        for signal in Signal::ALL {
            assert_eq!(for_signal(signal).signal(), signal);
        }
    }
}
