//! Arena HUD - game state from screen captures
//!
//! Periodic captures of HUD regions are matched against reference templates
//! and turned into scores, clock, held energy, objective captures, knock-outs
//! and defeats. Each HUD signal runs its own loop; repeat reads are filtered
//! out before anything is logged or published.
//!
//! ```text
//! FrameSource -> Matcher -> DuplicateSuppressor -> EventLog + GameStateAggregator -> StateBus
//! ```
//!
//! The library never installs a tracing subscriber; the binary does.

pub mod capture;
pub mod config;
pub mod detection;
pub mod duplicate;
pub mod error;
pub mod history;
pub mod matching;
pub mod messaging;
pub mod notify;
pub mod state;
pub mod stats;
pub mod team;
pub mod template;
pub mod utils;

pub use capture::{CaptureRegion, FrameSource, ScreenCapture, StillFrame};
pub use config::Config;
pub use detection::{DetectionContext, DetectionOrchestrator, Signal};
pub use duplicate::{DuplicateRecord, DuplicateSuppressor, Verdict};
pub use error::{AppResult, CaptureError, ConfigError, DetectionError, TemplateError};
pub use history::{MatchHistory, MatchRecord, Outcome};
pub use matching::{Match, MatchResult, Matcher};
pub use messaging::{StateBus, StateUpdate};
pub use notify::{Feed, Level, Notifier};
pub use state::{Event, EventKind, EventLog, GameState, GameStateAggregator, StateSink};
pub use stats::{Stats, StatsRecorder};
pub use team::{Side, Team};
pub use template::{Category, Template, TemplateLibrary};
