/// Event history and aggregate game state
///
/// The event log and the aggregator are the only state shared between
/// detection loops.

pub mod event_log;
pub mod events;
pub mod game_state;
pub mod process_state;

// Re-export commonly used types
pub use event_log::EventLog;
pub use events::{Defeat, Event, EventKind, Lane, Objective};
pub use game_state::{GameState, GameStateAggregator, StateSink};
pub use process_state::{ProcessState, ProcessStateMachine, TransitionError};
