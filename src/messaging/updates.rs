/// Updates broadcast to external state sinks
///
/// Each update describes a change already applied to the aggregate game
/// state and carries the totals after the change, so subscribers never need
/// to read the aggregator themselves.
use crate::state::events::Objective;
use crate::team::{Side, Team};

#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// Points added to (or retracted from, when negative) a team.
    Score {
        team: Team,
        delta: i32,
        purple: i32,
        orange: i32,
        player: i32,
    },

    /// Match clock as displayed (time remaining).
    Time { minutes: u32, seconds: u32 },

    Energy(u32),

    ObjectiveSecured { objective: Objective, side: Side },

    KnockOut { side: Side, streak: bool },

    Defeated { total: u32 },

    MatchStarted,

    /// Aggregate state reset to its defaults.
    Cleared,
}

impl StateUpdate {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            StateUpdate::Score { .. } => "score",
            StateUpdate::Time { .. } => "time",
            StateUpdate::Energy(_) => "energy",
            StateUpdate::ObjectiveSecured { .. } => "objective",
            StateUpdate::KnockOut { .. } => "ko",
            StateUpdate::Defeated { .. } => "defeated",
            StateUpdate::MatchStarted => "match-started",
            StateUpdate::Cleared => "cleared",
        }
    }
}
