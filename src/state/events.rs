/// Event kinds recorded in the event log
///
/// Every kind carries the team or side it belongs to in its payload, so the
/// team of an event is derived by exhaustive matching instead of a lookup.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use crate::team::{Side, Team};

/// Legendary objectives that can be secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Regieleki,
    Regice,
    Regirock,
    Registeel,
    Rayquaza,
}

/// Map lane an objective spawns in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Top,
    Bottom,
    Middle,
}

impl Objective {
    pub const ALL: [Objective; 5] = [
        Objective::Regieleki,
        Objective::Regice,
        Objective::Regirock,
        Objective::Registeel,
        Objective::Rayquaza,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Objective::Regieleki => "regieleki",
            Objective::Regice => "regice",
            Objective::Regirock => "regirock",
            Objective::Registeel => "registeel",
            Objective::Rayquaza => "rayquaza",
        }
    }

    pub fn from_name(name: &str) -> Option<Objective> {
        Objective::ALL.into_iter().find(|o| o.name() == name)
    }

    pub fn lane(self) -> Lane {
        match self {
            Objective::Regieleki => Lane::Top,
            Objective::Regice | Objective::Regirock | Objective::Registeel => Lane::Bottom,
            Objective::Rayquaza => Lane::Middle,
        }
    }
}

/// How the local player was defeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Defeat {
    Plain,
    WithPoints,
    WithoutPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Sentinel left behind by a clear.
    Nothing,
    PreScore,
    PostScore,
    PressButtonToScore,
    HoldingEnergy,
    Scored(Team),
    ScoreMissed(Team),
    ScoreOverride(Team),
    TimeTick,
    Defeated(Defeat),
    MatchStarting,
    MatchEnding,
    ObjectiveSecured(Objective, Side),
    KnockOut(Side),
    KnockOutStreak(Side),
    DetectionStarted,
    DetectionStopped,
}

impl EventKind {
    /// Team the event is attributed to, if any.
    pub fn team(&self) -> Option<Team> {
        match self {
            EventKind::Scored(team) | EventKind::ScoreMissed(team) | EventKind::ScoreOverride(team) => {
                Some(*team)
            }
            EventKind::ObjectiveSecured(_, side)
            | EventKind::KnockOut(side)
            | EventKind::KnockOutStreak(side) => Some(side.team()),
            EventKind::PreScore
            | EventKind::PostScore
            | EventKind::PressButtonToScore
            | EventKind::HoldingEnergy
            | EventKind::Defeated(_) => Some(Team::Player),
            EventKind::TimeTick => Some(Team::Time),
            EventKind::MatchStarting | EventKind::MatchEnding => Some(Team::Game),
            EventKind::Nothing | EventKind::DetectionStarted | EventKind::DetectionStopped => None,
        }
    }

    pub fn is_defeat(&self) -> bool {
        matches!(self, EventKind::Defeated(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Nothing => write!(f, "Nothing"),
            EventKind::PreScore => write!(f, "Pre Score"),
            EventKind::PostScore => write!(f, "Post Score"),
            EventKind::PressButtonToScore => write!(f, "Press Button To Score"),
            EventKind::HoldingEnergy => write!(f, "Holding Energy"),
            EventKind::Scored(team) => write!(f, "Scored ({})", team),
            EventKind::ScoreMissed(team) => write!(f, "Score Missed ({})", team),
            EventKind::ScoreOverride(team) => write!(f, "Score Override ({})", team),
            EventKind::TimeTick => write!(f, "Time"),
            EventKind::Defeated(Defeat::Plain) => write!(f, "Defeated"),
            EventKind::Defeated(Defeat::WithPoints) => write!(f, "Defeated With Points"),
            EventKind::Defeated(Defeat::WithoutPoints) => write!(f, "Defeated Without Points"),
            EventKind::MatchStarting => write!(f, "Match Starting"),
            EventKind::MatchEnding => write!(f, "Match Ending"),
            EventKind::ObjectiveSecured(objective, side) => {
                write!(f, "{} Secured ({})", objective.name(), side)
            }
            EventKind::KnockOut(side) => write!(f, "KO ({})", side),
            EventKind::KnockOutStreak(side) => write!(f, "KO Streak ({})", side),
            EventKind::DetectionStarted => write!(f, "Detection Started"),
            EventKind::DetectionStopped => write!(f, "Detection Stopped"),
        }
    }
}

/// A validated detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub at: Instant,
    /// Match clock shown on screen when the event was logged, e.g. `07:42`.
    pub clock: String,
    /// Points, energy or -1 when the event has no value.
    pub value: i32,
    pub vetoed: bool,
    pub verified: bool,
}

impl Event {
    pub fn new(kind: EventKind, at: Instant, clock: impl Into<String>, value: i32) -> Self {
        Self {
            kind,
            at,
            clock: clock.into(),
            value,
            vetoed: false,
            verified: false,
        }
    }

    pub fn age(&self) -> Duration {
        self.at.elapsed()
    }

    /// `[clock] kind` form used by the recent-events feed.
    pub fn strip(&self) -> String {
        format!("[{}] {}", self.clock, self.kind)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [Event] {}", self.clock, self.kind)?;
        if self.value != -1 {
            write!(f, " ({})", self.value)?;
        }
        if self.vetoed {
            write!(f, " (Vetoed)")?;
        }
        if self.verified {
            write!(f, " (Verified)")?;
        }
        Ok(())
    }
}
