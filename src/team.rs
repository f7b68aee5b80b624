/// Teams and sides as the HUD presents them.
///
/// A `Team` is a template/signal grouping (digits for the clock live under
/// `Time`, energy digits under `Energy`, ...). A `Side` is one of the two
/// playing sides that scores and objectives are attributed to.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capture::CaptureRegion;

/// Acceptance used when neither the template nor the team overrides it.
pub const DEFAULT_ACCEPTANCE: f32 = 0.91;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Purple,
    Orange,
    /// The local player.
    #[serde(rename = "self")]
    Player,
    First,
    Energy,
    Time,
    Game,
}

impl Team {
    pub const ALL: [Team; 7] = [
        Team::Purple,
        Team::Orange,
        Team::Player,
        Team::First,
        Team::Energy,
        Team::Time,
        Team::Game,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Team::Purple => "purple",
            Team::Orange => "orange",
            Team::Player => "self",
            Team::First => "first",
            Team::Energy => "energy",
            Team::Time => "time",
            Team::Game => "game",
        }
    }

    /// Parse a directory or config name. `balls` is accepted for energy.
    pub fn from_name(name: &str) -> Option<Team> {
        match name.to_ascii_lowercase().as_str() {
            "purple" | "ally" => Some(Team::Purple),
            "orange" | "enemy" => Some(Team::Orange),
            "self" | "player" => Some(Team::Player),
            "first" => Some(Team::First),
            "energy" | "balls" => Some(Team::Energy),
            "time" => Some(Team::Time),
            "game" => Some(Team::Game),
            _ => None,
        }
    }

    pub fn default_acceptance(self) -> f32 {
        match self {
            Team::Purple | Team::Orange | Team::First => 0.8,
            Team::Player => 0.75,
            Team::Energy => 0.7,
            Team::Time | Team::Game => DEFAULT_ACCEPTANCE,
        }
    }

    /// Sub-rectangle of a cropped score area compared by the duplicate check.
    pub fn comparable_region(self) -> CaptureRegion {
        match self {
            Team::Player => CaptureRegion::from_corners(0, 20, 225, 60),
            Team::First => CaptureRegion::from_corners(30, 20, 300, 60),
            Team::Time => CaptureRegion::from_corners(15, 30, 100, 60),
            _ => CaptureRegion::from_corners(15, 30, 150, 60),
        }
    }

    /// Rectangle holding the score digits, relative to a badge found at `(x, y)`.
    pub fn crop_region(self, x: i32, y: i32) -> CaptureRegion {
        match self {
            Team::Player => CaptureRegion::from_corners(x, y - 100, x + 300, y + 100),
            Team::First => CaptureRegion::from_corners(x, 0, x + 300, y + 100),
            _ => CaptureRegion::from_corners(x - 50, y - 30, x + 200, y + 75),
        }
    }

    pub fn side(self) -> Option<Side> {
        match self {
            Team::Purple => Some(Side::Purple),
            Team::Orange => Some(Side::Orange),
            _ => None,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Purple,
    Orange,
}

impl Side {
    pub fn team(self) -> Team {
        match self {
            Side::Purple => Team::Purple,
            Side::Orange => Team::Orange,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Purple => Side::Orange,
            Side::Orange => Side::Purple,
        }
    }

    pub fn name(self) -> &'static str {
        self.team().name()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
