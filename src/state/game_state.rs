/// Aggregate game state
///
/// A single mutex-guarded snapshot written by the detection loops and read by
/// external sinks. Every mutation is also broadcast on the `StateBus`.
use parking_lot::Mutex;
use std::time::Instant;

use super::events::Objective;
use crate::messaging::{StateBus, StateUpdate};
use crate::team::{Side, Team};

/// Seconds on the clock when a match starts.
pub const MATCH_SECONDS: u32 = 600;

/// Remaining seconds at or below which scored points are doubled.
pub const FINAL_STRETCH_SECONDS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameState {
    pub purple: i32,
    pub orange: i32,
    /// Points scored by the local player (also counted for purple).
    pub player: i32,
    pub energy: u32,
    /// Seconds left on the match clock, 0 when unknown.
    pub seconds_left: u32,
    pub objectives: Vec<(Objective, Side)>,
    pub purple_kos: u32,
    pub orange_kos: u32,
    pub defeated: u32,
    pub match_active: bool,
    /// Side that scored first in this match.
    pub first: Option<Side>,
    pub started_at: Option<Instant>,
}

impl GameState {
    pub fn elapsed_seconds(&self) -> u32 {
        if self.seconds_left == 0 {
            return 0;
        }
        MATCH_SECONDS.saturating_sub(self.seconds_left)
    }

    pub fn is_final_stretch(&self) -> bool {
        is_final_stretch(self.seconds_left)
    }

    /// Displayed clock, `MM:SS`.
    pub fn clock(&self) -> String {
        format!("{:02}:{:02}", self.seconds_left / 60, self.seconds_left % 60)
    }
}

pub fn is_final_stretch(seconds_left: u32) -> bool {
    seconds_left != 0 && seconds_left <= FINAL_STRETCH_SECONDS
}

/// Operations the detection core performs on the aggregate state.
pub trait StateSink: Send + Sync {
    fn set_score(&self, team: Team, delta: i32);
    fn set_time(&self, minutes: u32, seconds: u32);
    fn set_energy(&self, energy: u32);
    fn set_objective_secured(&self, side: Side, objective: Objective);
    fn set_knockout(&self, side: Side, streak: bool);
    fn set_defeated(&self);
    fn clear(&self);
}

pub struct GameStateAggregator {
    state: Mutex<GameState>,
    bus: StateBus,
}

impl GameStateAggregator {
    pub fn new(bus: StateBus) -> Self {
        Self {
            state: Mutex::new(GameState::default()),
            bus,
        }
    }

    pub fn bus(&self) -> &StateBus {
        &self.bus
    }

    pub fn snapshot(&self) -> GameState {
        self.state.lock().clone()
    }

    pub fn clock(&self) -> String {
        self.state.lock().clock()
    }

    pub fn seconds_left(&self) -> u32 {
        self.state.lock().seconds_left
    }

    pub fn is_final_stretch(&self) -> bool {
        self.state.lock().is_final_stretch()
    }

    pub fn is_match_active(&self) -> bool {
        self.state.lock().match_active
    }

    /// Record which side a first-score badge belongs to.
    pub fn set_first_side(&self, side: Side) {
        self.state.lock().first = Some(side);
    }

    /// Reset and mark a new match as running at 10:00.
    pub fn set_match_started(&self) {
        {
            let mut state = self.state.lock();
            *state = GameState {
                seconds_left: MATCH_SECONDS,
                match_active: true,
                started_at: Some(Instant::now()),
                ..GameState::default()
            };
        }
        self.bus.publish(StateUpdate::MatchStarted);
        self.bus.publish(StateUpdate::Time {
            minutes: MATCH_SECONDS / 60,
            seconds: 0,
        });
    }

    /// Final (purple, orange, player) totals.
    pub fn scores(&self) -> (i32, i32, i32) {
        let state = self.state.lock();
        (state.purple, state.orange, state.player)
    }
}

impl StateSink for GameStateAggregator {
    fn set_score(&self, team: Team, delta: i32) {
        let update = {
            let mut state = self.state.lock();
            match team {
                Team::Purple => state.purple += delta,
                Team::Orange => state.orange += delta,
                Team::Player => {
                    state.purple += delta;
                    state.player += delta;
                }
                Team::First => match state.first {
                    Some(Side::Purple) => state.purple += delta,
                    Some(Side::Orange) => state.orange += delta,
                    None => {
                        tracing::warn!("Unknown team scored first goal ({:+})", delta);
                        return;
                    }
                },
                Team::Energy | Team::Time | Team::Game => {
                    tracing::warn!("Ignoring score of {:+} for {}", delta, team);
                    return;
                }
            }
            tracing::debug!(
                "Publishing {:+} for {} (purple {}, orange {})",
                delta,
                team,
                state.purple,
                state.orange
            );
            StateUpdate::Score {
                team,
                delta,
                purple: state.purple,
                orange: state.orange,
                player: state.player,
            }
        };
        self.bus.publish(update);
    }

    fn set_time(&self, minutes: u32, seconds: u32) {
        self.state.lock().seconds_left = minutes * 60 + seconds;
        self.bus.publish(StateUpdate::Time { minutes, seconds });
    }

    fn set_energy(&self, energy: u32) {
        self.state.lock().energy = energy;
        self.bus.publish(StateUpdate::Energy(energy));
    }

    fn set_objective_secured(&self, side: Side, objective: Objective) {
        self.state.lock().objectives.push((objective, side));
        self.bus
            .publish(StateUpdate::ObjectiveSecured { objective, side });
    }

    fn set_knockout(&self, side: Side, streak: bool) {
        {
            let mut state = self.state.lock();
            match side {
                Side::Purple => state.purple_kos += 1,
                Side::Orange => state.orange_kos += 1,
            }
        }
        self.bus.publish(StateUpdate::KnockOut { side, streak });
    }

    fn set_defeated(&self) {
        let total = {
            let mut state = self.state.lock();
            state.defeated += 1;
            state.defeated
        };
        self.bus.publish(StateUpdate::Defeated { total });
    }

    fn clear(&self) {
        *self.state.lock() = GameState::default();
        self.bus.publish(StateUpdate::Cleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> GameStateAggregator {
        GameStateAggregator::new(StateBus::new())
    }

    #[test]
    fn test_self_score_counts_for_purple() {
        let agg = aggregator();
        agg.set_score(Team::Player, 20);
        agg.set_score(Team::Orange, 5);
        assert_eq!(agg.scores(), (20, 5, 20));
    }

    #[test]
    fn test_first_score_follows_side() {
        let agg = aggregator();
        agg.set_score(Team::First, 2);
        assert_eq!(agg.scores(), (0, 0, 0));

        agg.set_first_side(Side::Orange);
        agg.set_score(Team::First, 2);
        assert_eq!(agg.scores(), (0, 2, 0));
    }

    #[test]
    fn test_final_stretch() {
        let agg = aggregator();
        assert!(!agg.is_final_stretch());

        agg.set_time(2, 0);
        assert!(agg.is_final_stretch());
        assert_eq!(agg.clock(), "02:00");

        agg.set_time(2, 1);
        assert!(!agg.is_final_stretch());

        agg.set_time(0, 0);
        assert!(!agg.is_final_stretch());
    }

    #[test]
    fn test_match_start_resets() {
        let agg = aggregator();
        agg.set_score(Team::Purple, 40);
        agg.set_defeated();

        agg.set_match_started();
        let state = agg.snapshot();
        assert_eq!(state.purple, 0);
        assert_eq!(state.defeated, 0);
        assert_eq!(state.seconds_left, 600);
        assert!(state.match_active);
        assert_eq!(state.elapsed_seconds(), 0);
    }

    #[test]
    fn test_updates_are_broadcast() {
        let bus = StateBus::new();
        let (rx, _) = bus.subscribe();
        let agg = GameStateAggregator::new(bus);

        agg.set_energy(7);
        agg.set_score(Team::Purple, 15);
        agg.clear();

        let updates: Vec<_> = rx.try_iter().collect();
        assert_eq!(updates[0], StateUpdate::Energy(7));
        assert!(matches!(
            updates[1],
            StateUpdate::Score {
                team: Team::Purple,
                delta: 15,
                purple: 15,
                ..
            }
        ));
        assert_eq!(updates[2], StateUpdate::Cleared);
    }
}
