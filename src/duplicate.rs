/// Repeat and override suppression for numeric detections.
///
/// Score HUD elements stay on screen for a few seconds, so the same value is
/// read several times. Each team keeps the last counted `DuplicateRecord`;
/// a new candidate is either a repeat of it (`Duplicate`), a re-read of it
/// with more digits (`Override`), or a new value (`Found`).
use image::GrayImage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::matching::{similarity, MatchResult};
use crate::team::Team;

/// Comparison regions scoring above this are the same frame.
pub const SIMILARITY_THRESHOLD: f32 = 0.91;

/// Default duplicate window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(4000);

/// Why a candidate was or was not a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    ZeroValue,
    Sentinel,
    EmptyRegion,
    Inequality,
    LongDelay,
    Counted,
    Similar,
    Dissimilar,
    /// No previous record to compare against.
    First,
    Override,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::ZeroValue => "zero-value",
            Reason::Sentinel => "sentinel-value",
            Reason::EmptyRegion => "empty-region",
            Reason::Inequality => "inequality",
            Reason::LongDelay => "long-delay",
            Reason::Counted => "short-delay,equality,counted",
            Reason::Similar => "similar-region",
            Reason::Dissimilar => "dissimilar-region",
            Reason::First => "first",
            Reason::Override => "override",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct DuplicateRecord {
    pub value: i32,
    pub at: Instant,
    /// Compact sub-image compared by the similarity check.
    pub region: GrayImage,
    pub counted: bool,
    /// Value this record corrects, 0 when none.
    pub replaces: i32,
    /// Same value seen after the window expired.
    pub potential: bool,
}

impl DuplicateRecord {
    pub fn new(value: i32, region: GrayImage) -> Self {
        Self::at(value, region, Instant::now())
    }

    pub fn at(value: i32, region: GrayImage, at: Instant) -> Self {
        Self {
            value,
            at,
            region,
            counted: false,
            replaces: 0,
            potential: false,
        }
    }

    fn elapsed_since(&self, previous: &DuplicateRecord) -> Duration {
        self.at.saturating_duration_since(previous.at)
    }

    /// Whether this candidate repeats `previous`. Rules apply in order.
    pub fn is_duplicate(&mut self, previous: &DuplicateRecord, window: Duration) -> (bool, Reason) {
        if self.value == 0 || previous.value == 0 {
            return (false, Reason::ZeroValue);
        }
        if self.value == -1 {
            return (false, Reason::Sentinel);
        }
        if is_empty(&self.region) || is_empty(&previous.region) {
            return (false, Reason::EmptyRegion);
        }
        if self.value != previous.value {
            return (false, Reason::Inequality);
        }
        if self.elapsed_since(previous) > window {
            self.potential = true;
            return (false, Reason::LongDelay);
        }
        if previous.counted {
            return (true, Reason::Counted);
        }

        if similarity(&previous.region, &self.region) > SIMILARITY_THRESHOLD {
            (true, Reason::Similar)
        } else {
            (false, Reason::Dissimilar)
        }
    }

    /// Whether this candidate is `previous` read with one or two more digits.
    ///
    /// Only an exact x10 or x100 growth counts. Both records remember the
    /// replaced value on success.
    pub fn overrides(&mut self, previous: &mut DuplicateRecord, window: Duration) -> bool {
        if self.elapsed_since(previous) >= window
            || !previous.counted
            || previous.value <= 0
            || self.value <= previous.value
            || self.value % previous.value != 0
        {
            return false;
        }

        let ratio = self.value / previous.value;
        if ratio != 10 && ratio != 100 {
            return false;
        }

        previous.replaces = previous.value;
        self.replaces = previous.value;
        true
    }
}

fn is_empty(image: &GrayImage) -> bool {
    image.width() == 0 || image.height() == 0
}

/// Decision for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub result: MatchResult,
    pub reason: Reason,
    /// Previously published value to retract, 0 when none.
    pub replaces: i32,
}

/// Per-team duplicate state.
pub struct DuplicateSuppressor {
    window: Duration,
    records: Mutex<HashMap<Team, DuplicateRecord>>,
}

impl DuplicateSuppressor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Classify `candidate` against the team's previous record.
    ///
    /// Found and Override candidates are counted and become the new
    /// previous record; duplicates leave the state untouched.
    pub fn evaluate(&self, team: Team, mut candidate: DuplicateRecord) -> Verdict {
        let mut records = self.records.lock();

        let verdict = match records.get_mut(&team) {
            None => Verdict {
                result: MatchResult::Found,
                reason: Reason::First,
                replaces: 0,
            },
            Some(previous) => {
                if candidate.overrides(previous, self.window) {
                    tracing::warn!(
                        "Potential duplicate override detected (-{})/(+{}) for {}",
                        previous.value,
                        candidate.value,
                        team
                    );
                    Verdict {
                        result: MatchResult::Override,
                        reason: Reason::Override,
                        replaces: candidate.replaces,
                    }
                } else {
                    let (duplicate, reason) = candidate.is_duplicate(previous, self.window);
                    if duplicate {
                        tracing::debug!("{} duplicate of {} ({})", team, candidate.value, reason);
                        return Verdict {
                            result: MatchResult::Duplicate,
                            reason,
                            replaces: 0,
                        };
                    }
                    if candidate.potential {
                        tracing::debug!("{} repeated {} after the window", team, candidate.value);
                    }
                    Verdict {
                        result: MatchResult::Found,
                        reason,
                        replaces: 0,
                    }
                }
            }
        };

        candidate.counted = true;
        records.insert(team, candidate);
        verdict
    }

    /// Copy of the team's previous record.
    pub fn previous(&self, team: Team) -> Option<DuplicateRecord> {
        self.records.lock().get(&team).cloned()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    pub fn clear_team(&self, team: Team) {
        self.records.lock().remove(&team);
    }
}

impl Default for DuplicateSuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        GrayImage::from_fn(40, 16, |_, _| Luma([rng.gen()]))
    }

    fn record(value: i32, region: GrayImage, at: Instant, counted: bool) -> DuplicateRecord {
        let mut r = DuplicateRecord::at(value, region, at);
        r.counted = counted;
        r
    }

    #[test]
    fn test_rules_in_order() {
        let t0 = Instant::now();
        let w = DEFAULT_WINDOW;
        let prev = record(42, noise(1), t0, true);

        let mut zero = record(0, noise(1), t0, false);
        assert_eq!(zero.is_duplicate(&prev, w), (false, Reason::ZeroValue));

        let mut sentinel = record(-1, noise(1), t0, false);
        assert_eq!(sentinel.is_duplicate(&prev, w), (false, Reason::Sentinel));

        let mut empty = record(42, GrayImage::new(0, 0), t0, false);
        assert_eq!(empty.is_duplicate(&prev, w), (false, Reason::EmptyRegion));

        let mut other = record(43, noise(1), t0, false);
        assert_eq!(other.is_duplicate(&prev, w), (false, Reason::Inequality));

        let mut late = record(42, noise(1), t0 + Duration::from_millis(4500), false);
        assert_eq!(late.is_duplicate(&prev, w), (false, Reason::LongDelay));
        assert!(late.potential);

        let mut repeat = record(42, noise(9), t0 + Duration::from_millis(1200), false);
        assert_eq!(repeat.is_duplicate(&prev, w), (true, Reason::Counted));
    }

    #[test]
    fn test_region_similarity_decides_uncounted() {
        let t0 = Instant::now();
        let w = DEFAULT_WINDOW;
        let prev = record(42, noise(1), t0, false);

        let mut near = noise(1);
        for x in 0..4 {
            near.put_pixel(x, 0, Luma([0]));
        }
        let mut same = record(42, near, t0 + Duration::from_millis(1200), false);
        assert_eq!(same.is_duplicate(&prev, w), (true, Reason::Similar));

        let mut different = record(42, noise(2), t0 + Duration::from_millis(1200), false);
        assert_eq!(different.is_duplicate(&prev, w), (false, Reason::Dissimilar));
    }

    #[test]
    fn test_scenario_a_repeat_is_duplicate() {
        let suppressor = DuplicateSuppressor::default();
        let t0 = Instant::now();

        let first = suppressor.evaluate(Team::Purple, DuplicateRecord::at(42, noise(3), t0));
        assert_eq!(first.result, MatchResult::Found);

        let second = suppressor.evaluate(
            Team::Purple,
            DuplicateRecord::at(42, noise(3), t0 + Duration::from_millis(1200)),
        );
        assert_eq!(second.result, MatchResult::Duplicate);
    }

    #[test]
    fn test_scenario_b_non_exact_ratio_is_new_value() {
        let suppressor = DuplicateSuppressor::default();
        let t0 = Instant::now();

        suppressor.evaluate(Team::Orange, DuplicateRecord::at(7, noise(4), t0));
        let next = suppressor.evaluate(
            Team::Orange,
            DuplicateRecord::at(74, noise(5), t0 + Duration::from_millis(500)),
        );
        assert_eq!(next.result, MatchResult::Found);
        assert_eq!(next.replaces, 0);
        assert_eq!(suppressor.previous(Team::Orange).map(|r| r.value), Some(74));
    }

    #[test]
    fn test_scenario_c_hundredfold_overrides() {
        let suppressor = DuplicateSuppressor::default();
        let t0 = Instant::now();

        suppressor.evaluate(Team::Purple, DuplicateRecord::at(5, noise(6), t0));
        let next = suppressor.evaluate(
            Team::Purple,
            DuplicateRecord::at(500, noise(7), t0 + Duration::from_millis(300)),
        );
        assert_eq!(next.result, MatchResult::Override);
        assert_eq!(next.replaces, 5);

        let previous = suppressor.previous(Team::Purple).unwrap();
        assert_eq!(previous.value, 500);
        assert_eq!(previous.replaces, 5);
        assert!(previous.counted);
    }

    #[test]
    fn test_override_law() {
        let t0 = Instant::now();
        let w = DEFAULT_WINDOW;
        for (v, candidate, expected) in [
            (2, 20, true),
            (3, 300, true),
            (4, 40, true),
            (4, 44, false),
            (4, 4000, false),
            (12, 120, true),
            (20, 10, false),
        ] {
            let mut prev = record(v, noise(1), t0, true);
            let mut next = record(candidate, noise(2), t0 + Duration::from_millis(100), false);
            assert_eq!(next.overrides(&mut prev, w), expected, "{} -> {}", v, candidate);
            if expected {
                assert_eq!(prev.replaces, v);
                assert_eq!(next.replaces, v);
            }
        }

        let mut uncounted = record(2, noise(1), t0, false);
        let mut next = record(20, noise(2), t0, false);
        assert!(!next.overrides(&mut uncounted, w));

        let mut prev = record(2, noise(1), t0, true);
        let mut late = record(20, noise(2), t0 + w, false);
        assert!(!late.overrides(&mut prev, w));
    }

    #[test]
    fn test_teams_are_independent() {
        let suppressor = DuplicateSuppressor::default();
        let t0 = Instant::now();
        suppressor.evaluate(Team::Purple, DuplicateRecord::at(10, noise(8), t0));
        let orange = suppressor.evaluate(Team::Orange, DuplicateRecord::at(10, noise(8), t0));
        assert_eq!(orange.result, MatchResult::Found);

        suppressor.clear();
        assert!(suppressor.previous(Team::Purple).is_none());
    }
}
