/// Results of finished matches, kept for the session.
use parking_lot::Mutex;
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
    Tied,
}

impl Outcome {
    fn symbol(self) -> &'static str {
        match self {
            Outcome::Won => "+/ ",
            Outcome::Lost => " /-",
            Outcome::Tied => " / ",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Won => "Won",
            Outcome::Lost => "Lost",
            Outcome::Tied => "Tied",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub purple: i32,
    pub orange: i32,
    /// Points scored by the local player.
    pub player: i32,
    pub finished: SystemTime,
}

impl MatchRecord {
    /// Purple is the local player's side.
    pub fn outcome(&self) -> Outcome {
        match self.purple.cmp(&self.orange) {
            std::cmp::Ordering::Greater => Outcome::Won,
            std::cmp::Ordering::Less => Outcome::Lost,
            std::cmp::Ordering::Equal => Outcome::Tied,
        }
    }
}

#[derive(Default)]
pub struct MatchHistory {
    matches: Mutex<Vec<MatchRecord>>,
}

impl MatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, purple: i32, orange: i32, player: i32) -> MatchRecord {
        let record = MatchRecord {
            purple,
            orange,
            player,
            finished: SystemTime::now(),
        };
        self.matches.lock().push(record.clone());
        record
    }

    pub fn matches(&self) -> Vec<MatchRecord> {
        self.matches.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.matches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One line per match, oldest first.
    pub fn dump(&self) -> Vec<String> {
        let matches = self.matches.lock();
        if matches.is_empty() {
            return vec!["+/- No recent match history to display".to_string()];
        }
        matches
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let outcome = m.outcome();
                format!(
                    "{} #{} {} {} - {} - {}",
                    outcome.symbol(),
                    i + 1,
                    outcome,
                    m.purple,
                    m.orange,
                    m.player
                )
            })
            .collect()
    }
}
