/// Time-windowed event log
///
/// Events are kept oldest to newest in a `VecDeque` behind an `Arc`, and every
/// query walks them newest-first so windowed scans stop at the first event
/// that is too old. Writers serialise on the write lock and copy the buffer
/// only while a reader still holds an older snapshot.
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::events::{Event, EventKind};

pub type Snapshot = Arc<VecDeque<Event>>;

pub struct EventLog {
    events: RwLock<Snapshot>,
    started: Instant,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        Self::starting_at(max_events, Instant::now())
    }

    /// Log whose sentinel is stamped at `started`.
    pub fn starting_at(max_events: usize, started: Instant) -> Self {
        Self {
            events: RwLock::new(Arc::new(Self::sentinel(started))),
            started,
            max_events: max_events.max(1),
        }
    }

    fn sentinel(started: Instant) -> VecDeque<Event> {
        VecDeque::from([Event::new(EventKind::Nothing, started, "00:00", -1)])
    }

    /// Append an event stamped now.
    pub fn add(&self, kind: EventKind, clock: &str, value: i32) -> Event {
        self.add_at(kind, clock, value, Instant::now())
    }

    /// Append an event with an explicit timestamp.
    ///
    /// A timestamp older than the newest entry is raised to it so the log
    /// stays ordered.
    pub fn add_at(&self, kind: EventKind, clock: &str, value: i32, at: Instant) -> Event {
        let mut guard = self.events.write();
        let at = guard.back().map_or(at, |newest| at.max(newest.at));
        let event = Event::new(kind, at, clock, value);

        let events = Arc::make_mut(&mut *guard);
        events.push_back(event.clone());
        while events.len() > self.max_events {
            events.pop_front();
        }

        tracing::debug!("{}", event);
        event
    }

    /// Reset to the single sentinel event stamped at process start.
    pub fn clear(&self) {
        *self.events.write() = Arc::new(Self::sentinel(self.started));
    }

    /// Cheap, consistent view of the log; does not block writers.
    pub fn snapshot(&self) -> Snapshot {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent `kind` younger than `within`.
    pub fn occurred(&self, kind: EventKind, within: Duration) -> Option<Event> {
        self.occurred_before(kind, within, Instant::now())
    }

    /// Most recent `kind` in the window `[at - within, at]`.
    pub fn occurred_before(&self, kind: EventKind, within: Duration, at: Instant) -> Option<Event> {
        let snapshot = self.snapshot();
        let found = newest_first(&snapshot)
            .skip_while(|e| e.at > at)
            .take_while(|e| at.saturating_duration_since(e.at) <= within)
            .find(|e| e.kind == kind)
            .cloned();
        found
    }

    /// Most recent event of any of `kinds` younger than `within`.
    pub fn occurred_any(&self, kinds: &[EventKind], within: Duration) -> Option<Event> {
        let now = Instant::now();
        let snapshot = self.snapshot();
        let found = newest_first(&snapshot)
            .take_while(|e| now.saturating_duration_since(e.at) <= within)
            .find(|e| kinds.contains(&e.kind))
            .cloned();
        found
    }

    /// Every `kind` younger than `within`, newest first.
    pub fn past(&self, kind: EventKind, within: Duration) -> Vec<Event> {
        let now = Instant::now();
        let snapshot = self.snapshot();
        let events = newest_first(&snapshot)
            .take_while(|e| now.saturating_duration_since(e.at) <= within)
            .filter(|e| e.kind == kind)
            .cloned()
            .collect();
        events
    }

    /// Oldest `kind` younger than `within`.
    pub fn first(&self, kind: EventKind, within: Duration) -> Option<Event> {
        self.past(kind, within).pop()
    }

    /// True when the latest `a` is newer than the latest `b`.
    pub fn before(&self, a: EventKind, b: EventKind) -> bool {
        let snapshot = self.snapshot();
        for event in newest_first(&snapshot) {
            if event.kind == a {
                return true;
            }
            if event.kind == b {
                return false;
            }
        }
        false
    }

    /// Time since the newest event; zero until something beyond the sentinel is logged.
    pub fn idle(&self) -> Duration {
        let snapshot = self.snapshot();
        if snapshot.len() < 2 {
            return Duration::ZERO;
        }
        snapshot.back().map_or(Duration::ZERO, Event::age)
    }

    /// Time since the latest `kind`, zero when it never happened.
    pub fn since(&self, kind: EventKind) -> Duration {
        let snapshot = self.snapshot();
        let latest = newest_first(&snapshot).find(|e| e.kind == kind).cloned();
        latest.map_or(Duration::ZERO, |e| e.age())
    }

    pub fn last(&self) -> Option<Event> {
        self.snapshot().back().cloned()
    }

    /// Whether `kind` is anywhere in the log.
    pub fn contains(&self, kind: EventKind) -> bool {
        self.snapshot().iter().any(|e| e.kind == kind)
    }

    /// `[clock] kind` lines younger than `within`, newest first.
    pub fn recent(&self, within: Duration) -> Vec<String> {
        let now = Instant::now();
        let snapshot = self.snapshot();
        let lines = newest_first(&snapshot)
            .take_while(|e| now.saturating_duration_since(e.at) <= within)
            .map(Event::strip)
            .collect();
        lines
    }

    /// Full history, oldest first, for display.
    pub fn dump(&self) -> String {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return "No event data is available to display...".to_string();
        }
        let mut out = String::from("Event History");
        for event in snapshot.iter() {
            out.push('\n');
            out.push_str(&event.to_string());
        }
        out
    }

    /// Claim the latest unverified `kind` in `[at - within, at]`.
    ///
    /// Returns the claimed event; a second caller for the same event gets `None`.
    pub fn verify(&self, kind: EventKind, within: Duration, at: Instant) -> Option<Event> {
        let mut guard = self.events.write();
        let position = guard.iter().rposition(|e| {
            e.kind == kind
                && !e.verified
                && !e.vetoed
                && e.at <= at
                && at.saturating_duration_since(e.at) <= within
        })?;
        let events = Arc::make_mut(&mut *guard);
        let event = events.get_mut(position)?;
        event.verified = true;
        Some(event.clone())
    }

    /// Mark the latest `kind` as vetoed.
    pub fn veto(&self, kind: EventKind) -> bool {
        let mut guard = self.events.write();
        let Some(position) = guard.iter().rposition(|e| e.kind == kind) else {
            return false;
        };
        let events = Arc::make_mut(&mut *guard);
        match events.get_mut(position) {
            Some(event) => {
                event.vetoed = true;
                true
            }
            None => false,
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(4096)
    }
}

fn newest_first(events: &VecDeque<Event>) -> impl Iterator<Item = &Event> {
    events.iter().rev()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::events::Defeat;
    use crate::team::Team;

    fn aged_log(max_events: usize) -> (EventLog, Instant) {
        let now = Instant::now();
        let start = now.checked_sub(Duration::from_secs(120)).unwrap();
        (EventLog::starting_at(max_events, start), now)
    }

    #[test]
    fn test_new_log_holds_sentinel() {
        let log = EventLog::new(16);
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().kind, EventKind::Nothing);
        assert_eq!(log.idle(), Duration::ZERO);
    }

    #[test]
    fn test_occurred_respects_window() {
        let (log, now) = aged_log(16);
        log.add_at(EventKind::PreScore, "09:00", -1, now - Duration::from_secs(10));
        log.add_at(EventKind::TimeTick, "08:59", -1, now);

        assert!(log.occurred(EventKind::PreScore, Duration::from_secs(5)).is_none());
        assert!(log.occurred(EventKind::PreScore, Duration::from_secs(20)).is_some());
        assert!(log.occurred(EventKind::TimeTick, Duration::from_secs(1)).is_some());
    }

    #[test]
    fn test_past_is_newest_first_and_bounded() {
        let (log, now) = aged_log(64);
        for (i, secs) in [30u64, 8, 6, 4, 2].iter().enumerate() {
            log.add_at(
                EventKind::Scored(Team::Purple),
                "05:00",
                i as i32,
                now - Duration::from_secs(*secs),
            );
        }

        let past = log.past(EventKind::Scored(Team::Purple), Duration::from_secs(10));
        let values: Vec<i32> = past.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![4, 3, 2, 1]);
        assert!(past.windows(2).all(|w| w[0].at >= w[1].at));
        assert!(past.iter().all(|e| e.age() <= Duration::from_secs(10)));

        let first = log.first(EventKind::Scored(Team::Purple), Duration::from_secs(10));
        assert_eq!(first.unwrap().value, 1);
    }

    #[test]
    fn test_before() {
        let log = EventLog::new(16);
        assert!(!log.before(EventKind::MatchStarting, EventKind::MatchEnding));

        log.add(EventKind::MatchEnding, "00:00", -1);
        log.add(EventKind::MatchStarting, "10:00", -1);
        assert!(log.before(EventKind::MatchStarting, EventKind::MatchEnding));
        assert!(!log.before(EventKind::MatchEnding, EventKind::MatchStarting));
    }

    #[test]
    fn test_clear_resets_to_sentinel() {
        let log = EventLog::new(16);
        log.add(EventKind::MatchStarting, "10:00", -1);
        log.add(EventKind::TimeTick, "09:59", -1);
        assert_eq!(log.len(), 3);

        log.clear();
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().kind, EventKind::Nothing);
        assert!(!log.contains(EventKind::MatchStarting));
    }

    #[test]
    fn test_out_of_order_timestamp_is_raised() {
        let (log, now) = aged_log(16);
        log.add_at(EventKind::TimeTick, "09:00", -1, now);
        let late = log.add_at(EventKind::PreScore, "09:00", -1, now - Duration::from_secs(3));
        assert_eq!(late.at, now);
    }

    #[test]
    fn test_retention_cap() {
        let log = EventLog::new(3);
        for i in 0..10 {
            log.add(EventKind::TimeTick, "01:00", i);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().value, 9);
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let log = EventLog::new(16);
        let before = log.snapshot();
        log.add(EventKind::TimeTick, "09:59", -1);
        assert_eq!(before.len(), 1);
        assert_eq!(log.snapshot().len(), 2);
    }

    #[test]
    fn test_verify_claims_once() {
        let log = EventLog::new(16);
        let now = Instant::now();
        log.add_at(EventKind::PressButtonToScore, "03:00", 10, now);

        let window = Duration::from_secs(5);
        assert!(log.verify(EventKind::PressButtonToScore, window, now).is_some());
        assert!(log.verify(EventKind::PressButtonToScore, window, now).is_none());
        assert!(log.last().unwrap().verified);
    }

    #[test]
    fn test_occurred_before_looks_back_from_anchor() {
        let (log, now) = aged_log(16);
        let drop = now - Duration::from_secs(2);
        log.add_at(EventKind::Defeated(Defeat::Plain), "03:02", -1, drop - Duration::from_secs(1));
        log.add_at(EventKind::Defeated(Defeat::WithPoints), "03:00", -1, now);

        let found = log
            .occurred_before(EventKind::Defeated(Defeat::Plain), Duration::from_secs(3), drop)
            .unwrap();
        assert_eq!(found.clock, "03:02");
        assert!(log
            .occurred_before(EventKind::Defeated(Defeat::WithPoints), Duration::from_secs(3), drop)
            .is_none());
        assert!(log.since(EventKind::Defeated(Defeat::Plain)) >= Duration::from_secs(3));
    }

    #[test]
    fn test_occurred_any_and_since() {
        let log = EventLog::new(16);
        log.add(EventKind::Defeated(Defeat::WithPoints), "02:00", -1);
        let kinds = [
            EventKind::Defeated(Defeat::Plain),
            EventKind::Defeated(Defeat::WithPoints),
        ];
        assert!(log.occurred_any(&kinds, Duration::from_secs(2)).is_some());
        assert!(log.since(EventKind::MatchEnding).is_zero());
        assert!(log.idle() < Duration::from_secs(1));
    }

    #[test]
    fn test_concurrent_writers() {
        let log = Arc::new(EventLog::new(10_000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        log.add(EventKind::TimeTick, "05:00", t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 1001);
        assert!(snapshot
            .iter()
            .collect::<Vec<_>>()
            .windows(2)
            .all(|w| w[0].at <= w[1].at));
    }
}
