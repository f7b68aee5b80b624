/// Everything the signal loops share
///
/// One `DetectionContext` per detection session, passed by reference into
/// every loop. Tests build their own instances, so nothing here is global.
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::capture::FrameSource;
use crate::config::Config;
use crate::duplicate::DuplicateSuppressor;
use crate::history::MatchHistory;
use crate::matching::Matcher;
use crate::messaging::StateBus;
use crate::notify::Notifier;
use crate::state::{EventKind, EventLog, GameStateAggregator, StateSink};
use crate::stats::StatsRecorder;
use crate::team::{Side, Team};
use crate::template::{Category, TemplateLibrary, TemplateSet};

pub struct DetectionContext {
    pub config: Config,
    pub templates: Arc<TemplateLibrary>,
    pub frames: Arc<dyn FrameSource>,
    pub matcher: Matcher,
    pub duplicates: DuplicateSuppressor,
    pub log: EventLog,
    pub state: GameStateAggregator,
    pub notifier: Arc<dyn Notifier>,
    pub history: MatchHistory,

    /// Energy currently held, as last committed by the energy loop.
    holding: AtomicU32,
    /// A first score was counted in this match.
    first_counted: AtomicBool,
    paused: AtomicBool,
    running: AtomicBool,
    /// Bumped on every resume, so loops that slept through a pause still see it.
    resumes: AtomicU64,
    /// Bumped on every match start, end and idle reset.
    matches: AtomicU64,
    /// Serialises match start, end and idle resets.
    phase: Mutex<()>,
}

impl DetectionContext {
    pub fn new(
        config: Config,
        templates: Arc<TemplateLibrary>,
        frames: Arc<dyn FrameSource>,
        notifier: Arc<dyn Notifier>,
        stats: StatsRecorder,
        bus: StateBus,
    ) -> Self {
        Self {
            duplicates: DuplicateSuppressor::new(config.duplicate_window()),
            log: EventLog::new(config.max_events),
            matcher: Matcher::new(stats),
            state: GameStateAggregator::new(bus),
            history: MatchHistory::new(),
            config,
            templates,
            frames,
            notifier,
            holding: AtomicU32::new(0),
            first_counted: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            running: AtomicBool::new(false),
            resumes: AtomicU64::new(0),
            matches: AtomicU64::new(0),
            phase: Mutex::new(()),
        }
    }

    pub fn templates(&self, category: Category, team: Team) -> TemplateSet {
        self.templates.get(category, team)
    }

    pub fn acceptance(&self, team: Team) -> f32 {
        self.config.acceptance_for(team)
    }

    /// Match clock shown on screen, `MM:SS`.
    pub fn clock(&self) -> String {
        self.state.clock()
    }

    pub fn holding(&self) -> u32 {
        self.holding.load(Ordering::Acquire)
    }

    pub fn set_holding(&self, energy: u32) {
        self.holding.store(energy, Ordering::Release);
    }

    pub fn first_counted(&self) -> bool {
        self.first_counted.load(Ordering::Acquire)
    }

    pub fn set_first_counted(&self) {
        self.first_counted.store(true, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        let was_paused = self.paused.swap(paused, Ordering::AcqRel);
        if was_paused && !paused {
            self.resumes.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Number of resumes so far.
    pub fn resume_generation(&self) -> u64 {
        self.resumes.load(Ordering::Acquire)
    }

    /// Number of match resets so far.
    pub fn match_generation(&self) -> u64 {
        self.matches.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Reset per-match state shared by the loops.
    fn reset_match(&self) {
        self.state.clear();
        self.duplicates.clear();
        self.set_holding(0);
        self.first_counted.store(false, Ordering::Release);
        self.matches.fetch_add(1, Ordering::AcqRel);
    }

    /// A start banner was seen; wipe the previous match and run the clock from 10:00.
    pub fn start_match(&self) {
        let _phase = self.phase.lock();
        self.reset_match();
        self.log.clear();
        self.state.set_match_started();
        self.log.add(EventKind::MatchStarting, &self.clock(), -1);
        self.notifier.status("Match starting".to_string());
    }

    /// An end banner was seen; summarise, record and reset.
    pub fn end_match(&self) {
        let _phase = self.phase.lock();
        let snapshot = self.state.snapshot();
        self.log.add(EventKind::MatchEnding, &snapshot.clock(), -1);

        if snapshot.purple + snapshot.orange + snapshot.player != 0 {
            self.notifier.status(format!(
                "Match ended: purple {} ({} objectives), orange {} ({} objectives), self {}",
                snapshot.purple,
                snapshot.objectives.iter().filter(|(_, s)| *s == Side::Purple).count(),
                snapshot.orange,
                snapshot.objectives.iter().filter(|(_, s)| *s == Side::Orange).count(),
                snapshot.player
            ));
            let record = self
                .history
                .add(snapshot.purple, snapshot.orange, snapshot.player);
            tracing::info!("Match recorded as {}", record.outcome());
        }

        self.reset_match();
    }

    /// Reset a match whose log has been quiet for longer than the idle limit.
    pub fn reset_if_idle(&self) -> bool {
        if !self.state.is_match_active() || self.log.idle() < self.config.idle_reset() {
            return false;
        }
        let _phase = self.phase.lock();
        self.notifier.warn(format!(
            "No events for {}s, resetting match state",
            self.log.idle().as_secs()
        ));
        self.reset_match();
        self.log.clear();
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Contexts over still frames for detector tests.
    use super::*;
    use crate::capture::StillFrame;
    use crate::notify::Feed;
    use image::RgbaImage;

    pub fn context_with(
        config: Config,
        library: TemplateLibrary,
        frame: RgbaImage,
    ) -> Arc<DetectionContext> {
        Arc::new(DetectionContext::new(
            config,
            Arc::new(library),
            Arc::new(StillFrame::new(frame)),
            Arc::new(Feed::default()),
            StatsRecorder::disabled(),
            StateBus::new(),
        ))
    }

    pub fn empty_context() -> Arc<DetectionContext> {
        context_with(Config::default(), TemplateLibrary::new(), RgbaImage::new(1, 1))
    }
}
