/// Per-template match statistics
///
/// The matcher records samples through a cheap `StatsRecorder` handle. When
/// collection is enabled each sample goes onto a bounded channel drained by
/// one worker thread; a full channel drops the sample instead of blocking
/// the detection loop.
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Score cleared the acceptance.
    Accepted,
    /// Score computed, accepted or not.
    Observed,
}

#[derive(Debug, Clone)]
struct Sample {
    template: String,
    score: f32,
    kind: SampleKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateStat {
    pub name: String,
    /// Accepted matches.
    pub count: u64,
    /// Mean accepted score.
    pub average: f32,
    /// Times the template was scored at all.
    pub observed: u64,
    pub best: f32,
}

#[derive(Default)]
struct Table {
    rows: HashMap<String, TemplateStat>,
    accepted_total: HashMap<String, f64>,
}

impl Table {
    fn apply(&mut self, sample: Sample) {
        let row = self
            .rows
            .entry(sample.template.clone())
            .or_insert_with(|| TemplateStat {
                name: sample.template.clone(),
                ..TemplateStat::default()
            });
        match sample.kind {
            SampleKind::Observed => {
                row.observed += 1;
                row.best = row.best.max(sample.score);
            }
            SampleKind::Accepted => {
                row.count += 1;
                let total = self.accepted_total.entry(sample.template).or_insert(0.0);
                *total += sample.score as f64;
                row.average = (*total / row.count as f64) as f32;
            }
        }
    }
}

struct Shared {
    enabled: AtomicBool,
    pending: AtomicUsize,
    dropped: AtomicU64,
    table: Mutex<Table>,
}

/// Handle used by the matcher. Cloning is cheap.
#[derive(Clone)]
pub struct StatsRecorder {
    shared: Option<Arc<Shared>>,
    sender: Option<Sender<Sample>>,
}

impl StatsRecorder {
    /// Recorder that discards everything.
    pub fn disabled() -> Self {
        Self {
            shared: None,
            sender: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|s| s.enabled.load(Ordering::Relaxed))
    }

    pub fn record(&self, template: &str, score: f32, kind: SampleKind) {
        let (Some(shared), Some(sender)) = (&self.shared, &self.sender) else {
            return;
        };
        if !shared.enabled.load(Ordering::Relaxed) {
            return;
        }

        shared.pending.fetch_add(1, Ordering::AcqRel);
        let sample = Sample {
            template: template.to_string(),
            score,
            kind,
        };
        match sender.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                shared.pending.fetch_sub(1, Ordering::AcqRel);
                shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Owner of the statistics worker.
pub struct Stats {
    shared: Arc<Shared>,
    sender: Sender<Sample>,
}

impl Stats {
    /// Start the worker with a queue of `capacity` samples.
    pub fn spawn(enabled: bool, capacity: usize) -> std::io::Result<Self> {
        let (sender, receiver) = bounded(capacity.max(1));
        let shared = Arc::new(Shared {
            enabled: AtomicBool::new(enabled),
            pending: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            table: Mutex::new(Table::default()),
        });

        let worker_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("stats".to_string())
            .spawn(move || Self::run(worker_shared, receiver))?;

        Ok(Self { shared, sender })
    }

    fn run(shared: Arc<Shared>, receiver: Receiver<Sample>) {
        while let Ok(sample) = receiver.recv() {
            shared.table.lock().apply(sample);
            shared.pending.fetch_sub(1, Ordering::AcqRel);
        }
        tracing::debug!("Statistics worker stopped");
    }

    pub fn recorder(&self) -> StatsRecorder {
        StatsRecorder {
            shared: Some(Arc::clone(&self.shared)),
            sender: Some(self.sender.clone()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Relaxed);
        tracing::info!(
            "Statistics collection {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    /// Samples lost to a full queue.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Wait up to `timeout` for queued samples to be applied.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.shared.pending.load(Ordering::Acquire) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Rows sorted by accepted count, then name.
    pub fn report(&self) -> Vec<TemplateStat> {
        self.flush(Duration::from_millis(250));
        let mut rows: Vec<_> = self.shared.table.lock().rows.values().cloned().collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        rows
    }

    pub fn clear(&self) {
        self.flush(Duration::from_millis(250));
        let mut table = self.shared.table.lock();
        table.rows.clear();
        table.accepted_total.clear();
    }

    /// Log the report at info level.
    pub fn log_report(&self) {
        let rows = self.report();
        if rows.is_empty() {
            tracing::info!("No template statistics collected");
            return;
        }
        for row in rows {
            tracing::info!(
                "{:<32} count {:>5}  avg {:.3}  best {:.3}  observed {:>6}",
                row.name,
                row.count,
                row.average,
                row.best,
                row.observed
            );
        }
    }
}
