/// Detection orchestrator
///
/// Spawns one thread per enabled signal, all sharing a `DetectionContext`.
/// Pausing is cooperative: loops keep running but skip their ticks, and reset
/// their debounce state on the first tick after a resume.
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::context::DetectionContext;
use super::detector::Signal;
use super::for_signal;
use super::runner::SignalRunner;
use crate::error::DetectionError;
use crate::state::{EventKind, ProcessState, ProcessStateMachine};

pub struct DetectionOrchestrator {
    ctx: Arc<DetectionContext>,
    process: Mutex<ProcessStateMachine>,
    loops: Mutex<Vec<(Signal, JoinHandle<()>)>>,
}

impl DetectionOrchestrator {
    pub fn new(ctx: Arc<DetectionContext>) -> Self {
        Self {
            ctx,
            process: Mutex::new(ProcessStateMachine::new()),
            loops: Mutex::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &Arc<DetectionContext> {
        &self.ctx
    }

    pub fn state(&self) -> ProcessState {
        self.process.lock().state()
    }

    /// Signals currently running a loop.
    pub fn signals(&self) -> Vec<Signal> {
        self.loops.lock().iter().map(|(s, _)| *s).collect()
    }

    /// Spawn a loop per enabled signal. Returns the number of loops.
    pub fn start(&self) -> Result<usize, DetectionError> {
        let mut process = self.process.lock();
        process.start()?;

        self.ctx.set_paused(false);
        self.ctx.set_running(true);

        let mut loops = self.loops.lock();
        for signal in Signal::ALL {
            if !self.ctx.config.is_enabled(signal) {
                tracing::info!("{} disabled", signal);
                continue;
            }

            let runner = SignalRunner::new(for_signal(signal), &self.ctx);
            let ctx = Arc::clone(&self.ctx);
            let spawned = thread::Builder::new()
                .name(format!("detect-{}", signal))
                .spawn(move || runner.run(ctx));

            match spawned {
                Ok(handle) => loops.push((signal, handle)),
                Err(e) => {
                    tracing::error!("Failed to spawn {} loop: {}", signal, e);
                    self.ctx.set_running(false);
                    join_all(&mut loops);
                    process.force_stop();
                    return Err(DetectionError::ThreadSpawnFailed(e));
                }
            }
        }

        process.mark_running()?;
        let count = loops.len();
        self.ctx
            .log
            .add(EventKind::DetectionStarted, &self.ctx.clock(), -1);
        self.ctx
            .notifier
            .status(format!("Detection started ({} signals)", count));
        Ok(count)
    }

    pub fn pause(&self) -> Result<(), DetectionError> {
        self.process.lock().pause()?;
        self.ctx.set_paused(true);
        self.ctx.notifier.status("Detection paused".to_string());
        Ok(())
    }

    pub fn resume(&self) -> Result<(), DetectionError> {
        self.process.lock().resume()?;
        self.ctx.set_paused(false);
        self.ctx.notifier.status("Detection resumed".to_string());
        Ok(())
    }

    /// Pause when running, resume when paused. Returns true when now paused.
    pub fn toggle_pause(&self) -> Result<bool, DetectionError> {
        if self.state().is_paused() {
            self.resume()?;
            Ok(false)
        } else {
            self.pause()?;
            Ok(true)
        }
    }

    /// Stop every loop and wait for them to exit.
    pub fn stop(&self) -> Result<(), DetectionError> {
        let mut process = self.process.lock();
        process.stop()?;

        self.ctx.set_running(false);
        self.ctx.set_paused(false);
        join_all(&mut self.loops.lock());

        process.mark_stopped()?;
        self.ctx
            .log
            .add(EventKind::DetectionStopped, &self.ctx.clock(), -1);
        self.ctx.notifier.status("Detection stopped".to_string());
        Ok(())
    }

    /// One-line summary for status displays.
    pub fn status(&self) -> String {
        let state = self.ctx.state.snapshot();
        format!(
            "{} | {} | purple {} orange {} self {} | energy {} | {} loops | {} events",
            self.state().description(),
            state.clock(),
            state.purple,
            state.orange,
            state.player,
            state.energy,
            self.loops.lock().len(),
            self.ctx.log.len()
        )
    }
}

fn join_all(loops: &mut Vec<(Signal, JoinHandle<()>)>) {
    for (signal, handle) in loops.drain(..) {
        if handle.join().is_err() {
            tracing::error!("{} loop panicked", signal);
        }
    }
}

impl Drop for DetectionOrchestrator {
    fn drop(&mut self) {
        if self.ctx.is_running() {
            self.ctx.set_running(false);
            join_all(&mut self.loops.lock());
        }
    }
}
