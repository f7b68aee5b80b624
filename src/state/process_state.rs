/// Detection lifecycle state machine
///
/// Stopped -> Starting -> Running <-> Paused -> Stopping -> Stopped
use std::time::{Duration, Instant};
use thiserror::Error;

/// State of the detection process
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ProcessState {
    /// No signal loop is running
    #[default]
    Stopped,

    /// Loops are being spawned
    Starting,

    /// Loops are ticking
    Running { since: Instant },

    /// Loops are alive but skip every tick
    Paused { since: Instant },

    /// Loops have been told to exit
    Stopping,
}

impl ProcessState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, ProcessState::Stopped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, ProcessState::Paused { .. })
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Stopping)
    }

    /// Time spent in the running or paused state
    pub fn duration(&self) -> Option<Duration> {
        match self {
            ProcessState::Running { since } | ProcessState::Paused { since } => {
                Some(since.elapsed())
            }
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProcessState::Stopped => "Stopped",
            ProcessState::Starting => "Starting...",
            ProcessState::Running { .. } => "Running",
            ProcessState::Paused { .. } => "Paused",
            ProcessState::Stopping => "Stopping...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Detection is already running")]
    AlreadyRunning,

    #[error("Detection is already stopped")]
    AlreadyStopped,

    #[error("Detection is not running")]
    NotRunning,

    #[error("Detection is not paused")]
    NotPaused,

    #[error("Cannot perform action during state transition")]
    InTransition,
}

pub struct ProcessStateMachine {
    state: ProcessState,
}

impl ProcessStateMachine {
    pub fn new() -> Self {
        Self {
            state: ProcessState::Stopped,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ProcessState::Stopped => {
                self.state = ProcessState::Starting;
                Ok(())
            }
            ProcessState::Running { .. } | ProcessState::Paused { .. } => {
                Err(TransitionError::AlreadyRunning)
            }
            _ => Err(TransitionError::InTransition),
        }
    }

    pub fn mark_running(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ProcessState::Starting => {
                self.state = ProcessState::Running {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(TransitionError::InTransition),
        }
    }

    pub fn pause(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ProcessState::Running { .. } => {
                self.state = ProcessState::Paused {
                    since: Instant::now(),
                };
                Ok(())
            }
            ProcessState::Paused { .. } | ProcessState::Stopped => Err(TransitionError::NotRunning),
            _ => Err(TransitionError::InTransition),
        }
    }

    pub fn resume(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ProcessState::Paused { .. } => {
                self.state = ProcessState::Running {
                    since: Instant::now(),
                };
                Ok(())
            }
            ProcessState::Running { .. } | ProcessState::Stopped => Err(TransitionError::NotPaused),
            _ => Err(TransitionError::InTransition),
        }
    }

    pub fn stop(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ProcessState::Running { .. } | ProcessState::Paused { .. } => {
                self.state = ProcessState::Stopping;
                Ok(())
            }
            ProcessState::Stopped => Err(TransitionError::AlreadyStopped),
            _ => Err(TransitionError::InTransition),
        }
    }

    pub fn mark_stopped(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ProcessState::Stopping => {
                self.state = ProcessState::Stopped;
                Ok(())
            }
            _ => Err(TransitionError::InTransition),
        }
    }

    /// Force stop (for error recovery)
    pub fn force_stop(&mut self) {
        self.state = ProcessState::Stopped;
    }
}

impl Default for ProcessStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_state_predicates() {
        let paused = ProcessState::Paused {
            since: Instant::now(),
        };
        assert!(paused.is_paused());
        assert!(!paused.is_running());
        assert!(paused.duration().is_some());

        assert!(ProcessState::Starting.is_transitioning());
        assert!(ProcessState::default().is_stopped());
        assert_eq!(paused.description(), "Paused");
    }

    #[test]
    fn test_full_lifecycle() {
        let mut sm = ProcessStateMachine::new();
        sm.start().unwrap();
        sm.mark_running().unwrap();
        sm.pause().unwrap();
        assert!(sm.state().is_paused());
        sm.resume().unwrap();
        assert!(sm.state().is_running());
        sm.stop().unwrap();
        sm.mark_stopped().unwrap();
        assert!(sm.state().is_stopped());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = ProcessStateMachine::new();
        assert_eq!(sm.pause(), Err(TransitionError::NotRunning));
        assert_eq!(sm.resume(), Err(TransitionError::NotPaused));
        assert_eq!(sm.stop(), Err(TransitionError::AlreadyStopped));

        sm.start().unwrap();
        assert_eq!(sm.start(), Err(TransitionError::InTransition));
        assert_eq!(sm.pause(), Err(TransitionError::InTransition));

        sm.mark_running().unwrap();
        assert_eq!(sm.start(), Err(TransitionError::AlreadyRunning));
        assert_eq!(sm.resume(), Err(TransitionError::NotPaused));
    }

    #[test]
    fn test_stop_from_paused() {
        let mut sm = ProcessStateMachine::new();
        sm.start().unwrap();
        sm.mark_running().unwrap();
        sm.pause().unwrap();
        assert!(sm.stop().is_ok());
        assert_eq!(sm.state(), ProcessState::Stopping);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            TransitionError::NotPaused.to_string(),
            "Detection is not paused"
        );
    }
}
