use std::fmt;

use thiserror::Error;

/// Lifecycle of the capture → detect → draw loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    CaptureRunning,
    Detecting,
    Drawing,
    TornDown,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::CaptureRunning => "capture running",
            PipelineState::Detecting => "detecting",
            PipelineState::Drawing => "drawing",
            PipelineState::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid pipeline transition: {from} -> {to}")]
pub struct StateTransitionError {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Validated state holder. `TornDown` is reachable from anywhere and is
/// terminal.
#[derive(Debug, Clone)]
pub struct PipelineStateMachine {
    state: PipelineState,
    transitions: usize,
}

impl Default for PipelineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStateMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            transitions: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn transitions(&self) -> usize {
        self.transitions
    }

    pub fn is_torn_down(&self) -> bool {
        self.state == PipelineState::TornDown
    }

    pub fn can_transition(&self, to: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self.state, to),
            (Idle, CaptureRunning)
                | (CaptureRunning, Detecting)
                | (Detecting, Drawing)
                | (Drawing, CaptureRunning)
                | (CaptureRunning | Detecting | Drawing, Idle)
        ) || (to == TornDown && self.state != TornDown)
    }

    pub fn transition(&mut self, to: PipelineState) -> Result<(), StateTransitionError> {
        if !self.can_transition(to) {
            return Err(StateTransitionError {
                from: self.state,
                to,
            });
        }
        log::trace!("Pipeline state: {} -> {}", self.state, to);
        self.state = to;
        self.transitions += 1;
        Ok(())
    }

    /// Moves to `TornDown`; repeated calls are no-ops.
    pub fn tear_down(&mut self) {
        if self.state != PipelineState::TornDown {
            self.state = PipelineState::TornDown;
            self.transitions += 1;
        }
    }
}
