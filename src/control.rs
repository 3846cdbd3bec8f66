//! Control module - PID gains, scalar loop state, and the simulation session

use crate::config::EffectiveTiming;
use crate::expr::SetpointFn;
use crate::history::{HistoryBuffer, Sample};

// ============================================================================
// PID GAINS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    /// The control law: proportional on the error, integral on the
    /// accumulated error, derivative on the per-unit error slope.
    pub fn output(&self, error: f64, cumulative_error: f64, error_slope: f64) -> f64 {
        self.kp * error + self.ki * cumulative_error + self.kd * error_slope
    }
}

// ============================================================================
// CONTROL STATE - Scalars owned by the session, zeroed only on reset
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlState {
    pub process_variable: f64,
    pub velocity: f64,
    pub cumulative_error: f64,
    pub last_error: f64,
    pub time: f64,
}

// ============================================================================
// SIMULATION SESSION - Owns both history buffers and the control scalars
// ============================================================================

/// One running simulation: setpoint trace, process-variable trace, scalar
/// control state, and the active setpoint function.
///
/// The control thread ticks the session and the render side reads it,
/// both through the same shared handle; a reset is a single reassignment
/// performed under that lock.
pub struct SimSession {
    setpoint_history: HistoryBuffer,
    process_history: HistoryBuffer,
    state: ControlState,
    setpoint: SetpointFn,
}

impl SimSession {
    /// Create a session with freshly seeded buffers.
    pub fn new(capacity: usize, setpoint: SetpointFn) -> Self {
        let mut session = Self {
            setpoint_history: HistoryBuffer::new(capacity),
            process_history: HistoryBuffer::new(capacity),
            state: ControlState::default(),
            setpoint,
        };
        session.seed();
        session
    }

    // Every buffer starts with one sample at the origin so `last()` is
    // always available to the tick and the renderer.
    fn seed(&mut self) {
        self.setpoint_history.push(Sample::new(0.0, 0.0));
        self.process_history.push(Sample::new(0.0, 0.0));
    }

    /// Discard both buffers, recreate them at `capacity`, zero the scalars.
    /// The active setpoint function is kept.
    pub fn reset(&mut self, capacity: usize) {
        self.setpoint_history = HistoryBuffer::new(capacity);
        self.process_history = HistoryBuffer::new(capacity);
        self.state = ControlState::default();
        self.seed();
    }

    /// Advance the simulation by one tick.
    ///
    /// The process variable integrates its velocity first, both samples
    /// are recorded at the pre-advance time coordinate, and the control
    /// error is computed against the setpoint sample just recorded.
    pub fn tick(&mut self, timing: &EffectiveTiming, gains: &PidGains) {
        let upt = timing.units_per_tick;

        self.state.process_variable += self.state.velocity;
        self.process_history
            .push(Sample::new(self.state.time, self.state.process_variable));
        let target = self.setpoint.eval(self.state.time);
        self.setpoint_history.push(Sample::new(self.state.time, target));
        self.state.time += upt;

        let error = self
            .setpoint_history
            .last()
            .map(|s| s.y)
            .unwrap_or(target)
            - self.state.process_variable;
        self.state.cumulative_error += error;
        self.state.velocity += gains.output(
            error,
            self.state.cumulative_error,
            (error - self.state.last_error) / upt,
        );
        self.state.last_error = error;
    }

    /// Resize both buffers to the window target when the retained count is
    /// below it. A trace already holding `target` or more samples is never
    /// truncated here; that only happens through `reset`.
    pub fn fit_history(&mut self, target: usize) {
        if self.setpoint_history.len() < target {
            self.setpoint_history.resize(target);
            self.process_history.resize(target);
        }
    }

    /// Swap in a newly compiled setpoint function.
    pub fn install_setpoint(&mut self, setpoint: SetpointFn) {
        self.setpoint = setpoint;
    }

    pub fn setpoint_source(&self) -> &str {
        self.setpoint.source()
    }

    pub fn setpoint_history(&self) -> &HistoryBuffer {
        &self.setpoint_history
    }

    pub fn process_history(&self) -> &HistoryBuffer {
        &self.process_history
    }

    pub fn state(&self) -> ControlState {
        self.state
    }
}
