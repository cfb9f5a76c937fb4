//! Machine state simulator
//!
//! Accepts the same textual vocabulary as a real controller (G-code lines
//! and machine macro names) and maintains a [`MachineStatus`]:
//! - Motion runs as a fixed number of timed steps
//! - Feed hold suspends motion at the next step boundary
//! - Emergency stop raises an alarm that aborts motion immediately
//! - Targets outside the soft limits raise an alarm without moving
//!
//! The simulator is a cheap, cloneable handle; clones share one machine.

pub mod limits;
pub mod tokenizer;

use cncterm_core::data::parameters::{DEFAULT_FEED, MAX_SPINDLE};
use cncterm_core::{
    thread_safe_rw, MachineError, MachineParameters, MachineState, MachineStatus, ThreadSafeRw,
    ToolTable,
};
use cncterm_settings::MachineSettings;
use indexmap::IndexMap;
use limits::SoftLimits;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokenizer::{tokenize, CommandKind, MachineCommand};

/// Alarm reason raised by an emergency stop
pub const ESTOP_REASON: &str = "Emergency stop activated";

const AMBIENT_TEMP: f64 = 35.0;
const MIN_TEMP: f64 = 32.0;
const MAX_TEMP: f64 = 55.0;

/// Result of running one command on the simulator
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    /// The command ran to completion
    Completed(String),
    /// The command was not executed
    Rejected(String),
    /// Motion started but was stopped by an alarm; position unchanged
    Aborted(String),
}

impl SimulationOutcome {
    /// Whether the command ran to completion
    pub fn is_completed(&self) -> bool {
        matches!(self, SimulationOutcome::Completed(_))
    }

    /// The message or reason carried by the outcome
    pub fn message(&self) -> &str {
        match self {
            Self::Completed(m) | Self::Rejected(m) | Self::Aborted(m) => m,
        }
    }
}

/// Spindle thermal model
///
/// Moves the temperature a fixed fraction toward its target on every tick:
/// the ceiling while the spindle cuts, ambient otherwise.
#[derive(Debug, Clone, Copy)]
struct ThermalModel {
    rate: f64,
}

impl ThermalModel {
    fn next(&self, temp: f64, cutting: bool) -> f64 {
        let target = if cutting { MAX_TEMP } else { AMBIENT_TEMP };
        (temp + (target - temp) * self.rate).clamp(MIN_TEMP, MAX_TEMP)
    }
}

struct Inner {
    status: ThreadSafeRw<MachineStatus>,
    params: ThreadSafeRw<MachineParameters>,
    tools: ToolTable,
    macros: IndexMap<String, Vec<String>>,
    soft_limits: bool,
    motion_steps: u32,
    step_interval: Duration,
    thermal: ThermalModel,
    state_tx: watch::Sender<MachineState>,
    motion: tokio::sync::Mutex<()>,
}

/// Settles the machine state when a move ends without committing its target.
///
/// Also runs when the move's future is dropped mid-step, e.g. by a timeout.
struct MotionGuard<'a> {
    simulator: &'a MachineSimulator,
    committed: bool,
}

impl Drop for MotionGuard<'_> {
    fn drop(&mut self) {
        if !self.committed && self.simulator.settle_motion() {
            tracing::debug!("Motion stopped before completion");
        }
    }
}

/// Simulated machine
#[derive(Clone)]
pub struct MachineSimulator {
    inner: Arc<Inner>,
}

impl MachineSimulator {
    /// Create a simulator from machine settings
    pub fn new(settings: &MachineSettings) -> Self {
        let max_spindle = settings.max_spindle;
        let params = MachineParameters::new(
            settings.work_area.x,
            settings.work_area.y,
            settings.work_area.z,
            settings.max_velocity.x,
            max_spindle,
        );
        let status = MachineStatus::new()
            .with_speed(max_spindle / 2.0)
            .with_temp(AMBIENT_TEMP);
        let (state_tx, _) = watch::channel(status.state);

        Self {
            inner: Arc::new(Inner {
                status: thread_safe_rw(status),
                params: thread_safe_rw(params),
                tools: ToolTable::standard(),
                macros: settings.macros.clone(),
                soft_limits: settings.soft_limits,
                motion_steps: settings.motion_steps.max(1),
                step_interval: Duration::from_millis(settings.step_interval_ms),
                thermal: ThermalModel { rate: 0.05 },
                state_tx,
                motion: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Snapshot of the current status
    pub fn status(&self) -> MachineStatus {
        self.inner.status.read().clone()
    }

    /// Snapshot of the current status after one idle thermal tick
    pub fn sample_status(&self) -> MachineStatus {
        let mut status = self.inner.status.write();
        if !status.state.is_busy() {
            status.temp = self.inner.thermal.next(status.temp, false);
        }
        status.clone()
    }

    /// Current state
    pub fn state(&self) -> MachineState {
        self.inner.status.read().state
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<MachineState> {
        self.inner.state_tx.subscribe()
    }

    /// Copy of the parameter table
    pub fn parameters(&self) -> MachineParameters {
        self.inner.params.read().clone()
    }

    /// Update one parameter, returning its canonical key
    pub fn set_parameter(&self, key: &str, value: f64) -> Result<String, MachineError> {
        let key = self.inner.params.write().set(key, value)?;
        tracing::info!("Parameter {} set to {}", key, value);
        Ok(key)
    }

    /// The tool table
    pub fn tools(&self) -> &ToolTable {
        &self.inner.tools
    }

    /// Force the alarm state from any state.
    ///
    /// Motion in progress aborts at its next step boundary without
    /// committing its target.
    pub fn emergency_stop(&self) {
        self.update(|status| status.raise_alarm(ESTOP_REASON));
        tracing::warn!("{}", ESTOP_REASON);
    }

    /// Toggle between RUN and HOLD; no effect in other states.
    ///
    /// Returns the state after the toggle.
    pub fn feed_hold(&self) -> MachineState {
        let state = self.update(|status| {
            let target = match status.state {
                MachineState::Run => MachineState::Hold,
                MachineState::Hold => MachineState::Run,
                other => other,
            };
            status.transition_to(target);
            status.state
        });
        tracing::info!("Feed hold toggled, state {}", state);
        state
    }

    /// Clear an active alarm. Returns whether an alarm was cleared.
    pub fn reset(&self) -> bool {
        let cleared = self.update(|status| {
            if status.state.is_alarm() {
                status.clear_alarm();
                true
            } else {
                false
            }
        });
        if cleared {
            tracing::info!("Alarm cleared");
        }
        cleared
    }

    /// Execute one line: a G-code command or a machine macro name.
    ///
    /// Commands run one at a time; a second caller waits for the first.
    /// Returns `Err(MachineError::Cancelled)` when `cancel` fires mid-motion;
    /// the position is then left unchanged.
    pub async fn execute(
        &self,
        line: &str,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutcome, MachineError> {
        let Some(command) = tokenize(line) else {
            return Ok(SimulationOutcome::Rejected("Nothing to execute".to_string()));
        };

        let _guard = tokio::select! {
            _ = cancel.cancelled() => return Err(MachineError::Cancelled),
            guard = self.inner.motion.lock() => guard,
        };

        if let Some(reason) = self.alarm_reason() {
            tracing::warn!("Rejected '{}' while in alarm", line.trim());
            return Ok(SimulationOutcome::Rejected(format!(
                "Machine in ALARM: {}",
                reason
            )));
        }

        tracing::debug!("Simulating {}", command.name);

        match command.kind {
            CommandKind::GCode => self.execute_gcode(&command, cancel).await,
            CommandKind::Macro => self.execute_macro(&command.name, cancel).await,
        }
    }

    async fn execute_macro(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutcome, MachineError> {
        let lines = self
            .inner
            .macros
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, lines)| lines.clone());

        if let Some(lines) = lines {
            for line in &lines {
                let Some(inner) = tokenize(line) else {
                    continue;
                };
                if inner.kind != CommandKind::GCode {
                    tracing::debug!("Skipping non G-code line '{}' in macro {}", line, name);
                    continue;
                }
                let outcome = self.execute_gcode(&inner, cancel).await?;
                if !outcome.is_completed() {
                    return Ok(outcome);
                }
            }
            return Ok(SimulationOutcome::Completed(format!("Macro {} complete", name)));
        }

        match name {
            "HOME" => {
                let outcome = self.move_to(0.0, 0.0, 0.0, None, None, cancel).await?;
                Ok(match outcome {
                    SimulationOutcome::Completed(_) => {
                        SimulationOutcome::Completed("Homing complete".to_string())
                    }
                    other => other,
                })
            }
            "ZERO" => {
                self.update(|status| {
                    status.x = 0.0;
                    status.y = 0.0;
                    status.z = 0.0;
                });
                Ok(SimulationOutcome::Completed("Position zeroed".to_string()))
            }
            _ => Ok(SimulationOutcome::Rejected(format!("Unknown command: {}", name))),
        }
    }

    async fn execute_gcode(
        &self,
        command: &MachineCommand,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutcome, MachineError> {
        if let Some(reason) = self.alarm_reason() {
            return Ok(SimulationOutcome::Rejected(format!(
                "Machine in ALARM: {}",
                reason
            )));
        }

        let speed = command.param('S').map(|s| self.clamp_spindle(s));
        match command.name.as_str() {
            "G0" | "G1" => {
                let current = self.status();
                let x = command.param('X').unwrap_or(current.x);
                let y = command.param('Y').unwrap_or(current.y);
                let z = command.param('Z').unwrap_or(current.z);
                self.move_to(x, y, z, command.param('F'), speed, cancel).await
            }
            "G28" => self.move_to(0.0, 0.0, 0.0, command.param('F'), speed, cancel).await,
            "M3" | "M4" => {
                let speed = self.update(|status| {
                    if let Some(s) = speed {
                        status.speed = s;
                    }
                    status.speed
                });
                Ok(SimulationOutcome::Completed(format!("Spindle on at {:.0} RPM", speed)))
            }
            "M5" => {
                self.update(|status| status.speed = 0.0);
                Ok(SimulationOutcome::Completed("Spindle stopped".to_string()))
            }
            other => {
                if let Some(s) = speed {
                    self.update(|status| status.speed = s);
                }
                Ok(SimulationOutcome::Completed(format!("{} accepted", other)))
            }
        }
    }

    /// Run a simulated move and commit the target atomically on completion.
    async fn move_to(
        &self,
        x: f64,
        y: f64,
        z: f64,
        feed: Option<f64>,
        speed: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutcome, MachineError> {
        if self.inner.soft_limits {
            let limits = SoftLimits::from_parameters(&self.inner.params.read());
            if let Err(reason) = limits.check(x, y, z) {
                self.update(|status| status.raise_alarm(reason.clone()));
                tracing::warn!("{}", reason);
                return Ok(SimulationOutcome::Rejected(reason));
            }
        }

        let started = self.update(|status| status.transition_to(MachineState::Run));
        if !started {
            let reason = self.alarm_reason().unwrap_or_else(|| "Machine busy".to_string());
            return Ok(SimulationOutcome::Rejected(reason));
        }
        let mut motion = MotionGuard {
            simulator: self,
            committed: false,
        };

        let mut state_rx = self.watch_state();
        for _ in 0..self.inner.motion_steps {
            tokio::select! {
                _ = cancel.cancelled() => return self.cancel_motion(),
                _ = tokio::time::sleep(self.inner.step_interval) => {}
                _ = state_rx.wait_for(|s| s.is_alarm()) => {}
            }

            if self.state() == MachineState::Hold {
                tracing::debug!("Motion held");
                tokio::select! {
                    _ = cancel.cancelled() => return self.cancel_motion(),
                    _ = state_rx.wait_for(|s| *s != MachineState::Hold) => {}
                }
            }

            if let Some(reason) = self.alarm_reason() {
                tracing::warn!("Motion aborted: {}", reason);
                return Ok(SimulationOutcome::Aborted(reason));
            }

            self.update(|status| {
                status.temp = self.inner.thermal.next(status.temp, status.speed > 0.0);
            });
        }

        let default_feed = self.inner.params.read().get_or(DEFAULT_FEED, 0.0);
        let committed = self.update(|status| {
            if status.state.is_alarm() {
                return None;
            }
            status.x = x;
            status.y = y;
            status.z = z;
            status.feed = feed.unwrap_or(if status.feed > 0.0 {
                status.feed
            } else {
                default_feed
            });
            if let Some(s) = speed {
                status.speed = s;
            }
            status.transition_to(MachineState::Idle);
            Some(status.clone())
        });
        motion.committed = committed.is_some();

        match committed {
            Some(status) => {
                tracing::info!("Move complete at X:{:.2} Y:{:.2} Z:{:.2}", status.x, status.y, status.z);
                Ok(SimulationOutcome::Completed(format!(
                    "Moved to X:{:.2} Y:{:.2} Z:{:.2}",
                    status.x, status.y, status.z
                )))
            }
            None => Ok(SimulationOutcome::Aborted(
                self.alarm_reason().unwrap_or_else(|| ESTOP_REASON.to_string()),
            )),
        }
    }

    fn cancel_motion(&self) -> Result<SimulationOutcome, MachineError> {
        tracing::info!("Motion cancelled");
        Err(MachineError::Cancelled)
    }

    /// Return a RUN or HOLD state to IDLE. Returns whether the state changed.
    fn settle_motion(&self) -> bool {
        self.update(|status| status.state.is_busy() && status.transition_to(MachineState::Idle))
    }

    fn clamp_spindle(&self, speed: f64) -> f64 {
        let max = self.inner.params.read().get_or(MAX_SPINDLE, f64::MAX);
        speed.clamp(0.0, max)
    }

    fn alarm_reason(&self) -> Option<String> {
        let status = self.inner.status.read();
        status.state.is_alarm().then(|| status.alarm.clone())
    }

    /// Mutate the status under the write lock and publish any state change.
    fn update<R>(&self, f: impl FnOnce(&mut MachineStatus) -> R) -> R {
        let mut status = self.inner.status.write();
        let result = f(&mut status);
        let state = status.state;
        self.inner.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
        result
    }
}

impl std::fmt::Debug for MachineSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineSimulator")
            .field("status", &*self.inner.status.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings() -> MachineSettings {
        MachineSettings {
            motion_steps: 4,
            step_interval_ms: 1,
            ..MachineSettings::default()
        }
    }

    #[test]
    fn test_thermal_model_is_bounded() {
        let model = ThermalModel { rate: 0.5 };
        let mut temp = AMBIENT_TEMP;
        for _ in 0..100 {
            temp = model.next(temp, true);
        }
        assert!(temp <= MAX_TEMP);
        for _ in 0..100 {
            temp = model.next(temp, false);
        }
        assert!((temp - AMBIENT_TEMP).abs() < 0.01);
    }

    #[test]
    fn test_initial_status() {
        let sim = MachineSimulator::new(&MachineSettings::default());
        let status = sim.status();
        assert_eq!(status.state, MachineState::Idle);
        assert_eq!(status.speed, 6000.0);
        assert_eq!(status.temp, AMBIENT_TEMP);
        assert_eq!(sim.tools().len(), 3);
    }

    #[tokio::test]
    async fn test_spindle_clamped_to_max() {
        let sim = MachineSimulator::new(&fast_settings());
        let token = CancellationToken::new();
        let outcome = sim.execute("M3 S50000", &token).await.unwrap();
        assert!(outcome.is_completed());
        assert_eq!(sim.status().speed, 12000.0);

        sim.execute("M5", &token).await.unwrap();
        assert_eq!(sim.status().speed, 0.0);
    }

    #[tokio::test]
    async fn test_move_uses_default_feed() {
        let sim = MachineSimulator::new(&fast_settings());
        let token = CancellationToken::new();
        sim.execute("G0 X10", &token).await.unwrap();
        let status = sim.status();
        assert_eq!(status.feed, 1000.0);
        assert_eq!(status.position(), (10.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_empty_line_rejected() {
        let sim = MachineSimulator::new(&fast_settings());
        let outcome = sim.execute("  ", &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, SimulationOutcome::Rejected(_)));
    }
}
