//! Command state and fail-safe supervision
//!
//! The supervisor holds the last commanded actuator values and decides every cycle whether
//! they are still fresh. Stale commands are replaced with the safe output: neutral servos,
//! pump off and readiness [`Readiness::SLEEP`].

use crate::data_types::{Planar, Readiness};
use crate::time::{Duration, Instant};

pub const SERVO_COUNT: usize = 4;

/// Physical output collaborator
///
/// Called from task context once per cycle.
pub trait ActuatorOutput {
    /// `servo` values are normalized to \[-1, 1\], `readiness` is a 2-bit level.
    fn apply(&mut self, servo: &[f32; SERVO_COUNT], pump: bool, readiness: u8);
}

impl<T: ActuatorOutput + ?Sized> ActuatorOutput for &mut T {
    fn apply(&mut self, servo: &[f32; SERVO_COUNT], pump: bool, readiness: u8) {
        (**self).apply(servo, pump, readiness)
    }
}

/// Output adapter that keeps actuators neutral unless readiness is engaged
///
/// The readiness level itself is passed through unchanged.
#[derive(Debug, Clone, Default)]
pub struct OutputGate<O> {
    inner: O,
}

impl<O> OutputGate<O> {
    pub const fn new(inner: O) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut O {
        &mut self.inner
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: ActuatorOutput> ActuatorOutput for OutputGate<O> {
    fn apply(&mut self, servo: &[f32; SERVO_COUNT], pump: bool, readiness: u8) {
        if readiness >= Readiness::ENGAGED {
            self.inner.apply(servo, pump, readiness);
        } else {
            self.inner.apply(&[0.0; SERVO_COUNT], false, readiness);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandState {
    /// Normalized setpoints in \[-1, 1\]
    pub servo: [f32; SERVO_COUNT],
    pub pump: bool,
    /// 2-bit readiness level
    pub readiness: u8,
    /// Reception time of the last accepted command
    pub last_update: Option<Instant>,
}

impl CommandState {
    pub const SAFE: CommandState = CommandState {
        servo: [0.0; SERVO_COUNT],
        pump: false,
        readiness: Readiness::SLEEP,
        last_update: None,
    };
}

impl Default for CommandState {
    fn default() -> Self {
        Self::SAFE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SupervisorState {
    /// A command arrived within the staleness window.
    Live,
    /// No fresh command; the safe output is applied.
    SafeTimeout,
}

/// Maps a servo command to a normalized setpoint.
///
/// Takes the angular position, or the angular velocity when the position is not finite.
/// Falls back to zero and clamps the result to \[-1, 1\].
pub fn servo_setpoint(command: &Planar) -> f32 {
    let kinematics = &command.kinematics;
    [kinematics.angular_position, kinematics.angular_velocity]
        .into_iter()
        .find(|value| value.is_finite())
        .unwrap_or(0.0)
        .clamp(-1.0, 1.0)
}

pub struct Supervisor {
    command: CommandState,
    state: SupervisorState,
    staleness_timeout: Duration,
    decode_errors: u32,
    timeouts: u32,
}

impl Supervisor {
    /// Creates a supervisor in the safe state.
    pub const fn new(staleness_timeout: Duration) -> Self {
        Self {
            command: CommandState::SAFE,
            state: SupervisorState::SafeTimeout,
            staleness_timeout,
            decode_errors: 0,
            timeouts: 0,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn command(&self) -> &CommandState {
        &self.command
    }

    /// True while commands are fresh and readiness is engaged
    pub fn engaged(&self) -> bool {
        self.state == SupervisorState::Live && self.command.readiness == Readiness::ENGAGED
    }

    /// Payloads that failed to decode
    pub fn decode_errors(&self) -> u32 {
        self.decode_errors
    }

    /// Transitions from live to the safe state
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    /// Stores a servo command. Returns false for a channel out of range.
    pub fn set_servo(&mut self, channel: usize, command: &Planar, timestamp: Instant) -> bool {
        let Some(slot) = self.command.servo.get_mut(channel) else {
            return false;
        };
        *slot = servo_setpoint(command);
        self.command.last_update = Some(timestamp);
        true
    }

    pub fn set_pump(&mut self, on: bool, timestamp: Instant) {
        self.command.pump = on;
        self.command.last_update = Some(timestamp);
    }

    pub fn set_readiness(&mut self, readiness: Readiness, timestamp: Instant) {
        self.command.readiness = readiness.value & 0x3;
        self.command.last_update = Some(timestamp);
    }

    pub fn note_decode_error(&mut self) {
        self.decode_errors = self.decode_errors.wrapping_add(1);
    }

    /// Evaluates staleness and applies the resulting command to `output` exactly once.
    pub fn cycle<O: ActuatorOutput + ?Sized>(
        &mut self,
        now: Instant,
        output: &mut O,
    ) -> SupervisorState {
        let fresh = self
            .command
            .last_update
            .is_some_and(|at| now.saturating_duration_since(at) <= self.staleness_timeout);

        match (self.state, fresh) {
            (SupervisorState::Live, false) => {
                self.timeouts = self.timeouts.wrapping_add(1);
                self.command = CommandState::SAFE;
                self.state = SupervisorState::SafeTimeout;
                warn!("command timeout, entering safe state");
            }
            (SupervisorState::SafeTimeout, true) => {
                self.state = SupervisorState::Live;
                info!("commands live");
            }
            _ => {}
        }

        let command = match self.state {
            SupervisorState::Live => &self.command,
            SupervisorState::SafeTimeout => &CommandState::SAFE,
        };
        output.apply(&command.servo, command.pump, command.readiness);
        self.state
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::data_types::PlanarKinematics;
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder {
        applied: Vec<([f32; SERVO_COUNT], bool, u8)>,
    }

    impl ActuatorOutput for Recorder {
        fn apply(&mut self, servo: &[f32; SERVO_COUNT], pump: bool, readiness: u8) {
            self.applied.push((*servo, pump, readiness));
        }
    }

    const SAFE: ([f32; SERVO_COUNT], bool, u8) = ([0.0; SERVO_COUNT], false, 0);

    fn ts(ms: u64) -> Instant {
        Instant::MIN.saturating_add(Duration::from_millis(ms))
    }

    fn planar(position: f32, velocity: f32) -> Planar {
        Planar {
            kinematics: PlanarKinematics {
                angular_position: position,
                angular_velocity: velocity,
                angular_acceleration: 0.0,
            },
            torque: 0.0,
        }
    }

    #[test]
    fn test_servo_setpoint() {
        assert_eq!(servo_setpoint(&planar(0.25, 0.5)), 0.25);
        assert_eq!(servo_setpoint(&planar(f32::NAN, -0.5)), -0.5);
        assert_eq!(servo_setpoint(&planar(f32::INFINITY, f32::NAN)), 0.0);
        assert_eq!(servo_setpoint(&planar(3.0, 0.0)), 1.0);
        assert_eq!(servo_setpoint(&planar(f32::NAN, -7.0)), -1.0);
    }

    #[test]
    fn test_boots_safe_without_counting() {
        let mut supervisor = Supervisor::new(Duration::from_millis(1000));
        let mut output = Recorder::default();
        assert_eq!(supervisor.cycle(ts(0), &mut output), SupervisorState::SafeTimeout);
        assert_eq!(supervisor.timeouts(), 0);
        assert_eq!(output.applied, [SAFE]);
    }

    #[test]
    fn test_live_then_timeout_once() {
        let mut supervisor = Supervisor::new(Duration::from_millis(1000));
        let mut output = Recorder::default();

        supervisor.set_readiness(Readiness::new(Readiness::ENGAGED), ts(100));
        supervisor.set_servo(2, &planar(0.5, 0.0), ts(100));
        assert_eq!(supervisor.cycle(ts(120), &mut output), SupervisorState::Live);
        assert!(supervisor.engaged());
        assert_eq!(output.applied[0], ([0.0, 0.0, 0.5, 0.0], false, 3));

        // Exactly at the threshold the command is still fresh.
        assert_eq!(supervisor.cycle(ts(1100), &mut output), SupervisorState::Live);
        assert_eq!(supervisor.cycle(ts(1101), &mut output), SupervisorState::SafeTimeout);
        assert_eq!(supervisor.timeouts(), 1);
        assert!(!supervisor.engaged());
        assert_eq!(*supervisor.command(), CommandState::SAFE);

        for at in [1200, 5000, 9000] {
            supervisor.cycle(ts(at), &mut output);
        }
        assert_eq!(supervisor.timeouts(), 1);
        assert!(output.applied[2..].iter().all(|applied| *applied == SAFE));
        assert_eq!(output.applied.len(), 6);
    }

    #[test]
    fn test_safe_state_clears_command() {
        let mut supervisor = Supervisor::new(Duration::from_millis(1000));
        let mut output = Recorder::default();

        supervisor.set_pump(true, ts(0));
        supervisor.set_servo(0, &planar(0.9, 0.0), ts(0));
        supervisor.cycle(ts(10), &mut output);
        supervisor.cycle(ts(2000), &mut output);

        // A later readiness command alone does not bring back the old setpoints.
        supervisor.set_readiness(Readiness::new(Readiness::ENGAGED), ts(2100));
        supervisor.cycle(ts(2110), &mut output);
        assert_eq!(output.applied[2], ([0.0; SERVO_COUNT], false, 3));
    }

    #[test]
    fn test_decode_errors_do_not_stamp() {
        let mut supervisor = Supervisor::new(Duration::from_millis(1000));
        let mut output = Recorder::default();
        supervisor.note_decode_error();
        supervisor.note_decode_error();
        assert_eq!(supervisor.cycle(ts(1), &mut output), SupervisorState::SafeTimeout);
        assert_eq!(supervisor.decode_errors(), 2);
    }

    #[test]
    fn test_servo_channel_range() {
        let mut supervisor = Supervisor::new(Duration::from_millis(1000));
        assert!(!supervisor.set_servo(SERVO_COUNT, &planar(0.5, 0.0), ts(0)));
        assert_eq!(supervisor.command().last_update, None);
    }

    #[test]
    fn test_output_gate() {
        let mut gate = OutputGate::new(Recorder::default());
        gate.apply(&[0.5; SERVO_COUNT], true, Readiness::STANDBY);
        gate.apply(&[0.5; SERVO_COUNT], true, Readiness::ENGAGED);
        assert_eq!(
            gate.inner().applied,
            [
                ([0.0; SERVO_COUNT], false, 2),
                ([0.5; SERVO_COUNT], true, 3)
            ]
        );
    }
}
