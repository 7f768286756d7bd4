//! Arm state value types
//!
//! Joint/cartesian vectors, the coded enums reported by (or written to) the
//! controller, and the status frame snapshot decoded from the real-time
//! telemetry stream.

use crate::DecodeError;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

/// Per-joint vector of optional scalars.
///
/// `None` in a threshold position means "no limit for that joint"; the wire
/// representation substitutes a caller-chosen sentinel via [`JointVector::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointVector {
    pub j1: Option<f64>,
    pub j2: Option<f64>,
    pub j3: Option<f64>,
    pub j4: Option<f64>,
    pub j5: Option<f64>,
    pub j6: Option<f64>,
}

impl JointVector {
    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            j1: Some(values[0]),
            j2: Some(values[1]),
            j3: Some(values[2]),
            j4: Some(values[3]),
            j5: Some(values[4]),
            j6: Some(values[5]),
        }
    }

    /// All six joints set to the same value.
    pub fn splat(value: f64) -> Self {
        Self::from_array([value; 6])
    }

    pub fn to_array(&self) -> [Option<f64>; 6] {
        [self.j1, self.j2, self.j3, self.j4, self.j5, self.j6]
    }

    /// Concrete per-joint values, with `fallback` substituted for `None`.
    pub fn resolve(&self, fallback: f64) -> [f64; 6] {
        let mut out = [fallback; 6];
        for (slot, value) in out.iter_mut().zip(self.to_array()) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        out
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let a = self.to_array();
        let b = other.to_array();
        let mut out = [None; 6];
        for i in 0..6 {
            out[i] = match (a[i], b[i]) {
                (Some(x), Some(y)) => Some(f(x, y)),
                _ => None,
            };
        }
        Self {
            j1: out[0],
            j2: out[1],
            j3: out[2],
            j4: out[3],
            j5: out[4],
            j6: out[5],
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        let a = self.to_array();
        Self {
            j1: a[0].map(&f),
            j2: a[1].map(&f),
            j3: a[2].map(&f),
            j4: a[3].map(&f),
            j5: a[4].map(&f),
            j6: a[5].map(&f),
        }
    }
}

impl Add for JointVector {
    type Output = JointVector;

    fn add(self, other: JointVector) -> JointVector {
        self.zip_with(&other, |a, b| a + b)
    }
}

impl Mul<f64> for JointVector {
    type Output = JointVector;

    fn mul(self, factor: f64) -> JointVector {
        self.map(|v| v * factor)
    }
}

impl Div<f64> for JointVector {
    type Output = JointVector;

    fn div(self, divisor: f64) -> JointVector {
        self.map(|v| v / divisor)
    }
}

/// Cartesian pose or offset: translation in x/y/z plus roll/pitch/yaw.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartesianVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl CartesianVector {
    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            x: values[0],
            y: values[1],
            z: values[2],
            roll: values[3],
            pitch: values[4],
            yaw: values[5],
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.roll, self.pitch, self.yaw]
    }

    /// Euclidean distance over the translational components only;
    /// orientation is ignored.
    pub fn linear_distance(&self, other: &CartesianVector) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self {
            x: f(self.x, other.x),
            y: f(self.y, other.y),
            z: f(self.z, other.z),
            roll: f(self.roll, other.roll),
            pitch: f(self.pitch, other.pitch),
            yaw: f(self.yaw, other.yaw),
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            x: f(self.x),
            y: f(self.y),
            z: f(self.z),
            roll: f(self.roll),
            pitch: f(self.pitch),
            yaw: f(self.yaw),
        }
    }
}

impl Add for CartesianVector {
    type Output = CartesianVector;

    fn add(self, other: CartesianVector) -> CartesianVector {
        self.zip_with(&other, |a, b| a + b)
    }
}

impl Sub for CartesianVector {
    type Output = CartesianVector;

    fn sub(self, other: CartesianVector) -> CartesianVector {
        self.zip_with(&other, |a, b| a - b)
    }
}

impl Mul<f64> for CartesianVector {
    type Output = CartesianVector;

    fn mul(self, factor: f64) -> CartesianVector {
        self.map(|v| v * factor)
    }
}

impl Div<f64> for CartesianVector {
    type Output = CartesianVector;

    fn div(self, divisor: f64) -> CartesianVector {
        self.map(|v| v / divisor)
    }
}

/// Operating state reported in every status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmState {
    Stop,
    Run,
    Suspend,
    Drag,
}

impl ArmState {
    /// Decode the wire code. Out-of-range codes are a decode failure, never
    /// a silent default.
    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            1 => Ok(ArmState::Stop),
            2 => Ok(ArmState::Run),
            3 => Ok(ArmState::Suspend),
            4 => Ok(ArmState::Drag),
            _ => Err(DecodeError::RobotState(code)),
        }
    }
}

/// Control mode reported in every status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmMode {
    Automatic,
    Manual,
}

impl ArmMode {
    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(ArmMode::Automatic),
            1 => Ok(ArmMode::Manual),
            _ => Err(DecodeError::RobotMode(code)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ArmMode::Automatic => 0,
            ArmMode::Manual => 1,
        }
    }
}

/// Hardware collision-response policy. Written to the controller, never
/// reported back in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionStrategy {
    ErrorPause,
    KeepRunning,
    ErrorStop,
    HeavyMoment,
    ShockResponse,
    ImpactRebound,
}

impl CollisionStrategy {
    pub fn code(&self) -> i32 {
        match self {
            CollisionStrategy::ErrorPause => 0,
            CollisionStrategy::KeepRunning => 1,
            CollisionStrategy::ErrorStop => 2,
            CollisionStrategy::HeavyMoment => 3,
            CollisionStrategy::ShockResponse => 4,
            CollisionStrategy::ImpactRebound => 5,
        }
    }
}

/// Reference frame for offset moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    Base,
    Tool,
}

impl CoordinateSystem {
    pub fn code(&self) -> i32 {
        match self {
            CoordinateSystem::Base => 1,
            CoordinateSystem::Tool => 2,
        }
    }
}

/// One complete, checksum-validated telemetry snapshot.
///
/// Frames are immutable once decoded and only ever replaced wholesale in the
/// status cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusFrame {
    pub state: ArmState,
    pub mode: ArmMode,
    pub motion_done: bool,
    pub collision: bool,
    pub emergency_stop: bool,
    pub main_error: i32,
    pub sub_error: i32,
    pub joint_positions: [f64; 6],
    pub cartesian: CartesianVector,
    /// Joint torques in device units; scale by 1000 for display units.
    pub joint_torques: [f64; 6],
    pub digital_output_low: u8,
    pub digital_output_high: u8,
    pub digital_input_low: u8,
    pub digital_input_high: u8,
    pub tool_output: u8,
    pub tool_input: u8,
}

impl Default for StatusFrame {
    fn default() -> Self {
        Self {
            state: ArmState::Stop,
            mode: ArmMode::Automatic,
            motion_done: false,
            collision: false,
            emergency_stop: false,
            main_error: 0,
            sub_error: 0,
            joint_positions: [0.0; 6],
            cartesian: CartesianVector::default(),
            joint_torques: [0.0; 6],
            digital_output_low: 0,
            digital_output_high: 0,
            digital_input_low: 0,
            digital_input_high: 0,
            tool_output: 0,
            tool_input: 0,
        }
    }
}

impl StatusFrame {
    /// Whether either hardware error register is nonzero.
    pub fn has_error(&self) -> bool {
        self.main_error != 0 || self.sub_error != 0
    }

    /// Digital output bit by index; ids 0-7 come from the low group,
    /// 8-15 from the high group, anything else reads as 0.
    pub fn digital_output(&self, id: u8) -> u8 {
        bit_group(self.digital_output_low, self.digital_output_high, id)
    }

    pub fn digital_input(&self, id: u8) -> u8 {
        bit_group(self.digital_input_low, self.digital_input_high, id)
    }

    /// Tool digital output bit (ids 0-1).
    pub fn tool_digital_output(&self, id: u8) -> u8 {
        if id < 2 {
            (self.tool_output >> id) & 0x01
        } else {
            0
        }
    }

    /// Tool digital input bit (ids 0-1). The controller maps tool inputs
    /// starting at bit 1 of the register.
    pub fn tool_digital_input(&self, id: u8) -> u8 {
        if id < 2 {
            (self.tool_input >> (id + 1)) & 0x01
        } else {
            0
        }
    }
}

fn bit_group(low: u8, high: u8, id: u8) -> u8 {
    match id {
        0..=7 => (low >> id) & 0x01,
        8..=15 => (high >> (id - 8)) & 0x01,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_vector_ops() {
        let a = JointVector::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = JointVector::splat(1.0);

        let sum = a + b;
        assert_eq!(sum.j1, Some(2.0));
        assert_eq!(sum.j6, Some(7.0));

        let scaled = a * 2.0;
        assert_eq!(scaled.j3, Some(6.0));

        let divided = a / 2.0;
        assert_eq!(divided.j4, Some(2.0));
    }

    #[test]
    fn test_joint_vector_none_propagates() {
        let threshold = JointVector {
            j5: Some(0.05),
            ..Default::default()
        };

        let scaled = threshold / 10.0;
        assert_eq!(scaled.j5, Some(0.005));
        assert_eq!(scaled.j1, None);

        let resolved = threshold.resolve(1e9);
        assert_eq!(resolved[4], 0.05);
        assert_eq!(resolved[0], 1e9);
        assert_eq!(resolved[5], 1e9);
    }

    #[test]
    fn test_cartesian_ops() {
        let a = CartesianVector::from_array([1.0, 2.0, 3.0, 10.0, 20.0, 30.0]);
        let b = CartesianVector::from_array([4.0, 6.0, 3.0, 0.0, 0.0, 0.0]);

        let diff = b - a;
        assert_eq!(diff.x, 3.0);
        assert_eq!(diff.y, 4.0);

        let scaled = a * 2.0;
        assert_eq!(scaled.roll, 20.0);
    }

    #[test]
    fn test_linear_distance_ignores_orientation() {
        let a = CartesianVector::from_array([0.0, 0.0, 0.0, 90.0, 0.0, -45.0]);
        let b = CartesianVector::from_array([3.0, 4.0, 0.0, -90.0, 180.0, 45.0]);
        assert!((a.linear_distance(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(ArmState::from_code(3).unwrap(), ArmState::Suspend);
        assert_eq!(
            ArmState::from_code(0),
            Err(DecodeError::RobotState(0)),
            "code 0 is outside the valid range"
        );
        assert_eq!(ArmMode::from_code(1).unwrap(), ArmMode::Manual);
        assert!(ArmMode::from_code(2).is_err());
        assert_eq!(CollisionStrategy::ImpactRebound.code(), 5);
        assert_eq!(CoordinateSystem::Tool.code(), 2);
    }

    #[test]
    fn test_digital_io_bits() {
        let frame = StatusFrame {
            digital_output_low: 0b0000_0101,
            digital_output_high: 0b0000_0001,
            digital_input_low: 0b1000_0000,
            tool_output: 0b0000_0010,
            tool_input: 0b0000_0110,
            ..Default::default()
        };

        assert_eq!(frame.digital_output(0), 1);
        assert_eq!(frame.digital_output(1), 0);
        assert_eq!(frame.digital_output(2), 1);
        assert_eq!(frame.digital_output(8), 1);
        assert_eq!(frame.digital_output(9), 0);
        assert_eq!(frame.digital_output(16), 0);

        assert_eq!(frame.digital_input(7), 1);

        assert_eq!(frame.tool_digital_output(0), 0);
        assert_eq!(frame.tool_digital_output(1), 1);
        assert_eq!(frame.tool_digital_output(5), 0);

        // Tool inputs start at bit 1 of the register
        assert_eq!(frame.tool_digital_input(0), 1);
        assert_eq!(frame.tool_digital_input(1), 1);
        assert_eq!(frame.tool_digital_input(2), 0);
    }
}
