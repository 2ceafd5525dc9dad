//! Differential-drive forward kinematics and state integration.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::KinematicsError;
use crate::pose::{Pose, Twist};

/// Left and right wheel angular velocities commanded for one time step.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelVelocityCommand {
    /// Left wheel angular velocity (rad/s).
    pub omega_l: f64,
    /// Right wheel angular velocity (rad/s).
    pub omega_r: f64,
}

impl WheelVelocityCommand {
    /// Construct a wheel velocity command.
    ///
    /// # Arguments
    ///
    /// * `omega_l`: Left wheel angular velocity (rad/s).
    /// * `omega_r`: Right wheel angular velocity (rad/s).
    pub const fn new(omega_l: f64, omega_r: f64) -> Self {
        WheelVelocityCommand { omega_l, omega_r }
    }
}

impl fmt::Display for WheelVelocityCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ωL: {:.2} rad/s, ωR: {:.2} rad/s)", self.omega_l, self.omega_r)
    }
}

/// Absolute pose together with the body-frame twist the robot is moving with.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicState {
    /// World-frame pose.
    pub pose: Pose,
    /// Body-frame velocity.
    pub twist: Twist,
}

impl KinematicState {
    /// Construct a state from a pose and a twist.
    pub const fn new(pose: Pose, twist: Twist) -> Self {
        KinematicState { pose, twist }
    }

    /// A robot standing still at `pose`.
    pub const fn at_rest(pose: Pose) -> Self {
        KinematicState {
            pose,
            twist: Twist::zero(),
        }
    }
}

impl fmt::Display for KinematicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.pose, self.twist)
    }
}

/// Differential‑drive kinematics helper.
///
/// This struct encapsulates the physical parameters of a differential-drive robot
/// (the two wheel radii and the wheel separation) and provides methods for
/// kinematic calculations.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDrive {
    /// Left wheel radius (m).
    radius_left: f64,
    /// Right wheel radius (m).
    radius_right: f64,
    /// Distance between the two wheel contact points (m).
    axle_length: f64,
}

// Deserialized drives are validated like constructed ones.
#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for DifferentialDrive {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawDrive {
            radius_left: f64,
            radius_right: f64,
            axle_length: f64,
        }

        let raw = RawDrive::deserialize(deserializer)?;
        DifferentialDrive::with_radii(raw.radius_left, raw.radius_right, raw.axle_length).map_err(de::Error::custom)
    }
}

impl DifferentialDrive {
    /// Construct a drive whose wheels share the same radius.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidWheelRadius)` if `wheel_radius` is not positive.
    /// Returns `Err(KinematicsError::InvalidAxleLength)` if `axle_length` is not positive.
    pub const fn new(wheel_radius: f64, axle_length: f64) -> Result<Self, KinematicsError> {
        Self::with_radii(wheel_radius, wheel_radius, axle_length)
    }

    /// Construct a drive with independent left and right wheel radii.
    ///
    /// # Arguments
    ///
    /// * `radius_left`: The radius of the left wheel in meters.
    /// * `radius_right`: The radius of the right wheel in meters.
    /// * `axle_length`: The distance between the centers of the two drive wheels in meters.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidWheelRadius)` if either radius is not positive.
    /// Returns `Err(KinematicsError::InvalidAxleLength)` if `axle_length` is not positive.
    pub const fn with_radii(
        radius_left: f64,
        radius_right: f64,
        axle_length: f64,
    ) -> Result<Self, KinematicsError> {
        if !(radius_left > 0.0) || !(radius_right > 0.0) {
            return Err(KinematicsError::InvalidWheelRadius("must be positive"));
        }
        if !(axle_length > 0.0) {
            return Err(KinematicsError::InvalidAxleLength("must be positive"));
        }
        Ok(DifferentialDrive {
            radius_left,
            radius_right,
            axle_length,
        })
    }

    /// Returns the left wheel radius.
    pub fn radius_left(&self) -> f64 {
        self.radius_left
    }

    /// Returns the right wheel radius.
    pub fn radius_right(&self) -> f64 {
        self.radius_right
    }

    /// Returns the axle length.
    pub fn axle_length(&self) -> f64 {
        self.axle_length
    }

    /// Calculates the body-frame twist produced by the given wheel velocities.
    /// This is the forward kinematics problem.
    ///
    /// The linear velocity is the mean of the two wheel surface speeds and the
    /// angular velocity is their difference over the wheel separation.
    pub fn twist_from_wheel_velocities(&self, command: WheelVelocityCommand) -> Twist {
        let v_l = command.omega_l * self.radius_left;
        let v_r = command.omega_r * self.radius_right;

        Twist::new((v_r + v_l) / 2.0, (v_r - v_l) / self.axle_length)
    }

    /// Advances `current_pose` by holding `twist` for `dt` seconds.
    ///
    /// The motion is integrated in closed form (a circular arc for constant
    /// angular velocity), so the result does not depend on how the interval is
    /// subdivided. The final heading is normalized to `[-PI, PI)`.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn update_pose(&self, current_pose: Pose, twist: Twist, dt: f64) -> Result<Pose, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }

        Ok(current_pose.compose(twist.exp(dt)))
    }

    /// Integrates one wheel command over `dt` seconds.
    ///
    /// This method first converts `command` into a body-frame twist and then
    /// advances the pose of `state` with [`DifferentialDrive::update_pose`].
    /// The returned state carries the commanded twist.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn integrate(
        &self,
        state: &KinematicState,
        command: WheelVelocityCommand,
        dt: f64,
    ) -> Result<KinematicState, KinematicsError> {
        let twist = self.twist_from_wheel_velocities(command);
        let pose = self.update_pose(state.pose, twist, dt)?;
        Ok(KinematicState::new(pose, twist))
    }
}

impl fmt::Display for DifferentialDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DifferentialDrive (rL: {:.3} m, rR: {:.3} m, L: {:.3} m)",
            self.radius_left, self.radius_right, self.axle_length
        )
    }
}
