//! Planar rigid transforms and body-frame twists.

use core::f64::consts::PI;
use core::fmt;
use core::ops::Mul;
use libm::{cos, sin, sqrt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

/// Below this rotation the closed-form exponential switches to its series expansion.
const SMALL_ANGLE: f64 = 1e-9;

/// Normalize an angle to be within `[-PI, PI)`.
///
/// Angles at `PI` will be normalized to `-PI`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % (2.0 * PI);
    if a >= PI {
        a - 2.0 * PI
    } else if a < -PI {
        a + 2.0 * PI
    } else {
        a
    }
}

/// Signed shortest rotation taking heading `from` onto heading `to`.
pub fn angle_diff(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// A 2‑D pose `(x, y, θ)` in meters and radians (θ measured counter‑clockwise
/// from the x‑axis of the parent frame).
///
/// A pose doubles as an element of SE(2): [`Pose::compose`] is the group
/// product and [`Pose::inverse`] the group inverse. Every operation returns a
/// new value with the heading normalized to `[-PI, PI)`.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Parent-frame x position (m).
    pub x: f64,
    /// Parent-frame y position (m).
    pub y: f64,
    /// Heading (rad), normalized to `[-PI, PI)`.
    pub theta: f64,
}

// Deserialized poses go through `Pose::new` so the heading is normalized.
#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Pose {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawPose {
            x: f64,
            y: f64,
            theta: f64,
        }

        let raw = RawPose::deserialize(deserializer)?;
        Ok(Pose::new(raw.x, raw.y, raw.theta))
    }
}

impl Pose {
    /// Construct a new pose, normalizing the heading.
    ///
    /// # Arguments
    ///
    /// * `x`: Parent-frame x position in meters.
    /// * `y`: Parent-frame y position in meters.
    /// * `theta`: Heading in radians.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// The identity transform.
    pub const fn identity() -> Self {
        Pose {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// A pure rotation about the origin.
    pub fn from_rotation(theta: f64) -> Self {
        Pose::new(0.0, 0.0, theta)
    }

    /// Apply `other` in the frame of `self` (the SE(2) product `self * other`).
    pub fn compose(self, other: Pose) -> Pose {
        let (x, y) = self.transform_point(other.x, other.y);
        Pose::new(x, y, self.theta + other.theta)
    }

    /// The transform that undoes `self`.
    pub fn inverse(self) -> Pose {
        let (s, c) = (sin(self.theta), cos(self.theta));
        Pose::new(
            -c * self.x - s * self.y,
            s * self.x - c * self.y,
            -self.theta,
        )
    }

    /// Pose of `other` expressed in the frame of `self`.
    ///
    /// `self.compose(self.relative(other))` recovers `other`.
    pub fn relative(self, other: Pose) -> Pose {
        self.inverse().compose(other)
    }

    /// Map a point given in this pose's frame into the parent frame.
    pub fn transform_point(self, px: f64, py: f64) -> (f64, f64) {
        let (s, c) = (sin(self.theta), cos(self.theta));
        (self.x + c * px - s * py, self.y + s * px + c * py)
    }

    /// Euclidean distance between the positions of two poses.
    pub fn distance(self, other: Pose) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        sqrt(dx * dx + dy * dy)
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.compose(rhs)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.3}, y: {:.3}, θ: {:.3} rad)", self.x, self.y, self.theta)
    }
}

/// A twist expressed in the robot base frame.
/// A twist represents the linear and angular velocities of the robot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    /// Linear x velocity (m/s) in the robot's base frame.
    pub vx: f64,
    /// Angular z velocity (rad/s) around the robot's base frame z-axis.
    pub wz: f64,
}

impl Twist {
    /// Construct a new twist.
    ///
    /// # Arguments
    ///
    /// * `vx`: Linear velocity along the robot's x-axis (m/s).
    /// * `wz`: Angular velocity around the robot's z-axis (rad/s).
    pub const fn new(vx: f64, wz: f64) -> Self {
        Twist { vx, wz }
    }

    /// The twist of a body at rest.
    pub const fn zero() -> Self {
        Twist { vx: 0.0, wz: 0.0 }
    }

    /// Rigid motion produced by holding this twist for `dt` seconds.
    ///
    /// This is the SE(2) exponential map: the body follows a circular arc of
    /// radius `vx / wz` (a straight line when `wz` is zero), so heading and
    /// position stay coupled exactly however long the step is.
    pub fn exp(self, dt: f64) -> Pose {
        let distance = self.vx * dt;
        let dtheta = self.wz * dt;

        if dtheta.abs() < SMALL_ANGLE {
            // sin(a)/a and (1 - cos(a))/a to second order
            return Pose::new(
                distance * (1.0 - dtheta * dtheta / 6.0),
                distance * dtheta / 2.0,
                dtheta,
            );
        }

        let radius = distance / dtheta;
        let half_sin = sin(dtheta / 2.0);
        // 1 - cos(a) written as 2 sin²(a/2) to avoid cancellation
        Pose::new(radius * sin(dtheta), radius * 2.0 * half_sin * half_sin, dtheta)
    }
}

impl fmt::Display for Twist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(vx: {:.2} m/s, ωz: {:.2} rad/s)", self.vx, self.wz)
    }
}
