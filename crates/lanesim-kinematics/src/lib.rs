#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for planar rigid transforms and differential-drive robot kinematics."]
#![doc = ""]
#![doc = "This crate provides SE(2) poses with composition and inversion, body-frame twists,"]
#![doc = "wheel velocity commands and an exact closed-form integrator that advances a"]
#![doc = "kinematic state from wheel commands."]

pub mod drive;
pub mod error;
pub mod pose;

pub use drive::{DifferentialDrive, KinematicState, WheelVelocityCommand};
pub use error::KinematicsError;
pub use pose::{Pose, Twist, angle_diff, normalize_angle};
