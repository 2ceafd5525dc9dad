//! This module defines the error types used by the `lanesim-world` crate.

use lanesim_kinematics::KinematicsError;

/// Error type for lane geometry, catalog and trajectory operations.
///
/// Configuration variants (`InvalidControlPoints`, `InvalidLaneWidth`,
/// `InvalidMargin`, `InvalidScale`, `DuplicateName`) are raised at construction time.
/// `NoMatch` is an expected outcome of querying a pose that does not lie on a
/// lane and is meant to be handled by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldError {
    /// A lane segment needs at least two distinct, finite control points.
    InvalidControlPoints(&'static str),
    /// Lane width must be positive.
    InvalidLaneWidth(&'static str),
    /// The along-lane extrapolation margin must be finite and non-negative.
    InvalidMargin(&'static str),
    /// Tile sizes and scale factors must be finite and positive.
    InvalidScale(&'static str),
    /// The pose does not lie on the lane within the requested tolerance.
    NoMatch(&'static str),
    /// An along-lane coordinate lies beyond the extrapolation margin.
    OutOfDomain(&'static str),
    /// Sequence timestamps must be finite and strictly increasing.
    UnorderedTimestamps(&'static str),
    /// Timestamps and values of a sequence differ in length.
    LengthMismatch(&'static str),
    /// The operation needs at least one sample.
    EmptySequence(&'static str),
    /// Upsampling factor must be at least one.
    InvalidUpsampleFactor(&'static str),
    /// A catalog entry with this name already exists.
    DuplicateName(String),
    /// Error raised by the kinematic model.
    Kinematics(KinematicsError),
}

impl WorldError {
    /// Whether this is the recoverable "pose is not on this lane" outcome.
    pub fn is_no_match(&self) -> bool {
        matches!(self, WorldError::NoMatch(_) | WorldError::OutOfDomain(_))
    }
}

impl From<KinematicsError> for WorldError {
    fn from(err: KinematicsError) -> Self {
        WorldError::Kinematics(err)
    }
}

impl core::fmt::Display for WorldError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WorldError::InvalidControlPoints(msg) => write!(f, "Invalid control points: {}", msg),
            WorldError::InvalidLaneWidth(msg) => write!(f, "Invalid lane width: {}", msg),
            WorldError::InvalidMargin(msg) => write!(f, "Invalid along-lane margin: {}", msg),
            WorldError::InvalidScale(msg) => write!(f, "Invalid scale: {}", msg),
            WorldError::NoMatch(msg) => write!(f, "No lane match: {}", msg),
            WorldError::OutOfDomain(msg) => write!(f, "Along-lane coordinate out of domain: {}", msg),
            WorldError::UnorderedTimestamps(msg) => write!(f, "Invalid timestamps: {}", msg),
            WorldError::LengthMismatch(msg) => write!(f, "Length mismatch: {}", msg),
            WorldError::EmptySequence(msg) => write!(f, "Empty sequence: {}", msg),
            WorldError::InvalidUpsampleFactor(msg) => write!(f, "Invalid upsample factor: {}", msg),
            WorldError::DuplicateName(name) => write!(f, "Duplicate catalog entry: {}", name),
            WorldError::Kinematics(err) => write!(f, "Kinematics error: {}", err),
        }
    }
}

impl core::error::Error for WorldError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            WorldError::Kinematics(err) => Some(err),
            _ => None,
        }
    }
}
