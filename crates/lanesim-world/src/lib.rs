//! Lane geometry and lane matching for tiled road worlds.
//!
//! This crate builds on `lanesim-kinematics` and provides:
//! - [`LaneSegment`] centerlines with conversions between world poses and [`LanePose`]s
//! - Tile lane templates and a named [`LaneCatalog`] of placed lanes
//! - [`SampledSequence`], a time-indexed series of samples
//! - Trajectory building from timed wheel commands
//! - Lane matching with pluggable ranking ([`MatchRanking`])

#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod lane;
pub mod matching;
pub mod sequence;
pub mod templates;
pub mod trajectory;

pub use catalog::{LaneCatalog, LaneCatalogBuilder, LaneRef, PlacedObject, Placement, TileKind};
pub use error::WorldError;
pub use lane::{DEFAULT_ALONG_MARGIN, LanePose, LaneSegment};
pub use matching::{
    ByLateralOffset, ByRelativeHeading, ContinuityTracker, LaneMatchResult, LaneMatcher, MatchRanking, PreferLane,
    RankingPolicy, match_pose, rank_matches,
};
pub use sequence::SampledSequence;
pub use templates::{TILE_LANE_OFFSET, TILE_LANE_WIDTH, curve_left_lane, curve_right_lane, lane_templates, straight_lane};
pub use trajectory::{Trajectory, TrajectoryIter, build_trajectory};
