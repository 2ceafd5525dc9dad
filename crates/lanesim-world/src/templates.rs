//! Canonical lanes of a unit road tile.
//!
//! Tiles are one unit wide and centered on the origin; traffic drives on the
//! right, so the template lanes enter the tile from the `-x` edge at
//! `y = -TILE_LANE_OFFSET`.

use std::f64::consts::FRAC_PI_2;

use lanesim_kinematics::Pose;

use crate::error::WorldError;
use crate::lane::LaneSegment;

/// Distance between a lane centerline and the tile's center line.
pub const TILE_LANE_OFFSET: f64 = 0.22;

/// Width of a tile lane.
pub const TILE_LANE_WIDTH: f64 = 0.376;

/// Number of control points used to approximate a quarter circle.
const ARC_CONTROL_POINTS: usize = 3;

/// Straight lane crossing the tile from `-x` to `+x`.
pub fn straight_lane() -> Result<LaneSegment, WorldError> {
    LaneSegment::new(
        vec![
            Pose::new(-0.5, -TILE_LANE_OFFSET, 0.0),
            Pose::new(0.5, -TILE_LANE_OFFSET, 0.0),
        ],
        TILE_LANE_WIDTH,
    )
}

/// Lane turning left around the tile's `(-x, +y)` corner, leaving through the `+y` edge.
pub fn curve_left_lane() -> Result<LaneSegment, WorldError> {
    arc_lane((-0.5, 0.5), 0.5 + TILE_LANE_OFFSET, -FRAC_PI_2, FRAC_PI_2)
}

/// Lane turning right around the tile's `(-x, -y)` corner, leaving through the `-y` edge.
pub fn curve_right_lane() -> Result<LaneSegment, WorldError> {
    arc_lane((-0.5, -0.5), 0.5 - TILE_LANE_OFFSET, FRAC_PI_2, -FRAC_PI_2)
}

/// All template lanes keyed by their catalog name.
pub fn lane_templates() -> Result<Vec<(&'static str, LaneSegment)>, WorldError> {
    Ok(vec![
        ("straight/lane", straight_lane()?),
        ("curve_left/lane", curve_left_lane()?),
        ("curve_right/lane", curve_right_lane()?),
    ])
}

/// Circular lane sampled at evenly spaced angles; positive sweep turns left.
fn arc_lane(center: (f64, f64), radius: f64, start_angle: f64, sweep: f64) -> Result<LaneSegment, WorldError> {
    let tangent = if sweep >= 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 };
    let points = (0..ARC_CONTROL_POINTS)
        .map(|k| {
            let phi = start_angle + sweep * k as f64 / (ARC_CONTROL_POINTS - 1) as f64;
            Pose::new(center.0 + radius * phi.cos(), center.1 + radius * phi.sin(), phi + tangent)
        })
        .collect();
    LaneSegment::new(points, TILE_LANE_WIDTH)
}
