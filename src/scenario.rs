use std::fmt;

use anyhow::Context;
use lanesim_kinematics::{DifferentialDrive, Pose, WheelVelocityCommand};
use lanesim_world::{
    ContinuityTracker, LaneCatalog, LaneMatchResult, LaneMatcher, SampledSequence, WorldError, build_trajectory,
};
use tracing::{debug, info, info_span, warn};

use crate::config::{MapSettings, MatchingSettings, RobotSettings};

/// Outcome of driving one robot through the map.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub robot: String,
    pub samples: usize,
    pub on_lane: usize,
    pub lane_changes: usize,
    pub final_pose: Pose,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} samples on a lane, {} lane changes, final pose {}",
            self.robot, self.on_lane, self.samples, self.lane_changes, self.final_pose
        )
    }
}

/// Places every configured tile.
pub fn build_catalog(map: &MapSettings) -> Result<LaneCatalog, WorldError> {
    let mut builder = LaneCatalog::builder().with_tile_size(map.tile_size)?;
    for tile in &map.tiles {
        builder.place_tile(tile.i, tile.j, tile.kind, tile.rotation)?;
    }
    Ok(builder.build())
}

/// Builds the robot's trajectory and matches every pose against the catalog.
pub fn run_robot(
    catalog: &LaneCatalog,
    matching: &MatchingSettings,
    robot: &RobotSettings,
) -> anyhow::Result<ScenarioReport> {
    let _span = info_span!("robot", name = %robot.name).entered();

    let drive = DifferentialDrive::new(robot.wheel_radius, robot.axle_length)
        .with_context(|| format!("invalid wheel geometry for robot {}", robot.name))?;
    let commands = SampledSequence::from_pairs(
        robot
            .commands
            .iter()
            .map(|c| (c.t, WheelVelocityCommand::new(c.omega_l, c.omega_r))),
    )
    .and_then(|commands| commands.upsample(robot.upsample))
    .with_context(|| format!("invalid command sequence for robot {}", robot.name))?;

    let initial_pose = robot.initial_pose;
    let states = build_trajectory(&drive, initial_pose, &commands)
        .with_context(|| format!("failed to integrate commands for robot {}", robot.name))?;
    info!(%drive, samples = states.len(), "Trajectory built");

    let mut matcher = LaneMatcher::new(catalog);
    if let Some(tolerance) = matching.lateral_tolerance {
        matcher = matcher.with_tolerance(tolerance);
    }
    let mut tracker = ContinuityTracker::new(matching.policy);

    let mut on_lane = 0;
    let mut lane_changes = 0;
    let mut current_lane: Option<&str> = None;

    for (t, state) in &states {
        let matches: Vec<LaneMatchResult<'_>> = if matching.continuity {
            tracker.select(matcher.query(&state.pose))
        } else {
            matcher.query_ranked(&state.pose, &matching.policy)
        };

        let Some(best) = matches.first() else {
            warn!(t, pose = %state.pose, "Robot is off-lane");
            continue;
        };

        on_lane += 1;
        if current_lane.is_some_and(|lane| lane != best.name) {
            lane_changes += 1;
        }
        current_lane = Some(best.name);
        debug!(
            t,
            lane = best.name,
            candidates = matches.len(),
            along = best.lane_pose.along_lane,
            lateral = best.lane_pose.lateral,
            relative_heading = best.lane_pose.relative_heading,
            "Lane match"
        );
    }

    let final_pose = states.values().last().map(|s| s.pose).unwrap_or(initial_pose);
    Ok(ScenarioReport {
        robot: robot.name.clone(),
        samples: states.len(),
        on_lane,
        lane_changes,
        final_pose,
    })
}
