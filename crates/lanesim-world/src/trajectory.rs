//! Integration of timed wheel commands into a trajectory of kinematic states.

use lanesim_kinematics::{DifferentialDrive, KinematicState, KinematicsError, Pose, WheelVelocityCommand};

use crate::error::WorldError;
use crate::sequence::SampledSequence;

/// A differential-drive robot driven by a command sequence from an initial pose.
///
/// Command `i` is held from `t_i` until `t_{i+1}`; the last command only marks
/// the end of the horizon. The trajectory yields one state per command
/// timestamp, starting with the initial pose at rest.
#[derive(Debug, Clone, Copy)]
pub struct Trajectory<'a> {
    drive: &'a DifferentialDrive,
    initial_pose: Pose,
    commands: &'a SampledSequence<WheelVelocityCommand>,
}

impl<'a> Trajectory<'a> {
    /// Borrows the drive and commands; nothing is integrated until iteration.
    pub fn new(
        drive: &'a DifferentialDrive,
        initial_pose: Pose,
        commands: &'a SampledSequence<WheelVelocityCommand>,
    ) -> Self {
        Trajectory { drive, initial_pose, commands }
    }

    /// Lazily integrates the commands. Each call starts again from the initial pose.
    pub fn iter(&self) -> TrajectoryIter<'a> {
        TrajectoryIter {
            drive: self.drive,
            commands: self.commands,
            index: 0,
            state: KinematicState::at_rest(self.initial_pose),
        }
    }

    /// Integrates the commands and keeps only the poses.
    pub fn poses(&self) -> Result<SampledSequence<Pose>, WorldError> {
        let samples = self
            .iter()
            .map(|sample| sample.map(|(t, state)| (t, state.pose)))
            .collect::<Result<Vec<_>, _>>()?;
        SampledSequence::from_pairs(samples)
    }
}

impl<'a> IntoIterator for &Trajectory<'a> {
    type Item = Result<(f64, KinematicState), KinematicsError>;
    type IntoIter = TrajectoryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over `(timestamp, state)` pairs of a [`Trajectory`].
///
/// Stops after the first integration error.
#[derive(Debug, Clone)]
pub struct TrajectoryIter<'a> {
    drive: &'a DifferentialDrive,
    commands: &'a SampledSequence<WheelVelocityCommand>,
    index: usize,
    state: KinematicState,
}

impl Iterator for TrajectoryIter<'_> {
    type Item = Result<(f64, KinematicState), KinematicsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let timestamps = self.commands.timestamps();
        if self.index >= timestamps.len() {
            return None;
        }
        if self.index == 0 {
            self.index = 1;
            return Some(Ok((timestamps[0], self.state)));
        }

        let t = timestamps[self.index];
        let dt = t - timestamps[self.index - 1];
        let command = self.commands.values()[self.index - 1];
        match self.drive.integrate(&self.state, command, dt) {
            Ok(next) => {
                self.state = next;
                self.index += 1;
                Some(Ok((t, next)))
            }
            Err(e) => {
                self.index = timestamps.len();
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.commands.len().saturating_sub(self.index);
        (0, Some(remaining))
    }
}

/// Integrates `commands` from `initial_pose` and collects every state.
///
/// # Returns
/// * `Result<SampledSequence<KinematicState>, WorldError>` - One state per command timestamp
pub fn build_trajectory(
    drive: &DifferentialDrive,
    initial_pose: Pose,
    commands: &SampledSequence<WheelVelocityCommand>,
) -> Result<SampledSequence<KinematicState>, WorldError> {
    if commands.is_empty() {
        return Err(WorldError::EmptySequence("a trajectory needs at least one command"));
    }

    let trajectory = Trajectory::new(drive, initial_pose, commands);
    let samples = trajectory.iter().collect::<Result<Vec<_>, _>>()?;
    let states = SampledSequence::from_pairs(samples)?;

    if let Some(last) = states.values().last() {
        tracing::debug!(samples = states.len(), final_pose = %last.pose, "Trajectory built");
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanesim_kinematics::angle_diff;
    const EPSILON: f64 = 1e-9;

    fn drive() -> DifferentialDrive {
        DifferentialDrive::new(0.1, 0.5).unwrap()
    }

    #[test]
    fn test_first_state_is_initial_pose_at_rest() {
        let commands = SampledSequence::from_pairs([(2.0, WheelVelocityCommand::new(1.0, 1.0))]).unwrap();
        let start = Pose::new(1.0, 2.0, 0.5);
        let states = build_trajectory(&drive(), start, &commands).unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states.timestamps(), &[2.0]);
        assert_eq!(states.values()[0], KinematicState::at_rest(start));
    }

    #[test]
    fn test_command_held_until_next_timestamp() {
        // 10 rad/s on both wheels of radius 0.1 is 1 m/s straight ahead
        let commands = SampledSequence::from_pairs([
            (0.0, WheelVelocityCommand::new(10.0, 10.0)),
            (2.0, WheelVelocityCommand::new(0.0, 0.0)),
            (3.0, WheelVelocityCommand::new(0.0, 0.0)),
        ])
        .unwrap();
        let states = build_trajectory(&drive(), Pose::identity(), &commands).unwrap();
        assert_eq!(states.len(), 3);
        assert!((states.values()[1].pose.x - 2.0).abs() < EPSILON);
        assert!((states.values()[1].twist.vx - 1.0).abs() < EPSILON);
        assert!((states.values()[2].pose.x - 2.0).abs() < EPSILON);
        assert!(states.values()[2].twist.vx.abs() < EPSILON);
    }

    #[test]
    fn test_upsampling_does_not_change_end_pose() {
        let commands = SampledSequence::from_pairs([
            (0.0, WheelVelocityCommand::new(3.0, 5.0)),
            (1.5, WheelVelocityCommand::new(5.0, 2.0)),
            (2.0, WheelVelocityCommand::new(0.0, 0.0)),
        ])
        .unwrap();
        let coarse = build_trajectory(&drive(), Pose::identity(), &commands).unwrap();
        let fine = build_trajectory(&drive(), Pose::identity(), &commands.upsample(7).unwrap()).unwrap();
        let a = coarse.values().last().unwrap().pose;
        let b = fine.values().last().unwrap().pose;
        assert!(a.distance(b) < EPSILON);
        assert!(angle_diff(a.theta, b.theta).abs() < EPSILON);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let commands = SampledSequence::from_pairs([
            (0.0, WheelVelocityCommand::new(1.0, 2.0)),
            (1.0, WheelVelocityCommand::new(1.0, 2.0)),
        ])
        .unwrap();
        let drive = drive();
        let trajectory = Trajectory::new(&drive, Pose::identity(), &commands);
        let first: Vec<_> = trajectory.iter().collect::<Result<_, _>>().unwrap();
        let second: Vec<_> = (&trajectory).into_iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);

        let poses = trajectory.poses().unwrap();
        assert_eq!(poses.timestamps(), &[0.0, 1.0]);
        assert_eq!(poses.values()[1], first[1].1.pose);
    }

    #[test]
    fn test_empty_commands() {
        let commands: SampledSequence<WheelVelocityCommand> = SampledSequence::new(vec![], vec![]).unwrap();
        let result = build_trajectory(&drive(), Pose::identity(), &commands);
        assert!(matches!(result, Err(WorldError::EmptySequence(_))));
        let drive = drive();
        assert_eq!(Trajectory::new(&drive, Pose::identity(), &commands).iter().count(), 0);
    }
}
