//! Lane segment geometry and the lane pose coordinate system.
//!
//! A [`LaneSegment`] is a centerline described by an ordered list of control
//! poses. Positions are interpolated linearly between consecutive control
//! points and headings along the shortest arc, which gives every along-lane
//! coordinate a local frame (the *center point*). A [`LanePose`] expresses an
//! absolute pose relative to that frame.

use std::fmt;

use lanesim_kinematics::{Pose, angle_diff, normalize_angle};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::WorldError;

/// Default distance a lane may be extrapolated beyond either end.
pub const DEFAULT_ALONG_MARGIN: f64 = 0.05;

/// Control points closer than this are considered coincident.
const MIN_INTERVAL_LENGTH: f64 = 1e-9;

/// Residuals below this are treated as an exact root.
const ROOT_EPSILON: f64 = 1e-12;

const BISECTION_STEPS: usize = 64;

/// A pose expressed relative to a lane's centerline.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LanePose {
    /// Distance traveled along the centerline from the first control point.
    pub along_lane: f64,
    /// Signed offset from the centerline, positive to the left of the travel direction.
    pub lateral: f64,
    /// Heading relative to the centerline tangent, normalized to `[-PI, PI)`.
    pub relative_heading: f64,
}

impl LanePose {
    /// Construct a lane pose, normalizing the relative heading.
    pub fn new(along_lane: f64, lateral: f64, relative_heading: f64) -> Self {
        LanePose {
            along_lane,
            lateral,
            relative_heading: normalize_angle(relative_heading),
        }
    }

    /// A pose on the centerline, aligned with the lane.
    pub fn on_centerline(along_lane: f64) -> Self {
        LanePose::new(along_lane, 0.0, 0.0)
    }

    /// Unsigned distance from the centerline.
    pub fn distance_from_center(&self) -> f64 {
        self.lateral.abs()
    }

    /// Whether the pose faces the lane's direction of travel.
    pub fn is_correct_direction(&self) -> bool {
        self.relative_heading.abs() < std::f64::consts::FRAC_PI_2
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for LanePose {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawLanePose {
            along_lane: f64,
            lateral: f64,
            relative_heading: f64,
        }

        let raw = RawLanePose::deserialize(deserializer)?;
        Ok(LanePose::new(raw.along_lane, raw.lateral, raw.relative_heading))
    }
}

impl fmt::Display for LanePose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(along: {:.3}, lateral: {:.3}, rel. heading: {:.3} rad)",
            self.along_lane, self.lateral, self.relative_heading
        )
    }
}

/// A lane centerline defined by two or more control poses.
///
/// Control points are immutable once the segment is built; the chord length
/// of every interval and the cumulative length table are computed once in
/// [`LaneSegment::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct LaneSegment {
    control_points: Vec<Pose>,
    width: f64,
    along_margin: f64,
    /// Chord length of each interval (N - 1 entries).
    interval_lengths: Vec<f64>,
    /// Along-lane coordinate of each control point (N entries, starting at 0).
    cumulative: Vec<f64>,
}

impl LaneSegment {
    /// Creates a lane segment from its control points, in traversal order.
    ///
    /// # Arguments
    /// * `control_points` - Centerline poses, at least two, consecutive points distinct
    /// * `width` - Lane width in the same unit as the control points
    ///
    /// # Returns
    /// * `Result<Self, WorldError>` - The segment, or a configuration error
    pub fn new(control_points: Vec<Pose>, width: f64) -> Result<Self, WorldError> {
        if control_points.len() < 2 {
            return Err(WorldError::InvalidControlPoints("at least two control points are required"));
        }
        if control_points
            .iter()
            .any(|p| !(p.x.is_finite() && p.y.is_finite() && p.theta.is_finite()))
        {
            return Err(WorldError::InvalidControlPoints("coordinates must be finite"));
        }
        if !(width > 0.0 && width.is_finite()) {
            return Err(WorldError::InvalidLaneWidth("must be positive"));
        }

        let interval_lengths: Vec<f64> = control_points
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .collect();
        if interval_lengths.iter().any(|&len| len < MIN_INTERVAL_LENGTH) {
            return Err(WorldError::InvalidControlPoints("consecutive control points coincide"));
        }

        let mut cumulative = Vec::with_capacity(control_points.len());
        cumulative.push(0.0);
        let mut total = 0.0;
        for len in &interval_lengths {
            total += len;
            cumulative.push(total);
        }

        Ok(LaneSegment {
            control_points,
            width,
            along_margin: DEFAULT_ALONG_MARGIN,
            interval_lengths,
            cumulative,
        })
    }

    /// Sets how far beyond either end along-lane coordinates may extrapolate.
    pub fn with_along_margin(mut self, margin: f64) -> Result<Self, WorldError> {
        if !(margin >= 0.0 && margin.is_finite()) {
            return Err(WorldError::InvalidMargin("must be finite and non-negative"));
        }
        self.along_margin = margin;
        Ok(self)
    }

    /// Returns a copy with every position, the width and the margin scaled by `factor`.
    pub fn scaled(&self, factor: f64) -> Result<Self, WorldError> {
        if !(factor > 0.0 && factor.is_finite()) {
            return Err(WorldError::InvalidScale("scale factor must be finite and positive"));
        }
        let points = self
            .control_points
            .iter()
            .map(|p| Pose::new(p.x * factor, p.y * factor, p.theta))
            .collect();
        LaneSegment::new(points, self.width * factor)?.with_along_margin(self.along_margin * factor)
    }

    /// The control points in traversal order.
    pub fn control_points(&self) -> &[Pose] {
        &self.control_points
    }

    /// Lane width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Allowed extrapolation beyond either end.
    pub fn along_margin(&self) -> f64 {
        self.along_margin
    }

    /// Total centerline length (sum of the chord lengths).
    pub fn length(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Chord length of every interval between consecutive control points.
    pub fn lane_lengths(&self) -> &[f64] {
        &self.interval_lengths
    }

    /// Whether `lane_pose` lies inside the lane's extent and width.
    pub fn contains(&self, lane_pose: &LanePose) -> bool {
        (0.0..=self.length()).contains(&lane_pose.along_lane)
            && lane_pose.distance_from_center() <= self.width / 2.0
    }

    /// Center point at parameter `beta`, in control-point index units.
    ///
    /// `beta = 0` is the first control point and `beta = N - 1` the last.
    /// Values outside that range extrapolate linearly along the first or last
    /// interval.
    pub fn point_at(&self, beta: f64) -> Pose {
        let last = self.interval_lengths.len() - 1;
        let interval = (beta.floor().max(0.0) as usize).min(last);
        self.frame_at(interval, beta - interval as f64)
    }

    /// Parameter `beta` corresponding to an along-lane coordinate.
    pub fn beta_from_along(&self, along_lane: f64) -> Result<f64, WorldError> {
        self.check_domain(along_lane)?;
        let (interval, alpha) = self.locate(along_lane);
        Ok(interval as f64 + alpha)
    }

    /// Centerline frame at `along_lane`.
    pub fn center_point(&self, along_lane: f64) -> Result<Pose, WorldError> {
        self.check_domain(along_lane)?;
        let (interval, alpha) = self.locate(along_lane);
        Ok(self.frame_at(interval, alpha))
    }

    /// Converts lane coordinates into a pose in the segment's frame.
    ///
    /// # Returns
    /// * `Result<Pose, WorldError>` - `OutOfDomain` if `along_lane` lies beyond the margin
    pub fn absolute_from_lane_pose(&self, lane_pose: &LanePose) -> Result<Pose, WorldError> {
        let center = self.center_point(lane_pose.along_lane)?;
        Ok(center.compose(Pose::new(0.0, lane_pose.lateral, lane_pose.relative_heading)))
    }

    /// Converts a pose in the segment's frame into lane coordinates.
    ///
    /// Every interval is searched for the parameter whose centerline normal
    /// passes through the pose position; among those candidates the one
    /// closest to the centerline wins (the lower interval on ties).
    ///
    /// # Arguments
    /// * `pose` - Pose in the segment's frame
    /// * `tolerance` - Largest accepted distance from the centerline
    ///
    /// # Returns
    /// * `Result<LanePose, WorldError>` - `NoMatch` if the pose is off the lane
    pub fn lane_pose_from_absolute(&self, pose: &Pose, tolerance: f64) -> Result<LanePose, WorldError> {
        let last = self.interval_lengths.len() - 1;
        // (along_lane, lateral, tangent heading)
        let mut best: Option<(f64, f64, f64)> = None;

        for (interval, &len) in self.interval_lengths.iter().enumerate() {
            let lo = if interval == 0 { -self.along_margin / len } else { 0.0 };
            let hi = if interval == last { 1.0 + self.along_margin / len } else { 1.0 };

            let Some(alpha) = self.normal_foot(interval, lo, hi, pose) else {
                continue;
            };

            let center = self.frame_at(interval, alpha);
            let (sin, cos) = center.theta.sin_cos();
            let lateral = -sin * (pose.x - center.x) + cos * (pose.y - center.y);

            if best.is_none_or(|(_, best_lateral, _)| lateral.abs() < best_lateral.abs()) {
                best = Some((self.cumulative[interval] + alpha * len, lateral, center.theta));
            }
        }

        let Some((along_lane, lateral, heading)) = best else {
            return Err(WorldError::NoMatch("pose lies beyond the ends of the lane"));
        };
        if !(lateral.abs() <= tolerance) {
            return Err(WorldError::NoMatch("lateral offset exceeds tolerance"));
        }

        Ok(LanePose::new(along_lane, lateral, angle_diff(heading, pose.theta)))
    }

    /// Draws a lane pose that stays comfortably on the lane.
    ///
    /// `along_lane` is uniform over the whole lane, `lateral` within a quarter
    /// of the width on either side and the relative heading within half a radian.
    pub fn sample_random_lane_pose<R: Rng + ?Sized>(&self, rng: &mut R) -> LanePose {
        let half_band = self.width / 4.0;
        LanePose::new(
            rng.random_range(0.0..=self.length()),
            rng.random_range(-half_band..=half_band),
            rng.random_range(-0.5..=0.5),
        )
    }

    fn check_domain(&self, along_lane: f64) -> Result<(), WorldError> {
        let lo = -self.along_margin;
        let hi = self.length() + self.along_margin;
        if !(along_lane >= lo && along_lane <= hi) {
            return Err(WorldError::OutOfDomain("along_lane lies beyond the extrapolation margin"));
        }
        Ok(())
    }

    /// Bracketing interval and local parameter of an along-lane coordinate.
    fn locate(&self, along_lane: f64) -> (usize, f64) {
        let last = self.interval_lengths.len() - 1;
        let interval = self
            .cumulative
            .partition_point(|&c| c <= along_lane)
            .saturating_sub(1)
            .min(last);
        let alpha = (along_lane - self.cumulative[interval]) / self.interval_lengths[interval];
        (interval, alpha)
    }

    /// Centerline frame inside `interval` at local parameter `alpha` (unclamped).
    fn frame_at(&self, interval: usize, alpha: f64) -> Pose {
        let p0 = self.control_points[interval];
        let p1 = self.control_points[interval + 1];
        Pose::new(
            p0.x + alpha * (p1.x - p0.x),
            p0.y + alpha * (p1.y - p0.y),
            p0.theta + alpha * angle_diff(p0.theta, p1.theta),
        )
    }

    /// Local parameter in `[lo, hi]` whose centerline normal passes through `pose`.
    ///
    /// The residual is the tangential component of the offset from the center
    /// point to the pose; it changes sign across the foot of the normal.
    fn normal_foot(&self, interval: usize, lo: f64, hi: f64, pose: &Pose) -> Option<f64> {
        let residual = |alpha: f64| {
            let center = self.frame_at(interval, alpha);
            let (sin, cos) = center.theta.sin_cos();
            cos * (pose.x - center.x) + sin * (pose.y - center.y)
        };

        let (mut a, mut b) = (lo, hi);
        let mut fa = residual(a);
        let fb = residual(b);
        if fa.abs() <= ROOT_EPSILON {
            return Some(a);
        }
        if fb.abs() <= ROOT_EPSILON {
            return Some(b);
        }
        if fa.signum() == fb.signum() {
            return None;
        }

        for _ in 0..BISECTION_STEPS {
            let mid = 0.5 * (a + b);
            let fm = residual(mid);
            if fm == 0.0 {
                return Some(mid);
            }
            if fm.signum() == fa.signum() {
                a = mid;
                fa = fm;
            } else {
                b = mid;
            }
        }
        Some(0.5 * (a + b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
    const EPSILON: f64 = 1e-9;

    fn straight() -> LaneSegment {
        LaneSegment::new(vec![Pose::new(0.0, 0.0, 0.0), Pose::new(2.0, 0.0, 0.0)], 0.4).unwrap()
    }

    /// Two intervals turning left by 90 degrees.
    fn bend() -> LaneSegment {
        LaneSegment::new(
            vec![
                Pose::new(0.0, 0.0, 0.0),
                Pose::new(1.0, 0.0, FRAC_PI_4),
                Pose::new(1.0, 1.0, FRAC_PI_2),
            ],
            0.4,
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_creation() {
        let single = LaneSegment::new(vec![Pose::identity()], 0.4);
        assert!(matches!(single, Err(WorldError::InvalidControlPoints(_))));

        let coincident = LaneSegment::new(vec![Pose::new(1.0, 1.0, 0.0), Pose::new(1.0, 1.0, 0.5)], 0.4);
        assert!(matches!(coincident, Err(WorldError::InvalidControlPoints("consecutive control points coincide"))));

        let not_finite = LaneSegment::new(vec![Pose::identity(), Pose::new(f64::NAN, 0.0, 0.0)], 0.4);
        assert!(matches!(not_finite, Err(WorldError::InvalidControlPoints(_))));

        let zero_width = LaneSegment::new(vec![Pose::identity(), Pose::new(1.0, 0.0, 0.0)], 0.0);
        assert!(matches!(zero_width, Err(WorldError::InvalidLaneWidth(_))));

        assert!(matches!(straight().with_along_margin(-0.1), Err(WorldError::InvalidMargin(_))));
    }

    #[test]
    fn test_lengths() {
        let lane = bend();
        assert_eq!(lane.lane_lengths().len(), 2);
        assert!((lane.length() - 2.0).abs() < EPSILON);
        assert!((straight().length() - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_point_at_control_points() {
        let lane = bend();
        for (i, cp) in lane.control_points().iter().enumerate() {
            let p = lane.point_at(i as f64);
            assert!(p.distance(*cp) < EPSILON);
            assert!(angle_diff(p.theta, cp.theta).abs() < EPSILON);
        }
    }

    #[test]
    fn test_point_at_interpolates_heading_on_short_arc() {
        let lane = LaneSegment::new(
            vec![Pose::new(0.0, 0.0, 0.9 * std::f64::consts::PI), Pose::new(-1.0, 0.0, -0.9 * std::f64::consts::PI)],
            0.4,
        )
        .unwrap();
        let mid = lane.point_at(0.5);
        // Halfway between 0.9π and -0.9π through π, not through 0
        assert!(angle_diff(mid.theta, std::f64::consts::PI).abs() < EPSILON);
        assert!((mid.x + 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_point_at_extrapolates() {
        let lane = straight();
        let before = lane.point_at(-1.0);
        assert!((before.x + 2.0).abs() < EPSILON);
        let after = lane.point_at(2.5);
        assert!((after.x - 5.0).abs() < EPSILON);
        assert!(after.y.abs() < EPSILON);
    }

    #[test]
    fn test_beta_from_along() {
        let lane = bend();
        for (along, beta) in [(0.0, 0.0), (0.3, 0.3), (1.0, 1.0), (1.7, 1.7), (2.0, 2.0)] {
            assert!((lane.beta_from_along(along).unwrap() - beta).abs() < EPSILON);
        }
        assert!(matches!(lane.beta_from_along(2.5), Err(WorldError::OutOfDomain(_))));
    }

    #[test]
    fn test_absolute_from_lane_pose_offsets_left() {
        let lane = straight();
        let pose = lane.absolute_from_lane_pose(&LanePose::new(0.5, 0.1, FRAC_PI_4)).unwrap();
        assert!((pose.x - 0.5).abs() < EPSILON);
        assert!((pose.y - 0.1).abs() < EPSILON);
        assert!((pose.theta - FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn test_forward_conversion_domain() {
        let lane = straight().with_along_margin(0.1).unwrap();
        assert!(lane.absolute_from_lane_pose(&LanePose::on_centerline(-0.1)).is_ok());
        assert!(lane.absolute_from_lane_pose(&LanePose::on_centerline(2.1)).is_ok());
        assert!(matches!(
            lane.absolute_from_lane_pose(&LanePose::on_centerline(2.2)),
            Err(WorldError::OutOfDomain(_))
        ));
        assert!(matches!(lane.center_point(f64::NAN), Err(WorldError::OutOfDomain(_))));
    }

    #[test]
    fn test_round_trip_on_bend() {
        let lane = bend();
        for &(along, lateral, heading) in &[(0.0, 0.0, 0.0), (0.4, 0.1, -0.3), (1.0, -0.15, 0.2), (1.9, 0.05, 1.0)] {
            let lp = LanePose::new(along, lateral, heading);
            let pose = lane.absolute_from_lane_pose(&lp).unwrap();
            let back = lane.lane_pose_from_absolute(&pose, 0.2).unwrap();
            assert!((back.along_lane - lp.along_lane).abs() < 1e-9, "{} vs {}", back, lp);
            assert!((back.lateral - lp.lateral).abs() < 1e-9, "{} vs {}", back, lp);
            assert!(angle_diff(back.relative_heading, lp.relative_heading).abs() < 1e-9);
        }
    }

    #[test]
    fn test_lateral_beyond_tolerance_is_no_match() {
        let lane = straight();
        let result = lane.lane_pose_from_absolute(&Pose::new(1.0, 0.5, 0.0), 0.2);
        assert!(matches!(result, Err(WorldError::NoMatch("lateral offset exceeds tolerance"))));
        assert!(result.unwrap_err().is_no_match());
    }

    #[test]
    fn test_beyond_margin_is_no_match() {
        let lane = straight().with_along_margin(0.1).unwrap();
        let inside_margin = lane.lane_pose_from_absolute(&Pose::new(2.05, 0.0, 0.0), 0.2).unwrap();
        assert!((inside_margin.along_lane - 2.05).abs() < EPSILON);

        let outside = lane.lane_pose_from_absolute(&Pose::new(2.5, 0.0, 0.0), 0.2);
        assert!(matches!(outside, Err(WorldError::NoMatch("pose lies beyond the ends of the lane"))));
        let behind = lane.lane_pose_from_absolute(&Pose::new(-0.5, 0.0, 0.0), 0.2);
        assert!(behind.is_err());
    }

    #[test]
    fn test_zero_margin_still_matches_endpoints() {
        let lane = bend().with_along_margin(0.0).unwrap();
        let start = lane.lane_pose_from_absolute(&Pose::new(0.0, 0.1, 0.0), 0.2).unwrap();
        assert!(start.along_lane.abs() < EPSILON);
        let end = lane.lane_pose_from_absolute(&Pose::new(1.0, 1.0, FRAC_PI_2), 0.2).unwrap();
        assert!((end.along_lane - lane.length()).abs() < EPSILON);
    }

    #[test]
    fn test_scaled() {
        let lane = bend().scaled(0.5).unwrap();
        assert!((lane.length() - 1.0).abs() < EPSILON);
        assert!((lane.width() - 0.2).abs() < EPSILON);
        assert!((lane.along_margin() - DEFAULT_ALONG_MARGIN * 0.5).abs() < EPSILON);
        assert!(matches!(bend().scaled(0.0), Err(WorldError::InvalidScale(_))));
        assert!(matches!(bend().scaled(f64::NAN), Err(WorldError::InvalidScale(_))));
    }

    #[test]
    fn test_contains_and_direction() {
        let lane = straight();
        assert!(lane.contains(&LanePose::new(1.0, 0.19, 0.0)));
        assert!(!lane.contains(&LanePose::new(1.0, 0.21, 0.0)));
        assert!(!lane.contains(&LanePose::new(-0.01, 0.0, 0.0)));
        assert!(LanePose::new(0.0, 0.0, 1.0).is_correct_direction());
        assert!(!LanePose::new(0.0, 0.0, 2.0).is_correct_direction());
        assert!((LanePose::new(0.0, -0.3, 0.0).distance_from_center() - 0.3).abs() < EPSILON);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialized_lane_pose_is_normalized() {
        use serde::de::value::{Error as ValueError, MapDeserializer};

        let fields = vec![("along_lane", 0.5), ("lateral", -0.1), ("relative_heading", 7.0)];
        let lane_pose = LanePose::deserialize(MapDeserializer::<_, ValueError>::new(fields.into_iter())).unwrap();
        assert!((lane_pose.along_lane - 0.5).abs() < EPSILON);
        assert!((lane_pose.relative_heading - (7.0 - 2.0 * std::f64::consts::PI)).abs() < EPSILON);
        assert!(lane_pose.is_correct_direction());
    }
}
