//! Lane matching: which lanes does a pose lie on, and which of them is best.

use std::cmp::Ordering;

use lanesim_kinematics::Pose;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::catalog::{LaneCatalog, LaneRef};
use crate::lane::{LanePose, LaneSegment};

/// A lane a pose was found on.
#[derive(Debug, Clone, Copy)]
pub struct LaneMatchResult<'a> {
    /// Catalog name of the lane.
    pub name: &'a str,
    /// The matched lane's geometry.
    pub segment: &'a LaneSegment,
    /// World placement of the segment.
    pub segment_transform: Pose,
    /// Position of the pose relative to the lane.
    pub lane_pose: LanePose,
    /// The queried pose in the segment's frame.
    pub local_pose: Pose,
    /// World pose of the centerline at `lane_pose.along_lane`.
    pub center_point: Pose,
}

/// Tries every candidate lane and returns the ones `pose` lies on.
///
/// Candidates that reject the pose are skipped. An empty result means the
/// pose is off-lane. With `tolerance = None` each lane accepts poses up to
/// half its width from the centerline.
pub fn match_pose<'a, I>(pose: &Pose, candidates: I, tolerance: Option<f64>) -> Vec<LaneMatchResult<'a>>
where
    I: IntoIterator<Item = LaneRef<'a>>,
{
    let mut matches = Vec::new();
    for lane in candidates {
        let local_pose = lane.transform.relative(*pose);
        let tolerance = tolerance.unwrap_or(lane.segment.width() / 2.0);

        let result = lane
            .segment
            .lane_pose_from_absolute(&local_pose, tolerance)
            .and_then(|lane_pose| Ok((lane_pose, lane.segment.center_point(lane_pose.along_lane)?)));

        match result {
            Ok((lane_pose, center)) => matches.push(LaneMatchResult {
                name: lane.name,
                segment: lane.segment,
                segment_transform: lane.transform,
                lane_pose,
                local_pose,
                center_point: lane.transform.compose(center),
            }),
            Err(e) => tracing::trace!(lane = lane.name, reason = %e, "Lane rejected pose"),
        }
    }
    matches
}

/// Ordering of lane matches, best first.
///
/// Implemented for closures taking two matches, so ad-hoc policies need no type.
pub trait MatchRanking {
    /// `Less` when `a` is the better match.
    fn compare(&self, a: &LaneMatchResult<'_>, b: &LaneMatchResult<'_>) -> Ordering;
}

impl<F> MatchRanking for F
where
    F: Fn(&LaneMatchResult<'_>, &LaneMatchResult<'_>) -> Ordering,
{
    fn compare(&self, a: &LaneMatchResult<'_>, b: &LaneMatchResult<'_>) -> Ordering {
        self(a, b)
    }
}

/// Sorts `matches` best first. The sort is stable.
pub fn rank_matches<R>(matches: &mut [LaneMatchResult<'_>], ranking: &R)
where
    R: MatchRanking + ?Sized,
{
    matches.sort_by(|a, b| ranking.compare(a, b));
}

/// Prefers the lane whose direction best agrees with the pose heading.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByRelativeHeading;

impl MatchRanking for ByRelativeHeading {
    fn compare(&self, a: &LaneMatchResult<'_>, b: &LaneMatchResult<'_>) -> Ordering {
        a.lane_pose
            .relative_heading
            .abs()
            .total_cmp(&b.lane_pose.relative_heading.abs())
            .then_with(|| a.name.cmp(b.name))
    }
}

/// Prefers the lane whose centerline is closest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByLateralOffset;

impl MatchRanking for ByLateralOffset {
    fn compare(&self, a: &LaneMatchResult<'_>, b: &LaneMatchResult<'_>) -> Ordering {
        a.lane_pose
            .distance_from_center()
            .total_cmp(&b.lane_pose.distance_from_center())
            .then_with(|| a.name.cmp(b.name))
    }
}

/// Ranks a given lane first and orders the rest with `fallback`.
#[derive(Debug, Clone, Copy)]
pub struct PreferLane<'n, R> {
    /// Name of the preferred lane; `None` prefers nothing.
    pub lane: Option<&'n str>,
    /// Ordering among the remaining matches.
    pub fallback: R,
}

impl<R: MatchRanking> MatchRanking for PreferLane<'_, R> {
    fn compare(&self, a: &LaneMatchResult<'_>, b: &LaneMatchResult<'_>) -> Ordering {
        let preferred = |m: &LaneMatchResult<'_>| Some(m.name) == self.lane;
        // `true` sorts after `false`, so compare b against a
        preferred(b)
            .cmp(&preferred(a))
            .then_with(|| self.fallback.compare(a, b))
    }
}

/// Ranking selectable from configuration.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingPolicy {
    /// See [`ByRelativeHeading`].
    #[default]
    RelativeHeading,
    /// See [`ByLateralOffset`].
    LateralOffset,
}

impl MatchRanking for RankingPolicy {
    fn compare(&self, a: &LaneMatchResult<'_>, b: &LaneMatchResult<'_>) -> Ordering {
        match self {
            RankingPolicy::RelativeHeading => ByRelativeHeading.compare(a, b),
            RankingPolicy::LateralOffset => ByLateralOffset.compare(a, b),
        }
    }
}

/// Lane queries against one catalog.
#[derive(Debug, Clone, Copy)]
pub struct LaneMatcher<'c> {
    catalog: &'c LaneCatalog,
    tolerance: Option<f64>,
}

impl<'c> LaneMatcher<'c> {
    /// Matches against every lane of `catalog`, each with half its width as tolerance.
    pub fn new(catalog: &'c LaneCatalog) -> Self {
        LaneMatcher { catalog, tolerance: None }
    }

    /// Accept poses up to `tolerance` from any centerline instead of half the lane width.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// All lanes the pose lies on, in catalog order.
    pub fn query(&self, pose: &Pose) -> Vec<LaneMatchResult<'c>> {
        match_pose(pose, self.catalog.lanes(), self.tolerance)
    }

    /// All lanes the pose lies on, best first.
    pub fn query_ranked<R>(&self, pose: &Pose, ranking: &R) -> Vec<LaneMatchResult<'c>>
    where
        R: MatchRanking + ?Sized,
    {
        let mut matches = self.query(pose);
        rank_matches(&mut matches, ranking);
        matches
    }

    /// The best lane for the pose, if it is on any.
    pub fn best<R>(&self, pose: &Pose, ranking: &R) -> Option<LaneMatchResult<'c>>
    where
        R: MatchRanking + ?Sized,
    {
        self.query(pose)
            .into_iter()
            .min_by(|a, b| ranking.compare(a, b))
    }
}

/// Keeps a robot on the lane it was last matched to while that lane still matches.
#[derive(Debug, Clone, Default)]
pub struct ContinuityTracker<R> {
    previous: Option<String>,
    fallback: R,
    off_lane: usize,
}

impl<R: MatchRanking + Clone> ContinuityTracker<R> {
    /// A tracker with no lane yet, ranking with `fallback` until one is chosen.
    pub fn new(fallback: R) -> Self {
        ContinuityTracker {
            previous: None,
            fallback,
            off_lane: 0,
        }
    }

    /// Ranks `matches` and remembers the winner for the next call.
    pub fn select<'a>(&mut self, mut matches: Vec<LaneMatchResult<'a>>) -> Vec<LaneMatchResult<'a>> {
        let ranking = PreferLane {
            lane: self.previous.as_deref(),
            fallback: self.fallback.clone(),
        };
        rank_matches(&mut matches, &ranking);

        match matches.first() {
            Some(best) => {
                if self.previous.as_deref() != Some(best.name) {
                    tracing::debug!(from = ?self.previous, to = best.name, "Lane changed");
                    self.previous = Some(best.name.to_string());
                }
            }
            None => self.off_lane += 1,
        }
        matches
    }

    /// Name of the lane chosen last.
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    /// How many selections found no lane at all.
    pub fn off_lane_count(&self) -> usize {
        self.off_lane
    }
}
