//! Named, placed objects of a road world.
//!
//! A [`LaneCatalog`] maps unique names to placements. Lanes are one kind of
//! placed object among others; matching only ever looks at lanes.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::f64::consts::{FRAC_PI_2, PI};

use lanesim_kinematics::Pose;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::WorldError;
use crate::lane::LaneSegment;
use crate::templates::{curve_left_lane, curve_right_lane, straight_lane};

/// Kind of a road tile.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    /// Two-lane road crossing the tile along local `x`.
    Straight,
    /// Road turning left from the `-x` edge to the `+y` edge.
    CurveLeft,
    /// Road turning right from the `-x` edge to the `-y` edge.
    CurveRight,
    /// T junction closed on the local `+y` side.
    ThreeWay,
    /// Crossing open on all four sides.
    FourWay,
    /// Drivable surface without lanes.
    Asphalt,
}

/// Travel directions through an intersection, counter-clockwise from local `+x`.
const HEADINGS: [&str; 4] = ["east", "north", "west", "south"];

/// Movements of a T junction closed on the `north` side: `(heading, turn)`.
const THREE_WAY_MOVES: [(usize, Turn); 6] = [
    (0, Turn::Straight),
    (0, Turn::Right),
    (1, Turn::Left),
    (1, Turn::Right),
    (2, Turn::Straight),
    (2, Turn::Left),
];

#[derive(Debug, Clone, Copy)]
enum Turn {
    Straight,
    Left,
    Right,
}

impl Turn {
    const ALL: [Turn; 3] = [Turn::Straight, Turn::Left, Turn::Right];

    fn name(self) -> &'static str {
        match self {
            Turn::Straight => "straight",
            Turn::Left => "left",
            Turn::Right => "right",
        }
    }

    fn template(self) -> Result<LaneSegment, WorldError> {
        match self {
            Turn::Straight => straight_lane(),
            Turn::Left => curve_left_lane(),
            Turn::Right => curve_right_lane(),
        }
    }
}

/// Lane of an intersection entering while travelling along `heading`.
fn intersection_lane(heading: usize, turn: Turn) -> Result<(String, Pose, LaneSegment), WorldError> {
    Ok((
        format!("{}-{}", HEADINGS[heading], turn.name()),
        Pose::from_rotation(heading as f64 * FRAC_PI_2),
        turn.template()?,
    ))
}

impl TileKind {
    /// Lanes of this tile in tile units: `(suffix, local placement, segment)`.
    ///
    /// Road tiles carry two lanes of opposite direction; `lane2` of a curve is
    /// the opposite curve traversed from the other edge. Intersection lanes
    /// overlap where their movements share pavement.
    fn lanes(self) -> Result<Vec<(String, Pose, LaneSegment)>, WorldError> {
        let lanes = match self {
            TileKind::Straight => vec![
                ("lane1".to_string(), Pose::identity(), straight_lane()?),
                ("lane2".to_string(), Pose::from_rotation(PI), straight_lane()?),
            ],
            TileKind::CurveLeft => vec![
                ("lane1".to_string(), Pose::identity(), curve_left_lane()?),
                ("lane2".to_string(), Pose::from_rotation(-FRAC_PI_2), curve_right_lane()?),
            ],
            TileKind::CurveRight => vec![
                ("lane1".to_string(), Pose::identity(), curve_right_lane()?),
                ("lane2".to_string(), Pose::from_rotation(FRAC_PI_2), curve_left_lane()?),
            ],
            TileKind::ThreeWay => THREE_WAY_MOVES
                .iter()
                .map(|&(heading, turn)| intersection_lane(heading, turn))
                .collect::<Result<_, _>>()?,
            TileKind::FourWay => (0..HEADINGS.len())
                .flat_map(|heading| Turn::ALL.map(|turn| (heading, turn)))
                .map(|(heading, turn)| intersection_lane(heading, turn))
                .collect::<Result<_, _>>()?,
            TileKind::Asphalt => Vec::new(),
        };
        Ok(lanes)
    }
}

/// Something placed in the world.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacedObject {
    /// A lane segment, in the placement's frame.
    Lane(LaneSegment),
    /// A road tile; its lanes are registered as separate entries.
    Tile(TileKind),
    /// Any other named object, e.g. a sign or a parked robot.
    Marker(String),
}

impl PlacedObject {
    /// The lane segment, if this object is a lane.
    pub fn as_lane(&self) -> Option<&LaneSegment> {
        match self {
            PlacedObject::Lane(segment) => Some(segment),
            _ => None,
        }
    }

    /// Whether this object is a lane.
    pub fn is_lane(&self) -> bool {
        self.as_lane().is_some()
    }
}

/// An object with its world transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Frame of the object in world coordinates.
    pub transform: Pose,
    /// What is placed.
    pub object: PlacedObject,
}

/// Borrowed view of one lane in a catalog.
#[derive(Debug, Clone, Copy)]
pub struct LaneRef<'a> {
    /// Catalog name of the lane.
    pub name: &'a str,
    /// Frame of the lane in world coordinates.
    pub transform: Pose,
    /// Lane geometry in its own frame.
    pub segment: &'a LaneSegment,
}

/// Immutable collection of placed objects, iterated in name order.
#[derive(Debug, Clone, Default)]
pub struct LaneCatalog {
    entries: BTreeMap<String, Placement>,
}

impl LaneCatalog {
    /// Starts an empty catalog with unit tiles.
    pub fn builder() -> LaneCatalogBuilder {
        LaneCatalogBuilder::new()
    }

    /// Number of entries of any kind.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Placement> {
        self.entries.get(name)
    }

    /// All placed objects, lanes and others.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Placement)> + '_ {
        self.entries.iter().map(|(name, placement)| (name.as_str(), placement))
    }

    /// Only the entries that are lanes.
    pub fn lanes(&self) -> impl Iterator<Item = LaneRef<'_>> + '_ {
        self.iter().filter_map(|(name, placement)| {
            placement.object.as_lane().map(|segment| LaneRef {
                name,
                transform: placement.transform,
                segment,
            })
        })
    }

    /// The lane registered under `name`, if that entry is a lane.
    pub fn lane(&self, name: &str) -> Option<LaneRef<'_>> {
        let (name, placement) = self.entries.get_key_value(name)?;
        placement.object.as_lane().map(|segment| LaneRef {
            name: name.as_str(),
            transform: placement.transform,
            segment,
        })
    }
}

/// Builder for a [`LaneCatalog`]; names must be unique.
#[derive(Debug, Clone)]
pub struct LaneCatalogBuilder {
    entries: BTreeMap<String, Placement>,
    tile_size: f64,
}

impl Default for LaneCatalogBuilder {
    fn default() -> Self {
        LaneCatalogBuilder::new()
    }
}

impl LaneCatalogBuilder {
    /// Creates an empty builder with unit tiles.
    pub fn new() -> Self {
        LaneCatalogBuilder {
            entries: BTreeMap::new(),
            tile_size: 1.0,
        }
    }

    /// Side length of the tiles placed by [`LaneCatalogBuilder::place_tile`].
    pub fn with_tile_size(mut self, tile_size: f64) -> Result<Self, WorldError> {
        if !(tile_size > 0.0 && tile_size.is_finite()) {
            return Err(WorldError::InvalidScale("tile size must be finite and positive"));
        }
        self.tile_size = tile_size;
        Ok(self)
    }

    /// Adds a lane segment placed at `transform`.
    pub fn insert_lane(
        &mut self,
        name: impl Into<String>,
        transform: Pose,
        segment: LaneSegment,
    ) -> Result<&mut Self, WorldError> {
        self.insert_object(name, transform, PlacedObject::Lane(segment))
    }

    /// Adds any placed object.
    pub fn insert_object(
        &mut self,
        name: impl Into<String>,
        transform: Pose,
        object: PlacedObject,
    ) -> Result<&mut Self, WorldError> {
        match self.entries.entry(name.into()) {
            Entry::Occupied(entry) => Err(WorldError::DuplicateName(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(Placement { transform, object });
                Ok(self)
            }
        }
    }

    /// Places a tile at grid cell `(i, j)` rotated by `quarter_turns * 90` degrees.
    ///
    /// Registers the tile itself as `tile-{i}-{j}` and each of its lanes as
    /// `tile-{i}-{j}/lane1`, `tile-{i}-{j}/lane2`. Intersection lanes are named
    /// after their travel direction and turn, e.g. `tile-{i}-{j}/east-left`.
    pub fn place_tile(
        &mut self,
        i: i32,
        j: i32,
        kind: TileKind,
        quarter_turns: i32,
    ) -> Result<&mut Self, WorldError> {
        let size = self.tile_size;
        let tile_name = format!("tile-{i}-{j}");
        let tile_transform = Pose::new(
            (f64::from(i) + 0.5) * size,
            (f64::from(j) + 0.5) * size,
            f64::from(quarter_turns.rem_euclid(4)) * FRAC_PI_2,
        );

        let lanes = kind.lanes()?;
        self.insert_object(tile_name.clone(), tile_transform, PlacedObject::Tile(kind))?;
        for (suffix, local, template) in lanes {
            self.insert_lane(format!("{tile_name}/{suffix}"), tile_transform.compose(local), template.scaled(size)?)?;
        }

        tracing::trace!(tile = %tile_name, ?kind, quarter_turns, "Placed tile");
        Ok(self)
    }

    /// Freezes the catalog.
    pub fn build(self) -> LaneCatalog {
        let catalog = LaneCatalog { entries: self.entries };
        tracing::debug!(
            entries = catalog.len(),
            lanes = catalog.lanes().count(),
            others = catalog.iter().filter(|(_, placement)| !placement.object.is_lane()).count(),
            "Lane catalog built"
        );
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanesim_kinematics::angle_diff;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_lanes_filters_other_objects() {
        let mut builder = LaneCatalog::builder();
        builder
            .insert_lane("a", Pose::identity(), straight_lane().unwrap())
            .unwrap()
            .insert_object("sign", Pose::new(1.0, 1.0, 0.0), PlacedObject::Marker("stop".into()))
            .unwrap();
        let catalog = builder.build();
        assert_eq!(catalog.len(), 2);
        let names: Vec<&str> = catalog.lanes().map(|lane| lane.name).collect();
        assert_eq!(names, vec!["a"]);
        assert!(catalog.lane("sign").is_none());
        assert!(catalog.lane("a").is_some());
    }

    #[test]
    fn test_duplicate_name() {
        let mut builder = LaneCatalog::builder();
        builder.insert_lane("a", Pose::identity(), straight_lane().unwrap()).unwrap();
        let result = builder.insert_object("a", Pose::identity(), PlacedObject::Marker("x".into()));
        assert_eq!(result.unwrap_err(), WorldError::DuplicateName("a".to_string()));
    }

    #[test]
    fn test_place_straight_tile() {
        let mut builder = LaneCatalog::builder().with_tile_size(2.0).unwrap();
        builder.place_tile(1, 0, TileKind::Straight, 0).unwrap();
        let catalog = builder.build();
        assert_eq!(catalog.len(), 3);
        assert!(matches!(catalog.get("tile-1-0").unwrap().object, PlacedObject::Tile(TileKind::Straight)));

        let lane1 = catalog.lane("tile-1-0/lane1").unwrap();
        assert!((lane1.segment.length() - 2.0).abs() < EPSILON);
        let start = lane1.transform.compose(lane1.segment.control_points()[0]);
        assert!((start.x - 2.0).abs() < EPSILON);
        assert!((start.y - (1.0 - 0.44)).abs() < EPSILON);

        let lane2 = catalog.lane("tile-1-0/lane2").unwrap();
        let start = lane2.transform.compose(lane2.segment.control_points()[0]);
        assert!((start.x - 4.0).abs() < EPSILON);
        assert!((start.y - (1.0 + 0.44)).abs() < EPSILON);
        assert!(angle_diff(start.theta, PI).abs() < EPSILON);
    }

    #[test]
    fn test_curve_tile_lanes_share_edges() {
        let mut builder = LaneCatalog::builder();
        builder.place_tile(0, 0, TileKind::CurveLeft, 0).unwrap();
        let catalog = builder.build();
        let lane1 = catalog.lane("tile-0-0/lane1").unwrap();
        let lane2 = catalog.lane("tile-0-0/lane2").unwrap();

        // lane2 enters where lane1 leaves, on the other side of the road
        let lane1_end = lane1.transform.compose(*lane1.segment.control_points().last().unwrap());
        let lane2_start = lane2.transform.compose(lane2.segment.control_points()[0]);
        assert!((lane1_end.y - 1.0).abs() < EPSILON);
        assert!((lane2_start.y - 1.0).abs() < EPSILON);
        assert!((lane1_end.x + lane2_start.x - 1.0).abs() < EPSILON);
        assert!(angle_diff(lane1_end.theta, lane2_start.theta + PI).abs() < EPSILON);

        let lane2_end = lane2.transform.compose(*lane2.segment.control_points().last().unwrap());
        assert!(lane2_end.x.abs() < EPSILON);
        assert!((lane2_end.y - 0.72).abs() < EPSILON);
        assert!(angle_diff(lane2_end.theta, PI).abs() < EPSILON);
    }

    #[test]
    fn test_asphalt_and_rotation() {
        let mut builder = LaneCatalog::builder();
        builder.place_tile(0, 0, TileKind::Asphalt, 0).unwrap();
        builder.place_tile(0, 1, TileKind::Straight, -1).unwrap();
        let catalog = builder.build();
        assert_eq!(catalog.lanes().count(), 2);
        let lane1 = catalog.lane("tile-0-1/lane1").unwrap();
        assert!(angle_diff(lane1.transform.theta, -FRAC_PI_2).abs() < EPSILON);
    }

    #[test]
    fn test_invalid_tile_size() {
        for size in [0.0, -1.0, f64::INFINITY] {
            assert!(matches!(LaneCatalog::builder().with_tile_size(size), Err(WorldError::InvalidScale(_))));
        }
    }

    #[test]
    fn test_iter_includes_tiles() {
        let mut builder = LaneCatalog::builder();
        builder.place_tile(0, 0, TileKind::Straight, 0).unwrap();
        builder.place_tile(1, 0, TileKind::Asphalt, 0).unwrap();
        let catalog = builder.build();
        let others: Vec<&str> = catalog
            .iter()
            .filter(|(_, placement)| !placement.object.is_lane())
            .map(|(name, _)| name)
            .collect();
        assert_eq!(others, vec!["tile-0-0", "tile-1-0"]);
        assert_eq!(catalog.iter().count(), catalog.len());
    }

    #[test]
    fn test_four_way_lanes() {
        let mut builder = LaneCatalog::builder();
        builder.place_tile(0, 0, TileKind::FourWay, 0).unwrap();
        let catalog = builder.build();
        assert_eq!(catalog.lanes().count(), 12);
        for heading in ["east", "north", "west", "south"] {
            for turn in ["straight", "left", "right"] {
                assert!(catalog.lane(&format!("tile-0-0/{heading}-{turn}")).is_some());
            }
        }

        // Northbound traffic enters through the south edge on the right-hand side
        let north = catalog.lane("tile-0-0/north-straight").unwrap();
        let start = north.transform.compose(north.segment.control_points()[0]);
        assert!((start.x - 0.72).abs() < EPSILON);
        assert!(start.y.abs() < EPSILON);
        assert!(angle_diff(start.theta, FRAC_PI_2).abs() < EPSILON);
    }

    #[test]
    fn test_three_way_keeps_north_edge_closed() {
        let mut builder = LaneCatalog::builder();
        builder.place_tile(0, 0, TileKind::ThreeWay, 0).unwrap();
        let catalog = builder.build();
        let names: Vec<&str> = catalog.lanes().map(|lane| lane.name).collect();
        assert_eq!(
            names,
            vec![
                "tile-0-0/east-right",
                "tile-0-0/east-straight",
                "tile-0-0/north-left",
                "tile-0-0/north-right",
                "tile-0-0/west-left",
                "tile-0-0/west-straight",
            ]
        );

        for lane in catalog.lanes() {
            let points = lane.segment.control_points();
            let start = lane.transform.compose(points[0]);
            let end = lane.transform.compose(points[points.len() - 1]);
            assert!(start.y < 1.0 - EPSILON, "{} enters through the closed side", lane.name);
            assert!(end.y < 1.0 - EPSILON, "{} leaves through the closed side", lane.name);
        }
    }
}
