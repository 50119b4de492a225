//! Generation of the grid city: roads, buildings, entry and exit points, intersections.

use crate::network::{column_direction, row_direction};
use crate::{Cell, Direction, Occupant, SimError, SimResult, SpatialGrid};
use itertools::iproduct;

/// The number of lanes making up one road. The two lanes carry opposite directions.
pub const ROAD_WIDTH: i32 = 2;

/// A rectangular city of evenly spaced two-lane roads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CityLayout {
    /// The number of roads running left to right.
    pub roads_horizontal: usize,
    /// The number of roads running top to bottom.
    pub roads_vertical: usize,
    /// The number of cells between consecutive roads.
    pub road_spacing: i32,
}

/// A stop cell where one lane enters an intersection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Approach {
    /// The lane cell immediately before the intersection, where the signal stands.
    pub stop: Cell,
    /// The lane cell before the stop cell.
    pub upstream: Cell,
}

/// A 2×2 block of cells where a horizontal and a vertical road cross.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntersectionSite {
    /// The lower-left cell of the block.
    pub position: Cell,
    /// The approaches grouped into opposing pairs: vertical lanes first, then horizontal.
    pub approaches: [[Approach; 2]; 2],
}

impl Default for CityLayout {
    fn default() -> Self {
        Self {
            roads_horizontal: 4,
            roads_vertical: 4,
            road_spacing: 20,
        }
    }
}

impl CityLayout {
    /// The width of the city in cells.
    pub fn width(&self) -> i32 {
        let n = self.roads_vertical as i32;
        self.road_spacing * (n + 1) + ROAD_WIDTH * n
    }

    /// The height of the city in cells.
    pub fn height(&self) -> i32 {
        let n = self.roads_horizontal as i32;
        self.road_spacing * (n + 1) + ROAD_WIDTH * n
    }

    /// Checks that the roads fit and leave room for a stop cell and an upstream cell
    /// before every intersection.
    pub fn validate(&self) -> SimResult<()> {
        if self.roads_horizontal == 0 || self.roads_vertical == 0 {
            return Err(SimError::Config("the city needs at least one road each way".into()));
        }
        if self.road_spacing < 4 {
            return Err(SimError::Config(format!(
                "road spacing must be at least 4 cells, got {}",
                self.road_spacing
            )));
        }
        Ok(())
    }

    /// The x coordinate of the first lane of each vertical road.
    fn vertical_roads(&self) -> impl Iterator<Item = i32> + '_ {
        (1..=self.roads_vertical as i32).map(move |i| self.road_spacing * i + 1)
    }

    /// The y coordinate of the first lane of each horizontal road.
    fn horizontal_roads(&self) -> impl Iterator<Item = i32> + '_ {
        (1..=self.roads_horizontal as i32).map(move |i| self.road_spacing * i + 1)
    }

    /// The x coordinates of all vertical lanes.
    pub fn lane_columns(&self) -> Vec<i32> {
        self.vertical_roads()
            .flat_map(|x| (0..ROAD_WIDTH).map(move |k| x + k))
            .collect()
    }

    /// The y coordinates of all horizontal lanes.
    pub fn lane_rows(&self) -> Vec<i32> {
        self.horizontal_roads()
            .flat_map(|y| (0..ROAD_WIDTH).map(move |k| y + k))
            .collect()
    }

    /// Creates a grid with every lane cell marked as road and a building on every other cell.
    pub fn build_grid(&self) -> SpatialGrid {
        let mut grid = SpatialGrid::new(self.width(), self.height());
        let columns = self.lane_columns();
        let rows = self.lane_rows();
        for (x, y) in iproduct!(0..self.width(), 0..self.height()) {
            let cell = Cell::new(x, y);
            let placed = if columns.contains(&x) || rows.contains(&y) {
                grid.add_road(cell)
            } else {
                grid.place(Occupant::Building, cell)
            };
            debug_assert!(placed.is_ok(), "layout cell {} outside its own grid", cell);
        }
        grid
    }

    /// The cells where a lane enters the city.
    pub fn entry_points(&self) -> Vec<Cell> {
        self.lane_ends(true)
    }

    /// The cells where a lane leaves the city.
    pub fn exit_points(&self) -> Vec<Cell> {
        self.lane_ends(false)
    }

    fn lane_ends(&self, entry: bool) -> Vec<Cell> {
        let (top, right) = (self.height() - 1, self.width() - 1);
        let columns = self.lane_columns().into_iter().map(|x| {
            let y = match (column_direction(x), entry) {
                (Direction::Down, true) | (Direction::Up, false) => top,
                _ => 0,
            };
            Cell::new(x, y)
        });
        let rows = self.lane_rows().into_iter().map(|y| {
            let x = match (row_direction(y), entry) {
                (Direction::Left, true) | (Direction::Right, false) => right,
                _ => 0,
            };
            Cell::new(x, y)
        });
        columns.chain(rows).collect()
    }

    /// The intersections of the city, ordered by row then column.
    pub fn intersections(&self) -> Vec<IntersectionSite> {
        let columns: Vec<i32> = self.vertical_roads().collect();
        iproduct!(self.horizontal_roads(), columns)
            .map(|(y, x)| {
                let block = |dx: i32, dy: i32| Cell::new(x + dx, y + dy);
                // The first block cell each lane enters
                let vertical = [0, 1].map(|dx| match column_direction(x + dx) {
                    Direction::Down => block(dx, 1),
                    _ => block(dx, 0),
                });
                let horizontal = [0, 1].map(|dy| match row_direction(y + dy) {
                    Direction::Left => block(1, dy),
                    _ => block(0, dy),
                });
                let approach = |entry: Cell, dir: Direction| {
                    let stop = entry.step(dir.reverse());
                    Approach {
                        stop,
                        upstream: stop.step(dir.reverse()),
                    }
                };
                IntersectionSite {
                    position: block(0, 0),
                    approaches: [
                        vertical.map(|c| approach(c, column_direction(c.x))),
                        horizontal.map(|c| approach(c, row_direction(c.y))),
                    ],
                }
            })
            .collect()
    }
}
