//! The occupancy grid shared by every agent in the simulation.

use crate::{GridError, SignalId, VehicleId};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A discrete lattice position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

/// A direction of travel along a lane. `Up` points towards increasing `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Something that occupies a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Occupant {
    Vehicle(VehicleId),
    Signal(SignalId),
    /// Decorative filler between roads; has no identity and never moves.
    Building,
}

/// A multi-occupancy container over integer cell coordinates.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    /// Width of the grid in cells.
    width: i32,
    /// Height of the grid in cells.
    height: i32,
    /// The occupants of each cell, in placement order. Index = y * width + x.
    cells: Vec<SmallVec<[Occupant; 2]>>,
    /// The cell of every occupant that has an identity.
    positions: HashMap<Occupant, Cell>,
    /// The cells vehicles may drive on.
    roads: HashSet<Cell>,
}

impl Cell {
    /// Creates a new cell.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell in the given direction.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// The Euclidean distance between two cells.
    pub fn distance(self, other: Cell) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }

    /// The Manhattan distance between two cells.
    pub fn manhattan(self, other: Cell) -> usize {
        (self.x.abs_diff(other.x) + self.y.abs_diff(other.y)) as usize
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Direction {
    /// The unit offset of this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl SpatialGrid {
    /// Creates an empty grid.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![SmallVec::new(); (width * height) as usize],
            positions: HashMap::new(),
            roads: HashSet::new(),
        }
    }

    /// The width of the grid in cells.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// The height of the grid in cells.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Whether the cell lies within the grid.
    pub fn in_bounds(&self, cell: Cell) -> bool {
        (0..self.width).contains(&cell.x) && (0..self.height).contains(&cell.y)
    }

    /// Marks a cell as drivable.
    pub fn add_road(&mut self, cell: Cell) -> Result<(), GridError> {
        self.index(cell)?;
        self.roads.insert(cell);
        Ok(())
    }

    /// Whether vehicles may drive on the cell.
    pub fn is_road(&self, cell: Cell) -> bool {
        self.roads.contains(&cell)
    }

    /// The drivable cells of the grid.
    pub fn road_cells(&self) -> &HashSet<Cell> {
        &self.roads
    }

    /// Places an occupant on a cell.
    pub fn place(&mut self, occupant: Occupant, cell: Cell) -> Result<(), GridError> {
        let idx = self.index(cell)?;
        if occupant != Occupant::Building {
            if self.positions.contains_key(&occupant) {
                return Err(GridError::AlreadyPlaced(occupant));
            }
            self.positions.insert(occupant, cell);
        }
        self.cells[idx].push(occupant);
        Ok(())
    }

    /// Removes an occupant from the grid, returning the cell it was on.
    pub fn remove(&mut self, occupant: Occupant) -> Option<Cell> {
        let cell = self.positions.remove(&occupant)?;
        let idx = self.index(cell).ok()?;
        let slot = &mut self.cells[idx];
        if let Some(pos) = slot.iter().position(|o| *o == occupant) {
            slot.remove(pos);
        }
        Some(cell)
    }

    /// Relocates an occupant. The grid is left untouched if the move fails.
    pub fn move_to(&mut self, occupant: Occupant, cell: Cell) -> Result<(), GridError> {
        let idx = self.index(cell)?;
        self.remove(occupant).ok_or(GridError::NotPlaced(occupant))?;
        self.positions.insert(occupant, cell);
        self.cells[idx].push(occupant);
        Ok(())
    }

    /// The current cell of an occupant.
    pub fn position(&self, occupant: Occupant) -> Option<Cell> {
        self.positions.get(&occupant).copied()
    }

    /// The occupants of a cell in placement order. Cells outside the grid are empty.
    pub fn occupants(&self, cell: Cell) -> &[Occupant] {
        match self.index(cell) {
            Ok(idx) => &self.cells[idx],
            Err(_) => &[],
        }
    }

    /// Whether nothing occupies the cell.
    pub fn is_empty(&self, cell: Cell) -> bool {
        self.occupants(cell).is_empty()
    }

    /// Whether a vehicle occupies the cell.
    pub fn has_vehicle(&self, cell: Cell) -> bool {
        self.occupants(cell)
            .iter()
            .any(|o| matches!(o, Occupant::Vehicle(_)))
    }

    /// The signals standing on a cell.
    pub fn signals_at(&self, cell: Cell) -> impl Iterator<Item = SignalId> + '_ {
        self.occupants(cell).iter().filter_map(|o| match o {
            Occupant::Signal(id) => Some(*id),
            _ => None,
        })
    }

    /// The occupants of each cell in a window, paired with the cell's index in the window.
    pub fn window<'a>(
        &'a self,
        cells: &'a [Cell],
    ) -> impl Iterator<Item = (usize, &'a [Occupant])> + 'a {
        cells.iter().map(|cell| self.occupants(*cell)).enumerate()
    }

    fn index(&self, cell: Cell) -> Result<usize, GridError> {
        if self.in_bounds(cell) {
            Ok((cell.y * self.width + cell.x) as usize)
        } else {
            Err(GridError::OutOfBounds(cell))
        }
    }
}
