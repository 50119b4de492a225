//! The directed lattice of legal travel directions and the path router built on it.

use crate::{Cell, Direction, NetworkError};
use itertools::Itertools;
use pathfinding::directed::astar::astar_bag_collect;
use pathfinding::directed::dijkstra::dijkstra_all;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// The direction of travel of a vertical lane at column `x`.
/// Odd columns carry traffic down, even columns carry traffic up.
pub fn column_direction(x: i32) -> Direction {
    if x.rem_euclid(2) == 1 {
        Direction::Down
    } else {
        Direction::Up
    }
}

/// The direction of travel of a horizontal lane at row `y`.
/// Odd rows carry traffic right, even rows carry traffic left.
pub fn row_direction(y: i32) -> Direction {
    if y.rem_euclid(2) == 1 {
        Direction::Right
    } else {
        Direction::Left
    }
}

/// A directed graph whose nodes are road cells and whose edges are legal one-cell moves.
#[derive(Clone, Debug, Default)]
pub struct RoadNetwork {
    /// The cells reachable in one move from each road cell.
    links_out: HashMap<Cell, SmallVec<[Cell; 2]>>,
    /// The cells from which each road cell can be reached in one move.
    links_in: HashMap<Cell, SmallVec<[Cell; 2]>>,
}

impl RoadNetwork {
    /// Builds the network from a set of road cells.
    ///
    /// A column of road cells spanning the full vertical extent of the road set is a
    /// vertical lane, and a row spanning the full horizontal extent is a horizontal lane.
    /// Each lane is one-way, in the direction given by [column_direction] or
    /// [row_direction]; cells where lanes cross may continue along either.
    pub fn new<'a>(road_cells: impl IntoIterator<Item = &'a Cell>) -> Self {
        let cells: HashSet<Cell> = road_cells.into_iter().copied().collect();

        let (Some((min_x, max_x)), Some((min_y, max_y))) = (
            cells.iter().map(|c| c.x).minmax().into_option(),
            cells.iter().map(|c| c.y).minmax().into_option(),
        ) else {
            return Self::default();
        };

        let columns: HashSet<i32> = cells
            .iter()
            .filter(|c| c.y == min_y && cells.contains(&Cell::new(c.x, max_y)))
            .map(|c| c.x)
            .collect();
        let rows: HashSet<i32> = cells
            .iter()
            .filter(|c| c.x == min_x && cells.contains(&Cell::new(max_x, c.y)))
            .map(|c| c.y)
            .collect();

        let mut network = Self::default();
        for cell in &cells {
            network.links_out.entry(*cell).or_default();
            network.links_in.entry(*cell).or_default();
        }
        // Sorted so that link order, and with it path sampling, is reproducible
        for cell in cells.iter().sorted() {
            let dirs = [
                columns.contains(&cell.x).then(|| column_direction(cell.x)),
                rows.contains(&cell.y).then(|| row_direction(cell.y)),
            ];
            for dir in dirs.into_iter().flatten() {
                let next = cell.step(dir);
                if cells.contains(&next) {
                    network.add_link(*cell, next);
                }
            }
        }

        log::debug!(
            "Built road network: {} cells, {} links, {} vertical and {} horizontal lanes",
            network.node_count(),
            network.link_count(),
            columns.len(),
            rows.len()
        );
        network
    }

    /// The number of road cells in the network.
    pub fn node_count(&self) -> usize {
        self.links_out.len()
    }

    /// The number of one-cell moves in the network.
    pub fn link_count(&self) -> usize {
        self.links_out.values().map(|l| l.len()).sum()
    }

    /// Whether the cell is part of the network.
    pub fn contains(&self, cell: Cell) -> bool {
        self.links_out.contains_key(&cell)
    }

    /// The cells reachable from `cell` in one move.
    pub fn links_out(&self, cell: Cell) -> &[Cell] {
        self.links_out.get(&cell).map_or(&[], |l| l.as_slice())
    }

    /// The cells from which `cell` can be reached in one move.
    pub fn links_in(&self, cell: Cell) -> &[Cell] {
        self.links_in.get(&cell).map_or(&[], |l| l.as_slice())
    }

    /// Finds a minimum-length path from `start` to `end`, both included.
    /// When several paths share the minimum length, each is returned with equal probability.
    pub fn shortest_path<R: Rng + ?Sized>(
        &self,
        start: Cell,
        end: Cell,
        rng: &mut R,
    ) -> Result<Vec<Cell>, NetworkError> {
        self.check_cell(start)?;
        self.check_cell(end)?;
        if start == end {
            return Ok(vec![start]);
        }

        let dists = self.distances_from(start);
        let end_dist = *dists
            .get(&end)
            .ok_or(NetworkError::NoPath { from: start, to: end })?;

        // Number of distinct shortest paths from `start` to each cell
        let mut ways: HashMap<Cell, f64> = HashMap::new();
        ways.insert(start, 1.0);
        let layers = dists
            .iter()
            .filter(|(_, d)| **d > 0 && **d <= end_dist)
            .sorted_by_key(|(_, d)| **d);
        for (cell, dist) in layers {
            let count = self
                .shortest_preds(*cell, *dist, &dists)
                .map(|p| ways.get(&p).copied().unwrap_or(0.0))
                .sum();
            ways.insert(*cell, count);
        }

        // Walk back from the end, picking each predecessor in proportion to the
        // number of shortest paths through it.
        let mut path = vec![end];
        let mut cell = end;
        let mut dist = end_dist;
        while cell != start {
            let preds: SmallVec<[Cell; 2]> = self.shortest_preds(cell, dist, &dists).collect();
            let weights = preds.iter().map(|p| ways.get(p).copied().unwrap_or(0.0));
            cell = match WeightedIndex::new(weights) {
                Ok(choice) => preds[choice.sample(rng)],
                Err(_) => return Err(NetworkError::NoPath { from: start, to: end }),
            };
            dist -= 1;
            path.push(cell);
        }
        path.reverse();
        Ok(path)
    }

    /// The length in moves of the shortest path from `start` to `end`, if one exists.
    pub fn shortest_path_len(&self, start: Cell, end: Cell) -> Option<usize> {
        self.distances_from(start).get(&end).copied()
    }

    /// Enumerates every minimum-length path from `start` to `end`.
    ///
    /// The number of paths grows combinatorially with distance; this is intended for
    /// small networks and for checking [Self::shortest_path].
    pub fn all_shortest_paths(&self, start: Cell, end: Cell) -> Result<Vec<Vec<Cell>>, NetworkError> {
        self.check_cell(start)?;
        self.check_cell(end)?;
        astar_bag_collect(
            &start,
            |cell| self.links_out(*cell).iter().map(|next| (*next, 1usize)),
            |cell| cell.manhattan(end),
            |cell| *cell == end,
        )
        .map(|(paths, _)| paths)
        .ok_or(NetworkError::NoPath { from: start, to: end })
    }

    /// Verifies that every start cell can reach every end cell.
    pub fn check_connected(&self, starts: &[Cell], ends: &[Cell]) -> Result<(), NetworkError> {
        for start in starts {
            self.check_cell(*start)?;
            let dists = self.distances_from(*start);
            if let Some(end) = ends.iter().find(|end| !dists.contains_key(end)) {
                return Err(NetworkError::NoPath { from: *start, to: *end });
            }
        }
        Ok(())
    }

    /// The number of moves needed to reach each reachable cell from `start`.
    fn distances_from(&self, start: Cell) -> HashMap<Cell, usize> {
        let mut dists: HashMap<Cell, usize> = dijkstra_all(&start, |cell| {
            self.links_out(*cell).iter().map(|next| (*next, 1usize))
        })
        .into_iter()
        .map(|(cell, (_, dist))| (cell, dist))
        .collect();
        dists.insert(start, 0);
        dists
    }

    /// The predecessors of `cell` that lie on a shortest path to it.
    fn shortest_preds<'a>(
        &'a self,
        cell: Cell,
        dist: usize,
        dists: &'a HashMap<Cell, usize>,
    ) -> impl Iterator<Item = Cell> + 'a {
        self.links_in(cell)
            .iter()
            .copied()
            .filter(move |p| dists.get(p).map_or(false, |d| d + 1 == dist))
    }

    fn add_link(&mut self, from: Cell, to: Cell) {
        self.links_out.entry(from).or_default().push(to);
        self.links_in.entry(to).or_default().push(from);
    }

    fn check_cell(&self, cell: Cell) -> Result<(), NetworkError> {
        if self.contains(cell) {
            Ok(())
        } else {
            Err(NetworkError::UnknownCell(cell))
        }
    }
}
