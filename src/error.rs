//! Error types for the grid, the road network and the simulation.

use thiserror::Error;

use crate::{Cell, Occupant};

/// Errors produced by [SpatialGrid](crate::SpatialGrid) mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("cell {0} is outside the grid")]
    OutOfBounds(Cell),

    #[error("{0:?} is already on the grid")]
    AlreadyPlaced(Occupant),

    #[error("{0:?} is not on the grid")]
    NotPlaced(Occupant),
}

/// Errors produced by [RoadNetwork](crate::RoadNetwork) queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("no path from {from} to {to}")]
    NoPath { from: Cell, to: Cell },

    #[error("cell {0} is not a road cell")]
    UnknownCell(Cell),
}

/// Errors produced while building or stepping a [Simulation](crate::Simulation).
#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error("grid saturated: no free entry point after {attempts} attempts")]
    GridSaturated { attempts: usize },

    #[error("no exit far enough from {start} after {attempts} attempts")]
    NoDistantExit { start: Cell, attempts: usize },

    #[error("vehicle path is empty or leaves the grid")]
    InvalidPath,

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

pub type SimResult<T> = Result<T, SimError>;
