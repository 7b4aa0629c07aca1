//! Error types for the battle simulation.
//!
//! Orders issued during a running battle never fail: rejected orders are
//! silent no-ops. Errors are reserved for setup and lifecycle calls whose
//! failure the host has to react to.

use thiserror::Error;

use crate::battle::BattlePhase;
use crate::grid::Cell;
use crate::stats::Side;

/// Result type alias using [`BattleError`].
pub type Result<T> = std::result::Result<T, BattleError>;

/// Top-level error type for all battle errors.
#[derive(Debug, Error)]
pub enum BattleError {
    /// A lifecycle call was made in the wrong phase.
    #[error("Invalid battle phase: expected {expected:?}, found {found:?}")]
    InvalidPhase {
        /// Phase the call requires.
        expected: BattlePhase,
        /// Phase the battle is in.
        found: BattlePhase,
    },

    /// No deployment candidates are left for a side.
    #[error("Insufficient deployment room for {0:?}")]
    InsufficientDeploymentRoom(Side),

    /// The requested cell is not a valid deployment cell.
    #[error("Cell ({}, {}) is not deployable for {side:?}", cell.x, cell.y)]
    CellNotDeployable {
        /// Side attempting the deployment.
        side: Side,
        /// Rejected cell.
        cell: Cell,
    },

    /// The deployment queue has no entry at the given index.
    #[error("No queued unit at index {index} for {side:?}")]
    UnknownQueueEntry {
        /// Side whose queue was addressed.
        side: Side,
        /// Requested index.
        index: usize,
    },

    /// The side is not interactive and cannot be deployed by hand.
    #[error("{0:?} is deployed automatically")]
    NotInteractive(Side),

    /// Failed to parse a RON data file.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Reading a data file failed.
    #[error("Failed to read data file: {0}")]
    Io(#[from] std::io::Error),
}
