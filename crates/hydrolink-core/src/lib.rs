//! Links a water-resources network to a groundwater-model grid.
//!
//! The network is classified into typed elements and links, river arcs are
//! cut into segments at flow-altering nodes, and the overlay results of every
//! layer are consolidated into one record per grid cell.  A final pass checks
//! that features sharing a cell are connected in the network.

pub mod config;
pub mod connectivity;
pub mod diagnostics;
pub mod error;
pub mod grid;
pub mod network;
pub mod pipeline;
pub mod rivers;

pub use config::LinkageConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Scope, Severity};
pub use error::{LinkageError, Result};
pub use pipeline::{GridInputs, LinkageOutcome, LinkagePipeline, NetworkStage, RiverPieces};
