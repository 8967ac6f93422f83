//! Fatal preconditions.  Anything listed here aborts the stage that needs it;
//! data-quality issues go to [`crate::diagnostics::Diagnostics`] instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkageError {
    /// A mandatory attribute column is absent from an input table.
    #[error("table [{table}] has no column [{column}]")]
    MissingColumn { table: String, column: String },

    /// A column exists but holds a value of the wrong type.
    #[error("table [{table}] row {row}: column [{column}] {reason}")]
    InvalidAttribute {
        table: String,
        row: usize,
        column: String,
        reason: String,
    },

    /// Feature names of a grid layer that no network node of the same kind carries.
    #[error("layer [{layer}] names not present in the network: {}", names.join(", "))]
    UnknownFeatures { layer: String, names: Vec<String> },

    /// The same feature name was found in more than one map of a layer.
    #[error("layer [{layer}]: name [{name}] appears in more than one map ({})", maps.join(", "))]
    DuplicatedAcrossMaps {
        layer: String,
        name: String,
        maps: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, LinkageError>;
