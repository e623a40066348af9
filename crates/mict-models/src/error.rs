//! Error types for the `mict-models` crate.

use mict_core::node::NodeError;

/// Errors that can occur while assembling model hierarchies.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A node in the hierarchy could not be built.
    #[error("failed to build node: {source}")]
    Node {
        /// The underlying node error.
        #[from]
        source: NodeError,
    },

    /// The requested organism shape cannot be built.
    #[error("invalid organism layout: {reason}")]
    InvalidLayout {
        /// Explanation of what is wrong.
        reason: String,
    },
}
