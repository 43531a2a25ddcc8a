use serde::{Deserialize, Serialize};

use crate::session::{BatchIndex, Payload};

/// Everything the terminal step needs to aggregate a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeInput {
    /// Exclusive upper bound of expected batch indices.
    pub last_index: BatchIndex,
    pub payload: Payload,
    /// Failed indices plus expected indices without a successful result, sorted.
    pub missing_batches: Vec<BatchIndex>,
    /// Successfully processed indices, sorted.
    pub processed_batches: Vec<BatchIndex>,
}
