// ============================================================
// Layer 3 — KbChunk Domain Type
// ============================================================
// One entry of the knowledge base: the unit the retriever
// returns. Ids in the source JSON may be strings or integers;
// they are normalised to strings before a KbChunk is built so
// that KB ids and the chunk ids referenced by QA rows compare
// equal regardless of how they were written.

use serde::{Deserialize, Serialize};

/// A candidate document chunk from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbChunk {
    /// Normalised chunk identifier
    pub id: String,

    /// The chunk text that gets embedded into the corpus
    pub text: String,
}

impl KbChunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id:   id.into(),
            text: text.into(),
        }
    }
}
