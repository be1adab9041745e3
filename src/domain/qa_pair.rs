// ============================================================
// Layer 3 — QaPair Domain Type
// ============================================================
// One row of the generated question dataset:
//
//   anchor   — a question-like text (becomes the query)
//   positive — the chunk text that answers it
//   id       — query identifier (row index when the file has none)
//   global_chunk_id — the KB id the anchor was generated from
//
// In the input file the KB reference is called `chunk_id`;
// the loader renames it to `global_chunk_id`. Rows without it
// can still be trained on, but they cannot be scored by the
// retrieval evaluator.
//
// Example:
//   anchor:   "When does the spring term start?"
//   positive: "The spring term starts on 12 January ..."
//   id:       "17"
//   global_chunk_id: Some("kb-0042")

use serde::{Deserialize, Serialize};

/// A labelled anchor/positive pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    /// Query identifier, normalised to a string
    pub id: String,

    /// The query-like text
    pub anchor: String,

    /// The matching document chunk text
    pub positive: String,

    /// KB id of the chunk this pair was generated from, if known
    pub global_chunk_id: Option<String>,
}

impl QaPair {
    pub fn new(
        id:       impl Into<String>,
        anchor:   impl Into<String>,
        positive: impl Into<String>,
    ) -> Self {
        Self {
            id:              id.into(),
            anchor:          anchor.into(),
            positive:        positive.into(),
            global_chunk_id: None,
        }
    }

    /// Attach the KB chunk id this pair refers to
    pub fn with_chunk(mut self, chunk_id: impl Into<String>) -> Self {
        self.global_chunk_id = Some(chunk_id.into());
        self
    }
}
