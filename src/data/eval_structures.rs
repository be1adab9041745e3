// ============================================================
// Layer 4 — Evaluation Structures
// ============================================================
// Turns the KB and the held-out QA rows into the three maps
// the retrieval evaluator needs:
//
//   corpus        : KB id      → chunk text
//   queries       : QA row id  → anchor text
//   relevant_docs : QA row id  → { KB ids that answer it }
//
// Several rows may share one query id (the same question
// generated against different chunks); their chunk ids are
// grouped under that single query. Rows without a
// global_chunk_id stay in `queries` but contribute no
// relevant docs, and a warning is logged for each.
//
// BTreeMap keeps every map in a stable order so rankings and
// reports are reproducible.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::kb_chunk::KbChunk;
use crate::domain::qa_pair::QaPair;

/// The lookup maps consumed by the retrieval evaluator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationSet {
    pub corpus:        BTreeMap<String, String>,
    pub queries:       BTreeMap<String, String>,
    pub relevant_docs: BTreeMap<String, BTreeSet<String>>,
}

impl EvaluationSet {
    /// Query ids that have at least one relevant doc, in id order.
    /// Only these are scored.
    pub fn scorable_query_ids(&self) -> Vec<&String> {
        self.queries
            .keys()
            .filter(|id| self.relevant_docs.get(*id).is_some_and(|docs| !docs.is_empty()))
            .collect()
    }
}

/// Build corpus, queries, and relevant-doc maps in a single pass.
/// A duplicate KB id keeps the last text seen.
pub fn build_evaluation_structures(kb: &[KbChunk], test_rows: &[QaPair]) -> EvaluationSet {
    let corpus = kb
        .iter()
        .map(|chunk| (chunk.id.clone(), chunk.text.clone()))
        .collect();

    let mut queries       = BTreeMap::new();
    let mut relevant_docs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for row in test_rows {
        queries.insert(row.id.clone(), row.anchor.clone());

        let Some(chunk_id) = &row.global_chunk_id else {
            tracing::warn!("Missing 'global_chunk_id': {:?}", row);
            continue;
        };
        relevant_docs
            .entry(row.id.clone())
            .or_default()
            .insert(chunk_id.clone());
    }

    EvaluationSet { corpus, queries, relevant_docs }
}
