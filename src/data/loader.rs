// ============================================================
// Layer 4 — Dataset Loaders
// ============================================================
// Two input formats:
//
//   Knowledge base (JSON array):
//     [{"id": "kb-1", "text": "..."}, {"id": 2, "text": "..."}]
//
//   Training pairs (JSON lines):
//     {"anchor": "...", "positive": "...", "chunk_id": "kb-1"}
//     {"anchor": "...", "positive": "...", "chunk_id": 2, "id": 9}
//
// Field handling for the training file:
//   - `chunk_id` is renamed to `global_chunk_id`
//     (a row may also carry `global_chunk_id` directly)
//   - rows without `id` get their 0-based line index as id
//
// Ids may be strings or integers in either file. They are all
// normalised to strings so `2` and `"2"` refer to the same chunk.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::kb_chunk::KbChunk;
use crate::domain::qa_pair::QaPair;

/// Field name used in the raw training file for the KB reference
const RAW_CHUNK_FIELD: &str = "chunk_id";
/// Field name the rest of the pipeline uses for the KB reference
const CHUNK_FIELD: &str = "global_chunk_id";

/// Convert a JSON id (string or number) into its string form.
/// Returns None for null, booleans, arrays and objects.
pub fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _                => None,
    }
}

// ─── Knowledge Base ───────────────────────────────────────────────────────────
pub struct KnowledgeBaseLoader {
    path: PathBuf,
}

impl KnowledgeBaseLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the whole KB file. Every entry must have an `id` and a `text`.
    pub fn load(&self) -> Result<Vec<KbChunk>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read knowledge base '{}'", self.path.display()))?;
        let rows: Vec<Map<String, Value>> = serde_json::from_str(&raw)
            .with_context(|| format!("Knowledge base '{}' is not a JSON array of objects", self.path.display()))?;

        let mut chunks = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let id = row.get("id")
                .and_then(normalize_id)
                .ok_or_else(|| anyhow!("KB entry {index} has no usable 'id'"))?;
            let text = row.get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("KB entry {index} ('{id}') has no 'text'"))?;
            chunks.push(KbChunk::new(id, text));
        }

        tracing::info!("Loaded {} knowledge base chunks from '{}'", chunks.len(), self.path.display());
        Ok(chunks)
    }
}

// ─── Training Pairs ───────────────────────────────────────────────────────────
pub struct QaPairLoader {
    path: PathBuf,
}

impl QaPairLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read every non-blank line of the JSON lines file as a QaPair.
    pub fn load(&self) -> Result<Vec<QaPair>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read training data '{}'", self.path.display()))?;
        let pairs = parse_qa_lines(&raw, &self.path)?;
        tracing::info!("Loaded {} training pairs from '{}'", pairs.len(), self.path.display());
        Ok(pairs)
    }
}

fn parse_qa_lines(raw: &str, source: &Path) -> Result<Vec<QaPair>> {
    let mut pairs = Vec::new();

    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: Map<String, Value> = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid JSON object", source.display(), line_no + 1))?;

        // Row index counts only data rows, so blank lines don't shift ids
        let index = pairs.len();
        pairs.push(row_to_pair(&row, index)
            .with_context(|| format!("{}:{}", source.display(), line_no + 1))?);
    }

    Ok(pairs)
}

fn row_to_pair(row: &Map<String, Value>, index: usize) -> Result<QaPair> {
    let text_field = |name: &str| -> Result<String> {
        row.get(name)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("missing string field '{name}'"))
    };

    let id = row.get("id")
        .and_then(normalize_id)
        .unwrap_or_else(|| index.to_string());

    let chunk = row.get(RAW_CHUNK_FIELD)
        .or_else(|| row.get(CHUNK_FIELD))
        .and_then(normalize_id);

    let mut pair = QaPair::new(id, text_field("anchor")?, text_field("positive")?);
    pair.global_chunk_id = chunk;
    Ok(pair)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_normalize_id_accepts_strings_and_numbers() {
        assert_eq!(normalize_id(&json!("kb-1")), Some("kb-1".to_string()));
        assert_eq!(normalize_id(&json!(42)), Some("42".to_string()));
        assert_eq!(normalize_id(&Value::Null), None);
    }

    #[test]
    fn test_chunk_id_renamed_and_index_ids_assigned() {
        let raw = concat!(
            "{\"anchor\": \"q0\", \"positive\": \"p0\", \"chunk_id\": 7}\n",
            "\n",
            "{\"anchor\": \"q1\", \"positive\": \"p1\"}\n",
        );
        let pairs = parse_qa_lines(raw, Path::new("train.jsonl")).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].id, "0");
        assert_eq!(pairs[0].global_chunk_id.as_deref(), Some("7"));
        assert_eq!(pairs[1].id, "1");
        assert_eq!(pairs[1].global_chunk_id, None);
    }

    #[test]
    fn test_explicit_ids_and_global_chunk_id_kept() {
        let raw = "{\"id\": \"q-9\", \"anchor\": \"a\", \"positive\": \"b\", \"global_chunk_id\": \"kb-3\"}";
        let pairs = parse_qa_lines(raw, Path::new("train.jsonl")).unwrap();
        assert_eq!(pairs[0].id, "q-9");
        assert_eq!(pairs[0].global_chunk_id.as_deref(), Some("kb-3"));
    }

    #[test]
    fn test_missing_anchor_is_an_error() {
        let raw = "{\"positive\": \"b\"}";
        let err = parse_qa_lines(raw, Path::new("train.jsonl")).unwrap_err();
        assert!(format!("{err:#}").contains("anchor"));
    }

    #[test]
    fn test_knowledge_base_loader_reads_mixed_ids() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", json!([
            {"id": "a", "text": "alpha", "source": "ignored"},
            {"id": 2, "text": "beta"}
        ])).unwrap();

        let chunks = KnowledgeBaseLoader::new(file.path()).load().unwrap();
        assert_eq!(chunks, vec![KbChunk::new("a", "alpha"), KbChunk::new("2", "beta")]);
    }
}
