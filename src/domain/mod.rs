// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, errors, and traits that describe the
// fine-tuning problem:
//
//   - KbChunk:   one candidate document from the knowledge base
//   - QaPair:    one generated (anchor, positive) training row
//   - PipelineError: the fatal checks run before any work begins
//   - TextEncoder / ModelPublisher: the seams other layers implement
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//
// Keeping the evaluator and the publisher behind traits means
// the retrieval metrics and the upload decision can be unit
// tested without a model or a network.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A knowledge-base chunk (id → text)
pub mod kb_chunk;

// An anchor/positive training pair with identifiers
pub mod qa_pair;

// Typed fatal errors for preflight checks
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
