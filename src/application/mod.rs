// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (fine-tuning or scoring a saved model).
//
// Rules for this layer:
//   - No ML math or model code here
//   - Printing only of the final metrics tables
//   - File formats belong to Layers 4 and 6
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// YAML pipeline configuration and CLI overrides
pub mod config;

// The fine-tuning workflow
pub mod train_use_case;

// Scoring a saved model
pub mod evaluate_use_case;
