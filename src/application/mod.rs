// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// One use case per subcommand. Each wires the data, ml and infra
// layers together for a single goal and returns a report; the
// CLI decides what to print.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No direct file parsing (that's Layers 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Fetch the dataset and copy it into the project
pub mod download_use_case;

/// Fine-tune the classifier and write model + metrics
pub mod train_use_case;

/// Score a saved model on a labeled split
pub mod evaluate_use_case;

/// Classify one image with a saved model
pub mod predict_use_case;
