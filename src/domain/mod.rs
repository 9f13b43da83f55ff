// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the concepts of the
// defect classifier: a labeled image on disk, the set of class
// names shared by both splits, and the sources that produce them.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A single image file tagged with its class index
pub mod labeled_image;

// The ordered list of class names discovered from directories
pub mod class_set;

// Core abstractions (traits) that other layers implement
pub mod traits;
