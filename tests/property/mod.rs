//! Property-based tests for change detection, debounce and versioning

mod changeset_folding;
