//! Placeholder for primitives shared across the `blocks-stats-*` crates.
