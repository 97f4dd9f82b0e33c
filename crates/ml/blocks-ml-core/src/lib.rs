//! Placeholder for primitives shared across the `blocks-ml-*` crates.
