//! Placeholder for shared helper functions common to every `blocks-*` crate.
