//! Placeholder for shared primitives common to every `blocks-*` crate.
//!
//! Nothing in this workspace currently depends on it; kept as a landing
//! spot for future cross-cutting types.
