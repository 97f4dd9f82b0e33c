pub mod trees;

// Re-export implemented algorithms
pub use trees::{cart_fit, CartParams, Dataset, Node, Subset};