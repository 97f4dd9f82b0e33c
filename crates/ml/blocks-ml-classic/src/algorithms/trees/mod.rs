//! Binary classification trees over binary-featured data: the dataset
//! view, tree representation, and a CART reference implementation used to
//! compare against the Bayesian searchers in `blocks-ml-bcrt`.

mod bitset;
pub mod cart;
pub mod dataset;
pub mod metrics;
pub mod tree;

pub use bitset::Bitset;
pub use cart::{fit as cart_fit, CartParams};
pub use dataset::{Dataset, Subset};
pub use metrics::{accuracy, log_posterior_of};
pub use tree::Node;
