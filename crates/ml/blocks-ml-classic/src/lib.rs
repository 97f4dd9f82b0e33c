/*!
Binary classification trees over binary-featured data, plus a greedy CART
reference implementation used as an external point of comparison for the
Bayesian CART searchers in `blocks-ml-bcrt`.

# Available types
- [`Dataset`](algorithms::trees::dataset): column-major bitset view over binary-featured data
- [`Node`](algorithms::trees::tree): binary classification tree, with parenthesized serialization
- [`cart_fit`](algorithms::trees::cart): greedy Gini-impurity decision tree trainer

See the `blocks-ml-bcrt` crate for the Bayesian CART MAP, MCMC and SMC
searchers built on top of this crate's dataset and tree types.
*/

pub mod algorithms;
pub mod error;

pub use error::{Error, Result};
