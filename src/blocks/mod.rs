//! Content blocks and the ordered sequence that holds them.

pub mod types;
pub mod sequence;

pub use types::*;
pub use sequence::*;
