mod interface;
mod sequence;

pub use interface::*;
pub use sequence::*;
