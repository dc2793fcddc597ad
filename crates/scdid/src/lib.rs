#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod allocator;
mod error;
mod futures;
mod id;
mod proxy;
#[cfg(feature = "serde")]
pub mod serde;
mod store;
mod time;

pub use crate::allocator::*;
pub use crate::error::*;
pub use crate::futures::*;
pub use crate::id::*;
pub use crate::proxy::*;
pub use crate::store::*;
pub use crate::time::*;
