mod sleep_provider;
#[cfg(feature = "async-smol")]
mod smol;
#[cfg(feature = "async-tokio")]
mod tokio;

pub use sleep_provider::*;
#[cfg_attr(docsrs, doc(cfg(feature = "async-smol")))]
#[cfg(feature = "async-smol")]
pub use self::smol::*;
#[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
#[cfg(feature = "async-tokio")]
pub use self::tokio::*;
