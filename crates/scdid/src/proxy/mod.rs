mod buffered;
#[cfg(all(test, feature = "async-tokio"))]
mod tests;

pub use buffered::*;
