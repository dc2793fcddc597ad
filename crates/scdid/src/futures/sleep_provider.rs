use core::{future::Future, time::Duration};

/// A trait that abstracts over how to sleep for a given [`Duration`] in async
/// contexts.
///
/// [`BufferedProxy`] sleeps between failed refills through this trait, which
/// keeps it generic over runtimes like `Tokio` or `Smol`.
///
/// [`BufferedProxy`]: crate::BufferedProxy
pub trait SleepProvider {
    /// Returns a future that completes once `dur` has elapsed.
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send;
}
