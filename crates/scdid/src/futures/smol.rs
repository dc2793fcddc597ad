use smol::Timer;

use crate::futures::SleepProvider;

/// An implementation of [`SleepProvider`] using Smol's timer.
pub struct SmolSleep;
impl SleepProvider for SmolSleep {
    async fn sleep_for(dur: core::time::Duration) {
        Timer::after(dur).await;
    }
}
