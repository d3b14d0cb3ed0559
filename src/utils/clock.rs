use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Represents an entity responsible for providing time across application. This allows the tick
/// loop to be driven by a paused clock in tests.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn instant(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
