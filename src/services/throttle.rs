use parking_lot::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::info;

/// Fixed-delay throttle for provider requests.
///
/// The first call returns immediately; every later call sleeps the full
/// configured delay first. A batch of N requests therefore waits N-1 times
/// and never after its last request.
pub struct Throttle {
    /// Time between the end of one request and the start of the next
    delay: Duration,
    /// Start of the most recent request, `None` before the first one
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the next request may start.
    pub async fn acquire(&self) {
        let is_first = self.last_request.lock().is_none();

        if !is_first && !self.delay.is_zero() {
            info!("Waiting {} seconds...", self.delay.as_secs_f64());
            sleep(self.delay).await;
        }

        *self.last_request.lock() = Some(Instant::now());
    }

    /// Start of the most recent request, if any.
    pub fn last_request(&self) -> Option<Instant> {
        *self.last_request.lock()
    }
}
