use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Serializes calls per endpoint key and spaces them by a minimum interval.
///
/// One gate is shared by every worker of a run. Calls on different keys
/// proceed concurrently; calls on the same key wait for the previous call to
/// finish and for `min_interval` to elapse after it.
pub struct RequestGate {
    min_interval: Duration,
    lanes: StdMutex<HashMap<String, Arc<Mutex<Option<Instant>>>>>,
}

impl RequestGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            lanes: StdMutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn lane(&self, key: &str) -> Arc<Mutex<Option<Instant>>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        lanes
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Run `call` once the lane for `key` is free and cooled down.
    pub async fn run<F, T>(&self, key: &str, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let lane = self.lane(key);
        let mut last_finished = lane.lock().await;

        if let Some(previous) = *last_finished {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                debug!("Gate {} waiting {:?}", key, ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let output = call.await;
        *last_finished = Some(Instant::now());
        output
    }
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}
