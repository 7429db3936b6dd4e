//! Fixed-delay polling.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::{ApiClient, FetchOptions, RequestHook};

/// Shortest accepted polling period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Repeating timer whose first tick is one period after creation.
///
/// No drift compensation: a late tick pushes the following ones back.
pub struct PollTimer {
    interval: Interval,
}

impl PollTimer {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

impl<T> RequestHook<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Mount a GET hook that fetches immediately and then every `every`.
    ///
    /// Polling keeps going through failures; each cycle surfaces its own error.
    #[must_use]
    pub fn polling(client: ApiClient, url: impl Into<String>, every: Duration) -> Self {
        Self::new(
            client,
            url,
            FetchOptions::default().refetch_interval(every),
        )
    }
}
