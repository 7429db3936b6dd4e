//! Request hook: one request/response cycle with observable state.
//!
//! A hook is mounted by constructing it and unmounted by dropping it.
//! Every trigger (mount, `refetch`, poll tick, `execute`) starts its own
//! call; calls may overlap. Each call captures a generation number and only
//! the latest generation commits to the state.

use std::{
    sync::{
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    task::{JoinHandle, JoinSet},
};

use crate::{ApiClient, FetchError, Method, PollTimer};

/// Observable state of a hook.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
    /// Bumped by every `refetch()`.
    pub version: u64,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            version: 0,
        }
    }
}

/// Hook options.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// Fetch on mount and on every `refetch()`.
    pub auto_fetch: bool,
    /// Re-fetch on a fixed timer while mounted.
    pub refetch_interval: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::Get,
            body: None,
            auto_fetch: true,
            refetch_interval: None,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub const fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Only fetch on explicit `execute()`.
    #[must_use]
    pub const fn manual(mut self) -> Self {
        self.auto_fetch = false;
        self
    }

    #[must_use]
    pub const fn refetch_interval(mut self, every: Duration) -> Self {
        self.refetch_interval = Some(every);
        self
    }
}

/// Per-call replacements for the hook's configured request.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOverrides {
    pub body: Option<Value>,
    pub url: Option<String>,
    pub method: Option<Method>,
}

struct Target {
    url: String,
    method: Method,
    body: Option<Value>,
}

struct Shared<T> {
    client: ApiClient,
    target: RwLock<Target>,
    auto_fetch: bool,
    refetch_interval: Option<Duration>,
    state: watch::Sender<RequestState<T>>,
    generation: AtomicU64,
    mounted: AtomicBool,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<T> Shared<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn execute(&self, overrides: ExecuteOverrides) -> Result<T, FetchError> {
        if !self.mounted.load(Ordering::SeqCst) {
            return Err(FetchError::Cancelled);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let (url, method, body) = {
            let target = read(&self.target);
            (
                overrides.url.unwrap_or_else(|| target.url.clone()),
                overrides.method.unwrap_or(target.method),
                overrides.body.or_else(|| target.body.clone()),
            )
        };

        let result = self.client.request_as::<T>(method, &url, body).await;

        let latest = self.generation.load(Ordering::SeqCst) == generation;
        if latest && self.mounted.load(Ordering::SeqCst) {
            self.state.send_modify(|s| {
                match &result {
                    Ok(data) => s.data = Some(data.clone()),
                    Err(e) => s.error = Some(e.clone()),
                }
                s.loading = false;
            });
        } else {
            tracing::debug!(generation, %url, "Discarding stale response");
        }

        result
    }
}

/// A mounted request hook.
pub struct RequestHook<T = Value> {
    shared: Arc<Shared<T>>,
    refetch_tx: Option<mpsc::UnboundedSender<()>>,
    driver: Option<JoinHandle<()>>,
}

impl<T> RequestHook<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Mount a hook. With `auto_fetch` the first call starts right away.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(client: ApiClient, url: impl Into<String>, options: FetchOptions) -> Self {
        let (state, _) = watch::channel(RequestState::default());
        let shared = Arc::new(Shared {
            client,
            target: RwLock::new(Target {
                url: url.into(),
                method: options.method,
                body: options.body,
            }),
            auto_fetch: options.auto_fetch,
            refetch_interval: options.refetch_interval,
            state,
            generation: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
        });

        let mut hook = Self {
            shared,
            refetch_tx: None,
            driver: None,
        };
        hook.start_driver();
        hook
    }

    fn start_driver(&mut self) {
        if !self.shared.auto_fetch && self.shared.refetch_interval.is_none() {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.refetch_tx = Some(tx);
        self.driver = Some(tokio::spawn(drive(Arc::clone(&self.shared), rx)));
    }

    fn stop_driver(&mut self) {
        self.refetch_tx = None;
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> RequestState<T> {
        self.shared.state.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.shared.state.borrow().data.clone()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    #[must_use]
    pub fn error(&self) -> Option<FetchError> {
        self.shared.state.borrow().error.clone()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.state.borrow().version
    }

    #[must_use]
    pub fn url(&self) -> String {
        read(&self.shared.target).url.clone()
    }

    /// Run one call now and return its result for chaining.
    ///
    /// # Errors
    /// Returns the call's failure, or `Cancelled` once the hook is unmounted.
    pub async fn execute(&self, overrides: ExecuteOverrides) -> Result<T, FetchError> {
        self.shared.execute(overrides).await
    }

    /// Bump the version; auto-fetch hooks also start one new call.
    ///
    /// Manual hooks only record the bump; call `execute` instead.
    pub fn refetch(&self) {
        self.shared.state.send_modify(|s| s.version += 1);
        if self.shared.auto_fetch {
            if let Some(tx) = &self.refetch_tx {
                let _ = tx.send(());
            }
        }
    }

    /// Point the hook at a new address and restart it fresh.
    ///
    /// Calls still in flight for the old address no longer commit, and the
    /// polling timer starts over.
    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        {
            let mut target = write(&self.shared.target);
            if target.url == url {
                return;
            }
            target.url = url;
        }

        self.stop_driver();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.state.send_modify(|s| s.loading = false);
        self.start_driver();
    }

    /// Unmount the hook. Same as dropping it.
    pub fn unmount(self) {}
}

impl<T> Drop for RequestHook<T> {
    fn drop(&mut self) {
        self.shared.mounted.store(false, Ordering::SeqCst);
        self.refetch_tx = None;
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Runs auto and polled calls until aborted. Dropping it aborts its calls.
async fn drive<T>(shared: Arc<Shared<T>>, mut refetch_rx: mpsc::UnboundedReceiver<()>)
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let mut inflight = JoinSet::new();
    let mut timer = shared.refetch_interval.map(PollTimer::new);

    if shared.auto_fetch {
        spawn_call(&shared, &mut inflight);
    }

    loop {
        tokio::select! {
            request = refetch_rx.recv() => match request {
                Some(()) => spawn_call(&shared, &mut inflight),
                None => break,
            },
            () = next_tick(timer.as_mut()) => {
                tracing::trace!("Poll tick");
                spawn_call(&shared, &mut inflight);
            }
            Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
        }
    }
}

fn spawn_call<T>(shared: &Arc<Shared<T>>, inflight: &mut JoinSet<()>)
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let shared = Arc::clone(shared);
    inflight.spawn(async move {
        if let Err(e) = shared.execute(ExecuteOverrides::default()).await {
            tracing::debug!("Fetch cycle failed: {e}");
        }
    });
}

async fn next_tick(timer: Option<&mut PollTimer>) {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}
