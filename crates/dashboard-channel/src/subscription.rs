//! Named-list subscriptions over the push channel.
//!
//! A subscription asks for a list with a request event and keeps the latest
//! list the server answers with under the response event. It follows the
//! provider: whenever the channel is replaced it attaches to the new one.

use std::sync::{Arc, Mutex, MutexGuard};

use dashboard_core::models::{DepartmentName, ProfileName, TeamMember};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};

use crate::{ChannelProvider, ListenerId, PushChannel, protocol::events};

/// Department the team-member list starts with.
pub const DEFAULT_DEPARTMENT_ID: i64 = 2;

/// Request/response event pair of a named list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub request: String,
    pub response: String,
    /// Sent as the request payload.
    pub param: Option<Value>,
}

impl ListRequest {
    #[must_use]
    pub fn new(request: &str, response: &str) -> Self {
        Self {
            request: request.to_string(),
            response: response.to_string(),
            param: None,
        }
    }

    #[must_use]
    pub fn with_param(mut self, param: Value) -> Self {
        self.param = Some(param);
        self
    }
}

/// Listeners one subscription holds on one channel.
struct Attachment {
    channel: Arc<PushChannel>,
    listener: ListenerId,
    pending: Option<ListenerId>,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.channel.off(self.listener);
        if let Some(pending) = self.pending {
            self.channel.off(pending);
        }
    }
}

type Slot = Arc<Mutex<Option<Attachment>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Attachment>> {
    slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Live list kept in sync with the push server.
pub struct ListSubscription<T> {
    items: watch::Receiver<Vec<T>>,
    param: watch::Sender<Option<Value>>,
    slot: Slot,
    task: JoinHandle<()>,
}

impl<T> ListSubscription<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Subscribe through `provider`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(provider: &ChannelProvider, request: ListRequest) -> Self {
        let (items_tx, items) = watch::channel(Vec::new());
        let (param, params) = watch::channel(request.param.clone());
        let slot = Slot::default();
        let task = tokio::spawn(follow(
            request,
            provider.subscribe(),
            params,
            Arc::new(items_tx),
            slot.clone(),
        ));

        Self {
            items,
            param,
            slot,
            task,
        }
    }

    #[must_use]
    pub fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.items.clone()
    }

    #[must_use]
    pub fn param(&self) -> Option<Value> {
        self.param.borrow().clone()
    }

    /// Change the request payload. A different value re-requests the list.
    pub fn set_param(&self, value: Value) {
        self.param.send_if_modified(|param| {
            if param.as_ref() == Some(&value) {
                false
            } else {
                *param = Some(value);
                true
            }
        });
    }
}

impl ListSubscription<DepartmentName> {
    #[must_use]
    pub fn departments(provider: &ChannelProvider) -> Self {
        Self::new(
            provider,
            ListRequest::new(events::GET_DEPARTMENT_NAMES, events::DEPARTMENT_NAMES),
        )
    }
}

impl ListSubscription<ProfileName> {
    #[must_use]
    pub fn profiles(provider: &ChannelProvider) -> Self {
        Self::new(
            provider,
            ListRequest::new(events::GET_PROFILE_NAMES, events::PROFILE_NAMES),
        )
    }
}

impl ListSubscription<TeamMember> {
    /// Members of `department_id`, or of department 2 when `None`.
    #[must_use]
    pub fn team_members(provider: &ChannelProvider, department_id: Option<i64>) -> Self {
        let id = department_id.unwrap_or(DEFAULT_DEPARTMENT_ID);
        Self::new(
            provider,
            ListRequest::new(events::GET_TEAM_MEMBERS_BY_DEPARTMENT, events::TEAM_MEMBERS)
                .with_param(Value::from(id)),
        )
    }

    pub fn set_department(&self, department_id: i64) {
        self.set_param(Value::from(department_id));
    }
}

impl<T> Drop for ListSubscription<T> {
    fn drop(&mut self) {
        lock(&self.slot).take();
        self.task.abort();
    }
}

/// Non-arrays and arrays of the wrong shape both become an empty list.
fn decode_list<T: DeserializeOwned>(event: &str, payload: &Value) -> Vec<T> {
    if !payload.is_array() {
        tracing::warn!(event, "Expected a list payload");
        return Vec::new();
    }
    serde_json::from_value(payload.clone()).unwrap_or_else(|e| {
        tracing::warn!(event, "Malformed list payload: {e}");
        Vec::new()
    })
}

fn attach<T>(
    channel: Arc<PushChannel>,
    request: &ListRequest,
    param: Option<Value>,
    items: &Arc<watch::Sender<Vec<T>>>,
) -> Attachment
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let listener = {
        let items = items.clone();
        let event = request.response.clone();
        channel.on(&request.response, move |payload| {
            items.send_replace(decode_list(&event, payload));
        })
    };

    let event = request.request.clone();
    let pending = channel.once_connected(move |emitter| {
        if let Err(e) = emitter.emit(&event, param.unwrap_or(Value::Null)) {
            tracing::warn!(%event, "List request not sent: {e}");
        }
    });

    Attachment {
        channel,
        listener,
        pending,
    }
}

async fn follow<T>(
    request: ListRequest,
    mut channels: watch::Receiver<Option<Arc<PushChannel>>>,
    mut params: watch::Receiver<Option<Value>>,
    items: Arc<watch::Sender<Vec<T>>>,
    slot: Slot,
) where
    T: DeserializeOwned + Send + Sync + 'static,
{
    loop {
        let channel = channels.borrow_and_update().clone();
        let param = params.borrow_and_update().clone();
        let attachment = channel.map(|channel| attach(channel, &request, param, &items));
        // replacing drops the previous attachment, removing its listeners
        *lock(&slot) = attachment;

        tokio::select! {
            changed = channels.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = params.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
