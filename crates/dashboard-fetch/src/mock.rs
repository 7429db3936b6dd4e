//! Scripted in-process transport.
//!
//! Useful for tests and offline demos: replies are served from a queue,
//! then from a fallback, and every request is recorded.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// A scripted reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: Result<HttpResponse, String>,
    delay: Duration,
}

impl MockReply {
    /// JSON body with the given status.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::raw(status, body.to_string())
    }

    /// Raw body with the given status.
    #[must_use]
    pub fn raw(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            outcome: Ok(HttpResponse {
                status,
                body: body.into(),
            }),
            delay: Duration::ZERO,
        }
    }

    /// No response at all.
    #[must_use]
    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            delay: Duration::ZERO,
        }
    }

    /// Resolve only after `delay`.
    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Transport serving scripted replies.
pub struct MockTransport {
    queue: Mutex<VecDeque<MockReply>>,
    fallback: Mutex<MockReply>,
    requests: Mutex<Vec<HttpRequest>>,
    count: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Transport answering `200 null` until told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(MockReply::raw(200, "null")),
            requests: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
        }
    }

    /// Queue a reply for the next unanswered request.
    pub fn push(&self, reply: MockReply) {
        lock(&self.queue).push_back(reply);
    }

    /// Reply used once the queue is empty.
    pub fn set_fallback(&self, reply: MockReply) {
        *lock(&self.fallback) = reply;
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);

        let reply = lock(&self.queue)
            .pop_front()
            .unwrap_or_else(|| lock(&self.fallback).clone());

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.outcome.map_err(TransportError)
    }
}
