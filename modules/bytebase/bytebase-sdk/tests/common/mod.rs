#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Common test utilities for bytebase-sdk integration tests

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytebase_sdk::models::User;
use bytebase_sdk::{Client, Request, Status, Transport};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// What the transport does with the next request.
pub enum Reply {
    Ok(Value),
    Err(Status),
    /// Never completes.
    Hang,
}

/// Records every request and answers from a queue of scripted replies.
/// An empty queue answers `{}`.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Request>>>,
    replies: Arc<Mutex<VecDeque<Reply>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn reply_ok(&self, body: Value) -> &Self {
        self.reply(Reply::Ok(body))
    }

    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }

    pub fn last(&self) -> Request {
        self.sent.lock().last().cloned().expect("no request was sent")
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: Request) -> Result<Value, Status> {
        self.sent.lock().push(request);
        let reply = self.replies.lock().pop_front();
        match reply {
            None => Ok(json!({})),
            Some(Reply::Ok(body)) => Ok(body),
            Some(Reply::Err(status)) => Err(status),
            Some(Reply::Hang) => std::future::pending().await,
        }
    }
}

pub fn admin() -> User {
    serde_json::from_value(json!({
        "name": "users/admin",
        "email": "admin@example.com",
        "title": "Admin",
    }))
    .unwrap()
}

pub fn client() -> (Client<RecordingTransport>, RecordingTransport) {
    let transport = RecordingTransport::new();
    (Client::new(transport.clone(), admin()), transport)
}

pub fn environment_json(id: &str, order: i32) -> Value {
    json!({ "name": format!("environments/{id}"), "title": id, "order": order })
}

pub fn project_json(id: &str) -> Value {
    json!({ "name": format!("projects/{id}"), "title": id })
}

pub fn database_json(instance: &str, name: &str, project: &str) -> Value {
    json!({
        "name": format!("instances/{instance}/databases/{name}"),
        "project": format!("projects/{project}"),
        "engine": "POSTGRES",
    })
}
