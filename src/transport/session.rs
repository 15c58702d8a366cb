//! Client sessions
//!
//! One session per open event stream. A session owns the outgoing message
//! channel, the requests this server has sent to the client and is still
//! waiting on, and the repositories discovered from the client's roots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::protocol::{JsonRpcRequest, JsonRpcResponse, ListRootsResult};
use crate::error::{Result, TransportError};
use crate::git::filter_git_roots;

/// Outgoing messages buffered per session
const CHANNEL_CAPACITY: usize = 64;

/// Serialized JSON-RPC messages bound for the client
pub type Outgoing = mpsc::Receiver<String>;

#[derive(Debug)]
pub struct Session {
    id: String,
    sender: mpsc::Sender<String>,
    supports_roots: AtomicBool,
    next_request_id: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<JsonRpcResponse>>>,
    repositories: RwLock<Vec<PathBuf>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> (Arc<Self>, Outgoing) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let session = Self {
            id: id.into(),
            sender,
            supports_roots: AtomicBool::new(false),
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            repositories: RwLock::new(Vec::new()),
        };
        (Arc::new(session), receiver)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn supports_roots(&self) -> bool {
        self.supports_roots.load(Ordering::Relaxed)
    }

    pub fn set_supports_roots(&self, supported: bool) {
        self.supports_roots.store(supported, Ordering::Relaxed);
    }

    /// Repositories found among the client's roots at the last refresh
    pub async fn repositories(&self) -> Vec<PathBuf> {
        self.repositories.read().await.clone()
    }

    /// Queue a message for the event stream
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let text = serde_json::to_string(message)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        self.sender
            .send(text)
            .await
            .map_err(|_| TransportError::SessionClosed(self.id.clone()))?;
        Ok(())
    }

    /// Send a request to the client and wait for its reply
    #[instrument(skip(self, params), fields(session = %self.id))]
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let seq = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let id = Value::String(format!("srv-{}", seq));
        let key = id.to_string();

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(key.clone(), tx);

        let request = JsonRpcRequest::new(id, method, params);
        if let Err(e) = self.send(&request).await {
            self.pending.lock().await.remove(&key);
            return Err(e);
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(TransportError::SessionClosed(self.id.clone()).into()),
            Err(_) => {
                self.pending.lock().await.remove(&key);
                return Err(TransportError::RequestTimeout {
                    method: method.to_string(),
                    timeout,
                }
                .into());
            }
        };

        match (response.result, response.error) {
            (_, Some(error)) => Err(TransportError::ClientError {
                method: method.to_string(),
                message: error.message,
            }
            .into()),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    /// Route a client reply to the request waiting on it
    ///
    /// Returns `false` for replies nobody is waiting for.
    pub async fn resolve(&self, response: JsonRpcResponse) -> bool {
        let key = response.id.to_string();
        match self.pending.lock().await.remove(&key) {
            Some(waiter) => waiter.send(response).is_ok(),
            None => {
                debug!("Dropping reply to unknown request {}", key);
                false
            }
        }
    }

    /// Ask the client for its roots and keep the ones that are repositories
    ///
    /// Clients without the roots capability are not asked.
    pub async fn refresh_roots(&self, timeout: Duration) -> Result<Vec<PathBuf>> {
        let repositories = if self.supports_roots() {
            let result = self.request("roots/list", None, timeout).await?;
            let roots: ListRootsResult = serde_json::from_value(result)
                .map_err(|e| TransportError::Malformed(e.to_string()))?;
            filter_git_roots(roots.roots.iter().map(|root| root.uri.as_str()))
        } else {
            Vec::new()
        };

        info!(
            "Session {} has {} repositories: {:?}",
            self.id,
            repositories.len(),
            repositories
        );
        *self.repositories.write().await = repositories.clone();
        Ok(repositories)
    }
}

/// All live sessions, keyed by id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session with a fresh id
    pub async fn create(&self) -> (Arc<Session>, Outgoing) {
        let (session, outgoing) = Session::new(Uuid::new_v4().to_string());
        self.sessions
            .write()
            .await
            .insert(session.id().to_string(), Arc::clone(&session));
        info!("Session {} opened", session.id());
        (session, outgoing)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            info!("Session {} closed", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
