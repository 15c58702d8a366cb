//! JSON-RPC method handling
//!
//! Transport-independent: takes one decoded message for a session and
//! produces the reply, if any.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::protocol::{
    CallToolParams, CallToolResult, IncomingMessage, InitializeParams, InitializeResult,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, error_codes,
};
use super::session::{Session, SessionRegistry};
use crate::tools::Dispatcher;

/// Shared server state handed to every connection
#[derive(Debug)]
pub struct ServerContext {
    dispatcher: Arc<Dispatcher>,
    sessions: SessionRegistry,
    roots_timeout: Duration,
}

impl ServerContext {
    pub fn new(dispatcher: Arc<Dispatcher>, roots_timeout: Duration) -> Self {
        Self {
            dispatcher,
            sessions: SessionRegistry::new(),
            roots_timeout,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Handle one client message; `None` when no reply is due
    #[instrument(skip(self, session, message), fields(session = %session.id()))]
    pub async fn handle_message(
        &self,
        session: &Arc<Session>,
        message: Value,
    ) -> Option<JsonRpcResponse> {
        let message = match IncomingMessage::parse(message) {
            Ok(message) => message,
            Err(e) => {
                warn!("Rejecting message: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    error_codes::INVALID_REQUEST,
                    e.to_string(),
                ));
            }
        };

        match message {
            IncomingMessage::Request(request) => Some(self.handle_request(session, request).await),
            IncomingMessage::Notification(notification) => {
                self.handle_notification(session, &notification.method);
                None
            }
            IncomingMessage::Response(response) => {
                session.resolve(response).await;
                None
            }
        }
    }

    async fn handle_request(&self, session: &Session, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.unwrap_or(Value::Null);
        let params = request.params.unwrap_or(Value::Null);
        debug!("Request {}: {}", id, request.method);

        match request.method.as_str() {
            "initialize" => {
                let params: InitializeParams = serde_json::from_value(params).unwrap_or_default();
                session.set_supports_roots(params.capabilities.roots.is_some());
                info!(
                    "Session {} initialized (client protocol {:?}, roots: {})",
                    session.id(),
                    params.protocol_version,
                    session.supports_roots()
                );
                reply(id, &InitializeResult::current())
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => reply(
                id,
                &ListToolsResult {
                    tools: self.dispatcher.list_tools(),
                },
            ),
            "tools/call" => {
                let params: CallToolParams = match serde_json::from_value(params) {
                    Ok(params) => params,
                    Err(e) => {
                        return JsonRpcResponse::error(
                            id,
                            error_codes::INVALID_PARAMS,
                            format!("Invalid tools/call params: {}", e),
                        );
                    }
                };

                match self.dispatcher.call(&params.name, params.arguments).await {
                    Ok(content) => reply(
                        id,
                        &CallToolResult {
                            content,
                            is_error: false,
                        },
                    ),
                    Err(e) => {
                        warn!("Tool {} failed: {}", params.name, e);
                        JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, e.to_string())
                    }
                }
            }
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        }
    }

    fn handle_notification(&self, session: &Arc<Session>, method: &str) {
        match method {
            "notifications/initialized" | "notifications/roots/list_changed" => {
                // The reply to roots/list arrives as a separate POST
                let session = Arc::clone(session);
                let timeout = self.roots_timeout;
                tokio::spawn(async move {
                    if let Err(e) = session.refresh_roots(timeout).await {
                        warn!("Could not list roots for session {}: {}", session.id(), e);
                    }
                });
            }
            other => debug!("Ignoring notification {}", other),
        }
    }
}

fn reply<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
    }
}
