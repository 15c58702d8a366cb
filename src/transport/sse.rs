//! HTTP + Server-Sent Events transport
//!
//! `GET /sse` opens a session and streams its messages; the first event
//! (`endpoint`) tells the client where to post. `POST /messages` carries
//! one JSON-RPC message and is acknowledged with `202 Accepted`; the reply
//! goes out on the session's stream.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::server::ServerContext;

pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";

/// Build the transport router
pub fn router(context: Arc<ServerContext>) -> Router {
    Router::new()
        .route(SSE_PATH, get(open_stream))
        .route(MESSAGES_PATH, post(post_message))
        .with_state(context)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(context: Arc<ServerContext>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Listening on http://{} ({} and {})",
        listener.local_addr()?,
        SSE_PATH,
        MESSAGES_PATH
    );

    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Removes the session when its stream is dropped
struct SessionGuard {
    context: Arc<ServerContext>,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let context = Arc::clone(&self.context);
        let id = std::mem::take(&mut self.id);
        runtime.spawn(async move {
            context.sessions().remove(&id).await;
        });
    }
}

async fn open_stream(
    State(context): State<Arc<ServerContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (session, outgoing) = context.sessions().create().await;
    let endpoint = format!("{}?session_id={}", MESSAGES_PATH, session.id());
    let guard = SessionGuard {
        context: Arc::clone(&context),
        id: session.id().to_string(),
    };

    let first = stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint))
    });
    let messages = stream::unfold((outgoing, guard), |(mut outgoing, guard)| async move {
        let message = outgoing.recv().await?;
        Some((
            Ok::<_, Infallible>(Event::default().event("message").data(message)),
            (outgoing, guard),
        ))
    });

    Sse::new(first.chain(messages)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: String,
}

async fn post_message(
    State(context): State<Arc<ServerContext>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(session) = context.sessions().get(&query.session_id).await else {
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };

    let message: Value = match serde_json::from_str(&body) {
        Ok(message) => message,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("Could not parse message: {}", e))
                .into_response();
        }
    };

    // Tool calls can run long; answer the POST right away
    tokio::spawn(async move {
        if let Some(reply) = context.handle_message(&session, message).await {
            if let Err(e) = session.send(&reply).await {
                warn!("Could not deliver reply: {}", e);
            }
        }
    });

    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tools::Dispatcher;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn start() -> SocketAddr {
        let dispatcher = Arc::new(Dispatcher::new(&Config::default()));
        let context = Arc::new(ServerContext::new(dispatcher, Duration::from_secs(1)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(context)).await.unwrap();
        });
        addr
    }

    async fn post(addr: SocketAddr, path: &str, body: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            path,
            body.len(),
            body
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    /// Read from `stream` until `done` holds for everything read so far
    async fn read_until(stream: &mut TcpStream, buffer: &mut String, done: impl Fn(&str) -> bool) {
        let mut chunk = [0u8; 4096];
        while !done(buffer.as_str()) {
            let n = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut chunk))
                .await
                .unwrap()
                .unwrap();
            assert!(n > 0, "stream closed early: {:?}", buffer);
            buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let addr = start().await;
        let response = post(addr, "/messages?session_id=nope", "{}").await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn test_sse_round_trip() {
        let addr = start().await;

        let mut sse = TcpStream::connect(addr).await.unwrap();
        sse.write_all(b"GET /sse HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
            .await
            .unwrap();

        let mut buffer = String::new();
        read_until(&mut sse, &mut buffer, |b| {
            b.find("event: endpoint")
                .is_some_and(|at| b[at..].contains("\n\n"))
        })
        .await;

        let start = buffer.find("/messages?session_id=").unwrap();
        let endpoint: String = buffer[start..]
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();

        let response = post(addr, &endpoint, "not json").await;
        assert!(response.starts_with("HTTP/1.1 400"));

        let response = post(addr, &endpoint, r#"{"jsonrpc":"2.0","id":42,"method":"ping"}"#).await;
        assert!(response.starts_with("HTTP/1.1 202"));

        read_until(&mut sse, &mut buffer, |b| b.contains("\"id\":42")).await;
        assert!(buffer.contains("event: message"));
    }
}
