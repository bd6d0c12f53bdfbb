//! HTTP Transport
//!
//! Every node serves a single `POST /message` endpoint that takes a full envelope.
//! Requests are answered in the HTTP response: `200` with a reply envelope, `204` for
//! messages that take no reply (`flush`), or an error status with an `error` envelope.
//!
//! Identity and peer addresses come from configuration, so `init` is not used here.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use super::types::{MessageHandler, Transport};
use crate::error::{HandlerError, TransportError};
use crate::node::protocol::{Body, Message, Payload, RawMessage, request_id};
use crate::topology::types::NodeId;

pub const ENDPOINT_MESSAGE: &str = "/message";

pub struct HttpTransport {
    node_id: NodeId,
    peers: HashMap<NodeId, SocketAddr>,
    http_client: reqwest::Client,
    next_msg_id: AtomicU64,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        node_id: NodeId,
        peers: HashMap<NodeId, SocketAddr>,
        request_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            peers,
            http_client: reqwest::Client::new(),
            next_msg_id: AtomicU64::new(1),
            request_timeout,
        })
    }

    pub fn peer_addr(&self, peer: &NodeId) -> Option<SocketAddr> {
        self.peers.get(peer).copied()
    }

    /// Serves `POST /message` on `listen` until a handler reports a fatal error.
    pub async fn serve(
        self: Arc<Self>,
        listen: SocketAddr,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()> {
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<String>(1);
        let state = HttpState {
            transport: self.clone(),
            handler,
            fatal: fatal_tx,
        };

        let app = Router::new()
            .route(ENDPOINT_MESSAGE, post(handle_message))
            .layer(Extension(state));

        let listener = tokio::net::TcpListener::bind(listen)
            .await
            .with_context(|| format!("Failed to bind {}", listen))?;
        tracing::info!("Node {} listening on http://{}", self.node_id, listen);

        tokio::select! {
            result = axum::serve(listener, app).into_future() => {
                result.context("HTTP server failed")?;
                Ok(())
            }
            Some(reason) = fatal_rx.recv() => {
                Err(anyhow!("Fatal error while handling a message: {}", reason))
            }
        }
    }

    fn envelope(&self, dest: &NodeId, in_reply_to: Option<u64>, payload: Payload) -> Message {
        Message {
            src: self.node_id.clone(),
            dest: dest.clone(),
            body: Body {
                msg_id: Some(self.next_id()),
                in_reply_to,
                payload,
            },
        }
    }

    fn next_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn post_message(
        &self,
        dest: &NodeId,
        payload: Payload,
    ) -> Result<reqwest::Response, TransportError> {
        let addr = self
            .peer_addr(dest)
            .ok_or_else(|| TransportError::UnknownPeer(dest.clone()))?;
        let url = format!("http://{}{}", addr, ENDPOINT_MESSAGE);
        let message = self.envelope(dest, None, payload);

        let response = self
            .http_client
            .post(url)
            .json(&message)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::UnexpectedReply {
                peer: dest.clone(),
                reply: format!("HTTP {}", response.status()),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    async fn send(&self, dest: &NodeId, payload: Payload) -> Result<(), TransportError> {
        self.post_message(dest, payload).await.map(|_| ())
    }

    async fn rpc(&self, dest: &NodeId, payload: Payload) -> Result<Payload, TransportError> {
        let response = self.post_message(dest, payload).await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Err(TransportError::UnexpectedReply {
                peer: dest.clone(),
                reply: "no content".to_string(),
            });
        }

        let reply: RawMessage = response.json().await?;
        Body::decode(reply.body)
            .map(|body| body.payload)
            .map_err(|e| TransportError::UnexpectedReply {
                peer: dest.clone(),
                reply: e.to_string(),
            })
    }
}

#[derive(Clone)]
struct HttpState {
    transport: Arc<HttpTransport>,
    handler: Arc<dyn MessageHandler>,
    fatal: mpsc::Sender<String>,
}

async fn handle_message(
    Extension(state): Extension<HttpState>,
    Json(raw): Json<RawMessage>,
) -> Response {
    let msg_id = request_id(&raw.body);
    let src = raw.src;

    let body = match Body::decode(raw.body) {
        Ok(body) => body,
        Err(e) => return error_response(&state.transport, &src, msg_id, &e),
    };

    match state.handler.handle(&src, body.payload).await {
        Ok(Some(reply)) => {
            let message = state.transport.envelope(&src, msg_id, reply);
            (StatusCode::OK, Json(message)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            let response = error_response(&state.transport, &src, msg_id, &e);
            if e.is_fatal() {
                let _ = state.fatal.try_send(e.to_string());
            }
            response
        }
    }
}

fn error_response(
    transport: &HttpTransport,
    dest: &NodeId,
    msg_id: Option<u64>,
    err: &HandlerError,
) -> Response {
    tracing::warn!("Rejecting message from {}: {}", dest, err);

    let status = match err {
        HandlerError::Malformed(_) | HandlerError::NotSupported(_) => StatusCode::BAD_REQUEST,
        HandlerError::Uninitialized => StatusCode::SERVICE_UNAVAILABLE,
        HandlerError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = transport.envelope(dest, msg_id, Payload::error(err));

    (status, Json(message)).into_response()
}
