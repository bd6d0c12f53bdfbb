use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::{mpsc, oneshot};

use super::types::{MessageHandler, Transport};
use crate::error::{HandlerError, TransportError, codes};
use crate::node::protocol::{Body, Message, Payload, RawMessage, reply_id, request_id};
use crate::topology::types::NodeId;

/// Maelstrom-style transport over a line-oriented reader/writer pair (normally stdin/stdout).
pub struct StdioTransport {
    node_id: NodeId,
    node_ids: Vec<NodeId>,
    next_msg_id: AtomicU64,
    /// Outstanding RPCs by the `msg_id` of the request.
    pending: DashMap<u64, oneshot::Sender<Payload>>,
    outbox: mpsc::UnboundedSender<String>,
}

impl StdioTransport {
    /// Waits for the harness's `init`, answers it, and starts the writer task.
    ///
    /// Anything that arrives before `init` is logged and discarded.
    pub async fn handshake<R, W>(lines: &mut Lines<R>, writer: W) -> Result<Arc<Self>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbox, inbox) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, inbox));

        loop {
            let line = lines
                .next_line()
                .await
                .context("Failed to read from input")?
                .ok_or_else(|| anyhow!("Input closed before init"))?;

            let raw: RawMessage = match serde_json::from_str(&line) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Dropping undecodable line before init: {}", e);
                    continue;
                }
            };

            match Body::decode(raw.body) {
                Ok(Body {
                    msg_id,
                    payload: Payload::Init { node_id, node_ids },
                    ..
                }) => {
                    let transport = Arc::new(Self {
                        node_id,
                        node_ids,
                        next_msg_id: AtomicU64::new(1),
                        pending: DashMap::new(),
                        outbox,
                    });
                    transport.reply(&raw.src, msg_id, Payload::InitOk)?;

                    tracing::info!(
                        "Initialized as {} in a cluster of {} nodes",
                        transport.node_id,
                        transport.node_ids.len()
                    );
                    return Ok(transport);
                }
                Ok(body) => {
                    tracing::warn!("Ignoring {} received before init", body.payload.kind());
                }
                Err(e) => {
                    tracing::warn!("Ignoring invalid message before init: {}", e);
                }
            }
        }
    }

    /// Every node id in the cluster, as announced by `init`.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// RPCs still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Reads messages until input closes or a handler reports a fatal error.
    ///
    /// Replies to our own RPCs complete the matching request; everything else is handled
    /// on its own task so a slow handler never stalls the reader.
    pub async fn serve<R>(
        self: Arc<Self>,
        mut lines: Lines<R>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<HandlerError>(1);

        loop {
            tokio::select! {
                Some(err) = fatal_rx.recv() => {
                    return Err(anyhow!(err).context("Fatal error while handling a message"));
                }
                line = lines.next_line() => {
                    match line.context("Failed to read from input")? {
                        Some(line) => self.dispatch(line, &handler, &fatal_tx),
                        None => {
                            tracing::info!("Input closed, stopping");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        line: String,
        handler: &Arc<dyn MessageHandler>,
        fatal: &mpsc::Sender<HandlerError>,
    ) {
        let raw: RawMessage = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Dropping undecodable line: {}", e);
                return;
            }
        };

        if let Some(request) = reply_id(&raw.body) {
            self.complete(request, raw.body);
            return;
        }

        let msg_id = request_id(&raw.body);
        let src = raw.src;
        let body = match Body::decode(raw.body) {
            Ok(body) => body,
            Err(e) => {
                self.reject(&src, msg_id, &e);
                return;
            }
        };

        if let Payload::Init { .. } = body.payload {
            tracing::debug!("Repeated init from {}", src);
            if let Err(e) = self.reply(&src, msg_id, Payload::InitOk) {
                tracing::warn!("Failed to answer init: {}", e);
            }
            return;
        }

        let transport = self.clone();
        let handler = handler.clone();
        let fatal = fatal.clone();
        tokio::spawn(async move {
            match handler.handle(&src, body.payload).await {
                Ok(Some(reply)) => {
                    if let Err(e) = transport.reply(&src, msg_id, reply) {
                        tracing::warn!("Failed to reply to {}: {}", src, e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    transport.reject(&src, msg_id, &e);
                    if e.is_fatal() {
                        let _ = fatal.send(e).await;
                    }
                }
            }
        });
    }

    /// Hands a reply to the RPC waiting for it.
    fn complete(&self, request: u64, raw: serde_json::Value) {
        let payload = match Body::decode(raw) {
            Ok(body) => body.payload,
            Err(e) => Payload::Error {
                code: codes::MALFORMED_REQUEST,
                text: e.to_string(),
            },
        };

        match self.pending.remove(&request) {
            Some((_, waiter)) => {
                let _ = waiter.send(payload);
            }
            None => {
                tracing::debug!("Late or unknown reply to request {}", request);
            }
        }
    }

    fn reject(&self, dest: &NodeId, msg_id: Option<u64>, err: &HandlerError) {
        tracing::warn!("Rejecting message from {}: {}", dest, err);

        // Messages without a msg_id (flush) expect no answer
        if msg_id.is_some()
            && let Err(e) = self.reply(dest, msg_id, Payload::error(err))
        {
            tracing::warn!("Failed to send error reply to {}: {}", dest, e);
        }
    }

    fn reply(
        &self,
        dest: &NodeId,
        in_reply_to: Option<u64>,
        payload: Payload,
    ) -> Result<(), TransportError> {
        let body = Body {
            msg_id: Some(self.next_id()),
            in_reply_to,
            payload,
        };
        self.write(dest, body)
    }

    fn write(&self, dest: &NodeId, body: Body) -> Result<(), TransportError> {
        let message = Message {
            src: self.node_id.clone(),
            dest: dest.clone(),
            body,
        };
        let line = serde_json::to_string(&message)?;
        self.outbox.send(line).map_err(|_| TransportError::Closed)
    }

    fn next_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    async fn send(&self, dest: &NodeId, payload: Payload) -> Result<(), TransportError> {
        self.write(dest, Body::new(payload))
    }

    async fn rpc(&self, dest: &NodeId, payload: Payload) -> Result<Payload, TransportError> {
        let msg_id = self.next_id();
        let (waiter, reply) = oneshot::channel();
        self.pending.insert(msg_id, waiter);
        let _guard = PendingGuard {
            pending: &self.pending,
            msg_id,
        };

        self.write(
            dest,
            Body {
                msg_id: Some(msg_id),
                in_reply_to: None,
                payload,
            },
        )?;

        reply.await.map_err(|_| TransportError::Closed)
    }
}

/// Removes an RPC's pending entry however the call ends, including cancellation by timeout.
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, oneshot::Sender<Payload>>,
    msg_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.msg_id);
    }
}

async fn write_loop<W>(mut writer: W, mut inbox: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = inbox.recv().await {
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            tracing::error!("Failed to write message: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::error!("Failed to flush output: {}", e);
            break;
        }
    }
}
