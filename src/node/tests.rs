//! Node Module Tests
//!
//! ## Test Scopes
//! - **Handlers**: acknowledgment, dedup-gated propagation and the Uninitialized state.
//! - **Wire Protocol**: Maelstrom-compatible JSON shapes and decode error classification.
//! - **Concurrency**: parallel announcements are never lost.

#[cfg(test)]
mod tests {
    use crate::dissemination::engine::DisseminationEngine;
    use crate::dissemination::types::{EngineConfig, PropagationMode};
    use crate::error::{HandlerError, codes};
    use crate::executor::queue::{JobReceiver, channel};
    use crate::executor::types::{JobValues, OverflowPolicy, PropagationJob};
    use crate::node::handlers::BroadcastNode;
    use crate::node::protocol::{Body, Message, Payload, RawMessage, request_id};
    use crate::store::types::Value;
    use crate::store::value_store::ValueStore;
    use crate::topology::model::TopologyModel;
    use crate::topology::types::{NodeId, Topology, TopologyMode};
    use crate::transport::types::MessageHandler;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn abc() -> Topology {
        [
            (id("a"), vec![id("b"), id("c")]),
            (id("b"), vec![id("a")]),
            (id("c"), vec![id("a")]),
        ]
        .into_iter()
        .collect()
    }

    fn node(local: &str, mode: PropagationMode) -> (Arc<BroadcastNode>, JobReceiver) {
        let store = Arc::new(ValueStore::new());
        let topology = Arc::new(TopologyModel::new(id(local), TopologyMode::Tree));
        let (queue, receiver) = channel(1024, OverflowPolicy::Block);
        let engine = Arc::new(DisseminationEngine::new(
            EngineConfig {
                mode,
                resync_every: 0,
            },
            topology.clone(),
            store.clone(),
            queue,
        ));
        (Arc::new(BroadcastNode::new(store, topology, engine)), receiver)
    }

    async fn active_node(local: &str) -> (Arc<BroadcastNode>, JobReceiver) {
        let (node, receiver) = node(local, PropagationMode::Direct);
        node.handle_topology(&abc()).await.unwrap();
        (node, receiver)
    }

    fn drain(receiver: &JobReceiver) -> Vec<PropagationJob> {
        let mut jobs = Vec::new();
        while let Some(job) = receiver.try_recv() {
            jobs.push(job);
        }
        jobs
    }

    fn values(v: &[i64]) -> BTreeSet<Value> {
        v.iter().copied().map(Value).collect()
    }

    // ============================================================
    // BROADCAST HANDLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_broadcast_is_acked_and_propagated_once() {
        let (node, receiver) = active_node("a").await;

        let first = node.handle(&id("c1"), Payload::Broadcast { message: Value(42) }).await;
        let second = node.handle(&id("c1"), Payload::Broadcast { message: Value(42) }).await;

        assert_eq!(first.unwrap(), Some(Payload::BroadcastOk));
        assert_eq!(second.unwrap(), Some(Payload::BroadcastOk), "Duplicates are still acked");
        assert_eq!(drain(&receiver).len(), 2, "One job per peer, only for the first arrival");
    }

    #[tokio::test]
    async fn test_broadcast_from_peer_is_not_echoed() {
        let (node, receiver) = active_node("a").await;

        node.handle(&id("b"), Payload::Broadcast { message: Value(42) })
            .await
            .unwrap();

        let dests: Vec<NodeId> = drain(&receiver).into_iter().map(|job| job.dest).collect();
        assert_eq!(dests, vec![id("c")]);
    }

    #[tokio::test]
    async fn test_broadcast_before_topology_is_rejected() {
        let (node, receiver) = node("a", PropagationMode::Direct);

        let err = node
            .handle(&id("c1"), Payload::Broadcast { message: Value(1) })
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Uninitialized));
        assert_eq!(err.code(), codes::TEMPORARILY_UNAVAILABLE);
        assert!(drain(&receiver).is_empty());
    }

    // ============================================================
    // READ HANDLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_read_returns_every_known_value() {
        let (node, _receiver) = active_node("a").await;
        for v in [3, 1, 2, 1] {
            node.handle_broadcast(&id("c1"), Value(v)).await.unwrap();
        }

        let reply = node.handle(&id("c1"), Payload::Read).await.unwrap();

        assert_eq!(
            reply,
            Some(Payload::ReadOk {
                messages: values(&[1, 2, 3])
            })
        );
    }

    #[tokio::test]
    async fn test_read_before_topology_is_empty() {
        let (node, _receiver) = node("a", PropagationMode::Direct);

        let reply = node.handle(&id("c1"), Payload::Read).await.unwrap();

        assert_eq!(
            reply,
            Some(Payload::ReadOk {
                messages: BTreeSet::new()
            })
        );
    }

    // ============================================================
    // TOPOLOGY HANDLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_topology_is_acked_on_every_delivery() {
        let (node, _receiver) = node("b", PropagationMode::Direct);

        for _ in 0..2 {
            let reply = node
                .handle(&id("c1"), Payload::Topology { topology: abc() })
                .await
                .unwrap();
            assert_eq!(reply, Some(Payload::TopologyOk));
        }
    }

    #[tokio::test]
    async fn test_topology_without_self_is_fatal() {
        let (node, _receiver) = node("x", PropagationMode::Direct);

        let err = node
            .handle(&id("c1"), Payload::Topology { topology: abc() })
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(err.code(), codes::CRASH);
    }

    // ============================================================
    // FLUSH HANDLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_flush_has_no_reply_and_repropagates_new_values() {
        let (node, receiver) = active_node("a").await;
        node.handle_broadcast(&id("c1"), Value(1)).await.unwrap();
        drain(&receiver);

        let reply = node
            .handle(
                &id("b"),
                Payload::Flush {
                    messages: vec![Value(1), Value(2), Value(3)],
                },
            )
            .await
            .unwrap();

        assert_eq!(reply, None);
        let jobs = drain(&receiver);
        assert_eq!(jobs.len(), 1, "Only c gets it: b sent the batch");
        assert_eq!(jobs[0].dest, id("c"));
        assert_eq!(jobs[0].values, JobValues::Batch(vec![Value(2), Value(3)]));
    }

    #[tokio::test]
    async fn test_flush_of_known_values_is_silent() {
        let (node, receiver) = active_node("a").await;
        node.handle_broadcast(&id("c1"), Value(1)).await.unwrap();
        drain(&receiver);

        node.handle_flush(&id("b"), vec![Value(1)]).await.unwrap();

        assert!(drain(&receiver).is_empty());
    }

    #[tokio::test]
    async fn test_flush_before_topology_is_rejected() {
        let (node, _receiver) = node("a", PropagationMode::Batched);

        let result = node.handle_flush(&id("b"), vec![Value(1)]).await;

        assert!(matches!(result, Err(HandlerError::Uninitialized)));
    }

    #[tokio::test]
    async fn test_reply_kinds_are_not_requests() {
        let (node, _receiver) = active_node("a").await;

        let err = node.handle(&id("b"), Payload::BroadcastOk).await.unwrap_err();

        assert!(matches!(err, HandlerError::NotSupported(kind) if kind == "broadcast_ok"));
    }

    // ============================================================
    // CONCURRENCY TESTS
    // ============================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_announcements_are_all_read() {
        let (node, _receiver) = active_node("b").await;
        let mut handles = Vec::new();

        for v in 0..100 {
            let node = node.clone();
            handles.push(tokio::spawn(async move {
                node.handle(&NodeId::new("c1"), Payload::Broadcast { message: Value(v) })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Some(Payload::BroadcastOk));
        }

        match node.handle_read().await {
            Payload::ReadOk { messages } => assert_eq!(messages.len(), 100),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    // ============================================================
    // WIRE PROTOCOL TESTS
    // ============================================================

    #[test]
    fn test_decode_broadcast_message() {
        let line = r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":1000,"msg_id":1}}"#;

        let raw: RawMessage = serde_json::from_str(line).unwrap();
        let body = Body::decode(raw.body).unwrap();

        assert_eq!(raw.src, id("c1"));
        assert_eq!(body.msg_id, Some(1));
        assert_eq!(body.payload, Payload::Broadcast { message: Value(1000) });
    }

    #[test]
    fn test_decode_topology_message() {
        let raw = json!({
            "type": "topology",
            "msg_id": 7,
            "topology": {"n1": ["n2", "n3"], "n2": ["n1"], "n3": ["n1"]}
        });

        let body = Body::decode(raw).unwrap();

        match body.payload {
            Payload::Topology { topology } => {
                assert_eq!(topology[&id("n1")], vec![id("n2"), id("n3")]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_type_is_not_supported() {
        let err = Body::decode(json!({"type": "cas", "msg_id": 3})).unwrap_err();

        assert!(matches!(err, HandlerError::NotSupported(_)));
        assert_eq!(err.code(), codes::NOT_SUPPORTED);
    }

    #[test]
    fn test_decode_bad_fields_is_malformed() {
        let raw = json!({"type": "broadcast", "message": "forty-two", "msg_id": 4});

        assert_eq!(request_id(&raw), Some(4), "msg_id survives a failed decode");
        let err = Body::decode(raw).unwrap_err();

        assert!(matches!(err, HandlerError::Malformed(_)));
        assert_eq!(err.code(), codes::MALFORMED_REQUEST);
    }

    #[test]
    fn test_decode_missing_type_is_malformed() {
        let err = Body::decode(json!({"msg_id": 1})).unwrap_err();

        assert!(matches!(err, HandlerError::Malformed(_)));
    }

    #[test]
    fn test_read_ok_wire_shape() {
        let reply = Message {
            src: id("n1"),
            dest: id("c1"),
            body: Body {
                msg_id: Some(5),
                in_reply_to: Some(2),
                payload: Payload::ReadOk {
                    messages: values(&[2, 1]),
                },
            },
        };

        let encoded = serde_json::to_value(&reply).unwrap();

        assert_eq!(
            encoded,
            json!({
                "src": "n1",
                "dest": "c1",
                "body": {"type": "read_ok", "msg_id": 5, "in_reply_to": 2, "messages": [1, 2]}
            })
        );
    }

    #[test]
    fn test_flush_wire_shape_has_no_ids() {
        let body = Body::new(Payload::Flush {
            messages: vec![Value(3)],
        });

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"type": "flush", "messages": [3]})
        );
    }

    #[test]
    fn test_error_payload_carries_code_and_text() {
        let payload = Payload::error(&HandlerError::Uninitialized);

        assert_eq!(
            serde_json::to_value(Body::new(payload)).unwrap(),
            json!({
                "type": "error",
                "code": 11,
                "text": "node has not received a topology yet"
            })
        );
    }
}
