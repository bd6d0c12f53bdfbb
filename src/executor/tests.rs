//! Executor Module Tests
//!
//! ## Test Scopes
//! - **Queue Policy**: `block` applies backpressure, `drop` sheds and counts.
//! - **Workers**: direct jobs go out as acknowledged requests, batches as fire-and-forget.
//! - **Failure Handling**: errors and timeouts are counted and never retried.

#[cfg(test)]
mod tests {
    use crate::error::{QueueError, TransportError};
    use crate::executor::pool::{PoolConfig, WorkerPool};
    use crate::executor::queue::channel;
    use crate::executor::types::{JobValues, OverflowPolicy, PropagationJob};
    use crate::node::protocol::Payload;
    use crate::store::types::Value;
    use crate::topology::types::NodeId;
    use crate::transport::types::Transport;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready_ok};

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn job(dest: &str, value: i64) -> PropagationJob {
        PropagationJob::single(id(dest), id("origin"), Value(value))
    }

    /// Records every message and acknowledges broadcasts.
    struct RecordingTransport {
        id: NodeId,
        sent: Mutex<Vec<(NodeId, Payload)>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: id("self"),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<(NodeId, Payload)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn node_id(&self) -> &NodeId {
            &self.id
        }

        async fn send(&self, dest: &NodeId, payload: Payload) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push((dest.clone(), payload));
            Ok(())
        }

        async fn rpc(&self, dest: &NodeId, payload: Payload) -> Result<Payload, TransportError> {
            self.sent.lock().unwrap().push((dest.clone(), payload));
            Ok(Payload::BroadcastOk)
        }
    }

    /// Fails, replies wrongly, or hangs, depending on the mode.
    enum Misbehavior {
        Unreachable,
        WrongReply,
        Hang,
    }

    struct BrokenTransport {
        id: NodeId,
        mode: Misbehavior,
        attempts: Mutex<usize>,
    }

    impl BrokenTransport {
        fn new(mode: Misbehavior) -> Arc<Self> {
            Arc::new(Self {
                id: id("self"),
                mode,
                attempts: Mutex::new(0),
            })
        }

        fn attempts(&self) -> usize {
            *self.attempts.lock().unwrap()
        }
    }

    #[async_trait]
    impl Transport for BrokenTransport {
        fn node_id(&self) -> &NodeId {
            &self.id
        }

        async fn send(&self, dest: &NodeId, payload: Payload) -> Result<(), TransportError> {
            self.rpc(dest, payload).await.map(|_| ())
        }

        async fn rpc(&self, dest: &NodeId, _payload: Payload) -> Result<Payload, TransportError> {
            *self.attempts.lock().unwrap() += 1;
            match self.mode {
                Misbehavior::Unreachable => Err(TransportError::UnknownPeer(dest.clone())),
                Misbehavior::WrongReply => Ok(Payload::TopologyOk),
                Misbehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Payload::BroadcastOk)
                }
            }
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn config(workers: usize) -> PoolConfig {
        PoolConfig {
            workers,
            send_timeout: Duration::from_millis(100),
        }
    }

    // ============================================================
    // QUEUE POLICY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_block_policy_waits_for_capacity() {
        // ARRANGE: queue with room for a single job
        let (queue, receiver) = channel(1, OverflowPolicy::Block);
        queue.enqueue(job("a", 1)).await.unwrap();

        // ACT: second enqueue cannot complete yet
        let mut pending = tokio_test::task::spawn(queue.enqueue(job("a", 2)));
        assert_pending!(pending.poll());

        // ACT: a worker takes the first job
        assert_eq!(receiver.try_recv(), Some(job("a", 1)));

        // ASSERT: the blocked enqueue is released and nothing was dropped
        assert!(pending.is_woken());
        assert_ready_ok!(pending.poll());
        assert_eq!(receiver.try_recv(), Some(job("a", 2)));
        assert_eq!(receiver.counters().snapshot().dropped, 0);
    }

    #[tokio::test]
    async fn test_drop_policy_sheds_and_counts() {
        let (queue, receiver) = channel(2, OverflowPolicy::Drop);

        queue.enqueue(job("a", 1)).await.unwrap();
        queue.enqueue(job("a", 2)).await.unwrap();
        let result = queue.enqueue(job("a", 3)).await;

        assert_eq!(result, Err(QueueError::Full));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.counters().snapshot().dropped, 1);

        // The queued jobs are intact, the dropped one is gone
        assert_eq!(receiver.try_recv(), Some(job("a", 1)));
        assert_eq!(receiver.try_recv(), Some(job("a", 2)));
        assert_eq!(receiver.try_recv(), None);
    }

    #[tokio::test]
    async fn test_enqueue_after_receiver_dropped_is_closed() {
        let (queue, receiver) = channel(4, OverflowPolicy::Block);
        drop(receiver);

        assert_eq!(queue.enqueue(job("a", 1)).await, Err(QueueError::Closed));
    }

    #[test]
    fn test_job_payloads() {
        let single = PropagationJob::single(id("b"), id("a"), Value(5));
        let batch = PropagationJob::batch(id("b"), id("a"), vec![Value(1), Value(2)]);

        assert_eq!(single.payload(), Payload::Broadcast { message: Value(5) });
        assert_eq!(
            batch.payload(),
            Payload::Flush {
                messages: vec![Value(1), Value(2)]
            }
        );
        assert_eq!(batch.values, JobValues::Batch(vec![Value(1), Value(2)]));
    }

    // ============================================================
    // WORKER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_workers_deliver_every_job() {
        let transport = RecordingTransport::new();
        let (queue, receiver) = channel(64, OverflowPolicy::Block);
        let pool = WorkerPool::start(receiver, transport.clone(), config(4));

        for value in 0..20 {
            queue.enqueue(job("peer", value)).await.unwrap();
        }
        queue
            .enqueue(PropagationJob::batch(id("peer"), id("self"), vec![Value(100)]))
            .await
            .unwrap();

        wait_for(|| pool.stats().sent == 21).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 21);
        assert!(sent.iter().all(|(dest, _)| dest == &id("peer")));
        assert!(sent.contains(&(
            id("peer"),
            Payload::Flush {
                messages: vec![Value(100)]
            }
        )));
        assert_eq!(pool.worker_count(), 4);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_send_is_counted_not_retried() {
        let transport = BrokenTransport::new(Misbehavior::Unreachable);
        let (queue, receiver) = channel(8, OverflowPolicy::Block);
        let pool = WorkerPool::start(receiver, transport.clone(), config(2));

        queue.enqueue(job("ghost", 1)).await.unwrap();

        wait_for(|| pool.stats().failed == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.attempts(), 1, "Failed jobs must not be requeued");
        assert_eq!(pool.stats().sent, 0);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_unexpected_reply_counts_as_failure() {
        let transport = BrokenTransport::new(Misbehavior::WrongReply);
        let (queue, receiver) = channel(8, OverflowPolicy::Block);
        let pool = WorkerPool::start(receiver, transport, config(1));

        queue.enqueue(job("peer", 1)).await.unwrap();

        wait_for(|| pool.stats().failed == 1).await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_slow_peer_times_out_and_frees_worker() {
        let transport = BrokenTransport::new(Misbehavior::Hang);
        let (queue, receiver) = channel(8, OverflowPolicy::Block);
        let pool = WorkerPool::start(receiver, transport.clone(), config(1));

        queue.enqueue(job("slow", 1)).await.unwrap();
        queue.enqueue(job("slow", 2)).await.unwrap();

        // A single worker gets through both jobs because each send is bounded
        wait_for(|| pool.stats().failed == 2).await;
        assert_eq!(transport.attempts(), 2);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_workers() {
        let transport = RecordingTransport::new();
        let (_queue, receiver) = channel(8, OverflowPolicy::Block);
        let pool = WorkerPool::start(receiver, transport, config(3));

        tokio::time::timeout(Duration::from_secs(2), pool.shutdown())
            .await
            .expect("shutdown should not hang");
    }
}
