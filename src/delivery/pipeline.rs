// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Single-worker delivery pipeline
//!
//! The capture path pushes finished artifacts through a [`DeliveryQueue`]
//! without ever waiting on the network. One worker drains the queue in FIFO
//! order, pausing a fixed delay before every dequeue attempt, so at most one
//! upload is in flight and the remote rate limit is respected. On shutdown the
//! worker keeps going until the queue is empty.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::{DeliveryError, DeliveryTask, Transport};
use crate::config::{DeliveryConfig, MAX_DELAY_SECS};
use crate::core::ShutdownSignal;
use crate::recording::Artifact;

/// Longest pause the worker will take between dequeue attempts
const MAX_INTER_ATTEMPT_DELAY: Duration = Duration::from_secs(MAX_DELAY_SECS as u64);

#[derive(Debug, Default)]
struct QueueCounters {
    next_id: AtomicU64,
    pending: AtomicU64,
}

/// Producer handle. Cheap to clone; `submit` never blocks.
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<DeliveryTask>,
    counters: Arc<QueueCounters>,
}

impl DeliveryQueue {
    /// Append an artifact to the queue. Ownership moves into the pipeline.
    pub fn submit(&self, artifact: Artifact) -> Result<u64, DeliveryError> {
        let id = self.counters.next_id.fetch_add(1, Ordering::Relaxed);
        let task = DeliveryTask::new(id, artifact);

        self.counters.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(task).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(DeliveryError::QueueClosed);
        }

        debug!("Queued delivery task {} ({} pending)", id, self.pending());
        Ok(id)
    }

    /// Tasks submitted but not yet taken by the worker
    pub fn pending(&self) -> u64 {
        self.counters.pending.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Totals reported when the worker exits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
    pub retried: u64,
    pub notified: u64,
    pub notify_failed: u64,
}

/// Consumer side: owns the queue receiver and the transport
pub struct DeliveryPipeline {
    transport: Arc<dyn Transport>,
    rx: mpsc::UnboundedReceiver<DeliveryTask>,
    counters: Arc<QueueCounters>,
    inter_attempt_delay: Duration,
    max_attempts: u32,
}

impl DeliveryPipeline {
    pub fn new(transport: Arc<dyn Transport>, config: &DeliveryConfig) -> (Self, DeliveryQueue) {
        Self::with_settings(transport, config.inter_attempt_delay(), config.max_attempts)
    }

    pub fn with_settings(
        transport: Arc<dyn Transport>,
        inter_attempt_delay: Duration,
        max_attempts: u32,
    ) -> (Self, DeliveryQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(QueueCounters::default());

        let pipeline = Self {
            transport,
            rx,
            counters: counters.clone(),
            inter_attempt_delay: inter_attempt_delay.min(MAX_INTER_ATTEMPT_DELAY),
            max_attempts: max_attempts.max(1),
        };

        (pipeline, DeliveryQueue { tx, counters })
    }

    /// Run the worker on the tokio runtime
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<PipelineReport> {
        tokio::spawn(self.run(shutdown))
    }

    /// Worker loop. Returns once shutdown was requested and the queue is empty,
    /// or once every producer handle is gone and the queue is empty.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> PipelineReport {
        let mut report = PipelineReport::default();
        let mut retry: Option<DeliveryTask> = None;

        info!(
            "Delivery worker started via {} (delay {:?}, max attempts {})",
            self.transport.name(),
            self.inter_attempt_delay,
            self.max_attempts
        );

        loop {
            if !self.wait_for_slot(&mut shutdown, retry.is_some()).await {
                break;
            }

            let task = match retry.take() {
                Some(task) => task,
                None => match self.rx.try_recv() {
                    Ok(task) => {
                        self.counters.pending.fetch_sub(1, Ordering::SeqCst);
                        task
                    }
                    Err(TryRecvError::Empty) => continue,
                    Err(TryRecvError::Disconnected) => {
                        info!("All producers gone and queue drained");
                        break;
                    }
                },
            };

            retry = self.deliver(task, &mut report).await;
        }

        info!(
            "Delivery worker stopped: {} delivered, {} failed, {} notified",
            report.delivered, report.failed, report.notified
        );
        report
    }

    /// Sleep out the inter-attempt delay. Returns `false` when the worker should
    /// exit instead: shutdown was requested and nothing is left to deliver.
    async fn wait_for_slot(&self, shutdown: &mut ShutdownSignal, holding_retry: bool) -> bool {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.inter_attempt_delay)
            .unwrap_or_else(|| now + MAX_INTER_ATTEMPT_DELAY);

        loop {
            if shutdown.is_triggered() && !holding_retry && self.counters.pending.load(Ordering::SeqCst) == 0 {
                return false;
            }

            tokio::select! {
                _ = sleep_until(deadline) => return true,
                _ = shutdown.triggered(), if !shutdown.is_triggered() => {
                    debug!("Shutdown requested; draining delivery queue");
                }
            }
        }
    }

    /// One upload attempt. Hands the task back when it should be retried.
    async fn deliver(&self, mut task: DeliveryTask, report: &mut PipelineReport) -> Option<DeliveryTask> {
        task.attempts += 1;
        report.attempts += 1;

        if task.attempts == 1 {
            let waited = chrono::Utc::now() - task.enqueued_at;
            debug!("Task {} waited {}s in queue", task.id, waited.num_seconds());
        }

        info!(
            "Uploading {} (task {}, attempt {}/{})",
            task.artifact.id, task.id, task.attempts, self.max_attempts
        );

        match self.transport.upload(&task.artifact).await {
            Ok(reference) => {
                report.delivered += 1;
                info!("Video uploaded successfully: {} -> {}", task.artifact.id, reference);

                match self.transport.notify(&reference).await {
                    Ok(()) => {
                        report.notified += 1;
                        info!("Notification sent for {}", task.artifact.id);
                    }
                    Err(e) => {
                        report.notify_failed += 1;
                        warn!("Notification failed for {}: {}", task.artifact.id, e);
                    }
                }
                None
            }
            Err(e) if task.attempts < self.max_attempts => {
                report.retried += 1;
                warn!("Upload of {} failed, will retry: {}", task.artifact.id, e);
                Some(task)
            }
            Err(e) => {
                report.failed += 1;
                error!(
                    "Upload of {} failed after {} attempt(s), dropping {:?}: {}",
                    task.artifact.id, task.attempts, task.artifact.path, e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shutdown;
    use crate::delivery::ShareableReference;
    use crate::recording::RecordingId;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Records every call; uploads of names listed in `failures` fail that many times
    #[derive(Default)]
    struct MockTransport {
        uploads: Mutex<Vec<(String, Instant)>>,
        notified: Mutex<Vec<ShareableReference>>,
        failures: Mutex<HashMap<String, u32>>,
        fail_notify: bool,
    }

    impl MockTransport {
        fn failing(name: &str, times: u32) -> Self {
            let transport = Self::default();
            transport.failures.lock().insert(name.to_string(), times);
            transport
        }

        fn upload_names(&self) -> Vec<String> {
            self.uploads.lock().iter().map(|(n, _)| n.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn name(&self) -> &str {
            "mock"
        }

        async fn upload(&self, artifact: &Artifact) -> Result<ShareableReference, DeliveryError> {
            let name = artifact.id.name().to_string();
            self.uploads.lock().push((name.clone(), Instant::now()));

            if let Some(left) = self.failures.lock().get_mut(&name) {
                if *left > 0 {
                    *left -= 1;
                    return Err(DeliveryError::Status { status: 429, body: "slow down".to_string() });
                }
            }
            Ok(ShareableReference::new(format!("https://clips.example/{}", name)))
        }

        async fn notify(&self, reference: &ShareableReference) -> Result<(), DeliveryError> {
            if self.fail_notify {
                return Err(DeliveryError::InvalidResponse("mail down".to_string()));
            }
            self.notified.lock().push(reference.clone());
            Ok(())
        }
    }

    fn artifact(name: &str) -> Artifact {
        Artifact::new(
            RecordingId::new("2026-06-01", name),
            PathBuf::from(format!("/tmp/{}.raw", name)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order_and_rate_limit() {
        let transport = Arc::new(MockTransport::default());
        let (pipeline, queue) = DeliveryPipeline::with_settings(transport.clone(), Duration::from_secs(60), 1);
        let (trigger, signal) = shutdown::channel();

        queue.submit(artifact("a")).unwrap();
        queue.submit(artifact("b")).unwrap();
        assert_eq!(queue.pending(), 2);

        let started = Instant::now();
        let worker = pipeline.spawn(signal);
        trigger.trigger();
        let report = worker.await.unwrap();

        assert_eq!(transport.upload_names(), vec!["a", "b"]);
        let uploads = transport.uploads.lock().clone();
        assert!(uploads[0].1 - started >= Duration::from_secs(60));
        assert!(uploads[1].1 - uploads[0].1 >= Duration::from_secs(60));

        assert_eq!(report.delivered, 2);
        assert_eq!(report.notified, 2);
        assert_eq!(queue.pending(), 0);
        assert_eq!(
            transport.notified.lock()[0].as_str(),
            "https://clips.example/a"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_is_dropped() {
        let transport = Arc::new(MockTransport::failing("a", 1));
        let (pipeline, queue) = DeliveryPipeline::with_settings(transport.clone(), Duration::from_secs(5), 1);
        let (trigger, signal) = shutdown::channel();

        queue.submit(artifact("a")).unwrap();
        queue.submit(artifact("b")).unwrap();
        trigger.trigger();
        let report = pipeline.run(signal).await;

        assert_eq!(transport.upload_names(), vec!["a", "b"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(transport.notified.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_in_place_keeps_order() {
        let transport = Arc::new(MockTransport::failing("a", 2));
        let (pipeline, queue) = DeliveryPipeline::with_settings(transport.clone(), Duration::from_secs(10), 3);
        let (trigger, signal) = shutdown::channel();

        queue.submit(artifact("a")).unwrap();
        queue.submit(artifact("b")).unwrap();
        trigger.trigger();
        let report = pipeline.run(signal).await;

        assert_eq!(transport.upload_names(), vec!["a", "a", "a", "b"]);
        assert_eq!(report.retried, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);

        let uploads = transport.uploads.lock().clone();
        for pair in uploads.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_secs(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_failure_does_not_fail_delivery() {
        let transport = Arc::new(MockTransport {
            fail_notify: true,
            ..Default::default()
        });
        let (pipeline, queue) = DeliveryPipeline::with_settings(transport.clone(), Duration::from_secs(1), 1);
        let (trigger, signal) = shutdown::channel();

        queue.submit(artifact("a")).unwrap();
        trigger.trigger();
        let report = pipeline.run(signal).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.notify_failed, 1);
        assert_eq!(report.notified, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_worker_exits_promptly_on_shutdown() {
        let transport = Arc::new(MockTransport::default());
        let (pipeline, _queue) = DeliveryPipeline::with_settings(transport.clone(), Duration::from_secs(3600), 1);
        let (trigger, signal) = shutdown::channel();

        let started = Instant::now();
        let worker = pipeline.spawn(signal);
        tokio::time::sleep(Duration::from_secs(30)).await;
        trigger.trigger();
        let report = worker.await.unwrap();

        assert!(Instant::now() - started < Duration::from_secs(3600));
        assert_eq!(report, PipelineReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_submission_before_shutdown_is_delivered() {
        let transport = Arc::new(MockTransport::default());
        let (pipeline, queue) = DeliveryPipeline::with_settings(transport.clone(), Duration::from_secs(60), 1);
        let (trigger, signal) = shutdown::channel();

        let worker = pipeline.spawn(signal);
        tokio::time::sleep(Duration::from_secs(200)).await;
        queue.submit(artifact("late")).unwrap();
        trigger.trigger();
        let report = worker.await.unwrap();

        assert_eq!(transport.upload_names(), vec!["late"]);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_exits_when_producers_dropped() {
        let transport = Arc::new(MockTransport::default());
        let (pipeline, queue) = DeliveryPipeline::with_settings(transport.clone(), Duration::from_secs(1), 1);
        let (_trigger, signal) = shutdown::channel();

        queue.submit(artifact("a")).unwrap();
        drop(queue);
        let report = pipeline.run(signal).await;

        assert_eq!(report.delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delay_is_capped() {
        let transport = Arc::new(MockTransport::default());
        let (pipeline, queue) = DeliveryPipeline::with_settings(transport.clone(), Duration::MAX, 1);
        assert_eq!(pipeline.inter_attempt_delay, MAX_INTER_ATTEMPT_DELAY);
        let (trigger, signal) = shutdown::channel();

        queue.submit(artifact("a")).unwrap();
        let started = Instant::now();
        let worker = pipeline.spawn(signal);
        trigger.trigger();
        let report = worker.await.unwrap();

        assert_eq!(report.delivered, 1);
        let uploads = transport.uploads.lock().clone();
        assert!(uploads[0].1 - started >= MAX_INTER_ATTEMPT_DELAY);
    }

    #[test]
    fn test_submit_after_worker_gone() {
        let transport = Arc::new(MockTransport::default());
        let (pipeline, queue) = DeliveryPipeline::with_settings(transport, Duration::from_secs(1), 1);
        drop(pipeline);

        assert!(queue.is_closed());
        assert!(matches!(queue.submit(artifact("a")), Err(DeliveryError::QueueClosed)));
        assert_eq!(queue.pending(), 0);
    }
}
