// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{DispatchQueue, EnqueueRejection, PushPullRequest};
use crate::config::QueueConfig;
use crate::status::Status;
use crate::transport::Transport;

/// Entry in the pending heap, ordered by priority (higher first), then
/// version (lower first), then arrival.
struct QueueEntry {
    priority: i32,
    version: i32,
    seq: u64,
    request: PushPullRequest,
}

impl Eq for QueueEntry {}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; older versions and earlier arrivals compare greater
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.version.cmp(&self.version))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Pending {
    heap: BinaryHeap<QueueEntry>,
    closed: bool,
}

struct Inner {
    pending: Mutex<Pending>,
    notify: Notify,
    next_seq: AtomicU64,
    capacity: usize,
    max_inflight: usize,
    poll_interval: Duration,
    permits: Arc<Semaphore>,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

/// Bounded priority queue drained by a background worker.
///
/// The worker only hands a request to the transport once its readiness
/// signal is satisfied; requests that are not ready yet stay queued and are
/// re-examined when new work arrives or every `poll_interval`. At most
/// `max_inflight` push-pulls run against the transport at once.
pub struct ScheduledQueue {
    inner: Arc<Inner>,
}

impl ScheduledQueue {
    /// Create the queue and spawn its worker on `runtime`.
    pub fn start(config: &QueueConfig, transport: Arc<dyn Transport>, runtime: &Handle) -> Self {
        let max_inflight = config.max_inflight.max(1);
        let inner = Arc::new(Inner {
            pending: Mutex::new(Pending {
                heap: BinaryHeap::new(),
                closed: false,
            }),
            notify: Notify::new(),
            next_seq: AtomicU64::new(0),
            capacity: config.capacity.max(1),
            max_inflight,
            poll_interval: config.poll_interval(),
            permits: Arc::new(Semaphore::new(max_inflight)),
            transport,
            runtime: runtime.clone(),
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
        });

        tracing::debug!(
            capacity = inner.capacity,
            max_inflight,
            poll_interval_us = inner.poll_interval.as_micros() as u64,
            "starting dispatch queue"
        );
        inner.tasks.spawn_on(run(inner.clone()), runtime);

        Self { inner }
    }

    /// Push-pulls currently executing on the transport.
    pub fn inflight(&self) -> usize {
        self.inner.max_inflight - self.inner.permits.available_permits()
    }
}

#[async_trait]
impl DispatchQueue for ScheduledQueue {
    fn enqueue(&self, request: PushPullRequest) -> Result<(), EnqueueRejection> {
        let mut pending = self.inner.pending.lock();
        if pending.closed {
            return Err(EnqueueRejection {
                status: Status::precondition_error("dispatch queue is shut down"),
                request,
            });
        }
        if pending.heap.len() >= self.inner.capacity {
            tracing::warn!(
                name = request.name(),
                capacity = self.inner.capacity,
                "dispatch queue full"
            );
            return Err(EnqueueRejection {
                status: Status::aborted("dispatch queue at capacity"),
                request,
            });
        }

        let seq = self.inner.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        tracing::trace!(
            name = request.name(),
            priority = request.priority,
            version = request.version,
            seq,
            "push-pull queued"
        );
        pending.heap.push(QueueEntry {
            priority: request.priority,
            version: request.version,
            seq,
            request,
        });
        drop(pending);

        self.inner.notify.notify_one();
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner.pending.lock().heap.len()
    }

    async fn shutdown(&self) {
        let drained: Vec<PushPullRequest> = {
            let mut pending = self.inner.pending.lock();
            pending.closed = true;
            pending.heap.drain().map(|entry| entry.request).collect()
        };
        self.inner.cancel.cancel();

        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "aborting pending push-pulls");
        }
        for request in drained {
            let PushPullRequest {
                input,
                output,
                ready,
                completion,
                ..
            } = request;
            drop((input, output, ready));
            completion.complete(Status::aborted("dispatch queue shut down"));
        }

        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }
}

impl Drop for ScheduledQueue {
    fn drop(&mut self) {
        // pending completions resolve as aborted when the heap is dropped
        self.inner.cancel.cancel();
    }
}

impl Inner {
    /// Pop the highest-ordered request whose readiness is satisfied.
    fn pop_ready(&self) -> Option<PushPullRequest> {
        let mut pending = self.pending.lock();
        let mut deferred = Vec::new();
        let mut found = None;
        while let Some(entry) = pending.heap.pop() {
            if entry.request.ready.is_ready() {
                found = Some(entry.request);
                break;
            }
            deferred.push(entry);
        }
        pending.heap.extend(deferred);
        found
    }

    async fn next_ready(&self) -> Option<PushPullRequest> {
        loop {
            if let Some(request) = self.pop_ready() {
                return Some(request);
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

async fn run(inner: Arc<Inner>) {
    loop {
        let permit = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            permit = inner.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        let Some(request) = inner.next_ready().await else {
            break;
        };
        inner.tasks.spawn_on(
            dispatch(inner.transport.clone(), request, permit),
            &inner.runtime,
        );
    }
    tracing::debug!("dispatch worker stopped");
}

async fn dispatch(
    transport: Arc<dyn Transport>,
    request: PushPullRequest,
    permit: OwnedSemaphorePermit,
) {
    let PushPullRequest {
        record,
        input,
        output,
        ready,
        priority,
        version,
        completion,
    } = request;

    let status = if ready.is_failed() {
        Status::aborted(format!(
            "producer of tensor {} failed before push-pull",
            record.name()
        ))
    } else {
        tracing::trace!(name = record.name(), priority, version, "dispatching push-pull");
        transport.push_pull(&record, &input, &output, version).await
    };

    // views and readiness are released before the continuation runs
    drop((input, output, ready));
    drop(permit);

    if !status.is_ok() {
        tracing::warn!(name = record.name(), version, %status, "push-pull failed");
    }
    completion.complete(status);
}
