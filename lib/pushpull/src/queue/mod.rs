// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Dispatch queue.
//!
//! The coordinator hands every accepted push-pull to a [`DispatchQueue`]. The
//! queue decides when each request reaches the transport and must resolve the
//! request's [`Completion`] exactly once, either with the transport's status
//! or with `Aborted` if the request is discarded.
//!
//! - [`ScheduledQueue`]: priority heap drained by a background tokio worker

mod scheduled;

pub use scheduled::ScheduledQueue;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::completion::Completion;
use crate::ready::ReadyEvent;
use crate::registry::RegistrationRecord;
use crate::status::Status;
use crate::tensor::TensorView;

/// One accepted push-pull, owned by the queue until it completes.
#[derive(Debug)]
pub struct PushPullRequest {
    pub record: Arc<RegistrationRecord>,
    pub input: TensorView,
    pub output: TensorView,
    pub ready: ReadyEvent,
    /// Higher is dispatched sooner.
    pub priority: i32,
    pub version: i32,
    pub completion: Completion,
}

impl PushPullRequest {
    pub fn name(&self) -> &str {
        self.record.name()
    }
}

/// A request the queue refused, handed back with the reason.
///
/// The request's completion has not been resolved.
#[derive(Debug)]
pub struct EnqueueRejection {
    pub status: Status,
    pub request: PushPullRequest,
}

impl fmt::Display for EnqueueRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push-pull for {} rejected: {}", self.request.name(), self.status)
    }
}

#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// Accept `request` for dispatch without blocking.
    fn enqueue(&self, request: PushPullRequest) -> Result<(), EnqueueRejection>;

    /// Requests accepted but not yet handed to the transport.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting requests and resolve every pending one.
    async fn shutdown(&self);
}
