// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Single-resolution completion handles.
//!
//! A [`Completion`] carries the caller's continuation through the dispatch
//! queue. Resolving it consumes the handle, so a continuation cannot run
//! twice. Dropping an unresolved handle resolves it with
//! [`StatusCode::Aborted`](crate::StatusCode::Aborted), so a continuation
//! cannot be lost either.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::status::Status;

const DROP_REASON: &str = "completion dropped without being resolved";

type Callback = Box<dyn FnOnce(Status) + Send + 'static>;

/// Continuation of one push-pull request, invoked exactly once.
pub struct Completion {
    callback: Option<Callback>,
}

impl Completion {
    pub fn new(callback: impl FnOnce(Status) + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Completion paired with a [`PushPullHandle`] that resolves to the status.
    pub fn channel() -> (Self, PushPullHandle) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(move |status| {
            // receiver may have been dropped by a caller that stopped waiting
            let _ = tx.send(status);
        });
        (completion, PushPullHandle { rx })
    }

    /// Invoke the continuation with `status`.
    pub fn complete(mut self, status: Status) {
        if let Some(callback) = self.callback.take() {
            callback(status);
        }
    }

    /// Discard the continuation without invoking it.
    ///
    /// Only valid when the request never reached the dispatch queue and the
    /// caller is told about the failure synchronously.
    pub(crate) fn disarm(mut self) {
        self.callback.take();
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            tracing::warn!("{DROP_REASON}; resolving as aborted");
            callback(Status::aborted(DROP_REASON));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("armed", &self.callback.is_some())
            .finish()
    }
}

/// Future resolving to the terminal status of a submitted push-pull.
#[derive(Debug)]
pub struct PushPullHandle {
    rx: oneshot::Receiver<Status>,
}

impl Future for PushPullHandle {
    type Output = Result<(), Status>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(status)) => Poll::Ready(status.into_result()),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Status::aborted(DROP_REASON))),
            Poll::Pending => Poll::Pending,
        }
    }
}
