// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Readiness signals for tensor inputs.
//!
//! A [`ReadyEvent`] answers "has the producer finished writing this tensor?".
//! Host producers are synchronous, so their tensors are ready as soon as the
//! push-pull is submitted. Accelerator producers write asynchronously on a
//! stream; for those a marker is recorded on the producing stream and the
//! tensor is ready once the marker leaves the pending state.

use std::fmt;
use std::sync::Arc;

/// Status of a device completion marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkerStatus {
    Pending,
    Complete,
    Error,
}

/// Completion marker recorded on a device stream.
///
/// The marker observes every operation enqueued on its stream before the
/// point it was recorded.
pub trait DeviceMarker: Send + Sync {
    /// Non-blocking status query.
    fn query(&self) -> MarkerStatus;
}

/// Execution stream of the operation that produced a tensor.
pub trait DeviceStream: Send + Sync {
    /// Enqueue a marker at the current tail of the stream.
    ///
    /// Must not wait for the stream; it only records the marker.
    fn record_marker(&self) -> Arc<dyn DeviceMarker>;
}

/// Whether a tensor's bytes are safe to read.
#[derive(Clone)]
pub enum ReadyEvent {
    /// Produced synchronously; always ready.
    Ready,
    /// Produced on a device stream; ready once the marker completes.
    Device(Arc<dyn DeviceMarker>),
}

impl ReadyEvent {
    /// Record readiness for a tensor produced on `stream`, or on the host
    /// when no stream is available.
    pub fn record(stream: Option<&dyn DeviceStream>) -> Self {
        match stream {
            Some(stream) => ReadyEvent::Device(stream.record_marker()),
            None => ReadyEvent::Ready,
        }
    }

    /// Current status; host events are always complete.
    pub fn status(&self) -> MarkerStatus {
        match self {
            ReadyEvent::Ready => MarkerStatus::Complete,
            ReadyEvent::Device(marker) => marker.query(),
        }
    }

    /// Whether the producer has stopped, successfully or not.
    ///
    /// A failed producer is settled too; check [`status`](Self::status)
    /// before reading the bytes.
    pub fn is_ready(&self) -> bool {
        self.status() != MarkerStatus::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.status() == MarkerStatus::Error
    }

    pub fn is_device(&self) -> bool {
        matches!(self, ReadyEvent::Device(_))
    }
}

impl fmt::Debug for ReadyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyEvent::Ready => write!(f, "ReadyEvent::Ready"),
            ReadyEvent::Device(marker) => {
                write!(f, "ReadyEvent::Device({:?})", marker.query())
            }
        }
    }
}
