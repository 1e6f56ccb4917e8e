// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Transport contract.
//!
//! The transport moves tensor bytes between workers and performs the
//! reduction. The coordinator only needs two things from it: a blocking,
//! one-time registration per tensor name, and an asynchronous push-pull that
//! reports a terminal [`Status`].
//!
//! - [`LoopbackTransport`]: single-worker transport for tests and local runs

mod loopback;

pub use loopback::LoopbackTransport;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::ready::ReadyEvent;
use crate::registry::{RegistrationRecord, TensorDeclaration};
use crate::status::Status;
use crate::tensor::TensorView;

/// Opaque per-tensor state owned by the transport.
#[derive(Clone, Default)]
pub struct TransportContext {
    state: Option<Arc<dyn Any + Send + Sync>>,
}

impl TransportContext {
    pub fn empty() -> Self {
        Self { state: None }
    }

    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self {
            state: Some(Arc::new(state)),
        }
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.state.as_ref()?.downcast_ref::<T>()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }
}

impl fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportContext")
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

/// Engine that registers tensors with the job and executes push-pulls.
///
/// # Thread Safety
///
/// Implementations are shared between the coordinator (registration, on
/// caller threads) and the dispatch queue (push-pull, on runtime tasks).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind a tensor name for the lifetime of the process.
    ///
    /// Called once per name, before any push-pull for it, and allowed to
    /// block. `initial` is the first tensor seen for the name and `ready`
    /// tells when its bytes may be read, so a transport can seed its copy.
    fn register_tensor(
        &self,
        declaration: &TensorDeclaration,
        initial: &TensorView,
        ready: &ReadyEvent,
    ) -> Result<TransportContext, Status>;

    /// Reduce `input` across all workers into `output`.
    ///
    /// Only called once the request's readiness signal is satisfied. Must
    /// have finished with both views before returning.
    async fn push_pull(
        &self,
        record: &RegistrationRecord,
        input: &TensorView,
        output: &TensorView,
        version: i32,
    ) -> Status;
}
