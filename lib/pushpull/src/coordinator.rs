// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Submit path.
//!
//! [`Coordinator::submit`] turns a caller's tensor into a queued push-pull:
//!
//! 1. refuse if the coordinator is not initialized
//! 2. project input and output into views, failing fast on unsupported types
//! 3. record readiness on the producing stream, if there is one
//! 4. register the name on first use (blocking, at most once per name)
//! 5. enqueue the request with its completion and return
//!
//! Any failure in steps 1-5 is reported synchronously and hands the
//! completion back unresolved. Once a request is enqueued its completion is
//! resolved exactly once by the dispatch queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use derive_builder::Builder;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::completion::{Completion, PushPullHandle};
use crate::config::PushPullConfig;
use crate::device::DeviceId;
use crate::error::CoordinatorError;
use crate::queue::{DispatchQueue, PushPullRequest, ScheduledQueue};
use crate::ready::{DeviceStream, ReadyEvent};
use crate::registry::{NameRegistry, RegistrationRecord};
use crate::tensor::{TensorBuffer, TensorView};
use crate::transport::Transport;

/// Arguments of a single push-pull submission.
#[derive(Builder, Clone)]
#[builder(pattern = "owned")]
pub struct PushPullArgs {
    /// Tensor name; identical on every worker for the same logical tensor.
    #[builder(setter(into))]
    pub name: String,

    #[builder(default = "DeviceId::CPU")]
    pub device: DeviceId,

    pub input: Arc<dyn TensorBuffer>,

    /// Receives the reduced result; same type and shape as `input`.
    pub output: Arc<dyn TensorBuffer>,

    /// Stream that produced `input`. None for host tensors.
    #[builder(default, setter(strip_option))]
    pub stream: Option<Arc<dyn DeviceStream>>,

    #[builder(default = "0")]
    pub priority: i32,

    #[builder(default = "0")]
    pub version: i32,
}

impl PushPullArgs {
    pub fn builder() -> PushPullArgsBuilder {
        PushPullArgsBuilder::default()
    }
}

/// A submission refused before reaching the dispatch queue.
///
/// The completion is returned unresolved so the caller decides how to
/// report the error.
#[derive(Debug, Error)]
#[error("push-pull rejected: {error}")]
pub struct Rejected {
    pub error: CoordinatorError,
    pub completion: Completion,
}

struct Prepared {
    record: Arc<RegistrationRecord>,
    input: TensorView,
    output: TensorView,
    ready: ReadyEvent,
}

/// Registers tensor names and feeds push-pulls to the dispatch queue.
pub struct Coordinator {
    config: PushPullConfig,
    registry: NameRegistry,
    transport: Arc<dyn Transport>,
    queue: Arc<dyn DispatchQueue>,
    initialized: AtomicBool,
}

impl Coordinator {
    /// Create an uninitialized coordinator.
    pub fn new(
        config: PushPullConfig,
        transport: Arc<dyn Transport>,
        queue: Arc<dyn DispatchQueue>,
    ) -> Self {
        Self {
            registry: NameRegistry::new(config.partition_bytes),
            config,
            transport,
            queue,
            initialized: AtomicBool::new(false),
        }
    }

    /// Create an uninitialized coordinator backed by a [`ScheduledQueue`]
    /// whose worker runs on `runtime`.
    pub fn with_scheduled_queue(
        config: PushPullConfig,
        transport: Arc<dyn Transport>,
        runtime: &Handle,
    ) -> Self {
        let queue = Arc::new(ScheduledQueue::start(
            &config.queue,
            transport.clone(),
            runtime,
        ));
        Self::new(config, transport, queue)
    }

    /// Start accepting submissions.
    pub fn initialize(&self) {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            tracing::info!(
                partition_bytes = self.config.partition_bytes,
                queue_capacity = self.config.queue.capacity,
                "push-pull coordinator initialized"
            );
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn check_initialized(&self) -> Result<(), CoordinatorError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(CoordinatorError::Uninitialized)
        }
    }

    pub fn config(&self) -> &PushPullConfig {
        &self.config
    }

    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }

    /// Requests waiting in the dispatch queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Submit a push-pull, resolving `completion` when it finishes.
    ///
    /// Blocks only when this is the first submission for the name and the
    /// transport registration has to run. On `Ok` the completion will be
    /// resolved exactly once; on `Err` it is handed back untouched.
    pub fn submit(&self, args: PushPullArgs, completion: Completion) -> Result<(), Rejected> {
        let priority = args.priority;
        let version = args.version;

        let Prepared {
            record,
            input,
            output,
            ready,
        } = match self.prepare(args) {
            Ok(prepared) => prepared,
            Err(error) => return Err(Rejected { error, completion }),
        };

        tracing::trace!(
            name = record.name(),
            priority,
            version,
            device_ready = ready.is_device(),
            "enqueueing push-pull"
        );

        self.queue
            .enqueue(PushPullRequest {
                record,
                input,
                output,
                ready,
                priority,
                version,
                completion,
            })
            .map_err(|rejection| {
                tracing::warn!(
                    name = rejection.request.name(),
                    status = %rejection.status,
                    "push-pull not enqueued"
                );
                Rejected {
                    error: CoordinatorError::EnqueueRejected(rejection.status),
                    completion: rejection.request.completion,
                }
            })
    }

    /// Submit a push-pull and return a future of its terminal status.
    pub fn push_pull(&self, args: PushPullArgs) -> Result<PushPullHandle, CoordinatorError> {
        let (completion, handle) = Completion::channel();
        self.submit(args, completion)
            .map_err(|Rejected { error, completion }| {
                completion.disarm();
                error
            })?;
        Ok(handle)
    }

    /// Stop accepting submissions and resolve everything still queued.
    pub async fn shutdown(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        self.queue.shutdown().await;
        tracing::info!(
            registered = self.registry.len(),
            "push-pull coordinator shut down"
        );
    }

    fn prepare(&self, args: PushPullArgs) -> Result<Prepared, CoordinatorError> {
        self.check_initialized()?;

        let PushPullArgs {
            name,
            device,
            input,
            output,
            stream,
            ..
        } = args;

        let input = TensorView::new(input)?;
        let output = TensorView::new(output)?;
        if input.dtype() != output.dtype() || input.shape() != output.shape() {
            return Err(CoordinatorError::OutputMismatch {
                input_dtype: input.dtype(),
                input_shape: input.shape().clone(),
                output_dtype: output.dtype(),
                output_shape: output.shape().clone(),
            });
        }

        let ready = ReadyEvent::record(stream.as_deref());

        let dtype = input.dtype();
        let size = input.size();
        let existing = if self.registry.is_registered(&name, dtype, size, device)? {
            self.registry.get(&name)
        } else {
            None
        };
        let record = match existing {
            Some(record) => record,
            None => self.registry.register(&name, dtype, size, device, |declaration| {
                self.transport.register_tensor(declaration, &input, &ready)
            })?,
        };

        Ok(Prepared {
            record,
            input,
            output,
            ready,
        })
    }
}
