// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Push-pull coordination for distributed tensor reduction.
//!
//! Every worker submits its copy of a named tensor; the transport sums the
//! copies across workers and writes the result into each worker's output.
//! This crate owns the part in between:
//!
//! - registering each tensor name once per process ([`NameRegistry`])
//! - gating transport reads on producer completion ([`ReadyEvent`])
//! - ordering and dispatching requests ([`DispatchQueue`], [`ScheduledQueue`])
//! - resolving each caller continuation exactly once ([`Completion`])
//!
//! The network transport and the tensor storage are supplied by the caller
//! through the [`Transport`] and [`TensorBuffer`] traits.
//!
//! ```rust,ignore
//! let coordinator = Coordinator::with_scheduled_queue(
//!     PushPullConfig::from_env()?,
//!     Arc::new(LoopbackTransport::new()),
//!     &tokio::runtime::Handle::current(),
//! );
//! coordinator.initialize();
//!
//! let args = PushPullArgs::builder()
//!     .name("grad_w")
//!     .input(input)
//!     .output(output)
//!     .version(step)
//!     .build()?;
//! coordinator.push_pull(args)?.await?;
//! ```

pub mod completion;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod dtype;
pub mod error;
pub mod global;
pub mod logging;
pub mod op;
pub mod queue;
pub mod ready;
pub mod registry;
pub mod status;
pub mod tensor;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use completion::{Completion, PushPullHandle};
pub use config::{ConfigError, PushPullConfig, QueueConfig};
pub use coordinator::{Coordinator, PushPullArgs, PushPullArgsBuilder, Rejected};
pub use device::DeviceId;
pub use dtype::{DataType, ElementType};
pub use error::{CoordinatorError, TensorSignature};
pub use op::{DoneCallback, OpKernelContext, PushPullOp};
pub use queue::{DispatchQueue, EnqueueRejection, PushPullRequest, ScheduledQueue};
pub use ready::{DeviceMarker, DeviceStream, MarkerStatus, ReadyEvent};
pub use registry::{NameRegistry, Partition, RegistrationRecord, TensorDeclaration};
pub use status::{OpCode, OpStatus, Status, StatusCode};
pub use tensor::{TensorBuffer, TensorShape, TensorView};
pub use transport::{LoopbackTransport, Transport, TransportContext};
