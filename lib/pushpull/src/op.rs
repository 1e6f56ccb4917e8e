// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Framework-facing push-pull kernel.
//!
//! The host framework calls [`PushPullOp::compute_async`] with a kernel
//! context and a `done` callback. The op takes three inputs (the tensor, a
//! scalar version and a scalar priority), produces one output of the same
//! shape, and reports its result by setting the context status and calling
//! `done` exactly once.

use std::sync::Arc;

use crate::completion::Completion;
use crate::coordinator::{PushPullArgs, Rejected};
use crate::device::DeviceId;
use crate::global;
use crate::ready::DeviceStream;
use crate::status::{OpStatus, Status};
use crate::tensor::{TensorBuffer, TensorShape};

/// Signals the framework that an asynchronous kernel has finished.
pub type DoneCallback = Box<dyn FnOnce() + Send + 'static>;

/// Per-invocation view of the framework's kernel state.
pub trait OpKernelContext: Send + Sync {
    /// Node name; used as the tensor name.
    fn name(&self) -> &str;

    fn device(&self) -> DeviceId;

    /// Input 0: the tensor to reduce.
    fn input(&self) -> Arc<dyn TensorBuffer>;

    /// Input 1: scalar version.
    fn version(&self) -> i32;

    /// Input 2: scalar priority.
    fn priority(&self) -> i32;

    /// Allocate output 0 with `shape` and the input's data type.
    fn allocate_output(&self, shape: &TensorShape) -> Result<Arc<dyn TensorBuffer>, OpStatus>;

    /// Stream the input was produced on, for device kernels.
    fn device_stream(&self) -> Option<Arc<dyn DeviceStream>>;

    fn set_status(&self, status: OpStatus);
}

/// Asynchronous push-pull kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct PushPullOp;

impl PushPullOp {
    pub const NAME: &'static str = "PushPull";

    pub fn new() -> Self {
        Self
    }

    pub fn compute_async(&self, ctx: Arc<dyn OpKernelContext>, done: DoneCallback) {
        let completion = {
            let ctx = ctx.clone();
            Completion::new(move |status: Status| {
                ctx.set_status(OpStatus::from(status));
                done();
            })
        };

        let coordinator = match global::coordinator() {
            Ok(coordinator) => coordinator,
            Err(e) => return completion.complete(Status::from(e)),
        };

        let input = ctx.input();
        let shape = TensorShape::new(input.shape());
        let output = match ctx.allocate_output(&shape) {
            Ok(output) => output,
            Err(status) => return completion.complete(Status::from(status)),
        };

        let args = PushPullArgs {
            name: ctx.name().to_string(),
            device: ctx.device(),
            input,
            output,
            stream: ctx.device_stream(),
            priority: ctx.priority(),
            version: ctx.version(),
        };

        if let Err(Rejected { error, completion }) = coordinator.submit(args, completion) {
            tracing::error!(name = ctx.name(), %error, "push-pull op failed");
            completion.complete(Status::from(error));
        }
    }
}
