// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Loopback transport for single-worker jobs.

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{Transport, TransportContext};
use crate::ready::ReadyEvent;
use crate::registry::{RegistrationRecord, TensorDeclaration};
use crate::status::Status;
use crate::tensor::TensorView;

/// Transport for a job with exactly one worker.
///
/// The sum over a single worker is the worker's own tensor, so push-pull is a
/// copy of the input bytes into the output. No data leaves the process.
#[derive(Debug, Default)]
pub struct LoopbackTransport;

impl LoopbackTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn register_tensor(
        &self,
        declaration: &TensorDeclaration,
        initial: &TensorView,
        _ready: &ReadyEvent,
    ) -> Result<TransportContext, Status> {
        if declaration.size % declaration.dtype.size_in_bytes() != 0 {
            return Err(Status::invalid_argument(format!(
                "tensor {} has {} bytes, not a multiple of {} element size",
                declaration.name, declaration.size, declaration.dtype
            )));
        }
        tracing::debug!(
            name = %declaration.name,
            declared_key = declaration.declared_key,
            shape = %initial.shape(),
            "loopback registration"
        );
        Ok(TransportContext::empty())
    }

    async fn push_pull(
        &self,
        record: &RegistrationRecord,
        input: &TensorView,
        output: &TensorView,
        version: i32,
    ) -> Status {
        match copy_into(input, output) {
            Ok(()) => {
                tracing::trace!(
                    name = record.name(),
                    version,
                    bytes = input.size(),
                    "loopback push-pull complete"
                );
                Status::ok()
            }
            Err(e) => Status::invalid_argument(e.to_string()),
        }
    }
}

fn copy_into(input: &TensorView, output: &TensorView) -> Result<()> {
    if input.size() != output.size() {
        bail!(
            "push-pull size mismatch: input={} output={}",
            input.size(),
            output.size()
        );
    }
    if input.addr() == output.addr() || input.size() == 0 {
        return Ok(());
    }
    // SAFETY: both buffers are alive for the duration of the call and span
    // `size()` bytes; the output buffer accepts transport writes. The caller
    // may hand in overlapping buffers, so the copy must tolerate overlap.
    unsafe {
        std::ptr::copy(
            input.addr() as *const u8,
            output.addr() as *mut u8,
            input.size(),
        );
    }
    Ok(())
}
