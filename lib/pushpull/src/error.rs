// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Errors reported synchronously by [`Coordinator::submit`](crate::Coordinator::submit).
//!
//! Failures of the collective itself are not errors of this type; they arrive
//! later as a non-ok [`Status`] through the request's completion.

use thiserror::Error;

use crate::device::DeviceId;
use crate::dtype::{DataType, ElementType};
use crate::status::{Status, StatusCode};
use crate::tensor::TensorShape;

/// Binding of a tensor name to its element type, size and device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorSignature {
    pub dtype: ElementType,
    pub size: usize,
    pub device: DeviceId,
}

impl std::fmt::Display for TensorSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} x {} bytes on {}", self.dtype, self.size, self.device)
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("push-pull coordinator is not initialized")]
    Uninitialized,

    #[error("invalid tensor type: {dtype}")]
    InvalidTensorType { dtype: DataType },

    #[error(
        "output tensor ({output_dtype}, {output_shape}) does not match input ({input_dtype}, {input_shape})"
    )]
    OutputMismatch {
        input_dtype: ElementType,
        input_shape: TensorShape,
        output_dtype: ElementType,
        output_shape: TensorShape,
    },

    #[error("tensor {name} was registered as {existing} but is now presented as {requested}")]
    RegistrationConflict {
        name: String,
        existing: TensorSignature,
        requested: TensorSignature,
    },

    #[error("failed to register tensor {name}: {status}")]
    RegistrationFailed { name: String, status: Status },

    #[error("dispatch queue rejected the request: {0}")]
    EnqueueRejected(Status),
}

impl From<&CoordinatorError> for Status {
    fn from(err: &CoordinatorError) -> Self {
        match err {
            CoordinatorError::Uninitialized => Status::precondition_error(err.to_string()),
            CoordinatorError::InvalidTensorType { .. }
            | CoordinatorError::OutputMismatch { .. }
            | CoordinatorError::RegistrationConflict { .. } => {
                Status::invalid_argument(err.to_string())
            }
            CoordinatorError::RegistrationFailed { status, .. } => {
                Status::new(failure_code(status), err.to_string())
            }
            CoordinatorError::EnqueueRejected(status) => {
                Status::new(failure_code(status), status.reason())
            }
        }
    }
}

/// Code of a status carried as a failure; non-terminal codes become unknown.
fn failure_code(status: &Status) -> StatusCode {
    match status.code() {
        StatusCode::Ok | StatusCode::InProgress => StatusCode::UnknownError,
        code => code,
    }
}

impl From<CoordinatorError> for Status {
    fn from(err: CoordinatorError) -> Self {
        Status::from(&err)
    }
}
