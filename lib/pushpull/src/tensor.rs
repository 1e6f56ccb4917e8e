// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Read-only views over caller-owned tensor buffers.
//!
//! The coordinator never allocates or copies tensor storage. Callers hand in
//! an `Arc<dyn TensorBuffer>` and the coordinator projects it into a
//! [`TensorView`] that exposes only the metadata the transport needs.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::dtype::{DataType, ElementType};
use crate::error::CoordinatorError;

/// Tensor storage owned by the caller.
///
/// Implementations must keep `addr()..addr() + size_bytes()` valid for as long
/// as the buffer is alive. The transport writes the reduced result through the
/// output buffer's address, so output buffers must tolerate writes from the
/// transport until the push-pull completes.
pub trait TensorBuffer: fmt::Debug + Send + Sync {
    fn dtype(&self) -> DataType;
    fn shape(&self) -> Vec<usize>;
    fn addr(&self) -> usize;
    fn size_bytes(&self) -> usize;
}

/// Ordered list of dimension sizes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TensorShape {
    dims: Vec<usize>,
}

impl TensorShape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn add_dim(&mut self, dim: usize) {
        self.dims.push(dim);
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of dims; a scalar has one).
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl Display for TensorShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

/// Read-only projection of a caller-owned buffer.
///
/// Holding a view keeps a reference to the caller's buffer handle but never
/// to a copy of its bytes. Views are dropped before the completion
/// continuation of the push-pull that carried them is invoked.
#[derive(Clone, Debug)]
pub struct TensorView {
    buffer: Arc<dyn TensorBuffer>,
    dtype: ElementType,
    shape: TensorShape,
}

impl TensorView {
    /// Project `buffer`, failing fast if its data type cannot be reduced.
    pub fn new(buffer: Arc<dyn TensorBuffer>) -> Result<Self, CoordinatorError> {
        let dtype = ElementType::try_from(buffer.dtype())?;
        let shape = TensorShape::new(buffer.shape());
        Ok(Self {
            buffer,
            dtype,
            shape,
        })
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn addr(&self) -> usize {
        self.buffer.addr()
    }

    /// Length of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.buffer.size_bytes()
    }

    pub fn buffer(&self) -> &Arc<dyn TensorBuffer> {
        &self.buffer
    }
}
