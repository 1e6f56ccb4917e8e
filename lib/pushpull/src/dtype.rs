// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Element types understood by the push-pull transport.
//!
//! Callers describe their buffers with the open [`DataType`] tag. Only the
//! subset in [`ElementType`] can be reduced; classifying anything else fails
//! with [`CoordinatorError::InvalidTensorType`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::error::CoordinatorError;

/// Data type tag reported by a caller-owned tensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum DataType {
    Bool,
    UInt8,
    Int8,
    UInt16,
    Int16,
    Int32,
    Int64,
    Float16,
    BFloat16,
    Float32,
    Float64,
    Complex64,
    String,
}

/// Closed set of element types the transport can reduce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum ElementType {
    UInt8,
    Int8,
    Int32,
    Int64,
    Float16,
    Float32,
    Float64,
}

impl ElementType {
    /// Number of bytes per element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ElementType::UInt8 | ElementType::Int8 => 1,
            ElementType::Float16 => 2,
            ElementType::Int32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::Float64 => 8,
        }
    }

    /// The caller-side tag this element type corresponds to.
    pub fn data_type(&self) -> DataType {
        match self {
            ElementType::UInt8 => DataType::UInt8,
            ElementType::Int8 => DataType::Int8,
            ElementType::Int32 => DataType::Int32,
            ElementType::Int64 => DataType::Int64,
            ElementType::Float16 => DataType::Float16,
            ElementType::Float32 => DataType::Float32,
            ElementType::Float64 => DataType::Float64,
        }
    }
}

impl TryFrom<DataType> for ElementType {
    type Error = CoordinatorError;

    fn try_from(dtype: DataType) -> Result<Self, Self::Error> {
        match dtype {
            DataType::UInt8 => Ok(ElementType::UInt8),
            DataType::Int8 => Ok(ElementType::Int8),
            DataType::Int32 => Ok(ElementType::Int32),
            DataType::Int64 => Ok(ElementType::Int64),
            DataType::Float16 => Ok(ElementType::Float16),
            DataType::Float32 => Ok(ElementType::Float32),
            DataType::Float64 => Ok(ElementType::Float64),
            // 16-bit integers and bool are not reducible by the transport
            DataType::Bool
            | DataType::UInt16
            | DataType::Int16
            | DataType::BFloat16
            | DataType::Complex64
            | DataType::String => Err(CoordinatorError::InvalidTensorType { dtype }),
        }
    }
}
