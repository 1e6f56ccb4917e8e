// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Device a tensor lives on. [`DeviceId::CPU`] is host memory; any
/// non-negative value is an accelerator ordinal on the local process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(i32);

impl DeviceId {
    /// Host memory / no accelerator.
    pub const CPU: DeviceId = DeviceId(-1);

    /// Accelerator slot `ordinal` on this process.
    pub fn gpu(ordinal: u32) -> Self {
        Self(ordinal as i32)
    }

    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 { Self::CPU } else { Self(raw) }
    }

    pub fn raw(&self) -> i32 {
        self.0
    }

    pub fn is_host(&self) -> bool {
        *self == Self::CPU
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::CPU
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "cpu")
        } else {
            write!(f, "gpu:{}", self.0)
        }
    }
}
