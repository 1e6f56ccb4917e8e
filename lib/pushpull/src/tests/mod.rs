// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests of the submit path against the scheduled queue.

mod coordinator;

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::{PushPullConfig, QueueConfig};
use crate::coordinator::{Coordinator, PushPullArgs};
use crate::dtype::DataType;
use crate::testing::{CountingTransport, HostTensor};

/// Upper bound on any wait in these tests.
const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> PushPullConfig {
    PushPullConfig {
        partition_bytes: 64,
        queue: QueueConfig {
            capacity: 64,
            max_inflight: 4,
            poll_interval_us: 200,
        },
    }
}

/// Initialized coordinator over a scheduled queue and a counting transport.
fn scheduled_coordinator(transport: CountingTransport) -> (Arc<Coordinator>, Arc<CountingTransport>) {
    let transport = Arc::new(transport);
    let coordinator = Arc::new(Coordinator::with_scheduled_queue(
        test_config(),
        transport.clone(),
        &Handle::current(),
    ));
    coordinator.initialize();
    (coordinator, transport)
}

/// Args for `name` over a fresh input/output pair; returns the output too.
fn f32_push_pull(name: &str, values: &[f32]) -> (PushPullArgs, Arc<HostTensor>) {
    let output = Arc::new(HostTensor::zeros(DataType::Float32, vec![values.len()]));
    let args = PushPullArgs::builder()
        .name(name)
        .input(Arc::new(HostTensor::from_f32(values)))
        .output(output.clone())
        .build()
        .unwrap();
    (args, output)
}
