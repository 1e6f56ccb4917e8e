// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;

use super::{WAIT, f32_push_pull, scheduled_coordinator};
use crate::completion::Completion;
use crate::coordinator::PushPullArgs;
use crate::dtype::{DataType, ElementType};
use crate::error::CoordinatorError;
use crate::status::{Status, StatusCode};
use crate::testing::{CountingTransport, HostTensor, SimulatedStream};

#[tokio::test]
async fn first_use_registers_then_reuses_and_detects_conflicts() {
    let (coordinator, transport) = scheduled_coordinator(CountingTransport::new());

    let (args, output) = f32_push_pull("grad_w", &[1.0, 2.0, 3.0, 4.0]);
    let handle = coordinator.push_pull(args).unwrap();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(output.to_f32(), vec![1.0, 2.0, 3.0, 4.0]);

    let record = coordinator.registry().get("grad_w").unwrap();
    assert_eq!(record.dtype(), ElementType::Float32);
    assert_eq!(record.size(), 16);
    assert_eq!(transport.registrations(), 1);

    // same name and signature: no second registration
    let (args, _) = f32_push_pull("grad_w", &[5.0, 6.0, 7.0, 8.0]);
    let handle = coordinator.push_pull(args).unwrap();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(transport.registrations(), 1);
    assert_eq!(transport.completed(), 2);

    // same name, different element type
    let args = PushPullArgs::builder()
        .name("grad_w")
        .input(Arc::new(HostTensor::from_i32(&[1, 2, 3, 4])))
        .output(Arc::new(HostTensor::zeros(DataType::Int32, vec![4])))
        .build()
        .unwrap();
    let err = coordinator.push_pull(args).unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::RegistrationConflict { ref name, .. } if name == "grad_w"
    ));
    assert_eq!(Status::from(err).code(), StatusCode::InvalidArgument);
    assert_eq!(coordinator.pending(), 0);
    assert_eq!(transport.started().len(), 2);

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_first_submits_register_once() {
    const CALLERS: usize = 8;
    let (coordinator, transport) = scheduled_coordinator(
        CountingTransport::new().with_register_delay(Duration::from_millis(20)),
    );

    let handles = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..CALLERS)
            .map(|i| {
                let coordinator = &coordinator;
                scope.spawn(move || {
                    let (args, _) = f32_push_pull("shared", &[i as f32; 8]);
                    coordinator.push_pull(args).unwrap()
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect::<Vec<_>>()
    });

    for result in tokio::time::timeout(WAIT, join_all(handles)).await.unwrap() {
        result.unwrap();
    }
    assert_eq!(transport.registrations(), 1);
    assert_eq!(transport.completed(), CALLERS);
    assert_eq!(coordinator.registry().len(), 1);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn every_accepted_submit_resolves_exactly_once() {
    const REQUESTS: usize = 20;
    let (coordinator, _) = scheduled_coordinator(CountingTransport::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    for i in 0..REQUESTS {
        let (args, _) = f32_push_pull(&format!("t{}", i % 4), &[1.0; 4]);
        let args = PushPullArgs {
            priority: (i % 3) as i32,
            version: i as i32,
            ..args
        };
        let calls = calls.clone();
        let tx = tx.clone();
        coordinator
            .submit(
                args,
                Completion::new(move |status| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(status);
                }),
            )
            .unwrap();
    }

    for _ in 0..REQUESTS {
        let status = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(status.is_ok());
    }
    coordinator.shutdown().await;
    assert_eq!(calls.load(Ordering::SeqCst), REQUESTS);
}

#[tokio::test]
async fn device_tensor_waits_for_its_producer() {
    let (coordinator, transport) = scheduled_coordinator(CountingTransport::new());
    let stream = SimulatedStream::new();
    let write = stream.enqueue_op();

    let output = Arc::new(HostTensor::zeros(DataType::Float32, vec![2]));
    let args = PushPullArgs::builder()
        .name("activations")
        .input(Arc::new(HostTensor::from_f32(&[9.0, 8.0])))
        .output(output.clone())
        .stream(Arc::new(stream.clone()))
        .build()
        .unwrap();
    let handle = coordinator.push_pull(args).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(transport.started().is_empty());
    assert_eq!(coordinator.pending(), 1);

    stream.complete_through(write);
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(output.to_f32(), vec![9.0, 8.0]);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn failed_producer_is_reported_to_the_caller() {
    let (coordinator, transport) = scheduled_coordinator(CountingTransport::new());
    let stream = SimulatedStream::new();
    stream.enqueue_op();

    let output = Arc::new(HostTensor::zeros(DataType::Float32, vec![2]));
    let args = PushPullArgs::builder()
        .name("activations")
        .input(Arc::new(HostTensor::from_f32(&[9.0, 8.0])))
        .output(output.clone())
        .stream(Arc::new(stream.clone()))
        .build()
        .unwrap();
    let handle = coordinator.push_pull(args).unwrap();
    stream.fail();

    let status = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap_err();
    assert_eq!(status.code(), StatusCode::Aborted);
    assert!(transport.started().is_empty());
    assert_eq!(output.to_f32(), vec![0.0, 0.0]);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn retried_registration_keeps_keys_aligned_with_peers() {
    let (retried, transport) = scheduled_coordinator(CountingTransport::new());
    let (clean, _) = scheduled_coordinator(CountingTransport::new());

    transport.fail_registrations(Status::aborted("server not ready"));
    let (args, _) = f32_push_pull("a", &[1.0; 4]);
    let err = retried.push_pull(args).unwrap_err();
    assert!(matches!(err, CoordinatorError::RegistrationFailed { .. }));
    transport.clear_registration_failure();

    for name in ["a", "b"] {
        for coordinator in [&retried, &clean] {
            let (args, _) = f32_push_pull(name, &[1.0; 4]);
            let handle = coordinator.push_pull(args).unwrap();
            tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
        }
        assert_eq!(
            retried.registry().get(name).unwrap().declared_key(),
            clean.registry().get(name).unwrap().declared_key()
        );
    }

    retried.shutdown().await;
    clean.shutdown().await;
}

#[tokio::test]
async fn names_get_declared_keys_in_first_use_order() {
    let (coordinator, _) = scheduled_coordinator(CountingTransport::new());

    let mut handles = Vec::new();
    for name in ["embedding", "dense", "bias"] {
        // 40 floats = 160 bytes over 64-byte partitions
        let (args, _) = f32_push_pull(name, &[0.5; 40]);
        handles.push(coordinator.push_pull(args).unwrap());
    }
    for result in tokio::time::timeout(WAIT, join_all(handles)).await.unwrap() {
        result.unwrap();
    }

    let registry = coordinator.registry();
    for (key, name) in ["embedding", "dense", "bias"].into_iter().enumerate() {
        let record = registry.get(name).unwrap();
        assert_eq!(record.declared_key(), key as u64);
        let lens: Vec<usize> = record.partitions().iter().map(|p| p.len).collect();
        assert_eq!(lens, vec![64, 64, 32]);
        assert_eq!(record.partitions()[2].key, ((key as u64) << 16) + 2);
    }

    coordinator.shutdown().await;
}

#[tokio::test]
async fn transport_failure_is_delivered_not_raised() {
    let (coordinator, transport) = scheduled_coordinator(CountingTransport::new());
    transport.fail_push_pulls(Status::unknown_error("reduction failed"));

    let (args, _) = f32_push_pull("w", &[1.0]);
    let handle = coordinator.push_pull(args).unwrap();
    let status = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap_err();
    assert_eq!(status.code(), StatusCode::UnknownError);
    assert_eq!(status.reason(), "reduction failed");

    coordinator.shutdown().await;
}
