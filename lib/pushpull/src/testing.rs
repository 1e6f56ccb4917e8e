// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Test doubles for the coordinator's collaborators.
//!
//! Available to this crate's tests and, with the `testing` feature, to
//! dependents that want to exercise the submit path without a device or a
//! network transport.

use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::dtype::DataType;
use crate::queue::{DispatchQueue, EnqueueRejection, PushPullRequest};
use crate::ready::{DeviceMarker, DeviceStream, MarkerStatus, ReadyEvent};
use crate::registry::{RegistrationRecord, TensorDeclaration};
use crate::status::Status;
use crate::tensor::{TensorBuffer, TensorView};
use crate::transport::{LoopbackTransport, Transport, TransportContext};

fn element_bytes(dtype: DataType) -> usize {
    match dtype {
        DataType::Bool | DataType::UInt8 | DataType::Int8 => 1,
        DataType::UInt16 | DataType::Int16 | DataType::Float16 | DataType::BFloat16 => 2,
        DataType::Int32 | DataType::Float32 => 4,
        DataType::Int64 | DataType::Float64 | DataType::Complex64 | DataType::String => 8,
    }
}

/// Zero-initialized host allocation implementing [`TensorBuffer`].
#[derive(Debug)]
pub struct HostTensor {
    dtype: DataType,
    shape: Vec<usize>,
    data: NonNull<u8>,
    len: usize,
}

// SAFETY: the allocation is owned exclusively by the tensor and only written
// through raw addresses by code that holds a reference to it.
unsafe impl Send for HostTensor {}
unsafe impl Sync for HostTensor {}

impl HostTensor {
    pub fn zeros(dtype: DataType, shape: Vec<usize>) -> Self {
        let len = shape.iter().product::<usize>() * element_bytes(dtype);
        let boxed = vec![0u8; len].into_boxed_slice();
        let data = NonNull::new(Box::into_raw(boxed) as *mut u8).unwrap_or(NonNull::dangling());
        Self {
            dtype,
            shape,
            data,
            len,
        }
    }

    pub fn from_f32(values: &[f32]) -> Self {
        let tensor = Self::zeros(DataType::Float32, vec![values.len()]);
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        tensor.write(&bytes);
        tensor
    }

    pub fn from_i32(values: &[i32]) -> Self {
        let tensor = Self::zeros(DataType::Int32, vec![values.len()]);
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        tensor.write(&bytes);
        tensor
    }

    pub fn addr(&self) -> usize {
        self.data.as_ptr() as usize
    }

    pub fn to_vec(&self) -> Vec<u8> {
        // SAFETY: `data` spans `len` initialized bytes owned by `self`
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len).to_vec() }
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.to_vec()
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn write(&self, bytes: &[u8]) {
        let count = bytes.len().min(self.len);
        // SAFETY: `data` spans `len` bytes and `count <= len`
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.data.as_ptr(), count) };
    }
}

impl TensorBuffer for HostTensor {
    fn dtype(&self) -> DataType {
        self.dtype
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn addr(&self) -> usize {
        HostTensor::addr(self)
    }

    fn size_bytes(&self) -> usize {
        self.len
    }
}

impl Drop for HostTensor {
    fn drop(&mut self) {
        // SAFETY: reconstructs the boxed slice leaked in `zeros`
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.data.as_ptr(),
                self.len,
            )));
        }
    }
}

/// In-order execution stream whose progress is driven by the test.
///
/// Every enqueued operation gets a sequence number; a marker records the
/// number of operations submitted at recording time and completes once the
/// test marks that many as finished.
#[derive(Clone, Default)]
pub struct SimulatedStream {
    submitted: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
}

impl SimulatedStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an operation and return its sequence number.
    pub fn enqueue_op(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Finish every operation up to and including `seq`.
    pub fn complete_through(&self, seq: u64) {
        self.completed.fetch_max(seq, Ordering::SeqCst);
    }

    pub fn complete_all(&self) {
        self.complete_through(self.submitted.load(Ordering::SeqCst));
    }

    /// Put the stream into an error state.
    pub fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }
}

impl DeviceStream for SimulatedStream {
    fn record_marker(&self) -> Arc<dyn DeviceMarker> {
        Arc::new(SimulatedMarker {
            target: self.submitted.load(Ordering::SeqCst),
            completed: self.completed.clone(),
            failed: self.failed.clone(),
        })
    }
}

struct SimulatedMarker {
    target: u64,
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
}

impl DeviceMarker for SimulatedMarker {
    fn query(&self) -> MarkerStatus {
        if self.completed.load(Ordering::SeqCst) >= self.target {
            MarkerStatus::Complete
        } else if self.failed.load(Ordering::SeqCst) {
            MarkerStatus::Error
        } else {
            MarkerStatus::Pending
        }
    }
}

/// Loopback transport that records what it was asked to do.
pub struct CountingTransport {
    loopback: LoopbackTransport,
    registrations: AtomicUsize,
    register_delay: Duration,
    register_failure: Mutex<Option<Status>>,
    push_pull_failure: Mutex<Option<Status>>,
    gate: Option<Semaphore>,
    started: Mutex<Vec<(String, i32)>>,
    completed: AtomicUsize,
}

impl Default for CountingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl CountingTransport {
    pub fn new() -> Self {
        Self {
            loopback: LoopbackTransport::new(),
            registrations: AtomicUsize::new(0),
            register_delay: Duration::ZERO,
            register_failure: Mutex::new(None),
            push_pull_failure: Mutex::new(None),
            gate: None,
            started: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        }
    }

    /// Make every registration take at least `delay`.
    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = delay;
        self
    }

    /// Hold every push-pull until [`release`](Self::release) lets it through.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn fail_registrations(&self, status: Status) {
        *self.register_failure.lock() = Some(status);
    }

    pub fn clear_registration_failure(&self) {
        self.register_failure.lock().take();
    }

    pub fn fail_push_pulls(&self, status: Status) {
        *self.push_pull_failure.lock() = Some(status);
    }

    /// Successful registrations so far.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// `(name, version)` of every push-pull in the order it started.
    pub fn started(&self) -> Vec<(String, i32)> {
        self.started.lock().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` push-pulls have started.
    pub async fn wait_for_started(&self, count: usize) {
        loop {
            let started = self.started.lock().len();
            if started >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl Transport for CountingTransport {
    fn register_tensor(
        &self,
        declaration: &TensorDeclaration,
        initial: &TensorView,
        ready: &ReadyEvent,
    ) -> Result<TransportContext, Status> {
        if !self.register_delay.is_zero() {
            std::thread::sleep(self.register_delay);
        }
        if let Some(status) = self.register_failure.lock().clone() {
            return Err(status);
        }
        let context = self.loopback.register_tensor(declaration, initial, ready)?;
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(context)
    }

    async fn push_pull(
        &self,
        record: &RegistrationRecord,
        input: &TensorView,
        output: &TensorView,
        version: i32,
    ) -> Status {
        self.started.lock().push((record.name().to_string(), version));
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let failure = self.push_pull_failure.lock().clone();
        let status = match failure {
            Some(status) => status,
            None => self.loopback.push_pull(record, input, output, version).await,
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        status
    }
}

/// Queue that keeps every request until the test resolves it.
#[derive(Default)]
pub struct RecordingQueue {
    requests: Mutex<Vec<PushPullRequest>>,
    reject_with: Mutex<Option<Status>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every following enqueue with `status`.
    pub fn reject_with(&self, status: Status) {
        *self.reject_with.lock() = Some(status);
    }

    /// Take every recorded request out of the queue.
    pub fn take(&self) -> Vec<PushPullRequest> {
        std::mem::take(&mut *self.requests.lock())
    }

    /// Resolve every recorded request with `status`, returning how many.
    pub fn complete_all(&self, status: Status) -> usize {
        let requests = self.take();
        let count = requests.len();
        for request in requests {
            request.completion.complete(status.clone());
        }
        count
    }
}

#[async_trait]
impl DispatchQueue for RecordingQueue {
    fn enqueue(&self, request: PushPullRequest) -> Result<(), EnqueueRejection> {
        if let Some(status) = self.reject_with.lock().clone() {
            return Err(EnqueueRejection { status, request });
        }
        self.requests.lock().push(request);
        Ok(())
    }

    fn len(&self) -> usize {
        self.requests.lock().len()
    }

    async fn shutdown(&self) {
        self.complete_all(Status::aborted("dispatch queue shut down"));
    }
}
