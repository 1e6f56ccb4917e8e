// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Name registry.
//!
//! Binds each tensor name to its element type, byte size and device the first
//! time the name is seen. Workers match push-pull rounds purely by name, so
//! the binding must be established before the first round and never change.
//!
//! Entries are never removed. Each name owns a once-cell slot: the first
//! caller runs the transport registration while concurrent callers for the
//! same name block on the slot and then observe the winner's record.
//!
//! Declared keys count successful registrations only. Registrations of
//! different names run one at a time under the key lock, so a failed attempt
//! hands its key to the next registration and workers that declare names in
//! the same order agree on every key.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::device::DeviceId;
use crate::dtype::ElementType;
use crate::error::{CoordinatorError, TensorSignature};
use crate::status::Status;
use crate::transport::TransportContext;

/// Partition keys reserve the low 16 bits for the partition index.
const PARTITION_KEY_BITS: u32 = 16;
const MAX_PARTITIONS: usize = 1 << PARTITION_KEY_BITS;

/// Contiguous byte range of a registered tensor with its own transport key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub key: u64,
    pub offset: usize,
    pub len: usize,
}

/// Everything the transport is told when a name is first registered.
#[derive(Clone, Debug)]
pub struct TensorDeclaration {
    pub name: String,
    pub dtype: ElementType,
    pub size: usize,
    pub device: DeviceId,
    pub declared_key: u64,
    pub partitions: Vec<Partition>,
}

/// Permanent binding of a tensor name.
#[derive(Debug)]
pub struct RegistrationRecord {
    declaration: TensorDeclaration,
    context: TransportContext,
}

impl RegistrationRecord {
    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    pub fn dtype(&self) -> ElementType {
        self.declaration.dtype
    }

    /// Byte size of the tensor.
    pub fn size(&self) -> usize {
        self.declaration.size
    }

    pub fn device(&self) -> DeviceId {
        self.declaration.device
    }

    pub fn declared_key(&self) -> u64 {
        self.declaration.declared_key
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.declaration.partitions
    }

    /// Opaque state the transport attached at registration.
    pub fn context(&self) -> &TransportContext {
        &self.context
    }

    pub fn signature(&self) -> TensorSignature {
        TensorSignature {
            dtype: self.dtype(),
            size: self.size(),
            device: self.device(),
        }
    }

    fn matches(&self, requested: &TensorSignature) -> bool {
        self.signature() == *requested
    }
}

type Slot = Arc<OnceCell<Arc<RegistrationRecord>>>;

/// Process-wide map from tensor name to [`RegistrationRecord`].
pub struct NameRegistry {
    slots: DashMap<String, Slot>,
    /// Key of the next successful registration.
    next_declared_key: Mutex<u64>,
    partition_bytes: usize,
}

impl NameRegistry {
    /// Create an empty registry splitting tensors into partitions of at most
    /// `partition_bytes` bytes.
    pub fn new(partition_bytes: usize) -> Self {
        Self {
            slots: DashMap::new(),
            next_declared_key: Mutex::new(0),
            partition_bytes: partition_bytes.max(1),
        }
    }

    /// Look up the record for `name`, if registration has completed.
    pub fn get(&self, name: &str) -> Option<Arc<RegistrationRecord>> {
        let slot = self.slots.get(name).map(|slot| slot.clone())?;
        slot.get().cloned()
    }

    /// Whether `name` is registered with exactly this signature.
    ///
    /// Returns `RegistrationConflict` when a record exists but disagrees.
    pub fn is_registered(
        &self,
        name: &str,
        dtype: ElementType,
        size: usize,
        device: DeviceId,
    ) -> Result<bool, CoordinatorError> {
        match self.get(name) {
            None => Ok(false),
            Some(record) => {
                check_signature(&record, TensorSignature { dtype, size, device })?;
                Ok(true)
            }
        }
    }

    /// Register `name`, running `init` at most once per name.
    ///
    /// Blocks while another thread is registering any name. If `init` fails
    /// nothing is recorded, no declared key is consumed, and a later call may
    /// try again.
    pub fn register<F>(
        &self,
        name: &str,
        dtype: ElementType,
        size: usize,
        device: DeviceId,
        init: F,
    ) -> Result<Arc<RegistrationRecord>, CoordinatorError>
    where
        F: FnOnce(&TensorDeclaration) -> Result<TransportContext, Status>,
    {
        // clone the slot out so the shard lock is not held across `init`
        let slot: Slot = self.slots.entry(name.to_string()).or_default().clone();

        let record = slot.get_or_try_init(|| {
            let mut next_key = self.next_declared_key.lock();
            let declaration = self.declare(name, dtype, size, device, *next_key)?;
            tracing::debug!(
                name,
                %dtype,
                size,
                %device,
                declared_key = declaration.declared_key,
                partitions = declaration.partitions.len(),
                "registering tensor"
            );
            let context =
                init(&declaration).map_err(|status| CoordinatorError::RegistrationFailed {
                    name: name.to_string(),
                    status,
                })?;
            *next_key += 1;
            Ok::<_, CoordinatorError>(Arc::new(RegistrationRecord {
                declaration,
                context,
            }))
        })?;

        check_signature(record, TensorSignature { dtype, size, device })?;
        Ok(record.clone())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names with a completed registration.
    pub fn names(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|slot| slot.get().is_some())
            .map(|slot| slot.key().clone())
            .collect()
    }

    fn declare(
        &self,
        name: &str,
        dtype: ElementType,
        size: usize,
        device: DeviceId,
        declared_key: u64,
    ) -> Result<TensorDeclaration, CoordinatorError> {
        let count = size.div_ceil(self.partition_bytes).max(1);
        if count > MAX_PARTITIONS {
            return Err(CoordinatorError::RegistrationFailed {
                name: name.to_string(),
                status: Status::invalid_argument(format!(
                    "{size} bytes needs {count} partitions of {} bytes; at most {MAX_PARTITIONS} are supported",
                    self.partition_bytes
                )),
            });
        }

        let partitions = (0..count)
            .map(|index| {
                let offset = index * self.partition_bytes;
                Partition {
                    key: (declared_key << PARTITION_KEY_BITS) + index as u64,
                    offset,
                    len: self.partition_bytes.min(size - offset),
                }
            })
            .collect();

        Ok(TensorDeclaration {
            name: name.to_string(),
            dtype,
            size,
            device,
            declared_key,
            partitions,
        })
    }
}

fn check_signature(
    record: &RegistrationRecord,
    requested: TensorSignature,
) -> Result<(), CoordinatorError> {
    if record.matches(&requested) {
        return Ok(());
    }
    tracing::error!(
        name = record.name(),
        existing = %record.signature(),
        requested = %requested,
        "tensor signature conflicts with its registration"
    );
    Err(CoordinatorError::RegistrationConflict {
        name: record.name().to_string(),
        existing: record.signature(),
        requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ok_init(_: &TensorDeclaration) -> Result<TransportContext, Status> {
        Ok(TransportContext::empty())
    }

    #[test]
    fn first_registration_creates_record() {
        let registry = NameRegistry::new(1024);
        assert!(registry.get("grad_w").is_none());
        assert!(
            !registry
                .is_registered("grad_w", ElementType::Float32, 16, DeviceId::CPU)
                .unwrap()
        );

        let record = registry
            .register("grad_w", ElementType::Float32, 16, DeviceId::CPU, ok_init)
            .unwrap();
        assert_eq!(record.name(), "grad_w");
        assert_eq!(record.size(), 16);
        assert_eq!(record.declared_key(), 0);
        assert!(
            registry
                .is_registered("grad_w", ElementType::Float32, 16, DeviceId::CPU)
                .unwrap()
        );
        assert_eq!(registry.names(), vec!["grad_w".to_string()]);
    }

    #[test]
    fn mismatched_signature_is_a_conflict() {
        let registry = NameRegistry::new(1024);
        registry
            .register("grad_w", ElementType::Float32, 16, DeviceId::CPU, ok_init)
            .unwrap();

        let err = registry
            .is_registered("grad_w", ElementType::Float32, 32, DeviceId::CPU)
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::RegistrationConflict { .. }));

        let err = registry
            .is_registered("grad_w", ElementType::Float32, 16, DeviceId::gpu(0))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::RegistrationConflict { .. }));

        let calls = AtomicUsize::new(0);
        let err = registry
            .register("grad_w", ElementType::Int32, 16, DeviceId::CPU, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(TransportContext::empty())
            })
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::RegistrationConflict { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn concurrent_first_use_registers_once() {
        const THREADS: usize = 16;
        let registry = NameRegistry::new(1024);
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    let record = registry
                        .register("shared", ElementType::Float64, 64, DeviceId::CPU, |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            Ok(TransportContext::empty())
                        })
                        .unwrap();
                    assert_eq!(record.declared_key(), 0);
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_registration_leaves_no_record() {
        let registry = NameRegistry::new(1024);
        let err = registry
            .register("w", ElementType::Int8, 4, DeviceId::CPU, |_| {
                Err(Status::invalid_argument("rejected by server"))
            })
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::RegistrationFailed { .. }));
        assert!(registry.get("w").is_none());
        assert!(registry.is_empty());

        let record = registry
            .register("w", ElementType::Int8, 4, DeviceId::CPU, ok_init)
            .unwrap();
        assert_eq!(record.size(), 4);
    }

    #[test]
    fn failed_registration_does_not_shift_later_keys() {
        let retried = NameRegistry::new(1024);
        let clean = NameRegistry::new(1024);

        let err = retried
            .register("a", ElementType::Float32, 8, DeviceId::CPU, |_| {
                Err(Status::aborted("server not ready"))
            })
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::RegistrationFailed { .. }));

        for name in ["a", "b"] {
            let on_retried = retried
                .register(name, ElementType::Float32, 8, DeviceId::CPU, ok_init)
                .unwrap();
            let on_clean = clean
                .register(name, ElementType::Float32, 8, DeviceId::CPU, ok_init)
                .unwrap();
            assert_eq!(on_retried.declared_key(), on_clean.declared_key());
            assert_eq!(on_retried.partitions(), on_clean.partitions());
        }
        assert_eq!(retried.get("b").unwrap().declared_key(), 1);
    }

    #[test]
    fn partition_limit_failure_does_not_consume_a_key() {
        let registry = NameRegistry::new(1);
        registry
            .register("huge", ElementType::UInt8, MAX_PARTITIONS + 1, DeviceId::CPU, ok_init)
            .unwrap_err();
        let record = registry
            .register("small", ElementType::UInt8, 1, DeviceId::CPU, ok_init)
            .unwrap();
        assert_eq!(record.declared_key(), 0);
    }

    #[test]
    fn tensors_are_split_into_keyed_partitions() {
        let registry = NameRegistry::new(10);
        registry
            .register("a", ElementType::UInt8, 1, DeviceId::CPU, ok_init)
            .unwrap();
        let record = registry
            .register("b", ElementType::UInt8, 25, DeviceId::CPU, ok_init)
            .unwrap();

        assert_eq!(record.declared_key(), 1);
        assert_eq!(
            record.partitions(),
            &[
                Partition {
                    key: 1 << 16,
                    offset: 0,
                    len: 10
                },
                Partition {
                    key: (1 << 16) + 1,
                    offset: 10,
                    len: 10
                },
                Partition {
                    key: (1 << 16) + 2,
                    offset: 20,
                    len: 5
                },
            ]
        );
    }

    #[test]
    fn empty_tensor_gets_one_empty_partition() {
        let registry = NameRegistry::new(10);
        let record = registry
            .register("empty", ElementType::Float32, 0, DeviceId::CPU, ok_init)
            .unwrap();
        assert_eq!(record.partitions().len(), 1);
        assert_eq!(record.partitions()[0].len, 0);
    }

    #[test]
    fn too_many_partitions_fails_registration() {
        let registry = NameRegistry::new(1);
        let err = registry
            .register(
                "huge",
                ElementType::UInt8,
                MAX_PARTITIONS + 1,
                DeviceId::CPU,
                ok_init,
            )
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::RegistrationFailed { .. }));
        assert!(registry.get("huge").is_none());
    }
}
