// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Process-wide coordinator.
//!
//! Framework kernels have no way to carry a coordinator handle, so the
//! process installs one here at startup and kernels look it up per call.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::coordinator::Coordinator;
use crate::error::CoordinatorError;

static COORDINATOR: Lazy<RwLock<Option<Arc<Coordinator>>>> = Lazy::new(|| RwLock::new(None));

/// Install `coordinator` as the process-wide instance and initialize it.
///
/// Returns the previously installed coordinator, if any. The caller owns
/// shutting it down.
pub fn init(coordinator: Arc<Coordinator>) -> Option<Arc<Coordinator>> {
    coordinator.initialize();
    let previous = COORDINATOR.write().replace(coordinator);
    if previous.is_some() {
        tracing::warn!("replacing an already installed push-pull coordinator");
    }
    previous
}

/// The installed coordinator, if it is initialized.
pub fn coordinator() -> Result<Arc<Coordinator>, CoordinatorError> {
    let coordinator = COORDINATOR
        .read()
        .clone()
        .ok_or(CoordinatorError::Uninitialized)?;
    coordinator.check_initialized()?;
    Ok(coordinator)
}

pub fn check_initialized() -> Result<(), CoordinatorError> {
    coordinator().map(|_| ())
}

/// Remove the installed coordinator and shut it down.
///
/// Returns false if none was installed.
pub async fn shutdown() -> bool {
    let installed = COORDINATOR.write().take();
    let Some(coordinator) = installed else {
        return false;
    };
    coordinator.shutdown().await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushPullConfig;
    use crate::testing::{CountingTransport, RecordingQueue};
    use serial_test::serial;

    fn fresh() -> Arc<Coordinator> {
        Arc::new(Coordinator::new(
            PushPullConfig::default(),
            Arc::new(CountingTransport::new()),
            Arc::new(RecordingQueue::new()),
        ))
    }

    #[tokio::test]
    #[serial]
    async fn lifecycle() {
        shutdown().await;
        assert!(matches!(
            check_initialized(),
            Err(CoordinatorError::Uninitialized)
        ));

        assert!(init(fresh()).is_none());
        check_initialized().unwrap();
        assert!(coordinator().unwrap().is_initialized());

        let replaced = init(fresh());
        assert!(replaced.is_some());

        assert!(shutdown().await);
        assert!(coordinator().is_err());
        assert!(!shutdown().await);
    }

    #[tokio::test]
    #[serial]
    async fn installed_but_shut_down_counts_as_uninitialized() {
        let installed = fresh();
        init(installed.clone());
        installed.shutdown().await;
        assert!(matches!(
            coordinator(),
            Err(CoordinatorError::Uninitialized)
        ));
        shutdown().await;
    }
}
