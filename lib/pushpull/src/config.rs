// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Push-pull configuration.
//!
//! Configuration sources in priority order (lowest to highest):
//! 1. Code defaults
//! 2. System config file at /opt/dynamo/etc/pushpull.toml
//! 3. TOML file from DYN_PUSHPULL_CONFIG_PATH
//! 4. Environment variables (DYN_PUSHPULL_* and DYN_PUSHPULL_QUEUE_*)
//! 5. JSON overrides, when loaded through [`PushPullConfig::from_figment_with_json`]

use std::time::Duration;

use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Json, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extraction(#[from] Box<figment::Error>),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Configuration error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Dispatch queue tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of requests waiting for dispatch.
    #[validate(range(min = 1))]
    pub capacity: usize,

    /// Maximum number of push-pulls executing on the transport at once.
    #[validate(range(min = 1))]
    pub max_inflight: usize,

    /// How often requests gated on device readiness are re-examined.
    #[validate(range(min = 1))]
    pub poll_interval_us: u64,
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us.max(1))
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            max_inflight: 16,
            poll_interval_us: 50,
        }
    }
}

/// Top-level push-pull configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PushPullConfig {
    /// Upper bound on the byte length of one tensor partition.
    #[validate(range(min = 1))]
    pub partition_bytes: usize,

    #[validate(nested)]
    pub queue: QueueConfig,
}

impl Default for PushPullConfig {
    fn default() -> Self {
        Self {
            partition_bytes: 4_096_000,
            queue: QueueConfig::default(),
        }
    }
}

impl PushPullConfig {
    /// Create a Figment configuration with all sources merged.
    pub fn figment() -> Figment {
        let config_path = std::env::var("DYN_PUSHPULL_CONFIG_PATH").unwrap_or_default();

        Figment::new()
            .merge(Serialized::defaults(PushPullConfig::default()))
            .merge(Toml::file("/opt/dynamo/etc/pushpull.toml"))
            .merge(Toml::file(&config_path))
            // DYN_PUSHPULL_PARTITION_BYTES
            .merge(Env::prefixed("DYN_PUSHPULL_").only(&["partition_bytes"]))
            // DYN_PUSHPULL_QUEUE_CAPACITY, DYN_PUSHPULL_QUEUE_MAX_INFLIGHT, etc.
            .merge(
                Env::prefixed("DYN_PUSHPULL_QUEUE_")
                    .map(|k| format!("queue.{}", k.as_str().to_lowercase()).into()),
            )
    }

    /// Load configuration from default figment (env and files).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::extract_from(Self::figment())
    }

    /// Extract and validate configuration from any provider.
    pub fn extract_from<T: Provider>(provider: T) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(provider)
            .extract()
            .map_err(|e| ConfigError::Extraction(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with JSON overrides at the highest priority.
    pub fn from_figment_with_json(json: &str) -> Result<Self, ConfigError> {
        Self::extract_from(Self::figment().merge(Json::string(json)))
    }
}

impl Provider for PushPullConfig {
    fn metadata(&self) -> Metadata {
        Metadata::named("PushPullConfig")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}
