//! Registry configuration

use crate::entry::UserId;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
	/// User partitions to enumerate
	pub users: Vec<UserId>,

	/// Capacity of the registry event bus
	pub event_capacity: usize,

	/// Seconds between background re-enumerations of the package service;
	/// 0 disables polling
	pub refresh_interval_secs: u64,

	/// Logging level used by [`init_tracing`] when RUST_LOG is unset
	pub log_level: String,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			users: vec![0],
			event_capacity: 1024,
			refresh_interval_secs: 0,
			log_level: "info".to_string(),
		}
	}
}

impl RegistryConfig {
	/// Load configuration from a JSON file, falling back to defaults when the
	/// file does not exist
	pub fn load_from(path: &Path) -> Result<Self> {
		if path.exists() {
			info!("Loading registry config from {:?}", path);
			let json = fs::read_to_string(path)?;
			let config: RegistryConfig = serde_json::from_str(&json)?;
			Ok(config)
		} else {
			warn!("No config found at {:?}, using defaults", path);
			Ok(Self::default())
		}
	}

	/// Save configuration to a JSON file
	pub fn save(&self, path: &Path) -> Result<()> {
		let json = serde_json::to_string_pretty(self)?;
		fs::write(path, json)?;
		Ok(())
	}
}

/// Initialize tracing with an env-filter; `RUST_LOG` overrides `fallback`.
/// Safe to call more than once (subsequent calls are no-ops).
pub fn init_tracing(fallback: &str) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(fallback.to_string()));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.try_init();
}
