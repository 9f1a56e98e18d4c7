//! Collaborator interfaces consumed by the registry.
//!
//! The registry never talks to the host system directly; everything expensive
//! or platform-specific lives behind these traits so the core stays testable
//! and the background workers stay compute-only.

use crate::entry::{IconHandle, StaticInfo, UserId};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// A module reported by the host's module-info service
#[derive(Debug, Clone)]
pub struct ModuleInfo {
	pub package_name: String,
	/// Hidden system modules are excluded from all user-visible listings
	pub hidden: bool,
}

/// Per-package on-disk usage as reported by the storage-stats service
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageStats {
	pub code_bytes: u64,
	pub data_bytes: u64,
	pub cache_bytes: u64,
}

impl StorageStats {
	pub fn total_bytes(&self) -> i64 {
		(self.code_bytes + self.data_bytes + self.cache_bytes) as i64
	}
}

/// Which launch surface a launcher query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaunchIntent {
	Launcher,
	LeanbackLauncher,
}

/// One activity resolved for a launch intent
#[derive(Debug, Clone)]
pub struct LauncherMatch {
	pub package_name: String,
	pub enabled: bool,
	pub category: LaunchIntent,
}

/// Enumerates installed entities and their static attributes
#[async_trait]
pub trait PackageService: Send + Sync {
	async fn list_installed(&self, user: UserId) -> Result<Vec<StaticInfo>, ProviderError>;
}

/// Reports installed modules; used solely to build the hidden-module exclusion set
#[async_trait]
pub trait ModuleInfoService: Send + Sync {
	async fn list_modules(&self) -> Result<Vec<ModuleInfo>, ProviderError>;
}

/// Renders a badged icon for an entity
#[async_trait]
pub trait IconService: Send + Sync {
	async fn render_icon(&self, info: &StaticInfo) -> Result<IconHandle, ProviderError>;
}

/// Reports on-disk byte counts per entity
#[async_trait]
pub trait StorageStatsService: Send + Sync {
	async fn query_stats(
		&self,
		storage_uuid: Uuid,
		package_name: &str,
		user: UserId,
	) -> Result<StorageStats, ProviderError>;
}

/// Answers "does this entity have a user-facing launch point, and is it enabled"
#[async_trait]
pub trait LauncherService: Send + Sync {
	async fn resolve_launchers(
		&self,
		intent: LaunchIntent,
		user: UserId,
	) -> Result<Vec<LauncherMatch>, ProviderError>;
}

/// Identifies the package owning the system's current home activity
#[async_trait]
pub trait HomeService: Send + Sync {
	async fn home_activity(&self) -> Result<Option<String>, ProviderError>;
}

/// Bundle of all collaborator handles, cloned into background workers
#[derive(Clone)]
pub struct Providers {
	pub packages: Arc<dyn PackageService>,
	pub modules: Arc<dyn ModuleInfoService>,
	pub icons: Arc<dyn IconService>,
	pub storage: Arc<dyn StorageStatsService>,
	pub launcher: Arc<dyn LauncherService>,
	pub home: Arc<dyn HomeService>,
}
