//! Shared fixtures: a scriptable fake host and a recording observer.

use appstate::{
	AppEntry, Callbacks, HomeService, IconHandle, IconService, LaunchIntent, LauncherMatch,
	LauncherService, ModuleInfo, ModuleInfoService, PackageService, ProviderError, Providers,
	StaticInfo, StorageStats, StorageStatsService, UserId,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

pub const HOME_PACKAGE: &str = "com.example.home";
pub const LAUNCHABLE_PACKAGE: &str = "com.example.launchable";

/// Default per-package usage, mirroring a plausible host report
pub const DEFAULT_STATS: StorageStats = StorageStats {
	code_bytes: 10,
	data_bytes: 20,
	cache_bytes: 30,
};

/// Scriptable stand-in for every external collaborator the registry talks to
#[derive(Default)]
pub struct FakeHost {
	installed: Mutex<Vec<StaticInfo>>,
	modules: Mutex<Vec<ModuleInfo>>,
	launchers: Mutex<Vec<LauncherMatch>>,
	home_package: Mutex<Option<String>>,
	stats: Mutex<HashMap<String, StorageStats>>,
	stats_failures: Mutex<HashSet<String>>,
	stats_gate: Mutex<Option<Arc<Notify>>>,
	fail_enumeration: AtomicBool,
	fail_icons: AtomicBool,
	fail_stats: AtomicBool,
}

impl FakeHost {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn static_info(package: &str) -> StaticInfo {
		StaticInfo {
			package_name: package.to_string(),
			user: 0,
			installed: true,
			source_dir: PathBuf::from("/data/app").join(package),
			storage_uuid: Uuid::new_v4(),
			label: None,
		}
	}

	pub fn install(&self, package: &str) {
		self.installed
			.lock()
			.unwrap()
			.push(Self::static_info(package));
	}

	pub fn uninstall(&self, package: &str) {
		self.installed
			.lock()
			.unwrap()
			.retain(|info| info.package_name != package);
	}

	pub fn add_module(&self, package: &str, hidden: bool) {
		self.modules.lock().unwrap().push(ModuleInfo {
			package_name: package.to_string(),
			hidden,
		});
	}

	pub fn set_home(&self, package: &str) {
		*self.home_package.lock().unwrap() = Some(package.to_string());
	}

	pub fn add_launcher(&self, package: &str, category: LaunchIntent, enabled: bool) {
		self.launchers.lock().unwrap().push(LauncherMatch {
			package_name: package.to_string(),
			enabled,
			category,
		});
	}

	pub fn set_stats(&self, package: &str, stats: StorageStats) {
		self.stats
			.lock()
			.unwrap()
			.insert(package.to_string(), stats);
	}

	pub fn fail_enumeration(&self, fail: bool) {
		self.fail_enumeration.store(fail, Ordering::SeqCst);
	}

	pub fn fail_icons(&self, fail: bool) {
		self.fail_icons.store(fail, Ordering::SeqCst);
	}

	pub fn fail_stats(&self, fail: bool) {
		self.fail_stats.store(fail, Ordering::SeqCst);
	}

	pub fn fail_stats_for(&self, package: &str) {
		self.stats_failures
			.lock()
			.unwrap()
			.insert(package.to_string());
	}

	/// Block the next stats query until the returned handle is notified
	pub fn hold_next_stats(&self) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());
		*self.stats_gate.lock().unwrap() = Some(gate.clone());
		gate
	}

	pub fn providers(self: &Arc<Self>) -> Providers {
		Providers {
			packages: self.clone(),
			modules: self.clone(),
			icons: self.clone(),
			storage: self.clone(),
			launcher: self.clone(),
			home: self.clone(),
		}
	}
}

#[async_trait]
impl PackageService for FakeHost {
	async fn list_installed(&self, user: UserId) -> Result<Vec<StaticInfo>, ProviderError> {
		if self.fail_enumeration.load(Ordering::SeqCst) {
			return Err(ProviderError::Unavailable("package service down".into()));
		}
		Ok(self
			.installed
			.lock()
			.unwrap()
			.iter()
			.filter(|info| info.user == user)
			.cloned()
			.collect())
	}
}

#[async_trait]
impl ModuleInfoService for FakeHost {
	async fn list_modules(&self) -> Result<Vec<ModuleInfo>, ProviderError> {
		Ok(self.modules.lock().unwrap().clone())
	}
}

#[async_trait]
impl IconService for FakeHost {
	async fn render_icon(&self, info: &StaticInfo) -> Result<IconHandle, ProviderError> {
		if self.fail_icons.load(Ordering::SeqCst) {
			return Err(ProviderError::Unavailable("icon renderer down".into()));
		}
		Ok(IconHandle::new(info.package_name.clone().into_bytes()))
	}
}

#[async_trait]
impl StorageStatsService for FakeHost {
	async fn query_stats(
		&self,
		_storage_uuid: Uuid,
		package_name: &str,
		_user: UserId,
	) -> Result<StorageStats, ProviderError> {
		if self.fail_stats.load(Ordering::SeqCst)
			|| self.stats_failures.lock().unwrap().contains(package_name)
		{
			return Err(ProviderError::Unavailable("stats service down".into()));
		}
		let stats = self
			.stats
			.lock()
			.unwrap()
			.get(package_name)
			.copied()
			.unwrap_or(DEFAULT_STATS);
		let gate = self.stats_gate.lock().unwrap().take();
		if let Some(gate) = gate {
			gate.notified().await;
		}
		Ok(stats)
	}
}

#[async_trait]
impl LauncherService for FakeHost {
	async fn resolve_launchers(
		&self,
		intent: LaunchIntent,
		_user: UserId,
	) -> Result<Vec<LauncherMatch>, ProviderError> {
		Ok(self
			.launchers
			.lock()
			.unwrap()
			.iter()
			.filter(|found| found.category == intent)
			.cloned()
			.collect())
	}
}

#[async_trait]
impl HomeService for FakeHost {
	async fn home_activity(&self) -> Result<Option<String>, ProviderError> {
		Ok(self.home_package.lock().unwrap().clone())
	}
}

/// Observer that records every delivery for later assertions
#[derive(Default)]
pub struct RecordingCallbacks {
	rebuilds: Mutex<Vec<Vec<AppEntry>>>,
	package_list_changes: AtomicUsize,
	entry_changes: AtomicUsize,
}

impl RecordingCallbacks {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn last_rebuild(&self) -> Option<Vec<AppEntry>> {
		self.rebuilds.lock().unwrap().last().cloned()
	}

	pub fn rebuild_count(&self) -> usize {
		self.rebuilds.lock().unwrap().len()
	}

	pub fn package_list_changes(&self) -> usize {
		self.package_list_changes.load(Ordering::SeqCst)
	}

	pub fn entry_changes(&self) -> usize {
		self.entry_changes.load(Ordering::SeqCst)
	}
}

impl Callbacks for RecordingCallbacks {
	fn on_rebuild_complete(&self, entries: Vec<AppEntry>) {
		self.rebuilds.lock().unwrap().push(entries);
	}

	fn on_package_list_changed(&self) {
		self.package_list_changes.fetch_add(1, Ordering::SeqCst);
	}

	fn on_entries_changed(&self) {
		self.entry_changes.fetch_add(1, Ordering::SeqCst);
	}
}

pub fn find_entry<'a>(entries: &'a [AppEntry], package: &str) -> &'a AppEntry {
	entries
		.iter()
		.find(|entry| entry.id.package_name == package)
		.unwrap_or_else(|| panic!("no entry for {package}"))
}
