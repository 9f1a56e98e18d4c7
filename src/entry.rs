//! Entry types: the enrichable unit of data describing one installed application

use crate::enrichment::RequestedData;
use crate::providers::LaunchIntent;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Size sentinel meaning "not yet computed or not requested"
pub const UNKNOWN_SIZE: i64 = -1;

/// User partition identifier
pub type UserId = i32;

/// Stable identity of one installed application, unique within the cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId {
	pub package_name: String,
	pub user: UserId,
}

impl AppId {
	pub fn new(package_name: impl Into<String>, user: UserId) -> Self {
		Self {
			package_name: package_name.into(),
			user,
		}
	}
}

impl std::fmt::Display for AppId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}@{}", self.package_name, self.user)
	}
}

/// Immutable attributes reported by the package service at enumeration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticInfo {
	pub package_name: String,
	pub user: UserId,
	pub installed: bool,
	pub source_dir: PathBuf,
	/// Identifies the storage volume holding the app's code and data
	pub storage_uuid: Uuid,
	/// Display-name hint; entries fall back to the package name
	pub label: Option<String>,
}

impl StaticInfo {
	pub fn id(&self) -> AppId {
		AppId::new(self.package_name.clone(), self.user)
	}

	/// Resolve the display label without an extra service round-trip
	pub fn display_label(&self) -> String {
		self.label
			.clone()
			.unwrap_or_else(|| self.package_name.clone())
	}
}

/// Opaque handle to a rendered badge/icon, cheap to clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconHandle(Arc<[u8]>);

impl IconHandle {
	pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
		Self(data.into())
	}

	pub fn bytes(&self) -> &[u8] {
		&self.0
	}
}

/// One cached application entry. Owned exclusively by the dispatch context;
/// sessions and observers only ever hold copies.
#[derive(Debug, Clone)]
pub struct AppEntry {
	pub id: AppId,
	pub info: StaticInfo,
	/// Lazily resolved, cached once computed
	pub label: Option<String>,
	/// Absent until enrichment renders it
	pub icon: Option<IconHandle>,
	/// Aggregate on-disk size, [`UNKNOWN_SIZE`] until computed
	pub size_bytes: i64,
	pub is_home_app: bool,
	pub has_launcher_entry: bool,
	pub launcher_enabled: bool,
	/// Launch surfaces whose queries have completed for this entry;
	/// distinguishes "asked, no launcher" from "never asked", per surface
	pub resolved_intents: HashSet<LaunchIntent>,
	/// Whether the backing storage volume is currently available
	pub mounted: bool,
	/// Incarnation stamp assigned at creation; in-flight enrichment results
	/// carrying a different stamp are discarded
	pub created_seq: u64,
	/// Bumped on every mutation
	pub update_seq: u64,
}

impl AppEntry {
	pub fn new(info: StaticInfo, created_seq: u64) -> Self {
		Self {
			id: info.id(),
			label: None,
			icon: None,
			size_bytes: UNKNOWN_SIZE,
			is_home_app: false,
			has_launcher_entry: false,
			launcher_enabled: false,
			resolved_intents: HashSet::new(),
			mounted: !info.source_dir.as_os_str().is_empty(),
			created_seq,
			update_seq: 0,
			info,
		}
	}

	fn bump(&mut self) {
		self.update_seq += 1;
	}

	/// Fill the label from static info if not yet resolved. Returns true if
	/// the entry changed.
	pub fn ensure_label(&mut self) -> bool {
		if self.label.is_some() {
			return false;
		}
		self.label = Some(self.info.display_label());
		self.bump();
		true
	}

	pub fn set_icon(&mut self, icon: IconHandle) -> bool {
		if self.icon.as_ref() == Some(&icon) {
			return false;
		}
		self.icon = Some(icon);
		self.bump();
		true
	}

	pub fn set_size(&mut self, size_bytes: i64) -> bool {
		if self.size_bytes == size_bytes {
			return false;
		}
		self.size_bytes = size_bytes;
		self.bump();
		true
	}

	/// Merge one launcher query result. Surfaces resolve independently; a
	/// match on any queried surface sets the launcher fields, and they stay
	/// set until the entry is invalidated.
	pub fn set_launcher(
		&mut self,
		intents: &[LaunchIntent],
		has_entry: bool,
		enabled: bool,
	) -> bool {
		let mut changed = false;
		for intent in intents {
			changed |= self.resolved_intents.insert(*intent);
		}
		if has_entry && !self.has_launcher_entry {
			self.has_launcher_entry = true;
			changed = true;
		}
		if enabled && !self.launcher_enabled {
			self.launcher_enabled = true;
			changed = true;
		}
		if changed {
			self.bump();
		}
		changed
	}

	pub fn set_home_app(&mut self, is_home: bool) -> bool {
		if self.is_home_app == is_home {
			return false;
		}
		self.is_home_app = is_home;
		self.bump();
		true
	}

	pub fn set_mounted(&mut self, mounted: bool) -> bool {
		if self.mounted == mounted {
			return false;
		}
		self.mounted = mounted;
		self.bump();
		true
	}

	/// Defensive copy for delivery to one session: fields the session did not
	/// request stay at their sentinels even if the shared cache has them.
	pub fn masked_for(&self, requested: &RequestedData) -> AppEntry {
		let mut copy = self.clone();
		if !requested.icons {
			copy.icon = None;
		}
		if !requested.sizes {
			copy.size_bytes = UNKNOWN_SIZE;
		}
		if !requested.home_app {
			copy.is_home_app = false;
		}
		if !(requested.launcher || requested.leanback_launcher) {
			copy.has_launcher_entry = false;
			copy.launcher_enabled = false;
			copy.resolved_intents.clear();
		}
		copy
	}
}
