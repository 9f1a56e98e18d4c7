//! Entry cache: identity -> AppEntry, single-writer.
//!
//! Owned exclusively by the dispatch context; there is deliberately no
//! interior locking here. Readers get copies via [`EntryCache::snapshot_all`].

use crate::entry::{AppEntry, AppId, StaticInfo};
use std::collections::HashMap;
use tracing::debug;

/// What a reconciliation pass did to the cache
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
	pub added: Vec<AppId>,
	pub removed: Vec<AppId>,
	pub updated: Vec<AppId>,
}

impl ReconcileOutcome {
	pub fn changed(&self) -> bool {
		!(self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty())
	}
}

/// In-memory map of all visible entries, kept in insertion order
#[derive(Default)]
pub struct EntryCache {
	entries: HashMap<AppId, AppEntry>,
	/// Insertion order, for deterministic pre-sort snapshots
	order: Vec<AppId>,
	/// Monotonic stamp handed to new entries as their incarnation marker
	next_created_seq: u64,
}

impl EntryCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn get(&self, id: &AppId) -> Option<&AppEntry> {
		self.entries.get(id)
	}

	pub fn get_mut(&mut self, id: &AppId) -> Option<&mut AppEntry> {
		self.entries.get_mut(id)
	}

	/// Create the entry for `info` if absent; returns (entry, created)
	pub fn upsert(&mut self, info: StaticInfo) -> (&mut AppEntry, bool) {
		use std::collections::hash_map::Entry;

		let id = info.id();
		match self.entries.entry(id.clone()) {
			Entry::Occupied(occupied) => (occupied.into_mut(), false),
			Entry::Vacant(vacant) => {
				let seq = self.next_created_seq;
				self.next_created_seq += 1;
				self.order.push(id.clone());
				debug!(entry = %id, "cache entry created");
				(vacant.insert(AppEntry::new(info, seq)), true)
			}
		}
	}

	pub fn remove(&mut self, id: &AppId) -> Option<AppEntry> {
		let removed = self.entries.remove(id);
		if removed.is_some() {
			self.order.retain(|known| known != id);
			debug!(entry = %id, "cache entry removed");
		}
		removed
	}

	pub fn clear(&mut self) {
		self.entries.clear();
		self.order.clear();
	}

	/// Copies of every entry, in insertion order
	pub fn snapshot_all(&self) -> Vec<AppEntry> {
		self.order
			.iter()
			.filter_map(|id| self.entries.get(id))
			.cloned()
			.collect()
	}

	/// Mutable passes over every entry, in insertion order
	pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut AppEntry)) {
		for id in &self.order {
			if let Some(entry) = self.entries.get_mut(id) {
				f(entry);
			}
		}
	}

	/// Reconcile the cache against a freshly enumerated visible set: create
	/// entries for new packages, drop entries no longer listed, refresh the
	/// mounted flag on survivors.
	pub fn reconcile(&mut self, listed: &[StaticInfo]) -> ReconcileOutcome {
		let mut outcome = ReconcileOutcome::default();
		let mut seen = std::collections::HashSet::new();

		for info in listed {
			let id = info.id();
			seen.insert(id.clone());
			match self.entries.get_mut(&id) {
				Some(existing) => {
					if existing.set_mounted(!info.source_dir.as_os_str().is_empty()) {
						outcome.updated.push(id);
					}
				}
				None => {
					self.upsert(info.clone());
					outcome.added.push(id);
				}
			}
		}

		let gone: Vec<AppId> = self
			.order
			.iter()
			.filter(|id| !seen.contains(*id))
			.cloned()
			.collect();
		for id in gone {
			self.remove(&id);
			outcome.removed.push(id);
		}

		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;
	use uuid::Uuid;

	fn info(package: &str) -> StaticInfo {
		StaticInfo {
			package_name: package.to_string(),
			user: 0,
			installed: true,
			source_dir: PathBuf::from("/data/app"),
			storage_uuid: Uuid::new_v4(),
			label: None,
		}
	}

	#[test]
	fn upsert_is_create_or_get() {
		let mut cache = EntryCache::new();
		let (_, created) = cache.upsert(info("a.pkg"));
		assert!(created);
		let (_, created) = cache.upsert(info("a.pkg"));
		assert!(!created);
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn snapshot_preserves_insertion_order() {
		let mut cache = EntryCache::new();
		cache.upsert(info("c.pkg"));
		cache.upsert(info("a.pkg"));
		cache.upsert(info("b.pkg"));

		let names: Vec<_> = cache
			.snapshot_all()
			.into_iter()
			.map(|entry| entry.id.package_name)
			.collect();
		assert_eq!(names, vec!["c.pkg", "a.pkg", "b.pkg"]);
	}

	#[test]
	fn reconcile_adds_and_removes() {
		let mut cache = EntryCache::new();
		cache.upsert(info("old.pkg"));
		cache.upsert(info("kept.pkg"));

		let outcome = cache.reconcile(&[info("kept.pkg"), info("new.pkg")]);
		assert_eq!(outcome.added, vec![AppId::new("new.pkg", 0)]);
		assert_eq!(outcome.removed, vec![AppId::new("old.pkg", 0)]);
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn recreated_entry_gets_new_incarnation() {
		let mut cache = EntryCache::new();
		let (entry, _) = cache.upsert(info("a.pkg"));
		let first = entry.created_seq;
		let id = entry.id.clone();

		cache.remove(&id);
		let (entry, _) = cache.upsert(info("a.pkg"));
		assert!(entry.created_seq > first);
	}
}
