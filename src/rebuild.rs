//! Rebuild engine: filter predicates, total sort orders and missing-data
//! detection used when producing a session snapshot from the cache.

use crate::enrichment::RequestedData;
use crate::entry::{AppEntry, UNKNOWN_SIZE};
use std::cmp::Ordering;

/// Predicate selecting which entries are visible in a rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppFilter {
	/// Every cached entry
	Everything,
	/// Entries with a resolved, present launcher entry
	WithLauncherEntry,
	/// The entry owning the current home activity
	HomeApp,
	/// All sub-filters must match
	And(Vec<AppFilter>),
	/// At least one sub-filter must match
	Or(Vec<AppFilter>),
}

impl AppFilter {
	pub fn matches(&self, entry: &AppEntry) -> bool {
		match self {
			AppFilter::Everything => true,
			AppFilter::WithLauncherEntry => entry.has_launcher_entry,
			AppFilter::HomeApp => entry.is_home_app,
			AppFilter::And(filters) => filters.iter().all(|filter| filter.matches(entry)),
			AppFilter::Or(filters) => filters.iter().any(|filter| filter.matches(entry)),
		}
	}
}

/// Total order used to sort a rebuild's output. Every order falls back to the
/// entry identity as the final tiebreak, so equal primary keys still produce
/// deterministic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
	/// Largest on-disk size first; unknown sizes sort last
	SizeDescending,
	/// Case-insensitive label, A to Z
	LabelAscending,
}

impl SortOrder {
	pub fn compare(&self, a: &AppEntry, b: &AppEntry) -> Ordering {
		let primary = match self {
			SortOrder::SizeDescending => b
				.size_bytes
				.cmp(&a.size_bytes)
				.then_with(|| compare_labels(a, b)),
			SortOrder::LabelAscending => compare_labels(a, b),
		};
		primary.then_with(|| a.id.cmp(&b.id))
	}
}

fn compare_labels(a: &AppEntry, b: &AppEntry) -> Ordering {
	let left = a.label.as_deref().unwrap_or(&a.id.package_name);
	let right = b.label.as_deref().unwrap_or(&b.id.package_name);
	left.to_lowercase().cmp(&right.to_lowercase())
}

/// Filter + sort a cache snapshot. Pure; enrichment scheduling happens in the
/// dispatch context around this.
pub fn build_visible(
	snapshot: Vec<AppEntry>,
	filter: &AppFilter,
	order: SortOrder,
) -> Vec<AppEntry> {
	let mut visible: Vec<AppEntry> = snapshot
		.into_iter()
		.filter(|entry| filter.matches(entry))
		.collect();
	visible.sort_by(|a, b| order.compare(a, b));
	visible
}

/// Per-entry enrichment still outstanding for a given flag set
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MissingData {
	pub icon: bool,
	pub size: bool,
	pub launcher: bool,
}

impl MissingData {
	pub fn of(entry: &AppEntry, requested: &RequestedData) -> Self {
		Self {
			icon: requested.icons && entry.icon.is_none(),
			size: requested.sizes && entry.size_bytes == UNKNOWN_SIZE,
			// Every requested surface must have been answered for this entry
			launcher: requested
				.launch_intents()
				.iter()
				.any(|intent| !entry.resolved_intents.contains(intent)),
		}
	}

	pub fn any(&self) -> bool {
		self.icon || self.size || self.launcher
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entry::StaticInfo;
	use crate::providers::LaunchIntent;
	use pretty_assertions::assert_eq;
	use std::path::PathBuf;
	use uuid::Uuid;

	fn entry(package: &str, size: i64, label: &str) -> AppEntry {
		let info = StaticInfo {
			package_name: package.to_string(),
			user: 0,
			installed: true,
			source_dir: PathBuf::from("/data/app"),
			storage_uuid: Uuid::new_v4(),
			label: Some(label.to_string()),
		};
		let mut entry = AppEntry::new(info, 0);
		entry.ensure_label();
		entry.set_size(size);
		entry
	}

	fn packages(entries: &[AppEntry]) -> Vec<&str> {
		entries
			.iter()
			.map(|entry| entry.id.package_name.as_str())
			.collect()
	}

	#[test]
	fn everything_filter_keeps_all() {
		let entries = vec![entry("a", 1, "A"), entry("b", 2, "B")];
		let out = build_visible(entries, &AppFilter::Everything, SortOrder::LabelAscending);
		assert_eq!(out.len(), 2);
	}

	#[test]
	fn launcher_filter_excludes_non_launchable() {
		let mut launchable = entry("launchable", 1, "L");
		launchable.set_launcher(&[LaunchIntent::Launcher], true, true);
		let plain = entry("plain", 1, "P");

		let out = build_visible(
			vec![plain, launchable],
			&AppFilter::WithLauncherEntry,
			SortOrder::LabelAscending,
		);
		assert_eq!(packages(&out), vec!["launchable"]);
	}

	#[test]
	fn composed_filters_apply_logical_ops() {
		let mut home = entry("home", 1, "H");
		home.set_home_app(true);
		let mut launchable = entry("launchable", 1, "L");
		launchable.set_launcher(&[LaunchIntent::Launcher], true, true);
		let plain = entry("plain", 1, "P");

		let either = AppFilter::Or(vec![AppFilter::HomeApp, AppFilter::WithLauncherEntry]);
		let out = build_visible(
			vec![home.clone(), launchable.clone(), plain.clone()],
			&either,
			SortOrder::LabelAscending,
		);
		assert_eq!(packages(&out), vec!["home", "launchable"]);

		let both = AppFilter::And(vec![AppFilter::HomeApp, AppFilter::WithLauncherEntry]);
		let out = build_visible(vec![home, launchable, plain], &both, SortOrder::LabelAscending);
		assert!(out.is_empty());
	}

	#[test]
	fn size_descending_breaks_ties_by_label_then_id() {
		let out = build_visible(
			vec![
				entry("c", 10, "zeta"),
				entry("a", 20, "alpha"),
				entry("b", 10, "zeta"),
			],
			&AppFilter::Everything,
			SortOrder::SizeDescending,
		);
		assert_eq!(packages(&out), vec!["a", "b", "c"]);
	}

	#[test]
	fn label_sort_is_case_insensitive() {
		let out = build_visible(
			vec![entry("b", 0, "beta"), entry("a", 0, "Alpha")],
			&AppFilter::Everything,
			SortOrder::LabelAscending,
		);
		assert_eq!(packages(&out), vec!["a", "b"]);
	}

	#[test]
	fn sort_is_deterministic_across_runs() {
		let entries = vec![
			entry("b", 5, "same"),
			entry("a", 5, "same"),
			entry("c", 5, "same"),
		];
		let first = build_visible(
			entries.clone(),
			&AppFilter::Everything,
			SortOrder::SizeDescending,
		);
		let second = build_visible(entries, &AppFilter::Everything, SortOrder::SizeDescending);
		assert_eq!(packages(&first), packages(&second));
		assert_eq!(packages(&first), vec!["a", "b", "c"]);
	}

	#[test]
	fn missing_data_follows_requested_flags() {
		let fresh = entry("a", UNKNOWN_SIZE, "A");
		let missing = MissingData::of(&fresh, &RequestedData::all());
		assert!(missing.icon && missing.size && missing.launcher);

		let missing = MissingData::of(&fresh, &RequestedData::icons());
		assert!(missing.icon && !missing.size && !missing.launcher);

		let mut resolved = entry("a", 60, "A");
		resolved.set_launcher(
			&[LaunchIntent::Launcher, LaunchIntent::LeanbackLauncher],
			false,
			false,
		);
		resolved.set_icon(crate::entry::IconHandle::new(vec![0]));
		let missing = MissingData::of(&resolved, &RequestedData::all());
		assert!(!missing.any());
	}

	#[test]
	fn unresolved_surface_counts_as_missing() {
		let mut partial = entry("a", 60, "A");
		partial.set_launcher(&[LaunchIntent::Launcher], false, false);

		let missing = MissingData::of(&partial, &RequestedData::launcher());
		assert!(!missing.launcher);

		let missing = MissingData::of(&partial, &RequestedData::leanback_launcher());
		assert!(missing.launcher);
	}
}
