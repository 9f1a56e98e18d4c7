//! Background enrichment pipeline.
//!
//! Workers are spawned tasks that call exactly one external collaborator and
//! post one message back to the dispatch context. They never touch shared
//! state; failed calls leave the target field at its sentinel and are not
//! retried (a later rebuild re-requests).

use crate::dispatch::DispatchMsg;
use crate::entry::{AppId, IconHandle, StaticInfo, UserId};
use crate::error::{ProviderError, RegistryError};
use crate::providers::{LaunchIntent, Providers};
use strum::Display;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Enrichment categories, also the dedup dimension for in-flight work
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichKind {
	Icon,
	Size,
	Launcher,
	Home,
	Enumerate,
}

/// Dedup key: duplicate in-flight requests for the same key collapse into one
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingKey {
	pub kind: EnrichKind,
	/// None for global work (home status, enumeration)
	pub id: Option<AppId>,
}

impl PendingKey {
	pub fn entry(kind: EnrichKind, id: AppId) -> Self {
		Self { kind, id: Some(id) }
	}

	pub fn global(kind: EnrichKind) -> Self {
		Self { kind, id: None }
	}
}

/// Successful enrichment payload carried back to the dispatch context
#[derive(Debug)]
pub enum EnrichValue {
	Icon {
		id: AppId,
		created_seq: u64,
		icon: IconHandle,
	},
	Size {
		id: AppId,
		created_seq: u64,
		size_bytes: i64,
	},
	Launcher {
		id: AppId,
		created_seq: u64,
		/// Surfaces this result answers; failed surfaces are left out and
		/// stay missing
		intents: Vec<LaunchIntent>,
		has_entry: bool,
		enabled: bool,
	},
	Home {
		home_package: Option<String>,
	},
	Loaded {
		apps: Vec<StaticInfo>,
	},
}

/// The set of enrichment data a session asked for. A typed set instead of a
/// raw bitmask, so "what this session requested" is self-documenting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestedData {
	pub icons: bool,
	pub sizes: bool,
	pub home_app: bool,
	pub launcher: bool,
	pub leanback_launcher: bool,
}

impl RequestedData {
	pub fn none() -> Self {
		Self::default()
	}

	pub fn all() -> Self {
		Self {
			icons: true,
			sizes: true,
			home_app: true,
			launcher: true,
			leanback_launcher: true,
		}
	}

	pub fn icons() -> Self {
		Self {
			icons: true,
			..Self::default()
		}
	}

	pub fn sizes() -> Self {
		Self {
			sizes: true,
			..Self::default()
		}
	}

	pub fn home_app() -> Self {
		Self {
			home_app: true,
			..Self::default()
		}
	}

	pub fn launcher() -> Self {
		Self {
			launcher: true,
			..Self::default()
		}
	}

	pub fn leanback_launcher() -> Self {
		Self {
			leanback_launcher: true,
			..Self::default()
		}
	}

	pub fn wants_launcher(&self) -> bool {
		self.launcher || self.leanback_launcher
	}

	/// Launch surfaces to query for this flag set
	pub fn launch_intents(&self) -> Vec<LaunchIntent> {
		let mut intents = Vec::new();
		if self.launcher {
			intents.push(LaunchIntent::Launcher);
		}
		if self.leanback_launcher {
			intents.push(LaunchIntent::LeanbackLauncher);
		}
		intents
	}
}

fn post(tx: &mpsc::UnboundedSender<DispatchMsg>, key: PendingKey, value: Option<EnrichValue>) {
	// The dispatch loop may already be gone during shutdown
	let _ = tx.send(DispatchMsg::Enriched {
		key,
		value,
		reply: None,
	});
}

pub(crate) fn spawn_icon(
	providers: Providers,
	tx: mpsc::UnboundedSender<DispatchMsg>,
	info: StaticInfo,
	created_seq: u64,
) {
	let id = info.id();
	tokio::spawn(async move {
		let key = PendingKey::entry(EnrichKind::Icon, id.clone());
		match providers.icons.render_icon(&info).await {
			Ok(icon) => post(
				&tx,
				key,
				Some(EnrichValue::Icon {
					id,
					created_seq,
					icon,
				}),
			),
			Err(error) => {
				debug!(entry = %id, kind = %EnrichKind::Icon, %error, "enrichment failed");
				post(&tx, key, None);
			}
		}
	});
}

pub(crate) fn spawn_size(
	providers: Providers,
	tx: mpsc::UnboundedSender<DispatchMsg>,
	info: StaticInfo,
	created_seq: u64,
) {
	let id = info.id();
	tokio::spawn(async move {
		let key = PendingKey::entry(EnrichKind::Size, id.clone());
		match providers
			.storage
			.query_stats(info.storage_uuid, &info.package_name, info.user)
			.await
		{
			Ok(stats) => post(
				&tx,
				key,
				Some(EnrichValue::Size {
					id,
					created_seq,
					size_bytes: stats.total_bytes(),
				}),
			),
			Err(error) => {
				debug!(entry = %id, kind = %EnrichKind::Size, %error, "enrichment failed");
				post(&tx, key, None);
			}
		}
	});
}

pub(crate) fn spawn_launcher(
	providers: Providers,
	tx: mpsc::UnboundedSender<DispatchMsg>,
	id: AppId,
	created_seq: u64,
	intents: Vec<LaunchIntent>,
) {
	tokio::spawn(async move {
		let key = PendingKey::entry(EnrichKind::Launcher, id.clone());
		let mut answered = Vec::new();
		let mut has_entry = false;
		let mut enabled = false;

		for intent in intents {
			match providers.launcher.resolve_launchers(intent, id.user).await {
				Ok(matches) => {
					for found in matches {
						if found.package_name == id.package_name {
							has_entry = true;
							enabled = enabled || found.enabled;
						}
					}
					answered.push(intent);
				}
				Err(error) => {
					debug!(entry = %id, kind = %EnrichKind::Launcher, ?intent, %error, "enrichment failed");
				}
			}
		}

		if answered.is_empty() {
			post(&tx, key, None);
		} else {
			post(
				&tx,
				key,
				Some(EnrichValue::Launcher {
					id,
					created_seq,
					intents: answered,
					has_entry,
					enabled,
				}),
			);
		}
	});
}

pub(crate) fn spawn_home(providers: Providers, tx: mpsc::UnboundedSender<DispatchMsg>) {
	tokio::spawn(async move {
		let key = PendingKey::global(EnrichKind::Home);
		match providers.home.home_activity().await {
			Ok(home_package) => post(&tx, key, Some(EnrichValue::Home { home_package })),
			Err(error) => {
				debug!(kind = %EnrichKind::Home, %error, "enrichment failed");
				post(&tx, key, None);
			}
		}
	});
}

/// Enumerate installed entities across `users`, excluding hidden system
/// modules at the source boundary. On failure the optional `reply` channel
/// gets the error and the cache is left untouched.
pub(crate) fn spawn_enumerate(
	providers: Providers,
	tx: mpsc::UnboundedSender<DispatchMsg>,
	users: Vec<UserId>,
	reply: Option<oneshot::Sender<crate::error::Result<()>>>,
) {
	tokio::spawn(async move {
		let key = PendingKey::global(EnrichKind::Enumerate);
		match enumerate(&providers, &users).await {
			Ok(apps) => {
				let _ = tx.send(DispatchMsg::Enriched {
					key,
					value: Some(EnrichValue::Loaded { apps }),
					reply,
				});
			}
			Err(error) => {
				debug!(kind = %EnrichKind::Enumerate, %error, "enrichment failed");
				if let Some(reply) = reply {
					let _ = reply.send(Err(RegistryError::Enumeration(error)));
				}
				let _ = tx.send(DispatchMsg::Enriched {
					key,
					value: None,
					reply: None,
				});
			}
		}
	});
}

async fn enumerate(
	providers: &Providers,
	users: &[UserId],
) -> Result<Vec<StaticInfo>, ProviderError> {
	let hidden: std::collections::HashSet<String> = providers
		.modules
		.list_modules()
		.await?
		.into_iter()
		.filter(|module| module.hidden)
		.map(|module| module.package_name)
		.collect();

	let mut apps = Vec::new();
	for &user in users {
		for info in providers.packages.list_installed(user).await? {
			if hidden.contains(&info.package_name) {
				continue;
			}
			apps.push(info);
		}
	}
	Ok(apps)
}
