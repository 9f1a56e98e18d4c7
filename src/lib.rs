//! appstate
//!
//! In-process application registry and session cache: enumerates installed
//! applications through pluggable collaborator services, enriches each entry
//! in the background (icon, on-disk size, launcher presence, home-app
//! status), and serves filtered/sorted views of the shared cache to any
//! number of independent observer sessions.
//!
//! All mutable state is owned by a single dispatch task; background workers
//! only compute and report. See [`Registry`] for the entry point.

pub mod cache;
pub mod config;
mod dispatch;
pub mod enrichment;
pub mod entry;
pub mod error;
pub mod events;
pub mod providers;
pub mod rebuild;
pub mod registry;
pub mod session;

pub use config::{init_tracing, RegistryConfig};
pub use enrichment::RequestedData;
pub use entry::{AppEntry, AppId, IconHandle, StaticInfo, UserId, UNKNOWN_SIZE};
pub use error::{ProviderError, RegistryError, SessionError};
pub use events::{EventBus, RegistryEvent};
pub use providers::{
	HomeService, IconService, LaunchIntent, LauncherMatch, LauncherService, ModuleInfo,
	ModuleInfoService, PackageService, Providers, StorageStats, StorageStatsService,
};
pub use rebuild::{AppFilter, SortOrder};
pub use registry::Registry;
pub use session::{Callbacks, Session, SessionId, SessionState};
