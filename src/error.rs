//! Error types, one enum per concern

use thiserror::Error;

/// Failures reported by external collaborator services
#[derive(Error, Debug)]
pub enum ProviderError {
	/// The collaborator is not reachable or refused the call
	#[error("service unavailable: {0}")]
	Unavailable(String),

	/// IO error
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// Generic error
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

/// Registry-level operation errors
#[derive(Error, Debug)]
pub enum RegistryError {
	/// Whole-cache enumeration failed; last-known contents are preserved
	#[error("package enumeration failed: {0}")]
	Enumeration(#[source] ProviderError),

	/// The dispatch context has shut down
	#[error("registry has shut down")]
	ShutDown,
}

/// Session contract violations
#[derive(Error, Debug)]
pub enum SessionError {
	/// Method called after `on_destroy`
	#[error("session already destroyed")]
	Destroyed,

	/// The owning registry's dispatch context is gone
	#[error("registry has shut down")]
	RegistryShutDown,
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
