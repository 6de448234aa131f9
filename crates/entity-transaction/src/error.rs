// Transaction coordinator error types

use thiserror::Error;

/// Errors surfaced by the registry and the transaction API
#[derive(Error, Debug)]
pub enum TrxError {
	/// The strategy handed to the registry is missing or incomplete.
	#[error("invalid transaction strategy: {message}")]
	Configuration { message: String },

	/// A transactional API was requested before any strategy was registered.
	#[error(
		"no transaction strategy registered; register one with Registry::register before \
		 using the transaction API"
	)]
	NotReady,

	/// Commit or rollback was called on a scope that carries no transaction.
	#[error("no active transaction on this scope")]
	NoActiveTransaction,

	/// Error raised by the strategy itself, passed through untouched.
	#[error(transparent)]
	Strategy(#[from] anyhow::Error),

	#[error("failed to parse coordinator config: {0}")]
	ConfigJson(#[from] serde_json::Error),

	#[error("failed to parse coordinator config: {0}")]
	ConfigYaml(#[from] serde_yaml::Error),
}

impl TrxError {
	pub fn configuration(message: impl Into<String>) -> Self {
		Self::Configuration {
			message: message.into(),
		}
	}

	pub(crate) fn missing_hook(name: &str) -> Self {
		Self::configuration(format!("strategy must implement the {name} function"))
	}

	/// Borrow the strategy's original error, if this is one.
	pub fn strategy_error(&self) -> Option<&anyhow::Error> {
		match self {
			Self::Strategy(e) => Some(e),
			_ => None,
		}
	}
}

/// Result type for transaction operations.
pub type TrxResult<T> = Result<T, TrxError>;
