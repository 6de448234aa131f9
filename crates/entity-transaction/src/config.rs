use serde::{Deserialize, Serialize};

use crate::error::TrxResult;

/// What `commit` and `rollback` do on a scope that carries no transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingContext {
	/// Fail with `TrxError::NoActiveTransaction`.
	#[default]
	Reject,
	/// Return without calling the strategy.
	Ignore,
}

/// Coordinator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoordinatorConfig {
	/// Behaviour of commit/rollback without a transaction (default: reject)
	#[serde(default)]
	pub on_missing_context: MissingContext,
}

impl CoordinatorConfig {
	pub fn from_json(input: &str) -> TrxResult<Self> {
		Ok(serde_json::from_str(input)?)
	}

	pub fn from_yaml(input: &str) -> TrxResult<Self> {
		Ok(serde_yaml::from_str(input)?)
	}
}
