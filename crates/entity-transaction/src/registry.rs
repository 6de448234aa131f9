// Strategy registry
//
// Holds the single active strategy. Registration replaces whatever was there
// before; readers take a snapshot and keep using it even if the slot changes.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::error::{TrxError, TrxResult};
use crate::strategy::{Strategy, StrategyHooks};

/// Single-slot store for the active transaction strategy
pub struct Registry<H> {
	current: ArcSwap<Option<Arc<dyn Strategy<H>>>>,
}

impl<H: Send + Sync + 'static> Default for Registry<H> {
	fn default() -> Self {
		Self::new()
	}
}

impl<H: Send + Sync + 'static> Registry<H> {
	/// Create an empty registry
	pub fn new() -> Self {
		Self {
			current: ArcSwap::from_pointee(None),
		}
	}

	/// Register a strategy, replacing any previous one.
	///
	/// Fails with `TrxError::Configuration` when no strategy is given.
	pub fn register(&self, strategy: Option<Arc<dyn Strategy<H>>>) -> TrxResult<()> {
		let Some(strategy) = strategy else {
			return Err(TrxError::configuration("strategy must be provided"));
		};

		let previous = self.current.swap(Arc::new(Some(strategy)));
		info!(
			target: "entity_transaction",
			replaced = previous.is_some(),
			"transaction strategy registered"
		);
		Ok(())
	}

	/// Validate a set of hooks and register the resulting strategy.
	///
	/// Nothing is registered if a hook is missing.
	pub fn register_hooks(&self, hooks: StrategyHooks<H>) -> TrxResult<()> {
		let strategy: Arc<dyn Strategy<H>> = Arc::new(hooks.build()?);
		self.register(Some(strategy))
	}

	/// Get the registered strategy, if any
	pub fn get(&self) -> Option<Arc<dyn Strategy<H>>> {
		let guard = self.current.load();
		guard.as_ref().as_ref().map(Arc::clone)
	}

	pub fn is_registered(&self) -> bool {
		self.current.load().is_some()
	}

	/// Remove the registered strategy
	pub fn clear(&self) {
		self.current.store(Arc::new(None));
		info!(target: "entity_transaction", "transaction strategy cleared");
	}
}

impl<H: Send + Sync + 'static> fmt::Debug for Registry<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("registered", &self.is_registered())
			.finish()
	}
}
