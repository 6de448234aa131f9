// Transaction coordinator
//
// `EntityTransaction` is what a host installs once. It binds the registered
// strategy to a scope, producing a `TrxApi` that application code uses to
// start, commit and roll back transactions on that scope.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{CoordinatorConfig, MissingContext};
use crate::context::TransactionContext;
use crate::error::{TrxError, TrxResult};
use crate::registry::Registry;
use crate::scope::Scope;
use crate::strategy::Strategy;

/// Entry point bundling the strategy registry and coordinator config
pub struct EntityTransaction<H> {
	registry: Arc<Registry<H>>,
	config: CoordinatorConfig,
}

impl<H> Clone for EntityTransaction<H> {
	fn clone(&self) -> Self {
		Self {
			registry: Arc::clone(&self.registry),
			config: self.config.clone(),
		}
	}
}

impl<H: Send + Sync + 'static> Default for EntityTransaction<H> {
	fn default() -> Self {
		Self::new(Arc::new(Registry::new()))
	}
}

impl<H: Send + Sync + 'static> EntityTransaction<H> {
	pub fn new(registry: Arc<Registry<H>>) -> Self {
		Self {
			registry,
			config: CoordinatorConfig::default(),
		}
	}

	pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
		self.config = config;
		self
	}

	/// The registry strategies are registered with
	pub fn registry(&self) -> &Arc<Registry<H>> {
		&self.registry
	}

	pub fn config(&self) -> &CoordinatorConfig {
		&self.config
	}

	/// Bind the transaction API to `scope`.
	///
	/// Fails with `TrxError::NotReady` if no strategy has been registered.
	/// The strategy is captured here; registering another one later does not
	/// affect an API that is already bound.
	pub fn transaction(&self, scope: &Scope<H>) -> TrxResult<TrxApi<H>> {
		let strategy = self.registry.get().ok_or(TrxError::NotReady)?;
		Ok(TrxApi {
			scope: scope.clone(),
			strategy,
			on_missing_context: self.config.on_missing_context,
		})
	}

	/// The transaction `scope` carries, for use by store code.
	///
	/// Works whether or not a strategy is registered, so resource code can
	/// fall back to its non-transactional client when this returns `None`.
	pub fn try_get_trx(scope: &Scope<H>) -> Option<&TransactionContext<H>> {
		scope.context()
	}
}

impl<H: Send + Sync + 'static> fmt::Debug for EntityTransaction<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EntityTransaction")
			.field("registry", &self.registry)
			.field("config", &self.config)
			.finish()
	}
}

/// Transaction operations bound to one scope
pub struct TrxApi<H> {
	scope: Scope<H>,
	strategy: Arc<dyn Strategy<H>>,
	on_missing_context: MissingContext,
}

impl<H: Send + Sync + 'static> TrxApi<H> {
	pub fn scope(&self) -> &Scope<H> {
		&self.scope
	}

	/// Start a transaction and return the scope that owns it.
	///
	/// The strategy is always called, and receives the transaction this scope
	/// already carries as the pending one. The bound scope is left as is;
	/// transactional work continues on the returned scope.
	pub async fn start(&self) -> TrxResult<Scope<H>> {
		let pending = self.scope.context();

		debug!(
			target: "entity_transaction",
			scope_id = %self.scope.id(),
			nested = pending.is_some(),
			"starting transaction"
		);

		let handle = self.strategy.start_trx(&self.scope, pending).await?;
		let trx_scope = self.scope.derive_with(TransactionContext::new(handle));

		debug!(
			target: "entity_transaction",
			scope_id = %self.scope.id(),
			child_id = %trx_scope.id(),
			depth = trx_scope.depth(),
			"transaction started"
		);

		Ok(trx_scope)
	}

	/// Commit the transaction this scope carries.
	///
	/// The scope keeps its context afterwards; whether it may be used again
	/// is for the strategy to decide.
	pub async fn commit(&self) -> TrxResult<()> {
		let Some(trx) = self.active()? else {
			return Ok(());
		};

		debug!(target: "entity_transaction", scope_id = %self.scope.id(), "committing transaction");
		self.strategy.commit_trx(&self.scope, trx).await?;
		Ok(())
	}

	/// Roll back the transaction this scope carries.
	pub async fn rollback(&self) -> TrxResult<()> {
		let Some(trx) = self.active()? else {
			return Ok(());
		};

		debug!(target: "entity_transaction", scope_id = %self.scope.id(), "rolling back transaction");
		self.strategy.rollback_trx(&self.scope, trx).await?;
		Ok(())
	}

	/// The transaction this scope carries, if any.
	pub fn current(&self) -> Option<TransactionContext<H>> {
		self.scope.context().cloned()
	}

	fn active(&self) -> TrxResult<Option<&TransactionContext<H>>> {
		match (self.scope.context(), self.on_missing_context) {
			(Some(trx), _) => Ok(Some(trx)),
			(None, MissingContext::Reject) => Err(TrxError::NoActiveTransaction),
			(None, MissingContext::Ignore) => {
				debug!(
					target: "entity_transaction",
					scope_id = %self.scope.id(),
					"no transaction on scope, nothing to finish"
				);
				Ok(None)
			},
		}
	}
}

impl<H> fmt::Debug for TrxApi<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TrxApi")
			.field("scope", &self.scope)
			.field("on_missing_context", &self.on_missing_context)
			.finish_non_exhaustive()
	}
}
