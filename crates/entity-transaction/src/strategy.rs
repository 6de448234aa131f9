use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::TransactionContext;
use crate::error::{TrxError, TrxResult};
use crate::scope::Scope;

/// Resource-specific transaction hooks.
///
/// The coordinator calls these and nothing else; what a "transaction" is,
/// and what nesting means, is entirely up to the implementor. Errors are
/// returned to the caller of the coordinator unchanged.
#[async_trait]
pub trait Strategy<H>: Send + Sync {
	/// Open a transaction on behalf of `scope`.
	///
	/// `pending` is the transaction `scope` already carries, if any. It is
	/// passed so the implementor can open a nested transaction, emulate one
	/// with a savepoint, reuse the outer handle, or refuse.
	async fn start_trx(
		&self,
		scope: &Scope<H>,
		pending: Option<&TransactionContext<H>>,
	) -> anyhow::Result<H>;

	async fn commit_trx(&self, scope: &Scope<H>, trx: &TransactionContext<H>) -> anyhow::Result<()>;

	async fn rollback_trx(
		&self,
		scope: &Scope<H>,
		trx: &TransactionContext<H>,
	) -> anyhow::Result<()>;
}

type StartHook<H> = Box<
	dyn Fn(Scope<H>, Option<TransactionContext<H>>) -> BoxFuture<'static, anyhow::Result<H>>
		+ Send
		+ Sync,
>;

type FinishHook<H> =
	Box<dyn Fn(Scope<H>, TransactionContext<H>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Builder for a strategy assembled from closures.
///
/// Any hook may be left out while building; `build` (and
/// `Registry::register_hooks`) rejects an incomplete set.
pub struct StrategyHooks<H> {
	start_trx: Option<StartHook<H>>,
	commit_trx: Option<FinishHook<H>>,
	rollback_trx: Option<FinishHook<H>>,
}

impl<H> Default for StrategyHooks<H> {
	fn default() -> Self {
		Self {
			start_trx: None,
			commit_trx: None,
			rollback_trx: None,
		}
	}
}

impl<H: Send + Sync + 'static> StrategyHooks<H> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn start_trx<F, Fut>(mut self, hook: F) -> Self
	where
		F: Fn(Scope<H>, Option<TransactionContext<H>>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<H>> + Send + 'static,
	{
		self.start_trx = Some(Box::new(
			move |scope: Scope<H>, pending: Option<TransactionContext<H>>| hook(scope, pending).boxed(),
		));
		self
	}

	pub fn commit_trx<F, Fut>(mut self, hook: F) -> Self
	where
		F: Fn(Scope<H>, TransactionContext<H>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		self.commit_trx = Some(Box::new(
			move |scope: Scope<H>, trx: TransactionContext<H>| hook(scope, trx).boxed(),
		));
		self
	}

	pub fn rollback_trx<F, Fut>(mut self, hook: F) -> Self
	where
		F: Fn(Scope<H>, TransactionContext<H>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		self.rollback_trx = Some(Box::new(
			move |scope: Scope<H>, trx: TransactionContext<H>| hook(scope, trx).boxed(),
		));
		self
	}

	/// Check that every hook is present.
	pub fn build(self) -> TrxResult<HookStrategy<H>> {
		let start_trx = self
			.start_trx
			.ok_or_else(|| TrxError::missing_hook("start_trx"))?;
		let commit_trx = self
			.commit_trx
			.ok_or_else(|| TrxError::missing_hook("commit_trx"))?;
		let rollback_trx = self
			.rollback_trx
			.ok_or_else(|| TrxError::missing_hook("rollback_trx"))?;

		Ok(HookStrategy {
			start_trx,
			commit_trx,
			rollback_trx,
		})
	}
}

impl<H> fmt::Debug for StrategyHooks<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StrategyHooks")
			.field("start_trx", &self.start_trx.is_some())
			.field("commit_trx", &self.commit_trx.is_some())
			.field("rollback_trx", &self.rollback_trx.is_some())
			.finish()
	}
}

/// A complete strategy built from `StrategyHooks`.
pub struct HookStrategy<H> {
	start_trx: StartHook<H>,
	commit_trx: FinishHook<H>,
	rollback_trx: FinishHook<H>,
}

#[async_trait]
impl<H: Send + Sync + 'static> Strategy<H> for HookStrategy<H> {
	async fn start_trx(
		&self,
		scope: &Scope<H>,
		pending: Option<&TransactionContext<H>>,
	) -> anyhow::Result<H> {
		(self.start_trx)(scope.clone(), pending.cloned()).await
	}

	async fn commit_trx(&self, scope: &Scope<H>, trx: &TransactionContext<H>) -> anyhow::Result<()> {
		(self.commit_trx)(scope.clone(), trx.clone()).await
	}

	async fn rollback_trx(
		&self,
		scope: &Scope<H>,
		trx: &TransactionContext<H>,
	) -> anyhow::Result<()> {
		(self.rollback_trx)(scope.clone(), trx.clone()).await
	}
}

impl<H> fmt::Debug for HookStrategy<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HookStrategy").finish_non_exhaustive()
	}
}
