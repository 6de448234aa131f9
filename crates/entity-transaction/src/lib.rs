//! Transaction lifecycle coordination across derived execution scopes.
//!
//! A host creates a root [`Scope`] and derives child scopes as it hands work
//! to nested units. [`TrxApi::start`] asks the registered [`Strategy`] for a
//! transaction and returns a new scope owning it; code running in that scope,
//! or in any scope derived from it, shares that transaction and can start
//! nested ones. What nesting means is left to the strategy, which receives
//! the pending transaction on every start.
//!
//! ```no_run
//! # use entity_transaction::{EntityTransaction, Scope, StrategyHooks};
//! # async fn demo() -> Result<(), entity_transaction::TrxError> {
//! let et = EntityTransaction::<String>::default();
//! et.registry().register_hooks(
//! 	StrategyHooks::new()
//! 		.start_trx(|_, _| async { Ok("BEGIN".to_string()) })
//! 		.commit_trx(|_, _| async { Ok(()) })
//! 		.rollback_trx(|_, _| async { Ok(()) }),
//! )?;
//!
//! let root = Scope::root();
//! let trx = et.transaction(&root)?.start().await?;
//! // ... work with `trx` ...
//! et.transaction(&trx)?.commit().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod coordinator;
mod error;
mod registry;
mod scope;
mod strategy;

pub use config::{CoordinatorConfig, MissingContext};
pub use context::TransactionContext;
pub use coordinator::{EntityTransaction, TrxApi};
pub use error::{TrxError, TrxResult};
pub use registry::Registry;
pub use scope::{Ancestors, Scope, ScopeId};
pub use strategy::{HookStrategy, Strategy, StrategyHooks};

#[cfg(any(test, feature = "testing"))]
pub mod memory;
