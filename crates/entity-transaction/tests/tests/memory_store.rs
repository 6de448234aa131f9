use assert_matches::assert_matches;
use entity_transaction::memory::{MemoryError, Nesting, TrxState};
use entity_transaction::{Scope, TrxError};

use super::{Harness, user};

fn memory_error(err: &TrxError) -> Option<&MemoryError> {
	err.strategy_error()?.downcast_ref::<MemoryError>()
}

#[tokio::test]
async fn test_commit_publishes_rows() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let trx = h.et.transaction(&root)?.start().await?;
	h.db.insert(&trx, user("alice123"))?;
	h.db.insert(&trx, user("bob456"))?;
	assert_eq!(h.db.count(), 0);

	h.et.transaction(&trx)?.commit().await?;
	assert_eq!(h.db.count(), 2);
	Ok(())
}

#[tokio::test]
async fn test_rollback_discards_rows() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let trx = h.et.transaction(&root)?.start().await?;
	h.db.insert(&trx, user("alice123"))?;
	h.et.transaction(&trx)?.rollback().await?;

	assert_eq!(h.db.count(), 0);
	Ok(())
}

#[tokio::test]
async fn test_writes_without_trx_are_immediate() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	h.db.insert(&root, user("alice123"))?;
	h.db.insert(&root.derive(), user("bob456"))?;
	assert_eq!(h.db.count(), 2);
	assert_eq!(h.strategy.started(), 0);
	Ok(())
}

#[tokio::test]
async fn test_store_without_registered_strategy() -> anyhow::Result<()> {
	let h = Harness::unintegrated();
	let root = Scope::root();

	assert_matches!(h.et.transaction(&root), Err(TrxError::NotReady));
	h.db.insert(&root, user("alice123"))?;
	assert_eq!(h.db.count(), 1);
	assert_eq!(h.strategy.started(), 0);
	Ok(())
}

#[tokio::test]
async fn test_nested_rollback_then_outer_rollback() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let outer = h.et.transaction(&root)?.start().await?;
	h.db.insert(&outer, user("alice123"))?;
	let inner = h.et.transaction(&outer)?.start().await?;
	h.db.insert(&inner, user("bob456"))?;

	h.et.transaction(&inner)?.rollback().await?;
	h.et.transaction(&outer)?.rollback().await?;

	assert_eq!(h.db.count(), 0);
	Ok(())
}

#[tokio::test]
async fn test_nested_commit_then_outer_rollback() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let outer = h.et.transaction(&root)?.start().await?;
	h.db.insert(&outer, user("alice123"))?;
	let inner = h.et.transaction(&outer)?.start().await?;
	h.db.insert(&inner, user("bob456"))?;

	h.et.transaction(&inner)?.commit().await?;
	assert_eq!(h.db.count(), 0);
	h.et.transaction(&outer)?.rollback().await?;

	assert_eq!(h.db.count(), 0);
	Ok(())
}

#[tokio::test]
async fn test_nested_rollback_then_outer_commit() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let outer = h.et.transaction(&root)?.start().await?;
	h.db.insert(&outer, user("alice123"))?;
	let inner = h.et.transaction(&outer)?.start().await?;
	h.db.insert(&inner, user("bob456"))?;

	h.et.transaction(&inner)?.rollback().await?;
	h.et.transaction(&outer)?.commit().await?;

	assert_eq!(h.db.rows(), vec![user("alice123")]);
	Ok(())
}

#[tokio::test]
async fn test_trx_flows_into_derived_scopes() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let trx = h.et.transaction(&root)?.start().await?;
	let handler = trx.derive();
	let subhandler = handler.derive();
	h.db.insert(&trx, user("alice123"))?;
	h.db.insert(&handler, user("bob456"))?;
	h.db.insert(&subhandler, user("carol789"))?;
	assert_eq!(h.db.count(), 0);

	// Committing from a derived scope resolves the same transaction.
	h.et.transaction(&subhandler)?.commit().await?;
	assert_eq!(h.db.count(), 3);
	Ok(())
}

#[tokio::test]
async fn test_rollback_from_derived_scope() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let trx = h.et.transaction(&root)?.start().await?;
	let handler = trx.derive();
	h.db.insert(&trx, user("alice123"))?;
	h.db.insert(&handler, user("bob456"))?;
	h.db.insert(&handler.derive(), user("carol789"))?;

	h.et.transaction(&handler)?.rollback().await?;
	assert_eq!(h.db.count(), 0);
	Ok(())
}

#[tokio::test]
async fn test_subhandler_commit_then_handler_rollback() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let handler = h.et.transaction(&root)?.start().await?;
	h.db.insert(&handler, user("alice123"))?;

	let sub = h.et.transaction(&handler.derive())?.start().await?;
	h.db.insert(&sub, user("bob456"))?;
	h.et.transaction(&sub)?.commit().await?;

	h.et.transaction(&handler)?.rollback().await?;
	assert_eq!(h.db.count(), 0);
	Ok(())
}

#[tokio::test]
async fn test_subhandler_rollback_then_handler_commit() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let handler = h.et.transaction(&root)?.start().await?;
	h.db.insert(&handler, user("alice123"))?;

	let sub = h.et.transaction(&handler.derive())?.start().await?;
	h.db.insert(&sub, user("bob456"))?;
	h.et.transaction(&sub)?.rollback().await?;

	h.db.insert(&handler, user("carol789"))?;
	h.et.transaction(&handler)?.commit().await?;
	assert_eq!(h.db.rows(), vec![user("alice123"), user("carol789")]);
	Ok(())
}

#[tokio::test]
async fn test_outer_commit_covers_unfinished_nested() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let outer = h.et.transaction(&root)?.start().await?;
	let inner = h.et.transaction(&outer)?.start().await?;
	h.db.insert(&inner, user("alice123"))?;

	h.et.transaction(&outer)?.commit().await?;
	assert_eq!(h.db.count(), 1);
	assert_eq!(h.strategy.committed(), 1);

	let inner_trx = h.et.transaction(&inner)?.current().expect("inner trx");
	assert_eq!(inner_trx.handle().state(), TrxState::Active);
	// The savepoint died with its top-level transaction.
	assert_eq!(h.db.insert(&inner, user("bob456")), Err(MemoryError::TrxComplete));

	let err = h.et.transaction(&inner)?.commit().await.unwrap_err();
	assert_eq!(memory_error(&err), Some(&MemoryError::TrxComplete));
	let err = h.et.transaction(&inner)?.rollback().await.unwrap_err();
	assert_eq!(memory_error(&err), Some(&MemoryError::TrxComplete));

	assert_eq!(inner_trx.handle().state(), TrxState::Active);
	assert_eq!(h.db.count(), 1);
	assert_eq!((h.strategy.started(), h.strategy.committed(), h.strategy.rolled_back()), (2, 1, 0));
	Ok(())
}

#[tokio::test]
async fn test_nested_in_series_then_rollback() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let handler = h.et.transaction(&root)?.start().await?;
	let work = handler.derive();

	for name in ["alice123", "bob456", "carol789"] {
		let nested = h.et.transaction(&work)?.start().await?;
		h.db.insert(&nested, user(name))?;
		h.et.transaction(&nested)?.commit().await?;
	}
	assert_eq!(h.strategy.started(), 4);

	h.et.transaction(&handler)?.rollback().await?;
	assert_eq!(h.db.count(), 0);
	Ok(())
}

#[tokio::test]
async fn test_finished_scope_is_not_reused() -> anyhow::Result<()> {
	let h = Harness::new();
	let root = Scope::root();

	let trx = h.et.transaction(&root)?.start().await?;
	h.et.transaction(&trx)?.commit().await?;

	// The committed transaction is still the scope's context, so the
	// strategy is asked to nest inside it and the write is refused.
	let again = h.et.transaction(&trx)?.start().await?;
	let pending = again.parent().and_then(Scope::context).expect("pending trx");
	assert_eq!(pending.handle().state(), TrxState::Committed);
	assert_eq!(h.db.insert(&again, user("alice123")), Err(MemoryError::TrxComplete));

	// A second commit of the same transaction is a strategy error.
	let err = h.et.transaction(&trx)?.commit().await.unwrap_err();
	assert_eq!(memory_error(&err), Some(&MemoryError::TrxComplete));
	Ok(())
}

#[tokio::test]
async fn test_refusing_strategy_rejects_nesting() -> anyhow::Result<()> {
	let h = Harness::with_nesting(Nesting::Refuse);
	let root = Scope::root();

	let outer = h.et.transaction(&root)?.start().await?;
	let err = h.et.transaction(&outer.derive())?.start().await.unwrap_err();
	assert_matches!(err, TrxError::Strategy(_));
	assert_eq!(memory_error(&err), Some(&MemoryError::NestingRefused));

	// The outer transaction is unaffected.
	h.db.insert(&outer, user("alice123"))?;
	h.et.transaction(&outer)?.commit().await?;
	assert_eq!(h.db.count(), 1);
	assert_eq!(h.strategy.started(), 1);
	Ok(())
}

#[tokio::test]
async fn test_parallel_siblings_are_independent() -> anyhow::Result<()> {
	let h = Harness::new();
	let handler = Scope::root().derive();

	let (first, second) = tokio::join!(
		async { h.et.transaction(&handler)?.start().await },
		async { h.et.transaction(&handler)?.start().await },
	);
	let (first, second) = (first?, second?);
	assert!(first.context().is_some() && second.context().is_some());

	h.db.insert(&first, user("alice123"))?;
	h.db.insert(&second, user("bob456"))?;

	h.et.transaction(&second)?.rollback().await?;
	h.et.transaction(&first)?.commit().await?;

	assert_eq!(h.db.rows(), vec![user("alice123")]);
	assert_eq!((h.strategy.started(), h.strategy.committed(), h.strategy.rolled_back()), (2, 1, 1));
	Ok(())
}
