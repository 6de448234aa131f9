//! In-memory row store with a transaction strategy, for testing.
//!
//! `MemoryStrategy` gives nested transactions savepoint semantics: a nested
//! transaction writes into its top-level transaction's buffer, rolling it
//! back truncates the buffer to where it started, and committing it only
//! releases the savepoint. Rows become visible in `MemoryDb` when the
//! top-level transaction commits.
//!
//! The top-level transaction is the master. Callbacks queued with
//! `MemoryTrx::after_master_commit` from any savepoint under it run once the
//! master commits, and are dropped if it rolls back.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::context::TransactionContext;
use crate::coordinator::EntityTransaction;
use crate::scope::Scope;
use crate::strategy::Strategy;

/// Errors raised by the memory store and its strategy
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemoryError {
	/// The transaction, or one it is nested in, was already committed or rolled back.
	#[error("transaction query already complete")]
	TrxComplete,

	/// Nesting was requested from a strategy configured to refuse it.
	#[error("there is a pending trx already; starting a new trx would cause an implicit commit")]
	NestingRefused,
}

/// How `MemoryStrategy` treats a start with a pending transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Nesting {
	/// Open a savepoint inside the pending transaction.
	#[default]
	Savepoint,
	/// Fail the start.
	Refuse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrxState {
	Active,
	Committed,
	RolledBack,
}

type MasterHook = Box<dyn FnOnce() + Send>;

/// Callbacks waiting on the master transaction, shared by every savepoint under it
#[derive(Default)]
struct MasterEvents {
	after_commit: Mutex<Vec<MasterHook>>,
	after_rollback: Mutex<Vec<MasterHook>>,
}

impl MasterEvents {
	fn fire(&self, committed: bool) {
		let (run, discard) = if committed {
			(&self.after_commit, &self.after_rollback)
		} else {
			(&self.after_rollback, &self.after_commit)
		};
		discard.lock().clear();
		let hooks = std::mem::take(&mut *run.lock());
		for hook in hooks {
			hook();
		}
	}
}

impl fmt::Debug for MasterEvents {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MasterEvents")
			.field("after_commit", &self.after_commit.lock().len())
			.field("after_rollback", &self.after_rollback.lock().len())
			.finish()
	}
}

/// Shared table of committed rows
#[derive(Debug, Default)]
pub struct MemoryDb {
	rows: Mutex<Vec<Value>>,
}

impl MemoryDb {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a row, inside the scope's transaction if it carries one.
	pub fn insert(&self, scope: &Scope<MemoryTrx>, row: Value) -> Result<(), MemoryError> {
		match EntityTransaction::try_get_trx(scope) {
			Some(trx) => trx.handle().write(row),
			None => {
				self.rows.lock().push(row);
				Ok(())
			},
		}
	}

	/// Number of committed rows.
	pub fn count(&self) -> usize {
		self.rows.lock().len()
	}

	pub fn rows(&self) -> Vec<Value> {
		self.rows.lock().clone()
	}

	fn publish(&self, rows: Vec<Value>) {
		self.rows.lock().extend(rows);
	}
}

/// Transaction handle produced by `MemoryStrategy`
#[derive(Debug)]
pub struct MemoryTrx {
	id: u64,
	parent: Option<TransactionContext<MemoryTrx>>,
	// Buffer of the top-level transaction, shared by every savepoint under it
	buffer: Arc<Mutex<Vec<Value>>>,
	events: Arc<MasterEvents>,
	mark: usize,
	state: Mutex<TrxState>,
}

impl MemoryTrx {
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn is_nested(&self) -> bool {
		self.parent.is_some()
	}

	/// Whether this is the top-level transaction.
	pub fn is_master(&self) -> bool {
		self.parent.is_none()
	}

	pub fn parent(&self) -> Option<&TransactionContext<MemoryTrx>> {
		self.parent.as_ref()
	}

	pub fn state(&self) -> TrxState {
		*self.state.lock()
	}

	/// Rows written so far by the top-level transaction and its savepoints.
	pub fn pending_rows(&self) -> usize {
		self.buffer.lock().len()
	}

	/// Run `hook` once the master transaction commits. It never runs if the
	/// master rolls back.
	pub fn after_master_commit(
		&self,
		hook: impl FnOnce() + Send + 'static,
	) -> Result<(), MemoryError> {
		self.queue(&self.events.after_commit, Box::new(hook))
	}

	/// Run `hook` once the master transaction rolls back.
	pub fn after_master_rollback(
		&self,
		hook: impl FnOnce() + Send + 'static,
	) -> Result<(), MemoryError> {
		self.queue(&self.events.after_rollback, Box::new(hook))
	}

	fn queue(&self, hooks: &Mutex<Vec<MasterHook>>, hook: MasterHook) -> Result<(), MemoryError> {
		if !self.is_usable() {
			return Err(MemoryError::TrxComplete);
		}
		hooks.lock().push(hook);
		Ok(())
	}

	fn parent_usable(&self) -> bool {
		self.parent.as_ref().is_none_or(|parent| parent.handle().is_usable())
	}

	fn is_usable(&self) -> bool {
		self.state() == TrxState::Active && self.parent_usable()
	}

	fn write(&self, row: Value) -> Result<(), MemoryError> {
		if !self.is_usable() {
			return Err(MemoryError::TrxComplete);
		}
		self.buffer.lock().push(row);
		Ok(())
	}

	fn finish(&self, next: TrxState) -> Result<(), MemoryError> {
		// A savepoint ends with its master.
		if !self.parent_usable() {
			return Err(MemoryError::TrxComplete);
		}
		let mut state = self.state.lock();
		if *state != TrxState::Active {
			return Err(MemoryError::TrxComplete);
		}
		*state = next;
		Ok(())
	}
}

/// Strategy backed by a `MemoryDb`, counting every hook invocation
#[derive(Debug)]
pub struct MemoryStrategy {
	db: Arc<MemoryDb>,
	nesting: Nesting,
	next_id: AtomicU64,
	started: AtomicUsize,
	committed: AtomicUsize,
	rolled_back: AtomicUsize,
}

impl MemoryStrategy {
	pub fn new(db: Arc<MemoryDb>) -> Self {
		Self {
			db,
			nesting: Nesting::default(),
			next_id: AtomicU64::new(1),
			started: AtomicUsize::new(0),
			committed: AtomicUsize::new(0),
			rolled_back: AtomicUsize::new(0),
		}
	}

	pub fn with_nesting(mut self, nesting: Nesting) -> Self {
		self.nesting = nesting;
		self
	}

	pub fn started(&self) -> usize {
		self.started.load(Ordering::SeqCst)
	}

	pub fn committed(&self) -> usize {
		self.committed.load(Ordering::SeqCst)
	}

	pub fn rolled_back(&self) -> usize {
		self.rolled_back.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Strategy<MemoryTrx> for MemoryStrategy {
	async fn start_trx(
		&self,
		_scope: &Scope<MemoryTrx>,
		pending: Option<&TransactionContext<MemoryTrx>>,
	) -> anyhow::Result<MemoryTrx> {
		let (buffer, events, mark) = match pending {
			Some(_) if self.nesting == Nesting::Refuse => {
				return Err(MemoryError::NestingRefused.into());
			},
			Some(outer) => {
				let outer = outer.handle();
				let mark = outer.buffer.lock().len();
				(Arc::clone(&outer.buffer), Arc::clone(&outer.events), mark)
			},
			None => (Arc::default(), Arc::default(), 0),
		};

		self.started.fetch_add(1, Ordering::SeqCst);
		Ok(MemoryTrx {
			id: self.next_id.fetch_add(1, Ordering::SeqCst),
			parent: pending.cloned(),
			buffer,
			events,
			mark,
			state: Mutex::new(TrxState::Active),
		})
	}

	async fn commit_trx(
		&self,
		_scope: &Scope<MemoryTrx>,
		trx: &TransactionContext<MemoryTrx>,
	) -> anyhow::Result<()> {
		let trx = trx.handle();
		trx.finish(TrxState::Committed)?;
		self.committed.fetch_add(1, Ordering::SeqCst);
		if trx.is_master() {
			let rows = std::mem::take(&mut *trx.buffer.lock());
			self.db.publish(rows);
			trx.events.fire(true);
		}
		Ok(())
	}

	async fn rollback_trx(
		&self,
		_scope: &Scope<MemoryTrx>,
		trx: &TransactionContext<MemoryTrx>,
	) -> anyhow::Result<()> {
		let trx = trx.handle();
		trx.finish(TrxState::RolledBack)?;
		trx.buffer.lock().truncate(trx.mark);
		self.rolled_back.fetch_add(1, Ordering::SeqCst);
		if trx.is_master() {
			trx.events.fire(false);
		}
		Ok(())
	}
}
