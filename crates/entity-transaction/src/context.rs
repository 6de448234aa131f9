use std::fmt;
use std::sync::Arc;

/// A transaction handle produced by a strategy's `start_trx`.
///
/// The coordinator never looks inside the handle. Clones share it, so a
/// context can be handed to several scopes and still compare as the same
/// transaction.
pub struct TransactionContext<H> {
	handle: Arc<H>,
}

impl<H> TransactionContext<H> {
	pub(crate) fn new(handle: H) -> Self {
		Self {
			handle: Arc::new(handle),
		}
	}

	/// The strategy's handle.
	pub fn handle(&self) -> &H {
		&self.handle
	}

	/// Whether both contexts wrap the handle from the same `start_trx` call.
	pub fn same_transaction(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.handle, &other.handle)
	}
}

impl<H> Clone for TransactionContext<H> {
	fn clone(&self) -> Self {
		Self {
			handle: Arc::clone(&self.handle),
		}
	}
}

impl<H: fmt::Debug> fmt::Debug for TransactionContext<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransactionContext")
			.field("handle", &self.handle)
			.finish()
	}
}
