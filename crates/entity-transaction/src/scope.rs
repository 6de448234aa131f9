// Execution scope tree
//
// Scopes are immutable nodes linked to their parent. A scope created by
// `TrxApi::start` owns exactly one transaction context; a scope created by
// `Scope::derive` owns none and reads through to its ancestors.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::TransactionContext;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a scope, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
	fn next() -> Self {
		Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ScopeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

struct ScopeNode<H> {
	id: ScopeId,
	depth: usize,
	parent: Option<Scope<H>>,
	trx: Option<TransactionContext<H>>,
}

/// A node in the execution scope tree.
///
/// Cloning a `Scope` is cheap and yields a handle to the same node.
pub struct Scope<H> {
	node: Arc<ScopeNode<H>>,
}

impl<H> Scope<H> {
	/// Create a root scope. Roots never carry a transaction.
	pub fn root() -> Self {
		Self {
			node: Arc::new(ScopeNode {
				id: ScopeId::next(),
				depth: 0,
				parent: None,
				trx: None,
			}),
		}
	}

	/// Derive a child scope without attaching anything to it.
	///
	/// This is what a host does when delegating work to a sub-handler. The
	/// child sees the transaction of its nearest transactional ancestor.
	pub fn derive(&self) -> Self {
		self.child(None)
	}

	pub(crate) fn derive_with(&self, trx: TransactionContext<H>) -> Self {
		self.child(Some(trx))
	}

	fn child(&self, trx: Option<TransactionContext<H>>) -> Self {
		Self {
			node: Arc::new(ScopeNode {
				id: ScopeId::next(),
				depth: self.node.depth + 1,
				parent: Some(self.clone()),
				trx,
			}),
		}
	}

	pub fn id(&self) -> ScopeId {
		self.node.id
	}

	/// Number of derivations between this scope and its root.
	pub fn depth(&self) -> usize {
		self.node.depth
	}

	pub fn parent(&self) -> Option<&Scope<H>> {
		self.node.parent.as_ref()
	}

	pub fn is_root(&self) -> bool {
		self.node.parent.is_none()
	}

	/// The context attached to this very node, ignoring ancestors.
	pub fn own_context(&self) -> Option<&TransactionContext<H>> {
		self.node.trx.as_ref()
	}

	/// The context this scope carries: its own attachment, or that of the
	/// nearest ancestor which has one.
	pub fn context(&self) -> Option<&TransactionContext<H>> {
		self.ancestors().find_map(Scope::own_context)
	}

	/// This scope followed by each of its ancestors up to the root.
	pub fn ancestors(&self) -> Ancestors<'_, H> {
		Ancestors { next: Some(self) }
	}

	/// Whether both handles point at the same node.
	pub fn same_scope(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.node, &other.node)
	}
}

impl<H> Clone for Scope<H> {
	fn clone(&self) -> Self {
		Self {
			node: Arc::clone(&self.node),
		}
	}
}

impl<H> fmt::Debug for Scope<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Scope")
			.field("id", &self.node.id)
			.field("depth", &self.node.depth)
			.field("owns_trx", &self.node.trx.is_some())
			.finish()
	}
}

/// Iterator over a scope and its ancestors, nearest first.
pub struct Ancestors<'a, H> {
	next: Option<&'a Scope<H>>,
}

impl<'a, H> Iterator for Ancestors<'a, H> {
	type Item = &'a Scope<H>;

	fn next(&mut self) -> Option<Self::Item> {
		let current = self.next?;
		self.next = current.parent();
		Some(current)
	}
}
