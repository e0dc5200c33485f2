//! Abstraction over the hosted document store.
//!
//! Mutations travel as [`WriteBatch`] values: one atomic multi-document
//! write that either fully applies or leaves the store untouched. Reads are
//! owner-scoped collection snapshots; [`LiveDocumentStore`] adds push-based
//! subscriptions that re-deliver the full result set after every commit.

use std::fmt;
use std::sync::Arc;

use monedero_domain::{Category, Goal, Transaction};
use uuid::Uuid;

use crate::CoreResult;

/// Identifies one of the three owner-scoped collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Transactions,
    Categories,
    Goals,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Collection::Transactions => "transactions",
            Collection::Categories => "categories",
            Collection::Goals => "goals",
        };
        f.write_str(label)
    }
}

/// A single mutation inside an atomic batch.
///
/// Puts are upserts. Deletes and increments targeting a missing document
/// fail the whole batch; a concurrent delete therefore surfaces as one
/// failure with no partial state.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutTransaction(Transaction),
    DeleteTransaction(Uuid),
    PutCategory(Category),
    DeleteCategory(Uuid),
    PutGoal(Goal),
    DeleteGoal(Uuid),
    /// Numeric-increment primitive for goal balances.
    IncrementGoalAmount { goal_id: Uuid, delta: f64 },
}

impl WriteOp {
    pub fn collection(&self) -> Collection {
        match self {
            WriteOp::PutTransaction(_) | WriteOp::DeleteTransaction(_) => Collection::Transactions,
            WriteOp::PutCategory(_) | WriteOp::DeleteCategory(_) => Collection::Categories,
            WriteOp::PutGoal(_) | WriteOp::DeleteGoal(_) | WriteOp::IncrementGoalAmount { .. } => {
                Collection::Goals
            }
        }
    }
}

/// An ordered set of writes applied as one all-or-nothing operation.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_transaction(&mut self, txn: Transaction) -> &mut Self {
        self.ops.push(WriteOp::PutTransaction(txn));
        self
    }

    pub fn delete_transaction(&mut self, id: Uuid) -> &mut Self {
        self.ops.push(WriteOp::DeleteTransaction(id));
        self
    }

    pub fn put_category(&mut self, category: Category) -> &mut Self {
        self.ops.push(WriteOp::PutCategory(category));
        self
    }

    pub fn delete_category(&mut self, id: Uuid) -> &mut Self {
        self.ops.push(WriteOp::DeleteCategory(id));
        self
    }

    pub fn put_goal(&mut self, goal: Goal) -> &mut Self {
        self.ops.push(WriteOp::PutGoal(goal));
        self
    }

    pub fn delete_goal(&mut self, id: Uuid) -> &mut Self {
        self.ops.push(WriteOp::DeleteGoal(id));
        self
    }

    pub fn increment_goal_amount(&mut self, goal_id: Uuid, delta: f64) -> &mut Self {
        self.ops.push(WriteOp::IncrementGoalAmount { goal_id, delta });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Abstraction over persistence backends holding the three collections.
///
/// Collection reads return owner-scoped snapshots in a deterministic order:
/// transactions newest first, categories by name, goals by creation time.
pub trait DocumentStore: Send + Sync {
    fn transactions(&self, user_id: Uuid) -> CoreResult<Vec<Transaction>>;
    fn categories(&self, user_id: Uuid) -> CoreResult<Vec<Category>>;
    fn goals(&self, user_id: Uuid) -> CoreResult<Vec<Goal>>;

    fn transaction(&self, id: Uuid) -> CoreResult<Transaction>;
    fn category(&self, id: Uuid) -> CoreResult<Category>;
    fn goal(&self, id: Uuid) -> CoreResult<Goal>;

    /// Applies the batch atomically. No retry is attempted on failure.
    fn commit(&self, batch: WriteBatch) -> CoreResult<()>;
}

pub type SubscriptionId = u64;

pub type TransactionObserver = Arc<dyn Fn(&[Transaction]) + Send + Sync>;
pub type CategoryObserver = Arc<dyn Fn(&[Category]) + Send + Sync>;
pub type GoalObserver = Arc<dyn Fn(&[Goal]) + Send + Sync>;

/// Push-based live queries on top of a [`DocumentStore`].
///
/// Observers receive the current owner-scoped result set immediately on
/// subscription and again after every committed batch touching that
/// collection, until `unsubscribe` closes the subscription.
pub trait LiveDocumentStore: DocumentStore {
    fn subscribe_transactions(
        &self,
        user_id: Uuid,
        observer: TransactionObserver,
    ) -> CoreResult<SubscriptionId>;

    fn subscribe_categories(
        &self,
        user_id: Uuid,
        observer: CategoryObserver,
    ) -> CoreResult<SubscriptionId>;

    fn subscribe_goals(&self, user_id: Uuid, observer: GoalObserver) -> CoreResult<SubscriptionId>;

    fn unsubscribe(&self, subscription: SubscriptionId);
}
