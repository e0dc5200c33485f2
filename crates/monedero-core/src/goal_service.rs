//! Goal CRUD and direct contributions.

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use monedero_domain::{Goal, GoalKind, Transaction, TransactionKind};

use crate::store::{DocumentStore, WriteBatch};
use crate::{CoreError, CoreResult};

/// Provides validated operations for [`Goal`] entities.
pub struct GoalService;

impl GoalService {
    /// Inserts a new goal. The running balance always starts at zero;
    /// whatever the caller put in `current_amount` is discarded.
    pub fn create(store: &dyn DocumentStore, mut goal: Goal) -> CoreResult<Goal> {
        Self::validate(&goal)?;
        goal.current_amount = 0.0;
        let mut batch = WriteBatch::new();
        batch.put_goal(goal.clone());
        store.commit(batch)?;
        debug!("created goal {} ({})", goal.id, goal.kind);
        Ok(goal)
    }

    /// Updates a goal's descriptive fields. The stored `current_amount` is
    /// preserved: only the reconciliation rule may move it.
    pub fn edit(store: &dyn DocumentStore, mut changes: Goal) -> CoreResult<Goal> {
        Self::validate(&changes)?;
        let existing = store.goal(changes.id)?;
        if existing.user_id != changes.user_id {
            return Err(CoreError::Validation("Goal owner cannot change".into()));
        }
        changes.current_amount = existing.current_amount;
        changes.created_at = existing.created_at;
        let mut batch = WriteBatch::new();
        batch.put_goal(changes.clone());
        store.commit(batch)?;
        Ok(changes)
    }

    /// Deletes the goal document only. Transactions that linked it keep a
    /// dangling reference; later edits and deletes of those transactions
    /// treat the stale link as "nothing to revert".
    pub fn delete(store: &dyn DocumentStore, id: Uuid) -> CoreResult<()> {
        store.goal(id)?;
        let mut batch = WriteBatch::new();
        batch.delete_goal(id);
        store.commit(batch)?;
        debug!("deleted goal {}", id);
        Ok(())
    }

    /// Manual "add savings" / "make a payment" action: records a
    /// `Saving`-kind transaction linked to the goal and applies the
    /// contribution, atomically, so the transaction list remains the audit
    /// trail for every balance change.
    pub fn add_contribution(
        store: &dyn DocumentStore,
        goal_id: Uuid,
        amount: f64,
        date: NaiveDate,
    ) -> CoreResult<Transaction> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoreError::Validation("Amount must be positive".into()));
        }
        let goal = store.goal(goal_id)?;
        let description = match goal.kind {
            GoalKind::Saving => format!("Contribution to {}", goal.name),
            GoalKind::Debt => format!("Payment toward {}", goal.name),
        };
        let txn = Transaction::new(goal.user_id, description, amount, date, TransactionKind::Saving)
            .with_linked_goal(goal.id);

        let mut batch = WriteBatch::new();
        batch
            .put_transaction(txn.clone())
            .increment_goal_amount(goal.id, goal.contribution(&txn));
        store.commit(batch)?;
        debug!("recorded contribution of {} to goal {}", amount, goal.id);
        Ok(txn)
    }

    fn validate(goal: &Goal) -> CoreResult<()> {
        if goal.name.trim().is_empty() {
            return Err(CoreError::Validation("Goal name is required".into()));
        }
        if !goal.target_amount.is_finite() || goal.target_amount <= 0.0 {
            return Err(CoreError::Validation(
                "Target amount must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use monedero_domain::Timeframe;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    #[test]
    fn create_forces_zero_balance() {
        let store = MemoryStore::new();
        let mut goal = Goal::new(Uuid::new_v4(), "Vacation", GoalKind::Saving, 800_000.0);
        goal.current_amount = 999.0;
        let created = GoalService::create(&store, goal).unwrap();
        assert_eq!(created.current_amount, 0.0);
    }

    #[test]
    fn edit_preserves_reconciled_balance_and_creation_time() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let goal = GoalService::create(&store, Goal::new(user, "Fund", GoalKind::Saving, 100_000.0))
            .unwrap();
        GoalService::add_contribution(&store, goal.id, 40_000.0, date()).unwrap();

        let mut changes = store.goal(goal.id).unwrap();
        changes.name = "Emergency fund".into();
        changes.timeframe = Timeframe::LongTerm;
        changes.current_amount = 0.0; // stale caller copy must not win
        let edited = GoalService::edit(&store, changes).unwrap();

        assert_eq!(edited.current_amount, 40_000.0);
        assert_eq!(edited.created_at, goal.created_at);
        assert_eq!(store.goal(goal.id).unwrap().name, "Emergency fund");
    }

    #[test]
    fn add_contribution_writes_audit_transaction_atomically() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let goal = GoalService::create(
            &store,
            Goal::new(user, "Motorbike", GoalKind::Saving, 1_000_000.0),
        )
        .unwrap();

        let txn = GoalService::add_contribution(&store, goal.id, 300_000.0, date()).unwrap();

        assert_eq!(store.goal(goal.id).unwrap().current_amount, 300_000.0);
        let stored = store.transaction(txn.id).unwrap();
        assert_eq!(stored.kind, TransactionKind::Saving);
        assert_eq!(stored.linked_goal_id, Some(goal.id));
        assert_eq!(stored.amount, 300_000.0);
    }

    #[test]
    fn debt_contribution_counts_as_payment() {
        let store = MemoryStore::new();
        let goal = GoalService::create(
            &store,
            Goal::new(Uuid::new_v4(), "Card", GoalKind::Debt, 500_000.0),
        )
        .unwrap();

        let txn = GoalService::add_contribution(&store, goal.id, 50_000.0, date()).unwrap();

        assert_eq!(store.goal(goal.id).unwrap().current_amount, 50_000.0);
        assert!(txn.description.starts_with("Payment toward"));
    }

    #[test]
    fn contribution_to_missing_goal_fails_without_writes() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();
        let err = GoalService::add_contribution(&store, missing, 10_000.0, date()).unwrap_err();
        assert!(matches!(err, CoreError::GoalNotFound(id) if id == missing));
    }

    #[test]
    fn validation_rejects_empty_name_and_nonpositive_target() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        assert!(matches!(
            GoalService::create(&store, Goal::new(user, " ", GoalKind::Saving, 1.0)),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            GoalService::create(&store, Goal::new(user, "X", GoalKind::Saving, 0.0)),
            Err(CoreError::Validation(_))
        ));
    }
}
