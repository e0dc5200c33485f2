//! Transaction CRUD plus the goal reconciliation rule.
//!
//! Every mutation of a goal-linked transaction carries a compensating
//! `IncrementGoalAmount` write in the same batch, so a goal's
//! `current_amount` always equals the signed sum of its linked
//! transactions' contributions. The store's atomic commit is the only
//! thing relied on to keep that invariant across failures.

use tracing::{debug, warn};
use uuid::Uuid;

use monedero_domain::{Transaction, TransactionKind};

use crate::store::{DocumentStore, WriteBatch};
use crate::{CoreError, CoreResult};

/// Provides validated operations for [`Transaction`] entities.
pub struct TransactionService;

impl TransactionService {
    /// Inserts a transaction; if it links a goal, applies the contribution
    /// to the goal in the same atomic batch.
    pub fn create(store: &dyn DocumentStore, txn: Transaction) -> CoreResult<Transaction> {
        Self::validate(&txn)?;
        let mut batch = WriteBatch::new();
        if let Some(goal_id) = txn.linked_goal_id {
            let goal = store.goal(goal_id)?;
            batch.increment_goal_amount(goal_id, goal.contribution(&txn));
        }
        batch.put_transaction(txn.clone());
        store.commit(batch)?;
        debug!("created transaction {} ({})", txn.id, txn.kind);
        Ok(txn)
    }

    /// Rewrites a transaction's fields, reverting the old contribution and
    /// applying the new one in the same batch.
    ///
    /// When the goal link is unchanged both increments still run against
    /// the same goal, so the net effect is exactly the delta. Re-linking
    /// from goal A to goal B reverts A and charges B in one operation.
    pub fn edit(store: &dyn DocumentStore, updated: Transaction) -> CoreResult<Transaction> {
        Self::validate(&updated)?;
        let previous = store.transaction(updated.id)?;
        if previous.user_id != updated.user_id {
            return Err(CoreError::Validation(
                "Transaction owner cannot change".into(),
            ));
        }

        let mut batch = WriteBatch::new();
        if let Some(old_goal_id) = previous.linked_goal_id {
            match store.goal(old_goal_id) {
                Ok(old_goal) => {
                    batch.increment_goal_amount(old_goal_id, -old_goal.contribution(&previous));
                }
                // The goal was deleted after the link was made; there is
                // no balance left to revert.
                Err(CoreError::GoalNotFound(_)) => {
                    warn!(
                        "transaction {} links missing goal {}, skipping revert",
                        previous.id, old_goal_id
                    );
                }
                Err(err) => return Err(err),
            }
        }
        if let Some(new_goal_id) = updated.linked_goal_id {
            let new_goal = store.goal(new_goal_id)?;
            batch.increment_goal_amount(new_goal_id, new_goal.contribution(&updated));
        }
        batch.put_transaction(updated.clone());
        store.commit(batch)?;
        debug!("edited transaction {}", updated.id);
        Ok(updated)
    }

    /// Deletes a transaction, reverting its contribution if it was linked.
    /// A link to an already-deleted goal is ignored.
    pub fn delete(store: &dyn DocumentStore, id: Uuid) -> CoreResult<()> {
        let txn = store.transaction(id)?;
        let mut batch = WriteBatch::new();
        if let Some(goal_id) = txn.linked_goal_id {
            match store.goal(goal_id) {
                Ok(goal) => {
                    batch.increment_goal_amount(goal_id, -goal.contribution(&txn));
                }
                Err(CoreError::GoalNotFound(_)) => {
                    warn!(
                        "transaction {} links missing goal {}, skipping revert",
                        txn.id, goal_id
                    );
                }
                Err(err) => return Err(err),
            }
        }
        batch.delete_transaction(id);
        store.commit(batch)?;
        debug!("deleted transaction {}", id);
        Ok(())
    }

    fn validate(txn: &Transaction) -> CoreResult<()> {
        if !txn.amount.is_finite() || txn.amount <= 0.0 {
            return Err(CoreError::Validation("Amount must be positive".into()));
        }
        if txn.description.trim().is_empty() {
            return Err(CoreError::Validation("Description is required".into()));
        }
        if txn.kind != TransactionKind::Saving && txn.category_id.is_none() {
            return Err(CoreError::Validation(
                "A category is required for income and expense entries".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use chrono::NaiveDate;
    use monedero_domain::{Category, Goal, GoalKind};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn seeded(user: Uuid, kind: GoalKind) -> (MemoryStore, Goal, Category) {
        let store = MemoryStore::new();
        let goal = Goal::new(user, "Goal", kind, 1_000_000.0);
        let category = Category::new(user, "General");
        store.seed_goal(goal.clone());
        store.seed_category(category.clone());
        (store, goal, category)
    }

    #[test]
    fn linked_income_raises_saving_goal_balance() {
        let user = Uuid::new_v4();
        let (store, goal, category) = seeded(user, GoalKind::Saving);

        let txn = Transaction::new(user, "Bonus", 300_000.0, date(1), TransactionKind::Income)
            .with_category(category.id)
            .with_linked_goal(goal.id);
        TransactionService::create(&store, txn).expect("create");

        assert_eq!(store.goal(goal.id).unwrap().current_amount, 300_000.0);
    }

    #[test]
    fn expense_withdraws_from_saving_but_pays_down_debt() {
        let user = Uuid::new_v4();
        let (store, saving, category) = seeded(user, GoalKind::Saving);
        let debt = Goal::new(user, "Loan", GoalKind::Debt, 2_000_000.0);
        store.seed_goal(debt.clone());

        let withdrawal =
            Transaction::new(user, "Withdrawal", 20_000.0, date(2), TransactionKind::Expense)
                .with_category(category.id)
                .with_linked_goal(saving.id);
        TransactionService::create(&store, withdrawal).unwrap();
        assert_eq!(store.goal(saving.id).unwrap().current_amount, -20_000.0);

        let payment =
            Transaction::new(user, "Loan payment", 50_000.0, date(3), TransactionKind::Expense)
                .with_category(category.id)
                .with_linked_goal(debt.id);
        TransactionService::create(&store, payment).unwrap();
        assert_eq!(store.goal(debt.id).unwrap().current_amount, 50_000.0);
    }

    #[test]
    fn edit_applies_only_the_delta_against_the_same_goal() {
        let user = Uuid::new_v4();
        let (store, goal, category) = seeded(user, GoalKind::Saving);

        let txn = Transaction::new(user, "Deposit", 100_000.0, date(4), TransactionKind::Income)
            .with_category(category.id)
            .with_linked_goal(goal.id);
        let txn = TransactionService::create(&store, txn).unwrap();

        let mut updated = txn.clone();
        updated.amount = 150_000.0;
        TransactionService::edit(&store, updated).unwrap();

        assert_eq!(store.goal(goal.id).unwrap().current_amount, 150_000.0);
    }

    #[test]
    fn relink_moves_the_contribution_between_goals() {
        let user = Uuid::new_v4();
        let (store, goal_a, category) = seeded(user, GoalKind::Saving);
        let goal_b = Goal::new(user, "Other", GoalKind::Saving, 500_000.0);
        store.seed_goal(goal_b.clone());

        let txn = Transaction::new(user, "Deposit", 80_000.0, date(5), TransactionKind::Income)
            .with_category(category.id)
            .with_linked_goal(goal_a.id);
        let txn = TransactionService::create(&store, txn).unwrap();

        let mut moved = txn.clone();
        moved.linked_goal_id = Some(goal_b.id);
        TransactionService::edit(&store, moved).unwrap();

        assert_eq!(store.goal(goal_a.id).unwrap().current_amount, 0.0);
        assert_eq!(store.goal(goal_b.id).unwrap().current_amount, 80_000.0);
    }

    #[test]
    fn unlinking_on_edit_reverts_the_contribution() {
        let user = Uuid::new_v4();
        let (store, goal, category) = seeded(user, GoalKind::Saving);

        let txn = Transaction::new(user, "Deposit", 60_000.0, date(6), TransactionKind::Income)
            .with_category(category.id)
            .with_linked_goal(goal.id);
        let txn = TransactionService::create(&store, txn).unwrap();

        let mut unlinked = txn.clone();
        unlinked.linked_goal_id = None;
        TransactionService::edit(&store, unlinked).unwrap();

        assert_eq!(store.goal(goal.id).unwrap().current_amount, 0.0);
    }

    #[test]
    fn delete_restores_the_prior_balance() {
        let user = Uuid::new_v4();
        let (store, goal, category) = seeded(user, GoalKind::Saving);

        let txn = Transaction::new(user, "Deposit", 75_000.0, date(7), TransactionKind::Income)
            .with_category(category.id)
            .with_linked_goal(goal.id);
        let txn = TransactionService::create(&store, txn).unwrap();
        TransactionService::delete(&store, txn.id).unwrap();

        assert_eq!(store.goal(goal.id).unwrap().current_amount, 0.0);
        assert!(matches!(
            store.transaction(txn.id),
            Err(CoreError::TransactionNotFound(_))
        ));
    }

    #[test]
    fn delete_succeeds_after_the_linked_goal_is_gone() {
        let user = Uuid::new_v4();
        let (store, goal, category) = seeded(user, GoalKind::Saving);

        let txn = Transaction::new(user, "Deposit", 40_000.0, date(10), TransactionKind::Income)
            .with_category(category.id)
            .with_linked_goal(goal.id);
        let txn = TransactionService::create(&store, txn).unwrap();

        let mut batch = WriteBatch::new();
        batch.delete_goal(goal.id);
        store.commit(batch).unwrap();

        TransactionService::delete(&store, txn.id).expect("delete with dangling link");
        assert!(store.transaction(txn.id).is_err());
    }

    #[test]
    fn edit_can_unlink_from_a_deleted_goal() {
        let user = Uuid::new_v4();
        let (store, goal, category) = seeded(user, GoalKind::Saving);

        let txn = Transaction::new(user, "Deposit", 40_000.0, date(11), TransactionKind::Income)
            .with_category(category.id)
            .with_linked_goal(goal.id);
        let txn = TransactionService::create(&store, txn).unwrap();

        let mut batch = WriteBatch::new();
        batch.delete_goal(goal.id);
        store.commit(batch).unwrap();

        let mut unlinked = txn.clone();
        unlinked.linked_goal_id = None;
        unlinked.amount = 55_000.0;
        TransactionService::edit(&store, unlinked).expect("edit with dangling link");

        assert_eq!(store.transaction(txn.id).unwrap().amount, 55_000.0);
        assert_eq!(store.transaction(txn.id).unwrap().linked_goal_id, None);
    }

    #[test]
    fn create_rejects_missing_goal_without_inserting() {
        let user = Uuid::new_v4();
        let store = MemoryStore::new();
        let category = Category::new(user, "General");
        store.seed_category(category.clone());

        let orphan_goal = Uuid::new_v4();
        let txn = Transaction::new(user, "Deposit", 10_000.0, date(8), TransactionKind::Income)
            .with_category(category.id)
            .with_linked_goal(orphan_goal);
        let err = TransactionService::create(&store, txn.clone()).unwrap_err();

        assert!(matches!(err, CoreError::GoalNotFound(id) if id == orphan_goal));
        assert!(store.transactions(user).unwrap().is_empty());
    }

    #[test]
    fn validation_rejects_bad_input_before_any_write() {
        let user = Uuid::new_v4();
        let (store, _, category) = seeded(user, GoalKind::Saving);

        let negative =
            Transaction::new(user, "Bad", -5.0, date(9), TransactionKind::Expense)
                .with_category(category.id);
        assert!(matches!(
            TransactionService::create(&store, negative),
            Err(CoreError::Validation(_))
        ));

        let blank = Transaction::new(user, "  ", 5.0, date(9), TransactionKind::Expense)
            .with_category(category.id);
        assert!(matches!(
            TransactionService::create(&store, blank),
            Err(CoreError::Validation(_))
        ));

        let uncategorized = Transaction::new(user, "Lunch", 5.0, date(9), TransactionKind::Expense);
        assert!(matches!(
            TransactionService::create(&store, uncategorized),
            Err(CoreError::Validation(_))
        ));

        // Saving-kind entries are the one shape allowed without a category.
        let saving = Transaction::new(user, "Set aside", 5.0, date(9), TransactionKind::Saving);
        assert!(TransactionService::create(&store, saving).is_ok());
    }
}
