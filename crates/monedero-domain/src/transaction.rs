//! Domain models for ledger transactions.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// A single income, expense, or saving entry owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_goal_id: Option<Uuid>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        description: impl Into<String>,
        amount: f64,
        date: NaiveDate,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            description: description.into(),
            amount,
            date,
            kind,
            category_id: None,
            linked_goal_id: None,
        }
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_linked_goal(mut self, goal_id: Uuid) -> Self {
        self.linked_goal_id = Some(goal_id);
        self
    }

    /// Returns `true` when the entry contributes to a goal's balance.
    pub fn is_linked(&self) -> bool {
        self.linked_goal_id.is_some()
    }
}

impl Identifiable for Transaction {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Transaction {
    fn display_label(&self) -> String {
        format!("txn:{} [{}]", self.id, self.kind)
    }
}

/// Supported transaction types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Saving,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::Income => "Income",
            TransactionKind::Expense => "Expense",
            TransactionKind::Saving => "Saving",
        };
        f.write_str(label)
    }
}
