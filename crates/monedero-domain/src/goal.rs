//! Domain models for savings and debt goals.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;
use crate::transaction::{Transaction, TransactionKind};

/// A savings target or a debt being paid off.
///
/// `current_amount` is never edited directly: it is adjusted only through
/// batched compensating writes issued alongside linked transaction
/// mutations, so it always equals the signed sum of linked contributions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub kind: GoalKind,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(user_id: Uuid, name: impl Into<String>, kind: GoalKind, target_amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            kind,
            target_amount,
            current_amount: 0.0,
            timeframe: Timeframe::default(),
            target_date: None,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_target_date(mut self, target_date: NaiveDate) -> Self {
        self.target_date = Some(target_date);
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Signed amount this transaction adds to the goal's running balance.
    pub fn contribution(&self, txn: &Transaction) -> f64 {
        txn.amount * self.kind.multiplier(txn.kind)
    }

    pub fn progress_percent(&self) -> f64 {
        if self.target_amount > 0.0 {
            (self.current_amount / self.target_amount) * 100.0
        } else {
            0.0
        }
    }

    pub fn remaining_amount(&self) -> f64 {
        (self.target_amount - self.current_amount).max(0.0)
    }
}

impl Identifiable for Goal {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Goal {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Goal {
    fn display_label(&self) -> String {
        format!("{} ({})", self.name, self.kind)
    }
}

/// Distinguishes saving up toward a target from paying down a debt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    Saving,
    Debt,
}

impl GoalKind {
    /// Sign applied to a linked transaction's amount.
    ///
    /// Income always adds progress. An expense against a saving goal is a
    /// withdrawal; against a debt goal it is a payment, so it raises the
    /// amount paid off. Saving-kind entries are direct contributions and
    /// always add.
    pub fn multiplier(self, kind: TransactionKind) -> f64 {
        match (self, kind) {
            (GoalKind::Saving, TransactionKind::Expense) => -1.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for GoalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GoalKind::Saving => "Saving",
            GoalKind::Debt => "Debt",
        };
        f.write_str(label)
    }
}

/// Coarse horizon label attached to a goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Timeframe {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Timeframe::ShortTerm => "Short term",
            Timeframe::MediumTerm => "Medium term",
            Timeframe::LongTerm => "Long term",
        };
        f.write_str(label)
    }
}
