//! Aggregation helpers behind the dashboard and report views.
//!
//! Pure reduce/group-by passes over collection snapshots; recomputed
//! synchronously whenever a live subscription delivers new data.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use monedero_domain::{Category, Goal, Transaction, TransactionKind};

use crate::category_service::CategoryService;

/// Income, expense, and saving totals for one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub income: f64,
    pub expenses: f64,
    pub savings: f64,
}

impl MonthlySummary {
    /// What is left after spending and money set aside.
    pub fn balance(&self) -> f64 {
        self.income - self.expenses - self.savings
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// One bar/slice of the expense distribution chart.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySlice {
    /// Resolvable category id, or `None` for the uncategorized bucket.
    pub category_id: Option<Uuid>,
    pub name: String,
    pub total: f64,
}

/// Progress of a single goal for dashboard cards.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalProgress {
    pub goal_id: Uuid,
    pub name: String,
    pub current_amount: f64,
    pub target_amount: f64,
    pub percent: f64,
    pub remaining: f64,
}

/// Aggregates transaction and goal snapshots into derived views.
pub struct SummaryService;

impl SummaryService {
    /// Totals for a single calendar month.
    pub fn monthly_summary(
        transactions: &[Transaction],
        year: i32,
        month: u32,
    ) -> MonthlySummary {
        let mut summary = MonthlySummary {
            year,
            month,
            income: 0.0,
            expenses: 0.0,
            savings: 0.0,
        };
        for txn in transactions {
            if txn.date.year() != year || txn.date.month() != month {
                continue;
            }
            match txn.kind {
                TransactionKind::Income => summary.income += txn.amount,
                TransactionKind::Expense => summary.expenses += txn.amount,
                TransactionKind::Saving => summary.savings += txn.amount,
            }
        }
        summary
    }

    /// The last `months` calendar months ending at `reference`, oldest
    /// first. Feeds the income-vs-expense trend chart.
    pub fn monthly_trend(
        transactions: &[Transaction],
        reference: NaiveDate,
        months: usize,
    ) -> Vec<MonthlySummary> {
        let mut year = reference.year();
        let mut month = reference.month();
        let mut trend = Vec::with_capacity(months);
        for _ in 0..months {
            trend.push(Self::monthly_summary(transactions, year, month));
            if month == 1 {
                month = 12;
                year -= 1;
            } else {
                month -= 1;
            }
        }
        trend.reverse();
        trend
    }

    /// Expense totals grouped by category, largest first. Dangling
    /// category references all land in the uncategorized bucket.
    pub fn expense_distribution(
        transactions: &[Transaction],
        categories: &[Category],
    ) -> Vec<CategorySlice> {
        let mut totals: HashMap<Option<Uuid>, f64> = HashMap::new();
        for txn in transactions {
            if txn.kind != TransactionKind::Expense {
                continue;
            }
            let key = txn
                .category_id
                .filter(|id| categories.iter().any(|cat| cat.id == *id));
            *totals.entry(key).or_insert(0.0) += txn.amount;
        }
        let mut slices: Vec<CategorySlice> = totals
            .into_iter()
            .map(|(category_id, total)| CategorySlice {
                category_id,
                name: CategoryService::display_name(categories, category_id),
                total,
            })
            .collect();
        slices.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        slices
    }

    /// Newest-first slice for the dashboard's recent-transactions table.
    pub fn recent(transactions: &[Transaction], limit: usize) -> Vec<Transaction> {
        let mut rows = transactions.to_vec();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        rows
    }

    /// Percent complete and remaining amount per goal.
    pub fn goal_progress(goals: &[Goal]) -> Vec<GoalProgress> {
        goals
            .iter()
            .map(|goal| GoalProgress {
                goal_id: goal.id,
                name: goal.name.clone(),
                current_amount: goal.current_amount,
                target_amount: goal.target_amount,
                percent: goal.progress_percent(),
                remaining: goal.remaining_amount(),
            })
            .collect()
    }
}
