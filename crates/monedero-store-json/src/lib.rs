//! monedero-store-json
//!
//! Reference [`DocumentStore`] backend: in-memory collections with an
//! optional JSON snapshot on disk, atomic batch commit, and live
//! per-collection subscriptions. Stands in for the hosted document store
//! in tests and local runs.

pub mod identity;

pub use identity::LocalIdentityProvider;

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use monedero_core::{
    CategoryObserver, Collection, CoreError, CoreResult, DocumentStore, GoalObserver,
    LiveDocumentStore, SubscriptionId, TransactionObserver, WriteBatch, WriteOp,
};
use monedero_domain::{Category, Goal, Identifiable, Transaction};

const TMP_SUFFIX: &str = "tmp";

/// The three collections, keyed by document id.
#[derive(Debug, Clone, Default)]
struct Collections {
    transactions: HashMap<Uuid, Transaction>,
    categories: HashMap<Uuid, Category>,
    goals: HashMap<Uuid, Goal>,
}

impl Collections {
    /// Owner of the document an op touches, resolved against current state.
    fn op_owner(&self, op: &WriteOp) -> Option<Uuid> {
        match op {
            WriteOp::PutTransaction(txn) => Some(txn.user_id),
            WriteOp::DeleteTransaction(id) => self.transactions.get(id).map(|t| t.user_id),
            WriteOp::PutCategory(cat) => Some(cat.user_id),
            WriteOp::DeleteCategory(id) => self.categories.get(id).map(|c| c.user_id),
            WriteOp::PutGoal(goal) => Some(goal.user_id),
            WriteOp::DeleteGoal(id) => self.goals.get(id).map(|g| g.user_id),
            WriteOp::IncrementGoalAmount { goal_id, .. } => {
                self.goals.get(goal_id).map(|g| g.user_id)
            }
        }
    }

    /// Applies one op, first checking it is applicable to current state.
    fn apply(&mut self, op: WriteOp) -> CoreResult<()> {
        match op {
            WriteOp::PutTransaction(txn) => {
                self.transactions.insert(txn.id(), txn);
            }
            WriteOp::DeleteTransaction(id) => {
                self.transactions
                    .remove(&id)
                    .ok_or(CoreError::TransactionNotFound(id))?;
            }
            WriteOp::PutCategory(cat) => {
                self.categories.insert(cat.id(), cat);
            }
            WriteOp::DeleteCategory(id) => {
                self.categories
                    .remove(&id)
                    .ok_or(CoreError::CategoryNotFound(id))?;
            }
            WriteOp::PutGoal(goal) => {
                self.goals.insert(goal.id(), goal);
            }
            WriteOp::DeleteGoal(id) => {
                self.goals.remove(&id).ok_or(CoreError::GoalNotFound(id))?;
            }
            WriteOp::IncrementGoalAmount { goal_id, delta } => {
                let goal = self
                    .goals
                    .get_mut(&goal_id)
                    .ok_or(CoreError::GoalNotFound(goal_id))?;
                goal.current_amount += delta;
            }
        }
        Ok(())
    }

    fn transactions_for(&self, user_id: Uuid) -> Vec<Transaction> {
        let mut rows: Vec<Transaction> = self
            .transactions
            .values()
            .filter(|txn| txn.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        rows
    }

    fn categories_for(&self, user_id: Uuid) -> Vec<Category> {
        let mut rows: Vec<Category> = self
            .categories
            .values()
            .filter(|cat| cat.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        rows
    }

    fn goals_for(&self, user_id: Uuid) -> Vec<Goal> {
        let mut rows: Vec<Goal> = self
            .goals
            .values()
            .filter(|goal| goal.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rows
    }
}

/// On-disk shape of the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    #[serde(default)]
    transactions: Vec<Transaction>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    goals: Vec<Goal>,
}

impl StoreSnapshot {
    fn from_collections(cols: &Collections) -> Self {
        let mut snapshot = Self {
            transactions: cols.transactions.values().cloned().collect(),
            categories: cols.categories.values().cloned().collect(),
            goals: cols.goals.values().cloned().collect(),
        };
        // Deterministic file contents regardless of map order.
        snapshot.transactions.sort_by_key(|t| t.id);
        snapshot.categories.sort_by_key(|c| c.id);
        snapshot.goals.sort_by_key(|g| g.id);
        snapshot
    }

    fn into_collections(self) -> Collections {
        Collections {
            transactions: self.transactions.into_iter().map(|t| (t.id, t)).collect(),
            categories: self.categories.into_iter().map(|c| (c.id, c)).collect(),
            goals: self.goals.into_iter().map(|g| (g.id, g)).collect(),
        }
    }
}

enum Observer {
    Transactions(TransactionObserver),
    Categories(CategoryObserver),
    Goals(GoalObserver),
}

struct Subscriber {
    id: SubscriptionId,
    collection: Collection,
    user_id: Uuid,
    observer: Observer,
}

/// In-memory document store with optional JSON persistence.
///
/// Commits stage the whole batch against a copy of the current state and
/// persist the snapshot before swapping it in, so a rejected op or a
/// failed disk write leaves the previous state fully intact.
pub struct JsonDocumentStore {
    inner: Mutex<Collections>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription: AtomicU64,
    path: Option<PathBuf>,
}

impl JsonDocumentStore {
    /// A purely in-memory store, used by tests and previews.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Collections::default()),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            path: None,
        }
    }

    /// Opens (or creates) a snapshot-backed store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let collections = if path.exists() {
            let data = fs::read_to_string(&path)?;
            let snapshot: StoreSnapshot =
                serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))?;
            snapshot.into_collections()
        } else {
            Collections::default()
        };
        Ok(Self {
            inner: Mutex::new(collections),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, cols: &Collections) -> CoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = StoreSnapshot::from_collections(cols);
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|err| CoreError::Serde(err.to_string()))?;
        let tmp = tmp_path(path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn notify(&self, touched: &HashSet<(Collection, Uuid)>) {
        if touched.is_empty() {
            return;
        }
        // Snapshot result sets and the observer list under their locks,
        // then call out with neither held.
        let mut deliveries: Vec<Delivery> = Vec::new();
        {
            let cols = lock(&self.inner);
            let subscribers = lock(&self.subscribers);
            for sub in subscribers.iter() {
                if !touched.contains(&(sub.collection, sub.user_id)) {
                    continue;
                }
                let delivery = match &sub.observer {
                    Observer::Transactions(observer) => Delivery::Transactions(
                        observer.clone(),
                        cols.transactions_for(sub.user_id),
                    ),
                    Observer::Categories(observer) => {
                        Delivery::Categories(observer.clone(), cols.categories_for(sub.user_id))
                    }
                    Observer::Goals(observer) => {
                        Delivery::Goals(observer.clone(), cols.goals_for(sub.user_id))
                    }
                };
                deliveries.push(delivery);
            }
        }
        for delivery in deliveries {
            delivery.deliver();
        }
    }

    fn register(&self, collection: Collection, user_id: Uuid, observer: Observer) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push(Subscriber {
            id,
            collection,
            user_id,
            observer,
        });
        id
    }
}

enum Delivery {
    Transactions(TransactionObserver, Vec<Transaction>),
    Categories(CategoryObserver, Vec<Category>),
    Goals(GoalObserver, Vec<Goal>),
}

impl Delivery {
    fn deliver(self) {
        match self {
            Delivery::Transactions(observer, rows) => observer(&rows),
            Delivery::Categories(observer, rows) => observer(&rows),
            Delivery::Goals(observer, rows) => observer(&rows),
        }
    }
}

impl DocumentStore for JsonDocumentStore {
    fn transactions(&self, user_id: Uuid) -> CoreResult<Vec<Transaction>> {
        Ok(lock(&self.inner).transactions_for(user_id))
    }

    fn categories(&self, user_id: Uuid) -> CoreResult<Vec<Category>> {
        Ok(lock(&self.inner).categories_for(user_id))
    }

    fn goals(&self, user_id: Uuid) -> CoreResult<Vec<Goal>> {
        Ok(lock(&self.inner).goals_for(user_id))
    }

    fn transaction(&self, id: Uuid) -> CoreResult<Transaction> {
        lock(&self.inner)
            .transactions
            .get(&id)
            .cloned()
            .ok_or(CoreError::TransactionNotFound(id))
    }

    fn category(&self, id: Uuid) -> CoreResult<Category> {
        lock(&self.inner)
            .categories
            .get(&id)
            .cloned()
            .ok_or(CoreError::CategoryNotFound(id))
    }

    fn goal(&self, id: Uuid) -> CoreResult<Goal> {
        lock(&self.inner)
            .goals
            .get(&id)
            .cloned()
            .ok_or(CoreError::GoalNotFound(id))
    }

    fn commit(&self, batch: WriteBatch) -> CoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let op_count = batch.len();
        let mut touched: HashSet<(Collection, Uuid)> = HashSet::new();
        {
            let mut guard = lock(&self.inner);
            let mut staged = guard.clone();
            for op in batch.into_ops() {
                let collection = op.collection();
                if let Some(owner) = staged.op_owner(&op) {
                    touched.insert((collection, owner));
                }
                staged.apply(op)?;
            }
            self.persist(&staged)?;
            *guard = staged;
        }
        debug!("committed batch of {} op(s)", op_count);
        self.notify(&touched);
        Ok(())
    }
}

impl LiveDocumentStore for JsonDocumentStore {
    fn subscribe_transactions(
        &self,
        user_id: Uuid,
        observer: TransactionObserver,
    ) -> CoreResult<SubscriptionId> {
        let id = self.register(
            Collection::Transactions,
            user_id,
            Observer::Transactions(observer.clone()),
        );
        let rows = self.transactions(user_id)?;
        observer(&rows);
        Ok(id)
    }

    fn subscribe_categories(
        &self,
        user_id: Uuid,
        observer: CategoryObserver,
    ) -> CoreResult<SubscriptionId> {
        let id = self.register(
            Collection::Categories,
            user_id,
            Observer::Categories(observer.clone()),
        );
        let rows = self.categories(user_id)?;
        observer(&rows);
        Ok(id)
    }

    fn subscribe_goals(&self, user_id: Uuid, observer: GoalObserver) -> CoreResult<SubscriptionId> {
        let id = self.register(Collection::Goals, user_id, Observer::Goals(observer.clone()));
        let rows = self.goals(user_id)?;
        observer(&rows);
        Ok(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        lock(&self.subscribers).retain(|sub| sub.id != subscription);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}
