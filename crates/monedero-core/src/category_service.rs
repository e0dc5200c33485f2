//! Category management: validation, one-level cascade delete, and the
//! pure tree transformation used for rendering.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use monedero_domain::Category;

use crate::store::{DocumentStore, WriteBatch};
use crate::{CoreError, CoreResult};

/// Label shown for transactions whose category no longer resolves.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A category with its (at most one level of) subcategories.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Provides validated operations for [`Category`] entities.
pub struct CategoryService;

impl CategoryService {
    /// Adds a new category after checking its name and parent.
    pub fn create(store: &dyn DocumentStore, category: Category) -> CoreResult<Category> {
        let existing = store.categories(category.user_id)?;
        Self::validate_name(&existing, None, &category.name)?;
        if let Some(parent_id) = category.parent_id {
            Self::validate_parent(&existing, parent_id, category.id)?;
        }
        let mut batch = WriteBatch::new();
        batch.put_category(category.clone());
        store.commit(batch)?;
        Ok(category)
    }

    /// Applies updates to a category, respecting the depth-two rule.
    pub fn edit(store: &dyn DocumentStore, changes: Category) -> CoreResult<Category> {
        let current = store.category(changes.id)?;
        if current.user_id != changes.user_id {
            return Err(CoreError::Validation("Category owner cannot change".into()));
        }
        let existing = store.categories(changes.user_id)?;
        Self::validate_name(&existing, Some(changes.id), &changes.name)?;
        if let Some(parent_id) = changes.parent_id {
            Self::validate_parent(&existing, parent_id, changes.id)?;
            let has_children = existing.iter().any(|cat| cat.parent_id == Some(changes.id));
            if has_children {
                return Err(CoreError::Validation(
                    "Category with subcategories cannot be nested".into(),
                ));
            }
        }
        let mut batch = WriteBatch::new();
        batch.put_category(changes.clone());
        store.commit(batch)?;
        Ok(changes)
    }

    /// Deletes a category and its subcategories in one atomic batch.
    ///
    /// The subtree ids are collected up front and submitted together
    /// rather than issuing per-node deletes. Transactions referencing any
    /// of the removed ids are left untouched; readers render them under
    /// [`UNCATEGORIZED`].
    pub fn delete(store: &dyn DocumentStore, id: Uuid) -> CoreResult<()> {
        let target = store.category(id)?;
        let all = store.categories(target.user_id)?;
        let mut batch = WriteBatch::new();
        for child in all.iter().filter(|cat| cat.parent_id == Some(id)) {
            batch.delete_category(child.id);
        }
        batch.delete_category(id);
        let removed = batch.len();
        store.commit(batch)?;
        debug!("deleted category {} ({} document(s))", id, removed);
        Ok(())
    }

    /// Builds the rendered forest: bucket by parent, alphabetical at every
    /// level, and any category without a resolvable parent becomes a root.
    ///
    /// Every input category appears exactly once in the output, even for
    /// malformed data (self-parents, cycles) that validation would reject.
    pub fn tree(categories: &[Category]) -> Vec<CategoryNode> {
        let ids: HashSet<Uuid> = categories.iter().map(|cat| cat.id).collect();
        let mut by_parent: HashMap<Uuid, Vec<Category>> = HashMap::new();
        let mut roots: Vec<Category> = Vec::new();
        for cat in categories {
            match cat.parent_id.filter(|pid| *pid != cat.id && ids.contains(pid)) {
                Some(parent) => by_parent.entry(parent).or_default().push(cat.clone()),
                None => roots.push(cat.clone()),
            }
        }
        sort_by_name(&mut roots);

        let mut placed = HashSet::new();
        let mut forest: Vec<CategoryNode> = roots
            .into_iter()
            .map(|cat| build_node(cat, &mut by_parent, &mut placed))
            .collect();

        // Categories stranded on a cycle never hang off a root; surface
        // them as extra roots so nothing silently disappears.
        let mut stranded: Vec<Category> = categories
            .iter()
            .filter(|cat| !placed.contains(&cat.id))
            .cloned()
            .collect();
        sort_by_name(&mut stranded);
        for cat in stranded {
            if !placed.contains(&cat.id) {
                forest.push(build_node(cat, &mut by_parent, &mut placed));
            }
        }
        forest
    }

    /// Resolves an optional category reference to its display name,
    /// falling back to the [`UNCATEGORIZED`] convention for dangling ids.
    pub fn display_name(categories: &[Category], category_id: Option<Uuid>) -> String {
        category_id
            .and_then(|id| categories.iter().find(|cat| cat.id == id))
            .map(|cat| cat.name.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }

    fn validate_name(
        existing: &[Category],
        exclude: Option<Uuid>,
        candidate: &str,
    ) -> CoreResult<()> {
        if candidate.trim().is_empty() {
            return Err(CoreError::Validation("Category name is required".into()));
        }
        let normalized = candidate.trim().to_lowercase();
        let duplicate = existing.iter().any(|cat| {
            cat.name.trim().to_lowercase() == normalized && exclude != Some(cat.id)
        });
        if duplicate {
            return Err(CoreError::Validation(format!(
                "Category `{}` already exists",
                candidate.trim()
            )));
        }
        Ok(())
    }

    fn validate_parent(existing: &[Category], parent_id: Uuid, current: Uuid) -> CoreResult<()> {
        if parent_id == current {
            return Err(CoreError::Validation(
                "Category cannot be its own parent".into(),
            ));
        }
        let parent = existing
            .iter()
            .find(|cat| cat.id == parent_id)
            .ok_or(CoreError::CategoryNotFound(parent_id))?;
        if parent.parent_id.is_some() {
            return Err(CoreError::Validation(
                "Parent category is already a subcategory".into(),
            ));
        }
        Ok(())
    }
}

fn sort_by_name(categories: &mut [Category]) {
    categories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
}

fn build_node(
    category: Category,
    by_parent: &mut HashMap<Uuid, Vec<Category>>,
    placed: &mut HashSet<Uuid>,
) -> CategoryNode {
    placed.insert(category.id);
    let mut children = by_parent.remove(&category.id).unwrap_or_default();
    children.retain(|child| !placed.contains(&child.id));
    sort_by_name(&mut children);
    let children = children
        .into_iter()
        .map(|child| build_node(child, by_parent, placed))
        .collect();
    CategoryNode { category, children }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;

    #[test]
    fn tree_buckets_children_under_roots() {
        let user = Uuid::new_v4();
        let food = Category::new(user, "Food");
        let groceries = Category::new(user, "Groceries").with_parent(food.id);
        let transport = Category::new(user, "Transport");

        let forest =
            CategoryService::tree(&[food.clone(), groceries.clone(), transport.clone()]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].category.name, "Food");
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].category.name, "Groceries");
        assert_eq!(forest[1].category.name, "Transport");
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn tree_promotes_orphans_to_roots() {
        let user = Uuid::new_v4();
        let orphan = Category::new(user, "Dining").with_parent(Uuid::new_v4());
        let forest = CategoryService::tree(&[orphan.clone()]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].category.id, orphan.id);
    }

    #[test]
    fn tree_orders_alphabetically_at_every_level() {
        let user = Uuid::new_v4();
        let parent = Category::new(user, "Home");
        let b = Category::new(user, "bills").with_parent(parent.id);
        let a = Category::new(user, "Appliances").with_parent(parent.id);
        let forest = CategoryService::tree(&[parent, b, a]);
        let names: Vec<&str> = forest[0]
            .children
            .iter()
            .map(|node| node.category.name.as_str())
            .collect();
        assert_eq!(names, ["Appliances", "bills"]);
    }

    #[test]
    fn tree_keeps_every_category_exactly_once_under_cycles() {
        let user = Uuid::new_v4();
        let mut a = Category::new(user, "A");
        let mut b = Category::new(user, "B");
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);

        let forest = CategoryService::tree(&[a.clone(), b.clone()]);
        let mut seen = Vec::new();
        fn walk(nodes: &[CategoryNode], seen: &mut Vec<Uuid>) {
            for node in nodes {
                seen.push(node.category.id);
                walk(&node.children, seen);
            }
        }
        walk(&forest, &mut seen);
        seen.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn create_rejects_duplicate_names_case_insensitively() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        CategoryService::create(&store, Category::new(user, "Groceries")).unwrap();
        let err = CategoryService::create(&store, Category::new(user, "groceries")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("already exists")));
    }

    #[test]
    fn create_rejects_nesting_under_a_subcategory() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let root = CategoryService::create(&store, Category::new(user, "Home")).unwrap();
        let sub =
            CategoryService::create(&store, Category::new(user, "Bills").with_parent(root.id))
                .unwrap();
        let err = CategoryService::create(
            &store,
            Category::new(user, "Electricity").with_parent(sub.id),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("subcategory")));
    }

    #[test]
    fn edit_rejects_reparenting_a_category_with_children() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let parent = CategoryService::create(&store, Category::new(user, "Parent")).unwrap();
        CategoryService::create(&store, Category::new(user, "Child").with_parent(parent.id))
            .unwrap();
        let other = CategoryService::create(&store, Category::new(user, "Other")).unwrap();

        let mut changes = parent.clone();
        changes.parent_id = Some(other.id);
        let err = CategoryService::edit(&store, changes).unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("cannot be nested")));
    }

    #[test]
    fn delete_cascades_one_level_in_a_single_batch() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let parent = CategoryService::create(&store, Category::new(user, "Food")).unwrap();
        let child =
            CategoryService::create(&store, Category::new(user, "Snacks").with_parent(parent.id))
                .unwrap();
        let keep = CategoryService::create(&store, Category::new(user, "Transport")).unwrap();

        CategoryService::delete(&store, parent.id).unwrap();

        assert!(matches!(
            store.category(parent.id),
            Err(CoreError::CategoryNotFound(_))
        ));
        assert!(matches!(
            store.category(child.id),
            Err(CoreError::CategoryNotFound(_))
        ));
        assert!(store.category(keep.id).is_ok());
    }

    #[test]
    fn display_name_falls_back_to_uncategorized() {
        let user = Uuid::new_v4();
        let food = Category::new(user, "Food");
        let cats = vec![food.clone()];
        assert_eq!(CategoryService::display_name(&cats, Some(food.id)), "Food");
        assert_eq!(
            CategoryService::display_name(&cats, Some(Uuid::new_v4())),
            UNCATEGORIZED
        );
        assert_eq!(CategoryService::display_name(&cats, None), UNCATEGORIZED);
    }
}
