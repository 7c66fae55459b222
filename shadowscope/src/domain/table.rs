//! Category resolution context
//!
//! Drawables are decoded with a bare category index. [`CategoryTable`] binds
//! those indices to shared `Arc<Category>` values, synthesizes placeholders
//! for indices nothing defines, and records which categories a trace
//! actually references so unused ones can be pruned on output.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use log::debug;

use super::category::{palette_color, Category, CategorySummary, CategoryWeight, ColorAlpha, Topology};

/// A drawable's category: always an index, optionally bound to the entry
/// a [`CategoryTable`] resolved it to.
#[derive(Debug, Clone)]
pub struct CategoryBinding {
    index: i32,
    category: Option<Arc<Category>>,
}

impl PartialEq for CategoryBinding {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl CategoryBinding {
    #[must_use]
    pub fn unbound(index: i32) -> Self {
        Self { index, category: None }
    }

    #[must_use]
    pub fn bound(category: Arc<Category>) -> Self {
        Self { index: category.index, category: Some(category) }
    }

    #[must_use]
    pub fn index(&self) -> i32 {
        self.index
    }

    #[must_use]
    pub fn category(&self) -> Option<&Arc<Category>> {
        self.category.as_ref()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.category.is_some()
    }

    /// Bind through `table` and mark the category used.
    ///
    /// An unbound index is looked up (placeholder on a miss); an already
    /// bound category is registered so the table learns it was referenced.
    pub fn resolve(&mut self, table: &mut CategoryTable) -> Arc<Category> {
        let category = match self.category.take() {
            None => table.resolve(self.index),
            Some(category) => table.register(category),
        };
        self.index = category.index;
        self.category = Some(Arc::clone(&category));
        category
    }

    /// Undo [`CategoryBinding::resolve`] so a later pass can resolve again
    pub fn release(&mut self, table: &mut CategoryTable) {
        if self.category.take().is_some() {
            table.release(self.index);
        }
    }
}

impl fmt::Display for CategoryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(category) => write!(f, "{}", category.name),
            None => write!(f, "#{}", self.index),
        }
    }
}

/// Mutable per-trace state of one category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryState {
    pub used: bool,
    pub visible: bool,
    pub searchable: bool,
    /// Running summary accumulated while this trace is processed
    pub summary: CategorySummary,
}

impl Default for CategoryState {
    fn default() -> Self {
        Self { used: false, visible: true, searchable: true, summary: CategorySummary::default() }
    }
}

/// Index → category mapping plus per-category state.
///
/// Taken by `&mut` wherever resolution happens, so two passes can never
/// race on the used flags or summaries.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    categories: BTreeMap<i32, Arc<Category>>,
    states: BTreeMap<i32, CategoryState>,
    placeholders: BTreeSet<i32>,
    /// Palette slot the next placeholder is colored with
    next_color: usize,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryTable {
    /// Table holding only the shadow preview categories
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            categories: BTreeMap::new(),
            states: BTreeMap::new(),
            placeholders: BTreeSet::new(),
            next_color: 0,
        };
        for topology in [Topology::State, Topology::Arrow, Topology::Event] {
            table.insert(Category::shadow_preview(topology));
        }
        table
    }

    /// Add or replace a definition, e.g. one read from a category section
    pub fn insert(&mut self, category: Category) -> Arc<Category> {
        let index = category.index;
        let category = Arc::new(category);
        self.categories.insert(index, Arc::clone(&category));
        self.states.entry(index).or_default();
        self.placeholders.remove(&index);
        category
    }

    #[must_use]
    pub fn get(&self, index: i32) -> Option<&Arc<Category>> {
        self.categories.get(&index)
    }

    #[must_use]
    pub fn state(&self, index: i32) -> Option<&CategoryState> {
        self.states.get(&index)
    }

    /// Decode-time path: look `index` up, synthesizing `UnknownType-<index>`
    /// on a miss, and mark it used
    pub fn resolve(&mut self, index: i32) -> Arc<Category> {
        let category = match self.categories.get(&index) {
            Some(category) => Arc::clone(category),
            None => {
                debug!("No category for index {index}, synthesizing placeholder");
                let mut placeholder = Category::placeholder(index);
                placeholder.color = self.allocate_color();
                let category = self.insert(placeholder);
                self.placeholders.insert(index);
                category
            }
        };
        self.mark_used(index);
        category
    }

    /// Construction-time path: adopt an already bound category and mark it
    /// used. Returns the table's shared instance for that index.
    pub fn register(&mut self, category: Arc<Category>) -> Arc<Category> {
        let index = category.index;
        let shared = match self.categories.get(&index) {
            Some(existing) => Arc::clone(existing),
            None if category.name.is_empty() => {
                let mut named = (*category).clone();
                named.name = Category::placeholder_name(index);
                self.insert(named)
            }
            None => {
                self.categories.insert(index, Arc::clone(&category));
                self.states.entry(index).or_default();
                category
            }
        };
        self.mark_used(index);
        shared
    }

    pub fn release(&mut self, index: i32) {
        if let Some(state) = self.states.get_mut(&index) {
            state.used = false;
        }
    }

    /// Round-robin over the categorical palette
    fn allocate_color(&mut self) -> ColorAlpha {
        let color = palette_color(self.next_color);
        self.next_color += 1;
        color
    }

    fn mark_used(&mut self, index: i32) {
        self.states.entry(index).or_default().used = true;
    }

    #[must_use]
    pub fn is_used(&self, index: i32) -> bool {
        self.states.get(&index).is_some_and(|state| state.used)
    }

    /// Indices resolved to synthesized placeholders
    #[must_use]
    pub fn placeholders(&self) -> &BTreeSet<i32> {
        &self.placeholders
    }

    /// Unknown indices count as visible
    #[must_use]
    pub fn is_visible(&self, index: i32) -> bool {
        self.states.get(&index).is_none_or(|state| state.visible)
    }

    #[must_use]
    pub fn is_searchable(&self, index: i32) -> bool {
        self.states.get(&index).is_none_or(|state| state.searchable)
    }

    pub fn set_visible(&mut self, index: i32, visible: bool) {
        self.states.entry(index).or_default().visible = visible;
    }

    pub fn set_searchable(&mut self, index: i32, searchable: bool) {
        self.states.entry(index).or_default().searchable = searchable;
    }

    /// Fold one shadow's weights into the running summaries; `scale` is
    /// the shadow's duration over the whole trace's duration
    pub fn accumulate_summary<'a>(
        &mut self,
        weights: impl IntoIterator<Item = &'a CategoryWeight>,
        scale: f64,
    ) {
        for weight in weights {
            self.states
                .entry(weight.category_index())
                .or_default()
                .summary
                .accumulate(weight, scale);
        }
    }

    /// Real (non-preview) categories, in index order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Category>> {
        self.categories.values().filter(|category| !category.is_shadow_preview())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Categories worth persisting: referenced and not a shadow preview,
    /// with the running summary replacing the stored one once anything
    /// accumulated
    #[must_use]
    pub fn used_categories(&self) -> Vec<Category> {
        self.iter()
            .filter(|category| self.is_used(category.index))
            .map(|category| {
                let mut category = (**category).clone();
                if let Some(state) = self.states.get(&category.index) {
                    if state.summary.num_real_objs > 0 {
                        category.summary = state.summary;
                    }
                }
                category
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::category::default_color;

    fn mpi_send() -> Category {
        Category::new(3, "MPI_Send", Topology::State, default_color("MPI_Send"))
    }

    #[test]
    fn test_unknown_index_resolves_to_one_placeholder() {
        let mut table = CategoryTable::new();
        let first = table.resolve(99);
        let second = table.resolve(99);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "UnknownType-99");
        assert_eq!(first.topology, Topology::State);
        assert!(table.is_used(99));
        assert!(table.placeholders().contains(&99));
    }

    #[test]
    fn test_placeholders_take_successive_palette_colors() {
        let mut table = CategoryTable::new();
        let first = table.resolve(7);
        let second = table.resolve(3);
        let again = table.resolve(7);

        assert_eq!(first.color, palette_color(0));
        assert_eq!(second.color, palette_color(1));
        assert_eq!(again.color, palette_color(0));
        assert_ne!(first.color, second.color);
    }

    #[test]
    fn test_binding_resolves_known_category() {
        let mut table = CategoryTable::new();
        let stored = table.insert(mpi_send());
        assert!(!table.is_used(3));

        let mut binding = CategoryBinding::unbound(3);
        let resolved = binding.resolve(&mut table);
        assert!(Arc::ptr_eq(&stored, &resolved));
        assert!(binding.is_bound());
        assert!(table.is_used(3));
    }

    #[test]
    fn test_register_bound_category_and_release() {
        let mut table = CategoryTable::new();
        let mut binding = CategoryBinding::bound(Arc::new(mpi_send()));
        binding.resolve(&mut table);
        assert!(table.get(3).is_some());
        assert!(table.is_used(3));

        binding.release(&mut table);
        assert!(!binding.is_bound());
        assert!(!table.is_used(3));

        // second pass binds again
        binding.resolve(&mut table);
        assert!(table.is_used(3));
    }

    #[test]
    fn test_register_names_nameless_category() {
        let mut table = CategoryTable::new();
        let nameless = Category::new(5, "", Topology::Event, default_color(""));
        let mut binding = CategoryBinding::bound(Arc::new(nameless));
        let resolved = binding.resolve(&mut table);
        assert_eq!(resolved.name, "UnknownType-5");
        assert_eq!(binding.category().unwrap().name, "UnknownType-5");
    }

    #[test]
    fn test_used_categories_skip_previews_and_unused() {
        let mut table = CategoryTable::new();
        table.insert(mpi_send());
        table.insert(Category::new(4, "MPI_Recv", Topology::State, default_color("MPI_Recv")));
        table.resolve(4);
        table.resolve(Topology::State.shadow_index());

        let used = table.used_categories();
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].name, "MPI_Recv");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_summary_replaces_stored_once_accumulated() {
        let mut table = CategoryTable::new();
        table.insert(mpi_send());
        table.resolve(3);
        let weight = CategoryWeight::new(CategoryBinding::unbound(3), 0.5, 0.5, 2);
        table.accumulate_summary([&weight], 0.5);

        let used = table.used_categories();
        assert_eq!(used[0].summary.num_real_objs, 2);
        assert!((used[0].summary.ratios.inclusive - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_visibility_flags() {
        let mut table = CategoryTable::new();
        table.insert(mpi_send());
        assert!(table.state(3).unwrap().visible);
        table.set_visible(3, false);
        table.set_searchable(3, false);
        assert!(!table.is_visible(3));
        assert!(!table.is_searchable(3));
        assert!(table.is_visible(42));
        assert!(!table.state(3).unwrap().visible);
        assert!(!table.state(3).unwrap().searchable);
    }
}
