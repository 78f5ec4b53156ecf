//! Append-only table of category groups and their enabled flags.
//!
//! Every instrumented call site resolves its category group once and
//! then reads a single atomic byte per call. The table is bounded; once
//! it is full, new names alias a reserved entry that stays enabled for
//! recording so the exhaustion is visible in captured output.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use skein_core::{CategoryFlags, CategoryIndex};

/// Name of the default category for top-level work.
pub const TOPLEVEL_CATEGORY: &str = "toplevel";

/// Name of the entry that overflowing category groups alias.
pub const CATEGORIES_EXHAUSTED: &str =
    "tracing categories exhausted; must increase max_category_groups";

/// Name of the category metadata events are recorded under.
pub const METADATA_CATEGORY: &str = "__metadata";

/// Built-in entries, in index order.
pub const BUILTIN_CATEGORIES: [&str; 3] = [TOPLEVEL_CATEGORY, CATEGORIES_EXHAUSTED, METADATA_CATEGORY];

/// Index of [`CATEGORIES_EXHAUSTED`].
pub const EXHAUSTED_INDEX: CategoryIndex = CategoryIndex(1);

/// Index of [`METADATA_CATEGORY`].
pub const METADATA_INDEX: CategoryIndex = CategoryIndex(2);

struct CategoryEntry {
    name: OnceLock<Box<str>>,
    flags: AtomicU8,
    index: CategoryIndex,
}

impl CategoryEntry {
    fn name(&self) -> &str {
        self.name.get().map(|n| &**n).unwrap_or("")
    }
}

/// A resolved category group.
///
/// Cheap to copy. Call sites typically resolve once and keep the
/// reference for the lifetime of the log.
#[derive(Clone, Copy)]
pub struct CategoryRef<'a> {
    entry: &'a CategoryEntry,
}

impl<'a> CategoryRef<'a> {
    /// Current enabled flags.
    ///
    /// May briefly report a stale value after a session changes.
    #[inline]
    pub fn flags(&self) -> CategoryFlags {
        CategoryFlags::from_bits(self.entry.flags.load(Ordering::Acquire))
    }

    /// Whether any consumer is interested.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.flags().is_any()
    }

    /// The category group name.
    pub fn name(&self) -> &'a str {
        self.entry.name()
    }

    /// Stable registry index.
    pub fn index(&self) -> CategoryIndex {
        self.entry.index
    }
}

impl std::fmt::Debug for CategoryRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryRef")
            .field("name", &self.name())
            .field("index", &self.index())
            .field("flags", &self.flags())
            .finish()
    }
}

/// Bounded, append-only category table.
///
/// Lookups scan the published prefix without locking. Appends happen
/// under an internal lock and publish the new entry by bumping the
/// count with release ordering.
pub struct CategoryRegistry {
    entries: Box<[CategoryEntry]>,
    count: AtomicUsize,
    write: Mutex<()>,
    exhausted_warned: AtomicBool,
}

// Compile-time assertion: CategoryRegistry must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<CategoryRegistry>();
};

impl CategoryRegistry {
    /// Largest capacity a 16-bit [`CategoryIndex`] can address.
    pub const MAX_CAPACITY: usize = u16::MAX as usize + 1;

    /// Create a registry holding the built-in entries.
    ///
    /// `capacity` is clamped between the number of built-ins and
    /// [`MAX_CAPACITY`](Self::MAX_CAPACITY).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(BUILTIN_CATEGORIES.len(), Self::MAX_CAPACITY);
        let entries: Box<[CategoryEntry]> = (0..capacity)
            .map(|i| CategoryEntry {
                name: OnceLock::new(),
                flags: AtomicU8::new(0),
                index: CategoryIndex(i as u16),
            })
            .collect();
        for (entry, name) in entries.iter().zip(BUILTIN_CATEGORIES) {
            let _ = entry.name.set(name.into());
        }
        entries[EXHAUSTED_INDEX.0 as usize]
            .flags
            .store(CategoryFlags::RECORDING.bits(), Ordering::Release);
        Self {
            entries,
            count: AtomicUsize::new(BUILTIN_CATEGORIES.len()),
            write: Mutex::new(()),
            exhausted_warned: AtomicBool::new(false),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether only the built-in entries exist.
    pub fn is_empty(&self) -> bool {
        self.len() <= BUILTIN_CATEGORIES.len()
    }

    /// Look `name` up without creating it.
    pub fn get(&self, name: &str) -> Option<CategoryRef<'_>> {
        let published = self.count.load(Ordering::Acquire);
        self.entries[..published]
            .iter()
            .find(|e| e.name() == name)
            .map(|entry| CategoryRef { entry })
    }

    /// Look `name` up, appending it with flags from `compute` if absent.
    ///
    /// When the table is full the reserved exhausted entry is returned.
    pub fn get_or_create(
        &self,
        name: &str,
        compute: impl FnOnce(&str) -> CategoryFlags,
    ) -> CategoryRef<'_> {
        if let Some(found) = self.get(name) {
            return found;
        }

        let _write = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let published = self.count.load(Ordering::Acquire);
        if let Some(found) = self.entries[..published]
            .iter()
            .find(|e| e.name() == name)
        {
            return CategoryRef { entry: found };
        }

        let Some(entry) = self.entries.get(published) else {
            if !self.exhausted_warned.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    capacity = self.entries.len(),
                    category = name,
                    "category registry exhausted; further new categories alias the exhausted entry"
                );
            }
            return CategoryRef {
                entry: &self.entries[EXHAUSTED_INDEX.0 as usize],
            };
        };

        let _ = entry.name.set(name.into());
        entry.flags.store(compute(name).bits(), Ordering::Release);
        self.count.store(published + 1, Ordering::Release);
        CategoryRef { entry }
    }

    /// Resolve an index to its entry.
    pub fn by_index(&self, index: CategoryIndex) -> Option<CategoryRef<'_>> {
        let published = self.count.load(Ordering::Acquire);
        self.entries[..published]
            .get(index.0 as usize)
            .map(|entry| CategoryRef { entry })
    }

    /// Resolve an index to its name.
    pub fn name(&self, index: CategoryIndex) -> Option<&str> {
        self.by_index(index).map(|c| c.name())
    }

    /// Recompute every published entry's flags.
    ///
    /// The exhausted entry always keeps [`CategoryFlags::RECORDING`].
    pub fn recompute_all(&self, compute: impl Fn(&str) -> CategoryFlags) {
        let _write = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let published = self.count.load(Ordering::Acquire);
        for entry in &self.entries[..published] {
            let mut flags = compute(entry.name());
            if entry.index == EXHAUSTED_INDEX {
                flags |= CategoryFlags::RECORDING;
            }
            entry.flags.store(flags.bits(), Ordering::Release);
        }
    }

    /// Published entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = CategoryRef<'_>> {
        let published = self.count.load(Ordering::Acquire);
        self.entries[..published]
            .iter()
            .map(|entry| CategoryRef { entry })
    }
}

impl std::fmt::Debug for CategoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryRegistry")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn none(_: &str) -> CategoryFlags {
        CategoryFlags::NONE
    }

    #[test]
    fn builtins_are_present() {
        let reg = CategoryRegistry::new(8);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.name(CategoryIndex(0)), Some(TOPLEVEL_CATEGORY));
        assert_eq!(reg.name(EXHAUSTED_INDEX), Some(CATEGORIES_EXHAUSTED));
        assert_eq!(reg.name(METADATA_INDEX), Some(METADATA_CATEGORY));
        assert!(reg.by_index(EXHAUSTED_INDEX).unwrap().flags().contains(CategoryFlags::RECORDING));
    }

    #[test]
    fn capacity_is_clamped_to_index_range() {
        assert_eq!(CategoryRegistry::new(0).capacity(), 3);
        let reg = CategoryRegistry::new(1 << 20);
        assert_eq!(reg.capacity(), CategoryRegistry::MAX_CAPACITY);
        assert_eq!(reg.get_or_create("first", none).index(), CategoryIndex(3));
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let reg = CategoryRegistry::new(8);
        let a = reg.get_or_create("gpu", none);
        let b = reg.get_or_create("gpu", |_| CategoryFlags::RECORDING);
        assert_eq!(a.index(), b.index());
        assert_eq!(reg.len(), 4);
        // Flags were computed once, at creation.
        assert!(!b.is_enabled());
    }

    #[test]
    fn exhaustion_aliases_reserved_entry() {
        let reg = CategoryRegistry::new(4);
        let first = reg.get_or_create("a", none);
        assert_eq!(first.index(), CategoryIndex(3));
        let overflow = reg.get_or_create("b", none);
        assert_eq!(overflow.index(), EXHAUSTED_INDEX);
        assert!(overflow.flags().contains(CategoryFlags::RECORDING));
        assert_eq!(reg.len(), 4);
        assert!(reg.get("b").is_none());
    }

    #[test]
    fn recompute_updates_published_entries() {
        let reg = CategoryRegistry::new(8);
        let gpu = reg.get_or_create("gpu", none);
        reg.recompute_all(|name| {
            if name == "gpu" {
                CategoryFlags::MONITORING
            } else {
                CategoryFlags::NONE
            }
        });
        assert_eq!(gpu.flags(), CategoryFlags::MONITORING);
        assert!(reg.by_index(EXHAUSTED_INDEX).unwrap().flags().contains(CategoryFlags::RECORDING));
        assert!(!reg.by_index(CategoryIndex(0)).unwrap().is_enabled());
    }

    #[test]
    fn concurrent_creation_yields_one_entry_per_name() {
        let reg = Arc::new(CategoryRegistry::new(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    (0..20)
                        .map(|i| {
                            let name = format!("cat{}", (i + t) % 20);
                            reg.get_or_create(&name, none).index()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.len(), 3 + 20);
        let names: std::collections::HashSet<_> = reg.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names.len(), reg.len());
    }
}
