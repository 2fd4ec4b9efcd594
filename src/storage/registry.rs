use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{error, info};

use super::collection::{MemoryCollection, StudentCollection};
use crate::cohort::Cohort;

type CollectionFactory = dyn Fn(Cohort) -> Arc<dyn StudentCollection> + Send + Sync;

/// Fixed table of the four cohort collections.
///
/// Each slot is opened on first use and then kept for the lifetime of the registry.
/// Concurrent first use of a slot runs the factory once; every caller gets the same
/// handle.
pub struct PartitionRegistry {
    factory: Box<CollectionFactory>,
    slots: [OnceCell<Arc<dyn StudentCollection>>; Cohort::COUNT],
}

impl PartitionRegistry {
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(Cohort) -> Arc<dyn StudentCollection> + Send + Sync + 'static,
    {
        Self { factory: Box::new(factory), slots: Default::default() }
    }

    /// Collections live only in memory.
    pub fn in_memory() -> Self {
        Self::with_factory(|cohort| Arc::new(MemoryCollection::new(cohort.collection_name())))
    }

    /// Collections snapshot under `root/<collection name>/`.
    ///
    /// A snapshot that cannot be read leaves that cohort empty and refusing writes, so
    /// the unreadable file is never overwritten and no write is silently lost.
    pub fn persistent(root: impl AsRef<Path>) -> Self {
        let root: PathBuf = root.as_ref().to_path_buf();
        Self::with_factory(move |cohort| {
            let name = cohort.collection_name();
            match MemoryCollection::open(&root, &name) {
                Ok(c) => Arc::new(c),
                Err(e) => {
                    error!(collection = %name, "failed to load snapshot, collection is read-only until it is repaired: {e}");
                    Arc::new(MemoryCollection::unavailable(name))
                }
            }
        })
    }

    /// Handle for `cohort`'s collection.
    pub fn resolve(&self, cohort: Cohort) -> Arc<dyn StudentCollection> {
        self.slots[cohort.index()]
            .get_or_init(|| {
                let handle = (self.factory)(cohort);
                info!(cohort = %cohort, collection = handle.name(), "partition opened");
                handle
            })
            .clone()
    }

    /// Number of slots opened so far.
    pub fn opened(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}

impl std::fmt::Debug for PartitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionRegistry").field("opened", &self.opened()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn resolve_is_lazy_and_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c2 = calls.clone();
        let reg = PartitionRegistry::with_factory(move |cohort| {
            c2.fetch_add(1, Ordering::SeqCst);
            Arc::new(MemoryCollection::new(cohort.collection_name()))
        });
        assert_eq!(reg.opened(), 0);
        let a = reg.resolve(Cohort::SecondYear);
        let b = reg.resolve(Cohort::SecondYear);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "students_year2");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(reg.opened(), 1);
    }

    #[test]
    fn concurrent_first_use_yields_one_handle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c2 = calls.clone();
        let reg = Arc::new(PartitionRegistry::with_factory(move |cohort| {
            c2.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            Arc::new(MemoryCollection::new(cohort.collection_name()))
        }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || reg.resolve(Cohort::ThirdYear))
            })
            .collect();
        let got: Vec<Arc<dyn StudentCollection>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for h in &got[1..] { assert!(Arc::ptr_eq(&got[0], h)); }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn each_cohort_gets_its_own_collection() {
        let reg = PartitionRegistry::in_memory();
        let names: Vec<String> = Cohort::ALL.iter().map(|c| reg.resolve(*c).name().to_string()).collect();
        assert_eq!(names, vec!["students_year1", "students_year2", "students_year3", "students_year4"]);
        assert!(!Arc::ptr_eq(&reg.resolve(Cohort::FirstYear), &reg.resolve(Cohort::FourthYear)));
    }
}
