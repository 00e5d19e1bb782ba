use rustc_hash::FxHashSet;

/// Suppresses new fetches while any key holds it.
///
/// The traversal keeps running; only requests are withheld. Used while the
/// camera is still in motion so the loader is not flooded with tiles that
/// are abandoned a few frames later.
#[derive(Clone, Debug, Default)]
pub struct LoadLock {
    keys: FxHashSet<u64>,
}

impl LoadLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&mut self, key: u64) {
        self.keys.insert(key);
    }

    pub fn free(&mut self, key: u64) {
        self.keys.remove(&key);
    }

    pub fn free_all(&mut self) {
        self.keys.clear();
    }

    pub fn is_locked(&self) -> bool {
        !self.keys.is_empty()
    }
}
