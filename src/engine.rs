//! Component K: the engine. Owns the cache of open classes explicitly,
//! rather than hanging it off an interpreter environment or any other
//! ambient global (§9's redesign note).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::class::Class;
use crate::config::{EngineConfig, Usage};
use crate::error::Result;

/// The process-wide entry point: holds configuration and the cache of
/// classes opened through it. Not `Sync` (§5): a single `Engine` is not
/// shared across threads without external synchronization.
pub struct Engine {
    pub config: EngineConfig,
    classes: HashMap<PathBuf, Class>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            classes: HashMap::new(),
        }
    }

    /// Creates a brand-new class file and opens it into the cache.
    pub fn create(&mut self, path: impl AsRef<Path>, num_buckets: u32) -> Result<&mut Class> {
        let path = path.as_ref().to_path_buf();
        if let Some(class) = self.classes.remove(&path) {
            class.close()?;
        }
        let class = Class::create(&path, num_buckets, &self.config)?;
        self.classes.insert(path.clone(), class);
        Ok(self.classes.get_mut(&path).expect("just inserted"))
    }

    /// Opens `path` at `usage`, per §4.6's cache rule: a cache hit at
    /// `usage <= cached usage` reuses the class with its flags cleared; a
    /// miss, or a request for higher usage than cached, closes any stale
    /// entry and reopens.
    #[instrument(skip(self), fields(path = %path.as_ref().display(), usage = ?usage))]
    pub fn open(&mut self, path: impl AsRef<Path>, usage: Usage) -> Result<&mut Class> {
        let path = path.as_ref().to_path_buf();
        let needs_reopen = match self.classes.get(&path) {
            Some(class) => class.usage < usage,
            None => true,
        };

        if needs_reopen {
            if let Some(class) = self.classes.remove(&path) {
                class.close()?;
            }
            let class = Class::open(&path, usage, &self.config)?;
            self.classes.insert(path.clone(), class);
        } else {
            self.classes.get_mut(&path).expect("checked above").clear_flags();
        }

        Ok(self.classes.get_mut(&path).expect("just inserted or reused"))
    }

    /// Closes and removes a single cached class, if present.
    pub fn close(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(class) = self.classes.remove(path.as_ref()) {
            class.close()?;
        }
        Ok(())
    }

    /// Closes every cached class, writing back per its usage/state. Also
    /// run implicitly on drop, mirroring "flushed on process exit" without
    /// relying on a process-exit hook.
    #[instrument(skip(self))]
    pub fn close_all(&mut self) -> Result<()> {
        for (_, class) in self.classes.drain() {
            class.close()?;
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_then_create_puts_class_in_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.osbf");
        let mut engine = Engine::new(EngineConfig::default());
        engine.create(&path, 16).unwrap();
        assert!(engine.classes.contains_key(&path));
    }

    #[test]
    fn reopening_at_same_or_lower_usage_reuses_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.osbf");
        let mut engine = Engine::new(EngineConfig::default());
        engine.create(&path, 16).unwrap();
        engine.open(&path, Usage::ReadOnly).unwrap();
        assert_eq!(engine.classes.len(), 1);
    }
}
