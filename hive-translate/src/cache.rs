//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::any::Any;
use std::collections::HashMap;

use crate::debug::Debug;

/// Transaction-scoped store for the results of expensive device calls.
///
/// A new cache is created for every read or write transaction and dropped
/// when the transaction ends. Nothing stored here is ever persisted.
#[derive(Default)]
pub struct ModificationCache {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

// ===== impl ModificationCache =====

impl ModificationCache {
    pub fn new() -> ModificationCache {
        ModificationCache::default()
    }

    // Returns the value stored under `key`, if it exists and has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref::<T>()
    }

    pub fn put<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(key.into(), Box::new(value));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // Returns a copy of the value cached under `key`, running `dump` to
    // produce it on the first request.
    //
    // Failed dumps are not cached, so a later request retries the call.
    pub async fn get_or_dump<T, E, F, Fut>(
        &mut self,
        key: &str,
        dump: F,
    ) -> Result<T, E>
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key) {
            Debug::CacheHit(key).log();
            return Ok(value.clone());
        }

        Debug::CacheMiss(key).log();
        let value = dump().await?;
        self.put(key, value.clone());
        Ok(value)
    }
}

impl std::fmt::Debug for ModificationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn typed_access() {
        let mut cache = ModificationCache::new();
        cache.put("interfaces", vec![1u32, 2, 3]);

        assert!(cache.contains("interfaces"));
        assert_eq!(cache.get::<Vec<u32>>("interfaces"), Some(&vec![1, 2, 3]));
        assert_eq!(cache.get::<String>("interfaces"), None);
        assert_eq!(cache.get::<Vec<u32>>("bridge-domains"), None);

        assert!(cache.remove("interfaces"));
        assert!(!cache.remove("interfaces"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn dump_once() {
        let mut cache = ModificationCache::new();
        let calls = Cell::new(0);
        let counter = &calls;
        let dump = move || async move {
            counter.set(counter.get() + 1);
            Ok::<_, ()>(vec!["eth0".to_owned()])
        };

        let first = cache.get_or_dump("dump", dump).await.unwrap();
        let second = cache.get_or_dump("dump", dump).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn errors_not_cached() {
        let mut cache = ModificationCache::new();
        let result = cache
            .get_or_dump("dump", || async { Err::<u32, _>("timeout") })
            .await;
        assert_eq!(result, Err("timeout"));
        assert!(!cache.contains("dump"));

        let result = cache
            .get_or_dump("dump", || async { Ok::<u32, &str>(7) })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(cache.get::<u32>("dump"), Some(&7));
    }
}
