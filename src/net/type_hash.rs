use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::telemetry::logging;

const HASH_SEED: u32 = 5381;
pub const DEFAULT_REGISTRY_CAPACITY: usize = 4096;

/// Legacy client type hash.
///
/// ASCII `A`-`Z` fold to lowercase; every step is `c + 32 * result` with
/// 32-bit wraparound. The empty name hashes to 0 and no other name may, so a
/// non-empty name that lands on 0 reports 1.
pub fn type_hash(name: &str) -> u32 {
    if name.is_empty() {
        return 0;
    }
    let mut result = HASH_SEED;
    for ch in name.chars() {
        let mut c = ch as u32;
        if ch.is_ascii_uppercase() {
            c += 32;
        }
        result = c.wrapping_add(result.wrapping_mul(32));
    }
    if result == 0 {
        1
    } else {
        result
    }
}

struct RegistryInner {
    by_name: LruCache<String, u32>,
    by_hash: LruCache<u32, String>,
}

/// Memoised `type_hash` with a reverse index for names it has seen, so
/// hashed identifiers coming off the wire can be rendered in logs.
pub struct TypeHashRegistry {
    inner: Mutex<RegistryInner>,
}

impl TypeHashRegistry {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(RegistryInner {
                by_name: LruCache::new(capacity),
                by_hash: LruCache::new(capacity),
            }),
        }
    }

    pub fn with_names<'a>(capacity: usize, names: impl IntoIterator<Item = &'a str>) -> Self {
        let registry = Self::new(capacity);
        for name in names {
            registry.hash(name);
        }
        registry
    }

    pub fn hash(&self, name: &str) -> u32 {
        let key = name.to_ascii_lowercase();
        let mut inner = self.inner.lock();
        if let Some(hash) = inner.by_name.get(&key) {
            return *hash;
        }
        let hash = type_hash(name);
        if logging::options().log_hashes {
            tracing::trace!("type hash {hash:08x} {name}");
        }
        inner.by_name.put(key, hash);
        inner.by_hash.put(hash, name.to_string());
        hash
    }

    pub fn name_for(&self, hash: u32) -> Option<String> {
        self.inner.lock().by_hash.get(&hash).cloned()
    }

    /// `name_for`, falling back to the hex form of the hash.
    pub fn describe(&self, hash: u32) -> String {
        self.name_for(hash).unwrap_or_else(|| format!("#{hash:08x}"))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeHashRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_CAPACITY)
    }
}

impl std::fmt::Debug for TypeHashRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHashRegistry")
            .field("names", &self.len())
            .finish()
    }
}
