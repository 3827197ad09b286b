/* This file is part of the MeTube project - https://github.com/mini-bomba/MeTube
*
*  Copyright (C) 2024-2025 mini_bomba
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Raw string-keyed storage backing a [`LocalCache`].
///
/// Writes are best-effort; a backend must never panic on a failed write.
pub trait CacheBackend {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory backend, used natively and in tests
#[derive(Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<String, String>>,
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.borrow_mut().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// `window.localStorage` backend
#[cfg(target_arch = "wasm32")]
pub struct WebStorageCache {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl WebStorageCache {
    /// Returns `None` when localStorage is unavailable (sandboxed iframes etc.)
    pub fn new() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok()??;
        Some(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl CacheBackend for WebStorageCache {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(err) = self.storage.set_item(key, value) {
            warn!("Failed to persist localStorage key {key}: {err:?}");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.storage.remove_item(key) {
            warn!("Failed to remove localStorage key {key}: {err:?}");
        }
    }
}

/// JSON-serializing wrapper over a [`CacheBackend`], one value per key.
///
/// Reads never fail: a missing or unparseable entry yields the default and
/// gets overwritten by the next write.
#[derive(Clone)]
pub struct LocalCache {
    backend: Rc<dyn CacheBackend>,
}

impl LocalCache {
    pub fn new(backend: Rc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Rc::new(MemoryCache::default()))
    }

    /// Cache backed by the browser's localStorage, or an in-memory fallback
    /// when localStorage is unavailable
    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Self {
        match WebStorageCache::new() {
            Some(backend) => Self::new(Rc::new(backend)),
            None => {
                warn!("localStorage is unavailable, falling back to in-memory cache");
                Self::in_memory()
            }
        }
    }

    pub fn read<T>(&self, key: &str) -> T
    where T: DeserializeOwned + Default
    {
        self.read_opt(key).unwrap_or_default()
    }

    pub fn read_opt<T>(&self, key: &str) -> Option<T>
    where T: DeserializeOwned
    {
        let raw = self.backend.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Discarding unparseable cache entry under {key}: {err}");
                None
            }
        }
    }

    pub fn write<T>(&self, key: &str, value: &T)
    where T: Serialize
    {
        match serde_json::to_string(value) {
            Ok(raw) => self.backend.set(key, &raw),
            Err(err) => warn!("Failed to serialize cache entry under {key}: {err}"),
        }
    }

    pub fn remove(&self, key: &str) {
        self.backend.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_yields_default() {
        let cache = LocalCache::in_memory();
        let items: Vec<String> = cache.read("nothing-here");
        assert!(items.is_empty());
    }

    #[test]
    fn corrupt_entry_yields_default() {
        let backend = Rc::new(MemoryCache::default());
        backend.set("broken", "{not json");
        let cache = LocalCache::new(backend);
        let items: Vec<String> = cache.read("broken");
        assert!(items.is_empty());
    }

    #[test]
    fn write_read_round_trip() {
        let cache = LocalCache::in_memory();
        cache.write("list", &vec!["a".to_owned(), "b".to_owned()]);
        let items: Vec<String> = cache.read("list");
        assert_eq!(items, vec!["a".to_owned(), "b".to_owned()]);
        cache.remove("list");
        assert!(cache.read_opt::<Vec<String>>("list").is_none());
    }
}
