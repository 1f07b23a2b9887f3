// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared compilation cache for formula expressions
//!
//! Maps source text to a [`Weak`] reference to its parsed AST. The cache never
//! keeps an AST alive on its own: once every expression using a tree has been
//! dropped the entry is dead, counts as a miss, and is removed by the next
//! pruning sweep (run after each insertion).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rustc_hash::FxHashMap;

use crate::ast::ExpressionNode;
use crate::evaluator::EvaluationResult;
use crate::parser::parse;

/// Shared AST that can be safely cloned across threads
pub type SharedAst = Arc<ExpressionNode>;

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups answered from the cache
    pub hits: u64,
    /// Number of lookups that had to parse
    pub misses: u64,
    /// Number of dead entries removed by pruning
    pub pruned: u64,
    /// Number of entries currently stored, live or dead
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64) / ((self.hits + self.misses) as f64) * 100.0
        }
    }
}

/// Thread-safe cache of parsed expressions keyed by source text
#[derive(Debug)]
pub struct ExpressionCache {
    entries: RwLock<FxHashMap<String, Weak<ExpressionNode>>>,
    enabled: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    pruned: AtomicU64,
}

static GLOBAL_CACHE: Lazy<ExpressionCache> = Lazy::new(ExpressionCache::new);

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionCache {
    /// Create an empty, enabled cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            enabled: AtomicBool::new(true),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            pruned: AtomicU64::new(0),
        }
    }

    /// The process-wide cache
    pub fn global() -> &'static ExpressionCache {
        &GLOBAL_CACHE
    }

    /// Whether lookups and insertions go through the cache
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable caching; disabling empties the cache immediately
    ///
    /// The flag flips under the write lock, so an insertion racing with
    /// `set_enabled(false)` either lands before the clear or is skipped.
    pub fn set_enabled(&self, enabled: bool) {
        let mut entries = self.entries.write();
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            entries.clear();
            log::debug!("Expression cache disabled and cleared");
        }
    }

    /// Look up a live AST for `text`
    pub fn get(&self, text: &str) -> Option<SharedAst> {
        self.entries.read().get(text).and_then(Weak::upgrade)
    }

    /// Parse `text`, going through the cache unless bypassed or disabled
    ///
    /// Parse failures are returned and never cached.
    pub fn compile(&self, text: &str, bypass_cache: bool) -> EvaluationResult<SharedAst> {
        if bypass_cache || !self.is_enabled() {
            return Ok(Arc::new(parse(text)?));
        }

        if let Some(ast) = self.get(text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("Expression cache hit for '{text}'");
            return Ok(ast);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let ast = Arc::new(parse(text)?);
        {
            let mut entries = self.entries.write();
            if !self.is_enabled() {
                return Ok(ast);
            }
            entries.insert(text.to_string(), Arc::downgrade(&ast));
        }
        log::debug!("Expression cache stored '{text}'");

        self.prune();
        Ok(ast)
    }

    /// Remove dead entries, returning how many were removed
    ///
    /// Scans under an upgradable read and only takes the write lock when
    /// something needs removing.
    pub fn prune(&self) -> usize {
        let guard = self.entries.upgradable_read();
        if guard.values().all(|weak| weak.strong_count() > 0) {
            return 0;
        }

        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        let before = guard.len();
        guard.retain(|_, weak| weak.strong_count() > 0);
        let removed = before - guard.len();

        self.pruned.fetch_add(removed as u64, Ordering::Relaxed);
        log::debug!("Expression cache pruned {removed} dead entries");
        removed
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, live or dead
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of entries whose AST is still in use
    pub fn live_entries(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

/// Enable or disable the process-wide cache
pub fn set_cache_enabled(enabled: bool) {
    ExpressionCache::global().set_enabled(enabled);
}

/// Whether the process-wide cache is enabled
pub fn is_cache_enabled() -> bool {
    ExpressionCache::global().is_enabled()
}
