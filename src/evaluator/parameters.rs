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

//! Named parameter map

use std::borrow::Cow;

use indexmap::IndexMap;

use crate::model::Value;

/// Parameter values by name, in insertion order
///
/// When case-insensitive, lookups fold names to lowercase while the
/// original spelling of each name is preserved for iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: IndexMap<String, (String, Value)>,
    ignore_case: bool,
}

impl Parameters {
    /// Create an empty, case-sensitive map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty, case-insensitive map
    pub fn case_insensitive() -> Self {
        Self {
            entries: IndexMap::new(),
            ignore_case: true,
        }
    }

    fn key<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.ignore_case {
            Cow::Owned(name.to_lowercase())
        } else {
            Cow::Borrowed(name)
        }
    }

    /// Whether names are matched case-insensitively
    pub fn is_case_insensitive(&self) -> bool {
        self.ignore_case
    }

    /// Switch case sensitivity, re-keying existing entries
    ///
    /// When entries collide after folding, the later one wins.
    pub fn set_case_insensitive(&mut self, ignore_case: bool) {
        if self.ignore_case == ignore_case {
            return;
        }
        self.ignore_case = ignore_case;
        let entries = std::mem::take(&mut self.entries);
        for (_, (name, value)) in entries {
            let key = self.key(&name).into_owned();
            self.entries.insert(key, (name, value));
        }
    }

    /// Insert or replace a parameter, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let key = self.key(&name).into_owned();
        self.entries
            .insert(key, (name, value.into()))
            .map(|(_, previous)| previous)
    }

    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(self.key(name).as_ref()).map(|(_, value)| value)
    }

    /// Check if a parameter is defined
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(self.key(name).as_ref())
    }

    /// Remove a parameter, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let key = self.key(name);
        self.entries
            .shift_remove(key.as_ref())
            .map(|(_, value)| value)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Parameter names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(name, _)| name.as_str())
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Parameters {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut parameters = Self::new();
        parameters.extend(iter);
        parameters
    }
}
