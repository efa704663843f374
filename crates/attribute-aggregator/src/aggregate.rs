// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Attribute value → distinct message identity sets.
//!
//! The same type backs both the per-worker local aggregate and the
//! reconciler's windowed aggregate. It is always owned by exactly one task
//! and moves by value between them.

use std::collections::BTreeMap;

use fnv::FnvBuildHasher;
use hashbrown::{HashMap, HashSet};

use crate::extractor::{AttributeValue, MessageIdentity, Occurrence};

type IdentitySet = HashSet<MessageIdentity, FnvBuildHasher>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeAggregate {
    values: HashMap<AttributeValue, IdentitySet, FnvBuildHasher>,
}

impl AttributeAggregate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence. Returns `true` when the identity was new for
    /// that value.
    pub fn insert(&mut self, occurrence: Occurrence) -> bool {
        if let Some(identities) = self.values.get_mut(occurrence.value.as_str()) {
            return identities.insert(occurrence.identity);
        }

        let mut identities = IdentitySet::default();
        identities.insert(occurrence.identity);
        self.values.insert(occurrence.value, identities);
        true
    }

    pub fn extend(&mut self, occurrences: impl IntoIterator<Item = Occurrence>) {
        for occurrence in occurrences {
            self.insert(occurrence);
        }
    }

    /// Set union per attribute value. A message reported by several partial
    /// aggregates is counted once.
    pub fn merge(&mut self, other: AttributeAggregate) {
        if self.values.is_empty() {
            self.values = other.values;
            return;
        }

        for (value, identities) in other.values {
            match self.values.get_mut(value.as_str()) {
                Some(existing) => existing.extend(identities),
                None => {
                    self.values.insert(value, identities);
                }
            }
        }
    }

    /// Distinct message count for `value`, zero when it was never seen.
    #[must_use]
    pub fn count(&self, value: &str) -> usize {
        self.values.get(value).map_or(0, HashSet::len)
    }

    /// Snapshot of every count, ordered by attribute value.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<AttributeValue, usize> {
        self.values
            .iter()
            .map(|(value, identities)| (value.clone(), identities.len()))
            .collect()
    }

    /// Number of distinct attribute values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
