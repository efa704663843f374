// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Attribute extraction from a log batch.
//!
//! Each record resolves the tracked attribute hierarchically: a record-level
//! value beats a scope-level value, which beats a resource-level value.
//!
//! ```text
//!   Resource  { attr = "v1" }      default for everything below
//!     Scope   { attr = "v2" }      overrides the resource
//!       Record                     -> "v2"
//!       Record { attr = "v3" }     -> "v3"
//! ```
//!
//! Records without a body, or where no level carries the attribute, yield
//! nothing.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::model::{Batch, KeyValue, LogRecord};
use crate::stringify::stringify_value;

/// Canonical text form of an attribute value.
pub type AttributeValue = String;

/// SHA-256 of a record's stringified body.
///
/// Counting is done over distinct identities so that a batch delivered twice
/// does not inflate any count.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageIdentity([u8; 32]);

impl MessageIdentity {
    #[must_use]
    pub fn of_body(body: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for MessageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first eight bytes are plenty to tell identities apart in logs
        write!(f, "MessageIdentity(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// A resolved attribute value paired with the identity of its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub value: AttributeValue,
    pub identity: MessageIdentity,
}

/// Lazily walks `batch` and yields one [`Occurrence`] per record that has a
/// non-empty body and a resolvable `attribute_name`.
pub fn extract<'a>(
    batch: &'a Batch,
    attribute_name: &'a str,
) -> impl Iterator<Item = Occurrence> + 'a {
    batch.resource_logs.iter().flat_map(move |resource_logs| {
        let resource_attr = resource_logs
            .resource
            .as_ref()
            .and_then(|resource| find_attribute(&resource.attributes, attribute_name));

        resource_logs.scope_logs.iter().flat_map(move |scope_logs| {
            let scope_attr = scope_logs
                .scope
                .as_ref()
                .and_then(|scope| find_attribute(&scope.attributes, attribute_name))
                .or(resource_attr);

            scope_logs
                .log_records
                .iter()
                .filter_map(move |record| resolve_record(record, attribute_name, scope_attr))
        })
    })
}

fn find_attribute<'a>(attributes: &'a [KeyValue], attribute_name: &str) -> Option<&'a KeyValue> {
    attributes.iter().find(|kv| kv.key == attribute_name)
}

fn resolve_record(
    record: &LogRecord,
    attribute_name: &str,
    inherited: Option<&KeyValue>,
) -> Option<Occurrence> {
    let attr = find_attribute(&record.attributes, attribute_name).or(inherited)?;

    let body = stringify_value(record.body.as_ref());
    if body.is_empty() {
        return None;
    }

    Some(Occurrence {
        value: stringify_value(attr.value.as_ref()),
        identity: MessageIdentity::of_body(&body),
    })
}
