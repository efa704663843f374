// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Canonical text form of attribute and body values.

use crate::model::AnyValue;

/// Placeholder emitted for array values.
pub const ARRAY_PLACEHOLDER: &str = "[array]";

/// Placeholder emitted for key/value list values.
pub const KVLIST_PLACEHOLDER: &str = "[kvlist]";

/// Converts a value into the string used as its aggregation key.
///
/// The conversion never fails: composite values collapse to a fixed
/// placeholder so one unsupported attribute cannot abort a whole batch, and
/// an absent value becomes the empty string.
///
/// # Examples
///
/// ```
/// use attribute_aggregator::model::AnyValue;
/// use attribute_aggregator::stringify::stringify_value;
///
/// assert_eq!(stringify_value(Some(&AnyValue::BoolValue(true))), "true");
/// assert_eq!(stringify_value(Some(&AnyValue::DoubleValue(0.5))), "0.500000");
/// assert_eq!(stringify_value(None), "");
/// ```
#[must_use]
pub fn stringify_value(value: Option<&AnyValue>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    match value {
        AnyValue::StringValue(s) => s.clone(),
        AnyValue::BoolValue(true) => "true".to_string(),
        AnyValue::BoolValue(false) => "false".to_string(),
        AnyValue::IntValue(i) => i.to_string(),
        AnyValue::DoubleValue(d) => format!("{d:.6}"),
        AnyValue::BytesValue(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        AnyValue::ArrayValue(_) => ARRAY_PLACEHOLDER.to_string(),
        AnyValue::KvlistValue(_) => KVLIST_PLACEHOLDER.to_string(),
    }
}
