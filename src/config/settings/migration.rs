// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::{Map, Value};

/// Rewrite keys written by older versions to their current names.
///
/// `providers.<name>.default_model` became `model`, and
/// `resilience.base_delay_ms` became `initial_delay_ms`. A current key always
/// wins over a legacy one.
pub(super) fn migrate_on_load(mut value: Value) -> Value {
    if let Some(providers) = value.get_mut("providers").and_then(Value::as_object_mut) {
        for provider in providers.values_mut() {
            if let Some(provider) = provider.as_object_mut() {
                rename_key(provider, "default_model", "model");
            }
        }
    }
    if let Some(resilience) = value.get_mut("resilience").and_then(Value::as_object_mut) {
        rename_key(resilience, "base_delay_ms", "initial_delay_ms");
    }
    value
}

fn rename_key(object: &mut Map<String, Value>, legacy: &str, current: &str) {
    if let Some(old) = object.remove(legacy) {
        object.entry(current.to_string()).or_insert(old);
    }
}

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is serialized current struct.
/// Overlay values take priority.
pub(super) fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}
