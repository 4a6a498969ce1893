//! Spread property merging.
//!
//! With spreads, a child's properties are the shallow merge of an ordered
//! list of levels: each spread object, and each named attribute as a
//! one-key object. Later levels override earlier ones.

use crate::runtime::{Props, Value};

/// Convert an evaluated spread source into a level. Non-objects contribute
/// nothing.
pub fn level_from(value: Value) -> Props {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => Props::new(),
        other => {
            tracing::warn!(value = %other, "spread source is not an object");
            Props::new()
        }
    }
}

/// Merge levels left to right into initial properties.
pub fn merge(levels: &[Props]) -> Props {
    let mut props = Props::new();
    for level in levels {
        for (key, value) in level {
            props.insert(key.clone(), value.clone());
        }
    }
    props
}

/// Compute the patch caused by replacing some levels.
///
/// `updates[i]` is the recomputed level `i`, or `None` if it was not
/// recomputed. Walking from the last level back, the first level to mention
/// a key decides its value. A key that a recomputed level dropped falls back
/// to the last remaining level supplying it, or null if none does.
/// Recomputed levels are stored back into `levels`.
pub fn spread_update(levels: &mut [Props], updates: Vec<Option<Props>>) -> Props {
    debug_assert_eq!(levels.len(), updates.len());

    let mut update = Props::new();
    let mut to_null_out: Vec<String> = Vec::new();
    let mut accounted_for = std::collections::HashSet::new();

    for (level, fresh) in levels.iter_mut().zip(updates).rev() {
        match fresh {
            Some(fresh) => {
                for key in level.keys() {
                    if !fresh.contains_key(key) {
                        to_null_out.push(key.clone());
                    }
                }
                for (key, value) in &fresh {
                    if accounted_for.insert(key.clone()) {
                        update.insert(key.clone(), value.clone());
                    }
                }
                *level = fresh;
            }
            None => {
                for key in level.keys() {
                    accounted_for.insert(key.clone());
                }
            }
        }
    }

    for key in to_null_out {
        if update.contains_key(&key) {
            continue;
        }
        let fallback = levels
            .iter()
            .rev()
            .find_map(|level| level.get(&key).cloned())
            .unwrap_or(Value::Null);
        update.insert(key, fallback);
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Props {
        level_from(value)
    }

    #[test]
    fn merge_prefers_later_levels() {
        let merged = merge(&[props(json!({ "a": 1, "b": 1 })), props(json!({ "b": 2 }))]);
        assert_eq!(merged, props(json!({ "a": 1, "b": 2 })));
    }

    #[test]
    fn untouched_later_level_shadows_recomputed_key() {
        let mut levels = vec![props(json!({ "a": 1, "b": 1 })), props(json!({ "b": 2 }))];
        let update = spread_update(&mut levels, vec![Some(props(json!({ "a": 5, "b": 5 }))), None]);

        assert_eq!(update, props(json!({ "a": 5 })));
        assert_eq!(levels[0], props(json!({ "a": 5, "b": 5 })));
    }

    #[test]
    fn dropped_keys_are_nulled() {
        let mut levels = vec![props(json!({ "a": 1, "gone": true }))];
        let update = spread_update(&mut levels, vec![Some(props(json!({ "a": 1 })))]);

        assert_eq!(update, props(json!({ "a": 1, "gone": null })));
    }

    #[test]
    fn dropped_key_falls_back_to_earlier_level() {
        let mut levels = vec![props(json!({ "x": 1 })), props(json!({ "x": 2 }))];
        let update = spread_update(&mut levels, vec![None, Some(Props::new())]);

        assert_eq!(update, props(json!({ "x": 1 })));
    }
}
