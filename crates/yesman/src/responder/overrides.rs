// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-pinned overrides (§4.4 step 1, §4.7 `Set override`).

use std::collections::HashMap;
use std::sync::Mutex;

use super::ContextKey;

#[derive(Debug, Clone)]
struct OverrideEntry {
    response: String,
    one_shot: bool,
}

/// Pinned, per-`(context, fingerprint)` responses set by a human through the
/// control plane. One-shot overrides are consumed (removed) after their
/// first use; sticky overrides (`one_shot = false`) apply every time the
/// fingerprint recurs until replaced or explicitly cleared.
#[derive(Default)]
pub struct OverrideRegistry {
    entries: Mutex<HashMap<(String, String, String), OverrideEntry>>,
}

fn key(ctx: &ContextKey, fingerprint: &str) -> (String, String, String) {
    (ctx.project.clone(), ctx.session.clone(), fingerprint.to_owned())
}

impl OverrideRegistry {
    /// Pin `response` for `fingerprint` within `ctx`, replacing any existing
    /// override for the same key.
    pub fn set(&self, ctx: &ContextKey, fingerprint: &str, response: String, one_shot: bool) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key(ctx, fingerprint), OverrideEntry { response, one_shot });
    }

    /// Remove a pinned override without consuming it as a decision.
    pub fn clear(&self, ctx: &ContextKey, fingerprint: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&key(ctx, fingerprint)).is_some()
    }

    /// Consult and, if one-shot, consume the override for `(ctx, fingerprint)`.
    pub fn take(&self, ctx: &ContextKey, fingerprint: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let k = key(ctx, fingerprint);
        let entry = entries.get(&k)?.clone();
        if entry.one_shot {
            entries.remove(&k);
        }
        Some(entry.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_override_applies_once_then_falls_through() {
        let registry = OverrideRegistry::default();
        let ctx = ContextKey::new("proj", "s1");
        registry.set(&ctx, "fp1", "3".to_string(), true);

        assert_eq!(registry.take(&ctx, "fp1"), Some("3".to_string()));
        assert_eq!(registry.take(&ctx, "fp1"), None);
    }

    #[test]
    fn sticky_override_applies_repeatedly() {
        let registry = OverrideRegistry::default();
        let ctx = ContextKey::new("proj", "s1");
        registry.set(&ctx, "fp1", "y".to_string(), false);

        assert_eq!(registry.take(&ctx, "fp1"), Some("y".to_string()));
        assert_eq!(registry.take(&ctx, "fp1"), Some("y".to_string()));
    }

    #[test]
    fn overrides_are_scoped_per_context() {
        let registry = OverrideRegistry::default();
        registry.set(&ContextKey::new("proj", "s1"), "fp1", "a".to_string(), false);
        assert_eq!(registry.take(&ContextKey::new("proj", "s2"), "fp1"), None);
    }

    #[test]
    fn clear_removes_without_consuming_as_decision() {
        let registry = OverrideRegistry::default();
        let ctx = ContextKey::new("proj", "s1");
        registry.set(&ctx, "fp1", "y".to_string(), false);
        assert!(registry.clear(&ctx, "fp1"));
        assert_eq!(registry.take(&ctx, "fp1"), None);
    }
}
