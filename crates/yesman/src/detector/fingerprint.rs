// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable prompt fingerprinting: `hash(kind, skeleton, option_count)`.

use sha2::{Digest, Sha256};

use super::PromptKind;

/// Hash `(kind, skeleton, option_count)` into a stable hex fingerprint. Two
/// prompts with identical inputs always collide; prompts differing in any
/// of the three never collide (modulo hash strength).
pub fn fingerprint(kind: PromptKind, skeleton: &str, option_count: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(skeleton.as_bytes());
    hasher.update([0u8]);
    hasher.update(option_count.to_le_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_collide() {
        let a = fingerprint(PromptKind::YesNo, "do you trust \u{2301}?", 2);
        let b = fingerprint(PromptKind::YesNo, "do you trust \u{2301}?", 2);
        assert_eq!(a, b);
    }

    #[test]
    fn differing_kind_never_collides() {
        let a = fingerprint(PromptKind::YesNo, "continue?", 0);
        let b = fingerprint(PromptKind::Continuation, "continue?", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn differing_option_count_never_collides() {
        let a = fingerprint(PromptKind::NumberedSelection, "pick one", 2);
        let b = fingerprint(PromptKind::NumberedSelection, "pick one", 3);
        assert_ne!(a, b);
    }

    #[test]
    fn differing_skeleton_never_collides() {
        let a = fingerprint(PromptKind::YesNo, "trust this?", 2);
        let b = fingerprint(PromptKind::YesNo, "delete this?", 2);
        assert_ne!(a, b);
    }
}
