use std::collections::HashSet;

use tracing::{debug, warn};

use crate::keycodes::{KeycodeTable, Platform};
use crate::types::{ShortcutBinding, ShortcutKind};

/// Outcome of validating a candidate binding. Warnings accept the binding
/// but surface a usability hazard to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcutValidation {
    Accepted,
    AcceptedWithWarning(String),
    Rejected(String),
}

impl ShortcutValidation {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, ShortcutValidation::Rejected(_))
    }
}

/// Holds the accepted bindings and enforces the validation rules, in order:
/// key count, duplicates, reserved combinations, modifier requirement,
/// same-modifier pairs (Windows), and subset shadowing.
pub struct ShortcutRegistry {
    platform: Platform,
    table: &'static dyn KeycodeTable,
    bindings: Vec<ShortcutBinding>,
}

impl ShortcutRegistry {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            table: platform.keycode_table(),
            bindings: Vec::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn bindings(&self) -> &[ShortcutBinding] {
        &self.bindings
    }

    /// Validate and, if accepted, store the binding.
    pub fn register(&mut self, binding: ShortcutBinding) -> ShortcutValidation {
        let verdict = self.validate(&binding);
        match &verdict {
            ShortcutValidation::Rejected(reason) => {
                warn!(keys = ?binding.keys, %reason, "shortcut rejected");
            }
            ShortcutValidation::AcceptedWithWarning(warning) => {
                warn!(keys = ?binding.keys, %warning, "shortcut accepted with warning");
                self.bindings.push(binding);
            }
            ShortcutValidation::Accepted => {
                debug!(keys = ?binding.keys, kind = ?binding.kind, "shortcut registered");
                self.bindings.push(binding);
            }
        }
        verdict
    }

    pub fn validate(&self, candidate: &ShortcutBinding) -> ShortcutValidation {
        if candidate.keys.is_empty() {
            return ShortcutValidation::Rejected(
                "shortcut must contain at least one key".to_string(),
            );
        }
        if candidate.keys.len() > 4 {
            return ShortcutValidation::Rejected(
                "shortcut cannot contain more than 4 keys".to_string(),
            );
        }

        let raw_set = candidate.key_set();
        for existing in &self.bindings {
            if existing.key_set() == raw_set {
                return ShortcutValidation::Rejected(format!(
                    "duplicate of existing shortcut {:?}",
                    existing.keys
                ));
            }
        }

        let normalized = self.normalized_set(&candidate.keys);
        for combo in self.table.reserved_combos() {
            let reserved: HashSet<String> = combo.iter().map(|k| k.to_string()).collect();
            if normalized == reserved {
                return ShortcutValidation::Rejected(format!(
                    "combination is reserved by the operating system: {}",
                    combo.join("+")
                ));
            }
        }

        let all_plain = normalized
            .iter()
            .all(|k| k.len() == 1 && k.chars().all(|c| c.is_ascii_alphanumeric()));
        if all_plain {
            return ShortcutValidation::Rejected(
                "shortcut needs at least one modifier or special key".to_string(),
            );
        }

        if self.platform == Platform::Windows {
            for pair in [
                ["lshift", "rshift"],
                ["lctrl", "rctrl"],
                ["lalt", "ralt"],
                ["lwin", "rwin"],
            ] {
                if raw_set.contains(pair[0]) && raw_set.contains(pair[1]) {
                    return ShortcutValidation::Rejected(format!(
                        "left and right variants of the same modifier: {}+{}",
                        pair[0], pair[1]
                    ));
                }
            }
        }

        // Shorter toggle bindings are a hazard next to a longer push-to-talk
        // superset: the toggle fires while the user is still reaching for the
        // remaining keys.
        for existing in &self.bindings {
            let other = self.normalized_set(&existing.keys);
            let shadowed_candidate = candidate.kind == ShortcutKind::ToggleRecording
                && existing.kind == ShortcutKind::PushToTalk
                && normalized.is_subset(&other)
                && normalized.len() < other.len();
            let shadowed_existing = candidate.kind == ShortcutKind::PushToTalk
                && existing.kind == ShortcutKind::ToggleRecording
                && other.is_subset(&normalized)
                && other.len() < normalized.len();
            if shadowed_candidate || shadowed_existing {
                return ShortcutValidation::AcceptedWithWarning(format!(
                    "toggle shortcut may be shadowed by push-to-talk binding {:?}",
                    if shadowed_candidate {
                        &existing.keys
                    } else {
                        &candidate.keys
                    }
                ));
            }
        }

        ShortcutValidation::Accepted
    }

    fn normalized_set(&self, keys: &[String]) -> HashSet<String> {
        keys.iter().map(|k| self.table.normalize(k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptt(keys: &[&str]) -> ShortcutBinding {
        ShortcutBinding::new(keys, ShortcutKind::PushToTalk)
    }

    fn toggle(keys: &[&str]) -> ShortcutBinding {
        ShortcutBinding::new(keys, ShortcutKind::ToggleRecording)
    }

    #[test]
    fn empty_and_oversized_bindings_are_rejected() {
        let registry = ShortcutRegistry::new(Platform::MacOs);
        assert!(!registry.validate(&ptt(&[])).is_accepted());
        assert!(!registry
            .validate(&ptt(&["Cmd", "Shift", "Option", "Ctrl", "D"]))
            .is_accepted());
        assert!(registry
            .validate(&ptt(&["Cmd", "Shift", "Option", "D"]))
            .is_accepted());
    }

    #[test]
    fn duplicates_ignore_case_and_order() {
        let mut registry = ShortcutRegistry::new(Platform::MacOs);
        assert!(registry.register(ptt(&["Option", "Space"])).is_accepted());
        assert_eq!(
            registry.validate(&toggle(&["space", "option"])),
            ShortcutValidation::Rejected(
                "duplicate of existing shortcut [\"Option\", \"Space\"]".to_string()
            )
        );
    }

    #[test]
    fn reserved_combos_are_platform_specific() {
        let mac = ShortcutRegistry::new(Platform::MacOs);
        assert!(!mac.validate(&ptt(&["Cmd", "C"])).is_accepted());
        assert!(!mac.validate(&ptt(&["Cmd", "Space"])).is_accepted());
        // Ctrl+C is only reserved on Windows.
        assert!(mac.validate(&ptt(&["Ctrl", "C"])).is_accepted());

        let win = ShortcutRegistry::new(Platform::Windows);
        assert!(!win.validate(&ptt(&["Ctrl", "C"])).is_accepted());
        assert!(!win.validate(&ptt(&["Alt", "F4"])).is_accepted());
        assert!(win.validate(&ptt(&["Win", "C"])).is_accepted());
    }

    #[test]
    fn reserved_check_folds_aliases() {
        let mac = ShortcutRegistry::new(Platform::MacOs);
        assert!(!mac.validate(&ptt(&["Command", "c"])).is_accepted());
    }

    #[test]
    fn plain_alphanumeric_combos_need_a_modifier() {
        let registry = ShortcutRegistry::new(Platform::MacOs);
        assert!(!registry.validate(&toggle(&["A"])).is_accepted());
        assert!(!registry.validate(&toggle(&["A", "B", "3"])).is_accepted());
        assert!(registry.validate(&toggle(&["Shift", "A"])).is_accepted());
        assert!(registry.validate(&toggle(&["F6"])).is_accepted());
    }

    #[test]
    fn same_modifier_pairs_rejected_on_windows_only() {
        let win = ShortcutRegistry::new(Platform::Windows);
        assert!(!win.validate(&ptt(&["LShift", "RShift"])).is_accepted());
        assert!(win.validate(&ptt(&["LShift", "RCtrl"])).is_accepted());

        // macOS has no left/right distinction in key names.
        let mac = ShortcutRegistry::new(Platform::MacOs);
        assert!(mac.validate(&ptt(&["Shift", "Space"])).is_accepted());
    }

    #[test]
    fn shorter_toggle_subset_warns() {
        let mut registry = ShortcutRegistry::new(Platform::MacOs);
        assert!(registry
            .register(ptt(&["Ctrl", "Shift", "Space"]))
            .is_accepted());
        let verdict = registry.register(toggle(&["Ctrl", "Shift"]));
        assert!(matches!(
            verdict,
            ShortcutValidation::AcceptedWithWarning(_)
        ));
        assert_eq!(registry.bindings().len(), 2);
    }

    #[test]
    fn longer_ptt_registered_after_toggle_also_warns() {
        let mut registry = ShortcutRegistry::new(Platform::MacOs);
        assert!(registry.register(toggle(&["Ctrl", "Shift"])).is_accepted());
        let verdict = registry.register(ptt(&["Ctrl", "Shift", "Space"]));
        assert!(matches!(
            verdict,
            ShortcutValidation::AcceptedWithWarning(_)
        ));
    }

    #[test]
    fn equal_sets_of_different_kind_are_still_duplicates() {
        let mut registry = ShortcutRegistry::new(Platform::MacOs);
        assert!(registry.register(ptt(&["Ctrl", "Space"])).is_accepted());
        assert!(!registry.register(toggle(&["Ctrl", "Space"])).is_accepted());
        assert_eq!(registry.bindings().len(), 1);
    }
}
