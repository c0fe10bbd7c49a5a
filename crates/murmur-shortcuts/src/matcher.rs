use std::collections::HashSet;

use tracing::trace;

use crate::keycodes::{KeycodeTable, Platform, UNKNOWN_KEY};
use crate::types::{ShortcutBinding, ShortcutKind};

/// A key transition reported by the helper's event tap. Either the raw
/// keycode or an already-resolved key name may be present.
#[derive(Debug, Clone)]
pub struct KeyInput {
    pub keycode: Option<u32>,
    pub key: Option<String>,
    pub is_down: bool,
}

impl KeyInput {
    pub fn down(keycode: u32) -> Self {
        Self {
            keycode: Some(keycode),
            key: None,
            is_down: true,
        }
    }

    pub fn up(keycode: u32) -> Self {
        Self {
            keycode: Some(keycode),
            key: None,
            is_down: false,
        }
    }

    pub fn named(key: &str, is_down: bool) -> Self {
        Self {
            keycode: None,
            key: Some(key.to_string()),
            is_down,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcutTrigger {
    /// All keys of the binding became held simultaneously.
    Pressed { index: usize, kind: ShortcutKind },
    /// A previously matched binding lost one of its keys.
    Released { index: usize, kind: ShortcutKind },
}

/// Tracks the set of currently held keys and fires edge-triggered events
/// when a registered binding becomes fully held or stops being so.
pub struct ShortcutMatcher {
    table: &'static dyn KeycodeTable,
    bindings: Vec<ShortcutBinding>,
    binding_sets: Vec<HashSet<String>>,
    pressed: HashSet<String>,
    active: Vec<bool>,
}

impl ShortcutMatcher {
    pub fn new(platform: Platform, bindings: Vec<ShortcutBinding>) -> Self {
        let table = platform.keycode_table();
        let binding_sets = bindings
            .iter()
            .map(|b| b.keys.iter().map(|k| table.normalize(k)).collect())
            .collect();
        let active = vec![false; bindings.len()];
        Self {
            table,
            bindings,
            binding_sets,
            pressed: HashSet::new(),
            active,
        }
    }

    pub fn bindings(&self) -> &[ShortcutBinding] {
        &self.bindings
    }

    /// Feed one key transition; returns the triggers it caused, in binding
    /// registration order.
    pub fn handle(&mut self, input: KeyInput) -> Vec<ShortcutTrigger> {
        let name = match self.resolve(&input) {
            Some(name) => name,
            None => return Vec::new(),
        };

        let mut triggers = Vec::new();
        if input.is_down {
            self.pressed.insert(name);
            for (i, set) in self.binding_sets.iter().enumerate() {
                if !self.active[i] && set.is_subset(&self.pressed) {
                    self.active[i] = true;
                    triggers.push(ShortcutTrigger::Pressed {
                        index: i,
                        kind: self.bindings[i].kind,
                    });
                }
            }
        } else {
            self.pressed.remove(&name);
            for (i, set) in self.binding_sets.iter().enumerate() {
                if self.active[i] && set.contains(&name) {
                    self.active[i] = false;
                    triggers.push(ShortcutTrigger::Released {
                        index: i,
                        kind: self.bindings[i].kind,
                    });
                }
            }
        }

        if !triggers.is_empty() {
            trace!(?triggers, held = self.pressed.len(), "shortcut edge");
        }
        triggers
    }

    /// Drop all held state, e.g. after the event source reconnects and the
    /// true keyboard state is unknown.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.active.iter_mut().for_each(|a| *a = false);
    }

    fn resolve(&self, input: &KeyInput) -> Option<String> {
        let name = match (&input.key, input.keycode) {
            (Some(key), _) => self.table.normalize(key),
            (None, Some(code)) => {
                let raw = self.table.key_name(code);
                if raw == UNKNOWN_KEY {
                    return None;
                }
                self.table.normalize(raw)
            }
            (None, None) => return None,
        };
        if name == UNKNOWN_KEY {
            return None;
        }
        Some(name)
    }
}
