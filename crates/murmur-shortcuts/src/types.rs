use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortcutKind {
    PushToTalk,
    ToggleRecording,
}

/// A configured key combination. `keys` keeps the user's insertion order for
/// display; equality and duplicate checks compare the *set* of keys,
/// case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutBinding {
    pub keys: Vec<String>,
    pub kind: ShortcutKind,
}

impl ShortcutBinding {
    pub fn new(keys: &[&str], kind: ShortcutKind) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            kind,
        }
    }

    /// Lowercased key set, in raw (non-normalized) form. Left/right modifier
    /// variants stay distinct here; duplicate-pair validation depends on it.
    pub fn key_set(&self) -> HashSet<String> {
        self.keys.iter().map(|k| k.to_lowercase()).collect()
    }
}
