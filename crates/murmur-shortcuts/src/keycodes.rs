//! Per-platform keycode naming.
//!
//! Raw OS keycodes arrive from the privileged helper's event tap; the tables
//! here map them to canonical key names and fold platform spellings
//! ("Command" vs "Cmd", left/right modifier variants) into the form the
//! registry and matcher compare against.

/// Name returned for keycodes no table knows about. Never matches a binding.
pub const UNKNOWN_KEY: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::MacOs
        }
    }

    pub fn keycode_table(self) -> &'static dyn KeycodeTable {
        match self {
            Platform::MacOs => &MacKeycodeTable,
            Platform::Windows => &WindowsKeycodeTable,
        }
    }
}

pub trait KeycodeTable: Send + Sync {
    /// Canonical name for a raw keycode, [`UNKNOWN_KEY`] if unmapped.
    fn key_name(&self, keycode: u32) -> &'static str;

    /// Lowercase a user- or OS-supplied key name and fold aliases and
    /// left/right modifier variants into the canonical form used for
    /// matching. macOS keeps one name per modifier already; Windows folds
    /// LShift/RShift into Shift and so on.
    fn normalize(&self, name: &str) -> String;

    /// Combinations claimed by the OS that bindings may not use.
    fn reserved_combos(&self) -> &'static [&'static [&'static str]];

    /// Whether the (normalized) name counts as a modifier key.
    fn is_modifier(&self, name: &str) -> bool;
}

/// macOS virtual keycodes (ANSI layout), per Carbon's `Events.h`.
pub struct MacKeycodeTable;

const MAC_RESERVED: &[&[&str]] = &[
    &["cmd", "c"],
    &["cmd", "v"],
    &["cmd", "x"],
    &["cmd", "a"],
    &["cmd", "z"],
    &["cmd", "q"],
    &["cmd", "w"],
    &["cmd", "tab"],
    &["cmd", "space"],
];

impl KeycodeTable for MacKeycodeTable {
    fn key_name(&self, keycode: u32) -> &'static str {
        match keycode {
            0 => "A",
            1 => "S",
            2 => "D",
            3 => "F",
            4 => "H",
            5 => "G",
            6 => "Z",
            7 => "X",
            8 => "C",
            9 => "V",
            11 => "B",
            12 => "Q",
            13 => "W",
            14 => "E",
            15 => "R",
            16 => "Y",
            17 => "T",
            18 => "1",
            19 => "2",
            20 => "3",
            21 => "4",
            22 => "6",
            23 => "5",
            24 => "=",
            25 => "9",
            26 => "7",
            27 => "-",
            28 => "8",
            29 => "0",
            30 => "]",
            31 => "O",
            32 => "U",
            33 => "[",
            34 => "I",
            35 => "P",
            36 => "Return",
            37 => "L",
            38 => "J",
            39 => "'",
            40 => "K",
            41 => ";",
            42 => "\\",
            43 => ",",
            44 => "/",
            45 => "N",
            46 => "M",
            47 => ".",
            48 => "Tab",
            49 => "Space",
            50 => "`",
            51 => "Backspace",
            53 => "Escape",
            // macOS reports side information in event flags, not key names,
            // so left/right variants share one canonical name.
            54 | 55 => "Cmd",
            56 | 60 => "Shift",
            57 => "CapsLock",
            58 | 61 => "Option",
            59 | 62 => "Ctrl",
            63 => "Fn",
            96 => "F5",
            97 => "F6",
            98 => "F7",
            99 => "F3",
            100 => "F8",
            101 => "F9",
            103 => "F11",
            109 => "F10",
            111 => "F12",
            117 => "Delete",
            118 => "F4",
            120 => "F2",
            122 => "F1",
            123 => "Left",
            124 => "Right",
            125 => "Down",
            126 => "Up",
            _ => UNKNOWN_KEY,
        }
    }

    fn normalize(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        match lower.as_str() {
            "command" | "meta" => "cmd".to_string(),
            "control" => "ctrl".to_string(),
            "alt" => "option".to_string(),
            "esc" => "escape".to_string(),
            "enter" => "return".to_string(),
            _ => lower,
        }
    }

    fn reserved_combos(&self) -> &'static [&'static [&'static str]] {
        MAC_RESERVED
    }

    fn is_modifier(&self, name: &str) -> bool {
        matches!(name, "cmd" | "shift" | "option" | "ctrl" | "fn")
    }
}

/// Windows virtual-key codes (`VK_*`).
pub struct WindowsKeycodeTable;

const WINDOWS_RESERVED: &[&[&str]] = &[
    &["ctrl", "c"],
    &["ctrl", "v"],
    &["ctrl", "x"],
    &["ctrl", "a"],
    &["ctrl", "z"],
    &["alt", "tab"],
    &["alt", "f4"],
];

impl KeycodeTable for WindowsKeycodeTable {
    fn key_name(&self, keycode: u32) -> &'static str {
        match keycode {
            0x08 => "Backspace",
            0x09 => "Tab",
            0x0D => "Return",
            0x10 => "Shift",
            0x11 => "Ctrl",
            0x12 => "Alt",
            0x14 => "CapsLock",
            0x1B => "Escape",
            0x20 => "Space",
            0x21 => "PageUp",
            0x22 => "PageDown",
            0x23 => "End",
            0x24 => "Home",
            0x25 => "Left",
            0x26 => "Up",
            0x27 => "Right",
            0x28 => "Down",
            0x2D => "Insert",
            0x2E => "Delete",
            0x30 => "0",
            0x31 => "1",
            0x32 => "2",
            0x33 => "3",
            0x34 => "4",
            0x35 => "5",
            0x36 => "6",
            0x37 => "7",
            0x38 => "8",
            0x39 => "9",
            0x41 => "A",
            0x42 => "B",
            0x43 => "C",
            0x44 => "D",
            0x45 => "E",
            0x46 => "F",
            0x47 => "G",
            0x48 => "H",
            0x49 => "I",
            0x4A => "J",
            0x4B => "K",
            0x4C => "L",
            0x4D => "M",
            0x4E => "N",
            0x4F => "O",
            0x50 => "P",
            0x51 => "Q",
            0x52 => "R",
            0x53 => "S",
            0x54 => "T",
            0x55 => "U",
            0x56 => "V",
            0x57 => "W",
            0x58 => "X",
            0x59 => "Y",
            0x5A => "Z",
            0x5B => "LWin",
            0x5C => "RWin",
            0x70 => "F1",
            0x71 => "F2",
            0x72 => "F3",
            0x73 => "F4",
            0x74 => "F5",
            0x75 => "F6",
            0x76 => "F7",
            0x77 => "F8",
            0x78 => "F9",
            0x79 => "F10",
            0x7A => "F11",
            0x7B => "F12",
            0xA0 => "LShift",
            0xA1 => "RShift",
            0xA2 => "LCtrl",
            0xA3 => "RCtrl",
            0xA4 => "LAlt",
            0xA5 => "RAlt",
            _ => UNKNOWN_KEY,
        }
    }

    fn normalize(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        match lower.as_str() {
            "lshift" | "rshift" => "shift".to_string(),
            "lctrl" | "rctrl" | "control" => "ctrl".to_string(),
            "lalt" | "ralt" | "option" => "alt".to_string(),
            "lwin" | "rwin" | "windows" | "meta" => "win".to_string(),
            "esc" => "escape".to_string(),
            "enter" => "return".to_string(),
            _ => lower,
        }
    }

    fn reserved_combos(&self) -> &'static [&'static [&'static str]] {
        WINDOWS_RESERVED
    }

    fn is_modifier(&self, name: &str) -> bool {
        matches!(name, "shift" | "ctrl" | "alt" | "win")
    }
}
