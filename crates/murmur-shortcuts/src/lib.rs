pub mod keycodes;
pub mod matcher;
pub mod registry;
pub mod types;

pub use keycodes::{KeycodeTable, MacKeycodeTable, Platform, WindowsKeycodeTable, UNKNOWN_KEY};
pub use matcher::{KeyInput, ShortcutMatcher, ShortcutTrigger};
pub use registry::{ShortcutRegistry, ShortcutValidation};
pub use types::{ShortcutBinding, ShortcutKind};
