//! Hotkey handling - keyboard shortcuts for the draw
//!
//! Keys are identified by name ("space", "enter", "s", ...). The host
//! translates its native key events to these names; this module decides
//! which draw action a key triggers in the current phase.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::draw_state::Phase;

// =============================================================================
// KEY NAMES
// =============================================================================

/// Accepted key names and the canonical name each resolves to
const KEY_NAMES: &[(&str, &str)] = &[
    // Function keys
    ("f1", "f1"),
    ("f2", "f2"),
    ("f3", "f3"),
    ("f4", "f4"),
    ("f5", "f5"),
    ("f6", "f6"),
    ("f7", "f7"),
    ("f8", "f8"),
    ("f9", "f9"),
    ("f10", "f10"),
    ("f11", "f11"),
    ("f12", "f12"),
    // Letters
    ("a", "a"),
    ("b", "b"),
    ("c", "c"),
    ("d", "d"),
    ("e", "e"),
    ("f", "f"),
    ("g", "g"),
    ("h", "h"),
    ("i", "i"),
    ("j", "j"),
    ("k", "k"),
    ("l", "l"),
    ("m", "m"),
    ("n", "n"),
    ("o", "o"),
    ("p", "p"),
    ("q", "q"),
    ("r", "r"),
    ("s", "s"),
    ("t", "t"),
    ("u", "u"),
    ("v", "v"),
    ("w", "w"),
    ("x", "x"),
    ("y", "y"),
    ("z", "z"),
    // Numbers
    ("0", "0"),
    ("1", "1"),
    ("2", "2"),
    ("3", "3"),
    ("4", "4"),
    ("5", "5"),
    ("6", "6"),
    ("7", "7"),
    ("8", "8"),
    ("9", "9"),
    // Special keys
    ("escape", "escape"),
    ("esc", "escape"),
    ("space", "space"),
    (" ", "space"),
    ("enter", "enter"),
    ("return", "enter"),
    ("tab", "tab"),
    ("backspace", "backspace"),
    ("delete", "delete"),
    ("home", "home"),
    ("end", "end"),
];

fn canonical_name(name: &str) -> Option<&'static str> {
    let name_lower = name.to_lowercase();
    // A literal space is a valid key name, so only trim around other names
    let trimmed = name_lower.trim();
    let key = if trimmed.is_empty() {
        name_lower.as_str()
    } else {
        trimmed
    };
    KEY_NAMES
        .iter()
        .find(|(n, _)| *n == key)
        .map(|(_, canonical)| *canonical)
}

// =============================================================================
// HOTKEY TYPE
// =============================================================================

/// A single key, no modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    name: &'static str,
}

impl Hotkey {
    /// Create a hotkey from a key name (e.g., "space")
    pub fn from_name(name: &str) -> Option<Self> {
        canonical_name(name).map(|name| Hotkey { name })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether a key reported by the host is this hotkey
    pub fn matches(&self, key: &str) -> bool {
        canonical_name(key) == Some(self.name)
    }
}

impl Serialize for Hotkey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name)
    }
}

impl<'de> Deserialize<'de> for Hotkey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hotkey::from_name(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("Unknown key name: '{}'", s)))
    }
}

// =============================================================================
// KEY BINDINGS
// =============================================================================

/// What a key press asks the draw to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Spin,
    Stop,
    Accept,
    Skip,
    End,
}

/// Draw state a key press is judged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyContext {
    pub phase: Phase,
    /// A new spin would be accepted for the selected prize
    pub can_draw: bool,
    /// The running spin already committed its winner
    pub stopping: bool,
}

/// Keyboard shortcuts configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindings {
    /// Key that starts a spin
    #[serde(default = "default_spin")]
    pub spin: Hotkey,
    /// Key that stops the running spin (may be the same as `spin`)
    #[serde(default = "default_stop")]
    pub stop: Hotkey,
    #[serde(default = "default_accept")]
    pub accept: Hotkey,
    #[serde(default = "default_skip")]
    pub skip: Hotkey,
    /// Key that ends the session
    #[serde(default = "default_end")]
    pub end: Hotkey,
}

fn default_spin() -> Hotkey {
    Hotkey { name: "space" }
}

fn default_stop() -> Hotkey {
    Hotkey { name: "space" }
}

fn default_accept() -> Hotkey {
    Hotkey { name: "enter" }
}

fn default_skip() -> Hotkey {
    Hotkey { name: "s" }
}

fn default_end() -> Hotkey {
    Hotkey { name: "e" }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            spin: default_spin(),
            stop: default_stop(),
            accept: default_accept(),
            skip: default_skip(),
            end: default_end(),
        }
    }
}

impl KeyBindings {
    /// Action for `key` in the given context, or None if the key does
    /// nothing right now.
    ///
    /// Spin only while idle with a drawable pool; stop only while spinning
    /// and not yet stopping; the decision keys only while a result waits.
    pub fn action_for(&self, key: &str, ctx: &KeyContext) -> Option<KeyAction> {
        match ctx.phase {
            Phase::Idle if ctx.can_draw && self.spin.matches(key) => Some(KeyAction::Spin),
            Phase::Spinning if !ctx.stopping && self.stop.matches(key) => Some(KeyAction::Stop),
            Phase::AwaitingDecision => {
                if self.accept.matches(key) {
                    Some(KeyAction::Accept)
                } else if self.skip.matches(key) {
                    Some(KeyAction::Skip)
                } else if self.end.matches(key) {
                    Some(KeyAction::End)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
