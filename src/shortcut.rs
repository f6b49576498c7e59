use tracing::debug;

/// Physical key code for Escape (cancels an engaged recording).
pub const ESCAPE_KEY_CODE: u16 = 53;

/// The four canonical modifier bits considered by shortcut matching.
///
/// Raw OS events may carry additional flags (caps lock, fn, device-specific
/// bits); those are masked off before any comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    /// Control key.
    pub const CONTROL: Self = Self(0b0001);
    /// Option / Alt key.
    pub const OPTION: Self = Self(0b0010);
    /// Shift key.
    pub const SHIFT: Self = Self(0b0100);
    /// Command / Meta key.
    pub const COMMAND: Self = Self(0b1000);

    /// No modifiers held.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Union of two masks.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every bit of `other` is present in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no canonical modifier is held.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a persisted modifier name.
    ///
    /// # Errors
    /// Returns the unrecognized name so config loading can report it.
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "Control" | "Ctrl" => Ok(Self::CONTROL),
            "Option" | "Alt" => Ok(Self::OPTION),
            "Shift" => Ok(Self::SHIFT),
            "Command" | "Super" => Ok(Self::COMMAND),
            other => Err(other.to_owned()),
        }
    }

    /// Canonical names for persistence, in display order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::CONTROL) {
            names.push("Control");
        }
        if self.contains(Self::OPTION) {
            names.push("Option");
        }
        if self.contains(Self::SHIFT) {
            names.push("Shift");
        }
        if self.contains(Self::COMMAND) {
            names.push("Command");
        }
        names
    }

    /// Modifier glyphs in the conventional ⌃⌥⇧⌘ order.
    #[must_use]
    pub fn glyphs(self) -> String {
        let mut out = String::new();
        if self.contains(Self::CONTROL) {
            out.push('⌃');
        }
        if self.contains(Self::OPTION) {
            out.push('⌥');
        }
        if self.contains(Self::SHIFT) {
            out.push('⇧');
        }
        if self.contains(Self::COMMAND) {
            out.push('⌘');
        }
        out
    }
}

/// A user-configured recording shortcut.
///
/// `key_code: None` selects modifiers-only hold mode: recording runs while
/// exactly the configured modifiers are held. With a key code the shortcut
/// acts as a toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutDefinition {
    /// Physical key, absent for modifiers-only shortcuts.
    pub key_code: Option<u16>,
    /// Required modifier mask (canonical bits only).
    pub modifiers: Modifiers,
}

impl Default for ShortcutDefinition {
    fn default() -> Self {
        Self {
            key_code: None,
            modifiers: Modifiers::CONTROL.with(Modifiers::OPTION),
        }
    }
}

impl ShortcutDefinition {
    /// Human-readable rendering, e.g. `⌃⌥` or `⌘⇧Space`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = self.modifiers.glyphs();
        if let Some(code) = self.key_code {
            out.push_str(&key_name(code));
        }
        if out.is_empty() {
            out.push_str("None");
        }
        out
    }

    /// Whether this shortcut engages while held rather than toggling.
    #[must_use]
    pub const fn is_hold_mode(&self) -> bool {
        self.key_code.is_none()
    }
}

/// Display name for a physical key code.
///
/// Covers the keys a dictation shortcut plausibly uses; anything else is
/// rendered as `[code]`.
#[must_use]
pub fn key_name(code: u16) -> String {
    match code {
        49 => "Space".to_owned(),
        36 => "Enter".to_owned(),
        48 => "Tab".to_owned(),
        53 => "Esc".to_owned(),
        123 => "←".to_owned(),
        124 => "→".to_owned(),
        125 => "↓".to_owned(),
        126 => "↑".to_owned(),
        122 => "F1".to_owned(),
        120 => "F2".to_owned(),
        99 => "F3".to_owned(),
        118 => "F4".to_owned(),
        96 => "F5".to_owned(),
        97 => "F6".to_owned(),
        98 => "F7".to_owned(),
        100 => "F8".to_owned(),
        101 => "F9".to_owned(),
        109 => "F10".to_owned(),
        103 => "F11".to_owned(),
        111 => "F12".to_owned(),
        other => format!("[{other}]"),
    }
}

/// A raw keyboard event as delivered by the OS event tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKeyEvent {
    /// A key was pressed while `modifiers` were held.
    KeyDown {
        /// Physical key code.
        key_code: u16,
        /// Canonical modifier mask at press time.
        modifiers: Modifiers,
    },
    /// The held modifier set changed.
    ModifiersChanged {
        /// New canonical modifier mask.
        modifiers: Modifiers,
    },
}

/// Semantic edge events produced by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticEvent {
    /// Start recording.
    Engage,
    /// Stop recording and transcribe.
    Disengage,
    /// Abort the recording, discarding audio.
    Cancel,
}

/// Maps raw key events onto semantic engage/disengage/cancel edges.
///
/// Tracks only whether the shortcut is currently engaged; it has no press
/// history per physical key, so left/right instances of one logical modifier
/// are indistinguishable when the OS reports the same aggregated mask.
#[derive(Debug)]
pub struct ShortcutMatcher {
    definition: ShortcutDefinition,
    engaged: bool,
}

impl ShortcutMatcher {
    /// Creates a matcher for the given shortcut.
    #[must_use]
    pub const fn new(definition: ShortcutDefinition) -> Self {
        Self {
            definition,
            engaged: false,
        }
    }

    /// Whether the shortcut is currently engaged.
    #[must_use]
    pub const fn engaged(&self) -> bool {
        self.engaged
    }

    /// Replaces the definition wholesale, dropping any engagement.
    pub fn set_definition(&mut self, definition: ShortcutDefinition) {
        debug!(shortcut = %definition.describe(), "shortcut replaced");
        self.definition = definition;
        self.engaged = false;
    }

    /// Feeds one raw event, producing zero or one semantic event.
    pub fn on_event(&mut self, event: RawKeyEvent) -> Option<SemanticEvent> {
        match event {
            RawKeyEvent::KeyDown { key_code, modifiers } => {
                // Escape cancels an engaged recording before any other rule,
                // even when Escape is the configured shortcut key.
                if key_code == ESCAPE_KEY_CODE && self.engaged {
                    self.engaged = false;
                    return Some(SemanticEvent::Cancel);
                }

                let wanted = self.definition.key_code?;
                if key_code == wanted && modifiers == self.definition.modifiers {
                    self.engaged = !self.engaged;
                    return Some(if self.engaged {
                        SemanticEvent::Engage
                    } else {
                        SemanticEvent::Disengage
                    });
                }
                None
            }
            RawKeyEvent::ModifiersChanged { modifiers } => {
                if self.definition.key_code.is_some() {
                    return None;
                }

                if modifiers == self.definition.modifiers {
                    if self.engaged {
                        None
                    } else {
                        self.engaged = true;
                        Some(SemanticEvent::Engage)
                    }
                } else if self.engaged {
                    self.engaged = false;
                    Some(SemanticEvent::Disengage)
                } else {
                    None
                }
            }
        }
    }
}
