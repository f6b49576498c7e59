use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Delay between priming the clipboard and simulating the paste.
const PASTE_DELAY: Duration = Duration::from_millis(100);

/// Delay between the paste and restoring the previous clipboard contents.
const RESTORE_DELAY: Duration = Duration::from_millis(500);

/// Text insertion errors
#[derive(Debug, Error)]
pub enum InsertError {
    /// Text is empty
    #[error("text is empty")]
    EmptyText,

    /// Clipboard access failed
    #[error("clipboard access failed: {0}")]
    Clipboard(String),

    /// Failed to create `CGEvent` source
    #[error("failed to create CGEvent source")]
    EventSource,

    /// Failed to create keyboard `CGEvent`
    #[error("failed to create keyboard CGEvent")]
    EventCreation,
}

/// Delivers recognized text into the foreground application.
#[cfg_attr(test, mockall::automock)]
pub trait TextInjector {
    /// Attempts insertion, logging failures without propagating them.
    fn inject(&self, text: &str) -> bool;
}

/// Clipboard-swap insertion: park the text on the clipboard, simulate Cmd+V,
/// then restore whatever the clipboard held before.
///
/// The paste keystroke requires Input Monitoring permission on macOS; some
/// apps (secure input fields) block synthetic events, in which case the text
/// is still available on the clipboard until the restore fires.
#[derive(Debug, Default)]
pub struct ClipboardInjector;

impl ClipboardInjector {
    /// Creates the injector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn insert(text: &str) -> Result<(), InsertError> {
        if text.is_empty() {
            return Err(InsertError::EmptyText);
        }

        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| InsertError::Clipboard(e.to_string()))?;
        let previous = clipboard.get_text().ok();
        clipboard
            .set_text(text.to_owned())
            .map_err(|e| InsertError::Clipboard(e.to_string()))?;
        debug!(text_len = text.len(), "clipboard primed for paste");

        // Give the pasteboard a beat to settle, paste, then hand the
        // clipboard back to whatever the user had on it.
        std::thread::spawn(move || {
            std::thread::sleep(PASTE_DELAY);
            if let Err(e) = simulate_paste() {
                warn!("paste simulation failed: {e}");
            }
            std::thread::sleep(RESTORE_DELAY);
            if let Some(previous) = previous {
                match arboard::Clipboard::new() {
                    Ok(mut clipboard) => {
                        if let Err(e) = clipboard.set_text(previous) {
                            warn!("failed to restore clipboard: {e}");
                        } else {
                            debug!("clipboard restored");
                        }
                    }
                    Err(e) => warn!("failed to reopen clipboard for restore: {e}"),
                }
            }
        });

        info!(text_len = text.len(), "text insertion scheduled");
        Ok(())
    }
}

impl TextInjector for ClipboardInjector {
    fn inject(&self, text: &str) -> bool {
        match Self::insert(text) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, text_len = text.len(), "text insertion failed");
                false
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn simulate_paste() -> Result<(), InsertError> {
    use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

    // Key code 9 = 'v'
    const KEY_V: u16 = 9;

    let down_source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|()| InsertError::EventSource)?;
    let up_source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|()| InsertError::EventSource)?;

    let key_down = CGEvent::new_keyboard_event(down_source, KEY_V, true)
        .map_err(|()| InsertError::EventCreation)?;
    let key_up = CGEvent::new_keyboard_event(up_source, KEY_V, false)
        .map_err(|()| InsertError::EventCreation)?;

    key_down.set_flags(CGEventFlags::CGEventFlagCommand);
    key_up.set_flags(CGEventFlags::CGEventFlagCommand);

    key_down.post(CGEventTapLocation::HID);
    key_up.post(CGEventTapLocation::HID);

    debug!("simulated Cmd+V paste");
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn simulate_paste() -> Result<(), InsertError> {
    warn!("paste simulation is macOS-only; text stays on the clipboard");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_rejected() {
        let result = ClipboardInjector::insert("");
        assert!(matches!(result, Err(InsertError::EmptyText)));
    }

    #[test]
    fn inject_empty_returns_false() {
        assert!(!ClipboardInjector::new().inject(""));
    }

    #[test]
    #[ignore = "requires a clipboard and an active cursor"]
    fn inject_simple_text() {
        assert!(ClipboardInjector::new().inject("hello"));
    }
}
