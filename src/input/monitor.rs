use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, EventField,
};
use std::cell::RefCell;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::session::SessionEvent;
use crate::shortcut::{Modifiers, RawKeyEvent, SemanticEvent, ShortcutMatcher};

/// Spawns the listen-only event tap thread feeding the session channel.
///
/// The tap observes key-down and modifier-change events system-wide (this
/// needs Input Monitoring permission), runs them through the matcher, and
/// posts the resulting semantic events. Events are never swallowed or
/// modified; the tap is an observer.
pub fn spawn(
    matcher: ShortcutMatcher,
    events: UnboundedSender<SessionEvent>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("key-monitor".to_owned())
        .spawn(move || run_tap(matcher, events))
}

fn run_tap(matcher: ShortcutMatcher, events: UnboundedSender<SessionEvent>) {
    let matcher = RefCell::new(matcher);

    let tap = match CGEventTap::new(
        CGEventTapLocation::HID,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown, CGEventType::FlagsChanged],
        |_proxy, event_type, event| {
            if let Some(raw) = raw_event(event_type, event) {
                if let Some(semantic) = matcher.borrow_mut().on_event(raw) {
                    debug!(?semantic, "shortcut matched");
                    let _ = events.send(session_event(semantic));
                }
            }
            None
        },
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!(
                "failed to create event tap - enable this app under \
                 System Settings > Privacy & Security > Input Monitoring"
            );
            return;
        }
    };

    let Ok(source) = tap.mach_port.create_runloop_source(0) else {
        error!("failed to create run loop source for event tap");
        return;
    };

    let run_loop = CFRunLoop::get_current();
    #[allow(unsafe_code)] // kCFRunLoopCommonModes is an extern static
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();

    info!("key event tap running");
    CFRunLoop::run_current();
}

fn raw_event(event_type: CGEventType, event: &CGEvent) -> Option<RawKeyEvent> {
    let modifiers = canonical_modifiers(event.get_flags());
    match event_type {
        CGEventType::KeyDown => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let key_code =
                event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            Some(RawKeyEvent::KeyDown { key_code, modifiers })
        }
        CGEventType::FlagsChanged => Some(RawKeyEvent::ModifiersChanged { modifiers }),
        _ => None,
    }
}

/// Restricts raw event flags to the four canonical modifier bits.
fn canonical_modifiers(flags: CGEventFlags) -> Modifiers {
    let mut modifiers = Modifiers::empty();
    if flags.contains(CGEventFlags::CGEventFlagControl) {
        modifiers = modifiers.with(Modifiers::CONTROL);
    }
    if flags.contains(CGEventFlags::CGEventFlagAlternate) {
        modifiers = modifiers.with(Modifiers::OPTION);
    }
    if flags.contains(CGEventFlags::CGEventFlagShift) {
        modifiers = modifiers.with(Modifiers::SHIFT);
    }
    if flags.contains(CGEventFlags::CGEventFlagCommand) {
        modifiers = modifiers.with(Modifiers::COMMAND);
    }
    modifiers
}

const fn session_event(semantic: SemanticEvent) -> SessionEvent {
    match semantic {
        SemanticEvent::Engage => SessionEvent::Engage,
        SemanticEvent::Disengage => SessionEvent::Disengage,
        SemanticEvent::Cancel => SessionEvent::Cancel,
    }
}
