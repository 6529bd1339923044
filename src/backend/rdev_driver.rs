//! Real OS input driver backed by the rdev crate
//!
//! # Hook lifecycle
//!
//! `rdev::listen` blocks its thread for the life of the process and offers no
//! portable teardown, so the listener thread is started lazily on the first
//! subscription and kept alive afterwards. The subscription itself is the
//! scoped resource: attaching a sender starts delivery, detaching it stops
//! delivery, and nothing observed while detached goes anywhere. An install
//! failure (missing permissions, no display server) is reported from the
//! first `subscribe` call and leaves no partial state.
//!
//! # Coordinates on clicks and scrolls
//!
//! The OS reports button and wheel events without coordinates, so the driver
//! tracks the last observed pointer position and stamps it onto click and
//! scroll notifications, matching how capture sources that deliver
//! `(x, y, button, pressed)` tuples behave.
//!
//! # Key identity
//!
//! Keys are classified from the physical `rdev::Key` alone, so a press and
//! its release always produce the same identifier: keys with a canonical
//! printable character (US layout) become `Char`, recognized symbolic keys
//! become `Named`, and everything else is preserved as `Raw`.

use crate::backend::driver::{CapturedInput, DriverStats, InputDriver, SynthAction};
use crate::error::{MacroError, Result};
use crate::types::{EventKind, KeyIdent, NamedKey, PointerButton};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long the first subscription waits for an early hook-install failure
const HOOK_INSTALL_GRACE: Duration = Duration::from_millis(150);

/// State shared with the listener thread
struct ListenerShared {
    /// Active subscriber, if any
    tx: Mutex<Option<Sender<CapturedInput>>>,
    /// Error reported by `rdev::listen`, once it fails
    hook_failed: Mutex<Option<String>>,
    /// Last observed pointer position, stamped onto clicks and scrolls
    last_pos: Mutex<(f64, f64)>,
    /// Notifications delivered to subscribers
    delivered: AtomicU64,
}

/// Input driver using rdev for the global hook and event synthesis
pub struct RdevDriver {
    shared: Arc<ListenerShared>,
    listener_started: bool,
    stats: DriverStats,
}

impl Default for RdevDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RdevDriver {
    /// Create a driver; the hook is not installed until the first subscription
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ListenerShared {
                tx: Mutex::new(None),
                hook_failed: Mutex::new(None),
                last_pos: Mutex::new((0.0, 0.0)),
                delivered: AtomicU64::new(0),
            }),
            listener_started: false,
            stats: DriverStats::default(),
        }
    }

    fn start_listener(&mut self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let (failed_tx, failed_rx) = crossbeam_channel::bounded::<String>(1);

        std::thread::Builder::new()
            .name("macrorec-hook".into())
            .spawn(move || {
                let cb_shared = Arc::clone(&shared);
                let result = rdev::listen(move |event| {
                    let captured_at = std::time::Instant::now();
                    if let Some(kind) = observed_kind(&event.event_type, &cb_shared.last_pos) {
                        let guard = match cb_shared.tx.lock() {
                            Ok(g) => g,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        if let Some(ref tx) = *guard {
                            let sent = tx
                                .send(CapturedInput {
                                    at: captured_at,
                                    kind,
                                })
                                .is_ok();
                            if sent {
                                cb_shared.delivered.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                });
                if let Err(e) = result {
                    let msg = format!("{:?}", e);
                    tracing::error!("input hook failed: {}", msg);
                    let mut failed = match shared.hook_failed.lock() {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    *failed = Some(msg.clone());
                    let _ = failed_tx.send(msg);
                }
            })
            .map_err(|e| MacroError::HookInstall(format!("failed to spawn hook thread: {}", e)))?;

        // rdev reports install failures (permissions, display server) almost
        // immediately; absence of an error within the grace period means the
        // hook is up.
        match failed_rx.recv_timeout(HOOK_INSTALL_GRACE) {
            Ok(msg) => Err(MacroError::HookInstall(msg)),
            Err(_) => Ok(()),
        }
    }

    fn set_tx(&self, tx: Option<Sender<CapturedInput>>) {
        let mut guard = match self.shared.tx.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = tx;
    }
}

impl InputDriver for RdevDriver {
    fn subscribe(&mut self, tx: Sender<CapturedInput>) -> Result<()> {
        {
            let failed = match self.shared.hook_failed.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(ref msg) = *failed {
                return Err(MacroError::HookInstall(msg.clone()));
            }
        }

        self.set_tx(Some(tx));
        if !self.listener_started {
            if let Err(e) = self.start_listener() {
                self.set_tx(None);
                return Err(e);
            }
            self.listener_started = true;
        }
        tracing::debug!("input hook subscription attached");
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.set_tx(None);
        self.stats.events_delivered = self.shared.delivered.load(Ordering::Relaxed);
        tracing::debug!("input hook subscription detached");
    }

    fn is_subscribed(&self) -> bool {
        match self.shared.tx.lock() {
            Ok(g) => g.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    fn synthesize(&mut self, action: &SynthAction) -> Result<()> {
        let event_type = match synth_event_type(action) {
            Ok(et) => et,
            Err(e) => {
                self.stats.record_synth(false);
                return Err(e);
            }
        };
        match rdev::simulate(&event_type) {
            Ok(()) => {
                self.stats.record_synth(true);
                Ok(())
            }
            Err(e) => {
                self.stats.record_synth(false);
                Err(MacroError::Synthesis(format!(
                    "OS rejected {:?}: {:?}",
                    action, e
                )))
            }
        }
    }

    fn stats(&self) -> &DriverStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut DriverStats {
        &mut self.stats
    }
}

/// Convert one observed rdev event into a domain event kind.
///
/// Returns `None` for notifications outside the recorded set (unknown
/// hardware buttons).
fn observed_kind(event_type: &rdev::EventType, last_pos: &Mutex<(f64, f64)>) -> Option<EventKind> {
    let pos = |last_pos: &Mutex<(f64, f64)>| -> (f64, f64) {
        match last_pos.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    };

    match *event_type {
        rdev::EventType::KeyPress(key) => Some(EventKind::KeyPress {
            key: key_ident_for(key),
        }),
        rdev::EventType::KeyRelease(key) => Some(EventKind::KeyRelease {
            key: key_ident_for(key),
        }),
        rdev::EventType::MouseMove { x, y } => {
            let mut guard = match last_pos.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = (x, y);
            Some(EventKind::PointerMove { x, y })
        }
        rdev::EventType::ButtonPress(button) => match pointer_button_for(button) {
            Some(button) => {
                let (x, y) = pos(last_pos);
                Some(EventKind::PointerClick {
                    x,
                    y,
                    button,
                    pressed: true,
                })
            }
            None => {
                tracing::debug!("ignoring unknown button press {:?}", button);
                None
            }
        },
        rdev::EventType::ButtonRelease(button) => match pointer_button_for(button) {
            Some(button) => {
                let (x, y) = pos(last_pos);
                Some(EventKind::PointerClick {
                    x,
                    y,
                    button,
                    pressed: false,
                })
            }
            None => {
                tracing::debug!("ignoring unknown button release {:?}", button);
                None
            }
        },
        rdev::EventType::Wheel { delta_x, delta_y } => {
            let (x, y) = pos(last_pos);
            Some(EventKind::PointerScroll {
                x,
                y,
                dx: delta_x,
                dy: delta_y,
            })
        }
    }
}

/// Map a synthesis action onto the rdev event to simulate
fn synth_event_type(action: &SynthAction) -> Result<rdev::EventType> {
    Ok(match action {
        SynthAction::KeyDown(key) => rdev::EventType::KeyPress(rdev_key_for(key)?),
        SynthAction::KeyUp(key) => rdev::EventType::KeyRelease(rdev_key_for(key)?),
        SynthAction::ButtonDown(button) => rdev::EventType::ButtonPress(rdev_button_for(*button)),
        SynthAction::ButtonUp(button) => rdev::EventType::ButtonRelease(rdev_button_for(*button)),
        SynthAction::Scroll { dx, dy } => rdev::EventType::Wheel {
            delta_x: *dx,
            delta_y: *dy,
        },
    })
}

/// Classify a physical key into the portable identifier
pub(crate) fn key_ident_for(key: rdev::Key) -> KeyIdent {
    if let Some(name) = named_key_for(key) {
        return KeyIdent::named(name);
    }
    if let Some(c) = char_for_key(key) {
        return KeyIdent::ch(c);
    }
    KeyIdent::raw(format!("{:?}", key))
}

/// Resolve a portable identifier back to a physical key
pub(crate) fn rdev_key_for(ident: &KeyIdent) -> Result<rdev::Key> {
    match ident {
        KeyIdent::Char { char } => key_for_char(*char).ok_or_else(|| {
            MacroError::Synthesis(format!("no key mapping for character {:?}", char))
        }),
        KeyIdent::Named { name } => Ok(rdev_key_for_named(*name)),
        KeyIdent::Raw { value } => Err(MacroError::Synthesis(format!(
            "cannot synthesize raw key <{}>",
            value
        ))),
    }
}

fn pointer_button_for(button: rdev::Button) -> Option<PointerButton> {
    match button {
        rdev::Button::Left => Some(PointerButton::Left),
        rdev::Button::Right => Some(PointerButton::Right),
        rdev::Button::Middle => Some(PointerButton::Middle),
        rdev::Button::Unknown(_) => None,
    }
}

fn rdev_button_for(button: PointerButton) -> rdev::Button {
    match button {
        PointerButton::Left => rdev::Button::Left,
        PointerButton::Right => rdev::Button::Right,
        PointerButton::Middle => rdev::Button::Middle,
    }
}

fn named_key_for(key: rdev::Key) -> Option<NamedKey> {
    use rdev::Key as K;
    Some(match key {
        K::Alt => NamedKey::Alt,
        K::AltGr => NamedKey::AltGr,
        K::Backspace => NamedKey::Backspace,
        K::CapsLock => NamedKey::CapsLock,
        K::ControlLeft => NamedKey::ControlLeft,
        K::ControlRight => NamedKey::ControlRight,
        K::Delete => NamedKey::Delete,
        K::DownArrow => NamedKey::DownArrow,
        K::End => NamedKey::End,
        K::Escape => NamedKey::Escape,
        K::F1 => NamedKey::F1,
        K::F2 => NamedKey::F2,
        K::F3 => NamedKey::F3,
        K::F4 => NamedKey::F4,
        K::F5 => NamedKey::F5,
        K::F6 => NamedKey::F6,
        K::F7 => NamedKey::F7,
        K::F8 => NamedKey::F8,
        K::F9 => NamedKey::F9,
        K::F10 => NamedKey::F10,
        K::F11 => NamedKey::F11,
        K::F12 => NamedKey::F12,
        K::Home => NamedKey::Home,
        K::Insert => NamedKey::Insert,
        K::LeftArrow => NamedKey::LeftArrow,
        K::MetaLeft => NamedKey::MetaLeft,
        K::MetaRight => NamedKey::MetaRight,
        K::NumLock => NamedKey::NumLock,
        K::PageDown => NamedKey::PageDown,
        K::PageUp => NamedKey::PageUp,
        K::Pause => NamedKey::Pause,
        K::PrintScreen => NamedKey::PrintScreen,
        K::Return => NamedKey::Return,
        K::RightArrow => NamedKey::RightArrow,
        K::ScrollLock => NamedKey::ScrollLock,
        K::ShiftLeft => NamedKey::ShiftLeft,
        K::ShiftRight => NamedKey::ShiftRight,
        K::Space => NamedKey::Space,
        K::Tab => NamedKey::Tab,
        K::UpArrow => NamedKey::UpArrow,
        _ => return None,
    })
}

fn rdev_key_for_named(name: NamedKey) -> rdev::Key {
    use rdev::Key as K;
    match name {
        NamedKey::Alt => K::Alt,
        NamedKey::AltGr => K::AltGr,
        NamedKey::Backspace => K::Backspace,
        NamedKey::CapsLock => K::CapsLock,
        NamedKey::ControlLeft => K::ControlLeft,
        NamedKey::ControlRight => K::ControlRight,
        NamedKey::Delete => K::Delete,
        NamedKey::DownArrow => K::DownArrow,
        NamedKey::End => K::End,
        NamedKey::Escape => K::Escape,
        NamedKey::F1 => K::F1,
        NamedKey::F2 => K::F2,
        NamedKey::F3 => K::F3,
        NamedKey::F4 => K::F4,
        NamedKey::F5 => K::F5,
        NamedKey::F6 => K::F6,
        NamedKey::F7 => K::F7,
        NamedKey::F8 => K::F8,
        NamedKey::F9 => K::F9,
        NamedKey::F10 => K::F10,
        NamedKey::F11 => K::F11,
        NamedKey::F12 => K::F12,
        NamedKey::Home => K::Home,
        NamedKey::Insert => K::Insert,
        NamedKey::LeftArrow => K::LeftArrow,
        NamedKey::MetaLeft => K::MetaLeft,
        NamedKey::MetaRight => K::MetaRight,
        NamedKey::NumLock => K::NumLock,
        NamedKey::PageDown => K::PageDown,
        NamedKey::PageUp => K::PageUp,
        NamedKey::Pause => K::Pause,
        NamedKey::PrintScreen => K::PrintScreen,
        NamedKey::Return => K::Return,
        NamedKey::RightArrow => K::RightArrow,
        NamedKey::ScrollLock => K::ScrollLock,
        NamedKey::ShiftLeft => K::ShiftLeft,
        NamedKey::ShiftRight => K::ShiftRight,
        NamedKey::Space => K::Space,
        NamedKey::Tab => K::Tab,
        NamedKey::UpArrow => K::UpArrow,
    }
}

/// Canonical printable character of a physical key (US layout)
fn char_for_key(key: rdev::Key) -> Option<char> {
    use rdev::Key as K;
    Some(match key {
        K::KeyA => 'a',
        K::KeyB => 'b',
        K::KeyC => 'c',
        K::KeyD => 'd',
        K::KeyE => 'e',
        K::KeyF => 'f',
        K::KeyG => 'g',
        K::KeyH => 'h',
        K::KeyI => 'i',
        K::KeyJ => 'j',
        K::KeyK => 'k',
        K::KeyL => 'l',
        K::KeyM => 'm',
        K::KeyN => 'n',
        K::KeyO => 'o',
        K::KeyP => 'p',
        K::KeyQ => 'q',
        K::KeyR => 'r',
        K::KeyS => 's',
        K::KeyT => 't',
        K::KeyU => 'u',
        K::KeyV => 'v',
        K::KeyW => 'w',
        K::KeyX => 'x',
        K::KeyY => 'y',
        K::KeyZ => 'z',
        K::Num0 => '0',
        K::Num1 => '1',
        K::Num2 => '2',
        K::Num3 => '3',
        K::Num4 => '4',
        K::Num5 => '5',
        K::Num6 => '6',
        K::Num7 => '7',
        K::Num8 => '8',
        K::Num9 => '9',
        K::BackQuote => '`',
        K::Minus => '-',
        K::Equal => '=',
        K::LeftBracket => '[',
        K::RightBracket => ']',
        K::SemiColon => ';',
        K::Quote => '\'',
        K::BackSlash => '\\',
        K::Comma => ',',
        K::Dot => '.',
        K::Slash => '/',
        _ => return None,
    })
}

/// Physical key producing the given character (US layout)
fn key_for_char(c: char) -> Option<rdev::Key> {
    use rdev::Key as K;
    Some(match c.to_ascii_lowercase() {
        'a' => K::KeyA,
        'b' => K::KeyB,
        'c' => K::KeyC,
        'd' => K::KeyD,
        'e' => K::KeyE,
        'f' => K::KeyF,
        'g' => K::KeyG,
        'h' => K::KeyH,
        'i' => K::KeyI,
        'j' => K::KeyJ,
        'k' => K::KeyK,
        'l' => K::KeyL,
        'm' => K::KeyM,
        'n' => K::KeyN,
        'o' => K::KeyO,
        'p' => K::KeyP,
        'q' => K::KeyQ,
        'r' => K::KeyR,
        's' => K::KeyS,
        't' => K::KeyT,
        'u' => K::KeyU,
        'v' => K::KeyV,
        'w' => K::KeyW,
        'x' => K::KeyX,
        'y' => K::KeyY,
        'z' => K::KeyZ,
        '0' => K::Num0,
        '1' => K::Num1,
        '2' => K::Num2,
        '3' => K::Num3,
        '4' => K::Num4,
        '5' => K::Num5,
        '6' => K::Num6,
        '7' => K::Num7,
        '8' => K::Num8,
        '9' => K::Num9,
        '`' => K::BackQuote,
        '-' => K::Minus,
        '=' => K::Equal,
        '[' => K::LeftBracket,
        ']' => K::RightBracket,
        ';' => K::SemiColon,
        '\'' => K::Quote,
        '\\' => K::BackSlash,
        ',' => K::Comma,
        '.' => K::Dot,
        '/' => K::Slash,
        ' ' => K::Space,
        _ => return None,
    })
}
