//! PS/2 keyboard driver (8042 controller, scancode set 1).
//!
//! Decodes scancodes into `KeyEvent`s and hands each one to whatever
//! handler `keyboard_init` registered — the TTY subsystem, in this build,
//! exactly like punix wires `keyboard_init(tty_keyboard_handler)` once at
//! boot.

use spin::Mutex;
use crate::arch::x86::port::Port;

const PS2_DATA: Port<u8> = Port::new(0x60);
const PS2_STATUS: Port<u8> = Port::new(0x64);
const PS2_COMMAND: Port<u8> = Port::new(0x64);

const STATUS_OUTPUT_FULL: u8 = 0x01;
const STATUS_INPUT_FULL: u8 = 0x02;

const CMD_READ_CONFIG: u8 = 0x20;
const CMD_WRITE_CONFIG: u8 = 0x60;
const CMD_DISABLE_MOUSE: u8 = 0xA7;
const CMD_ENABLE_KEYBOARD: u8 = 0xAE;

const CONFIG_KEYBOARD_INTERRUPT: u8 = 0x01;
const CONFIG_MOUSE_INTERRUPT: u8 = 0x02;
const CONFIG_KEYBOARD_DISABLE: u8 = 0x10;
const CONFIG_MOUSE_DISABLE: u8 = 0x20;
const CONFIG_TRANSLATE: u8 = 0x40;

/// Scancodes for Left/Right Shift, Ctrl, Alt (make and break codes).
const SC_LSHIFT: u8 = 0x2A;
const SC_RSHIFT: u8 = 0x36;
const SC_LSHIFT_BREAK: u8 = 0xAA;
const SC_RSHIFT_BREAK: u8 = 0xB6;
const SC_LALT: u8 = 0x38;
const SC_LALT_BREAK: u8 = 0xB8;
const SC_CAPS: u8 = 0x3A;

/// F1..F12 make codes (scancode set 1).
const SC_F1: u8 = 0x3B;
const SC_F12: u8 = 0x58;

#[derive(Debug, Clone, Copy)]
pub enum KeyEvent {
    Char(u8),
    /// Alt+F<n>, n in 1..=12, zero-based (0 == F1).
    AltFn(u8),
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

struct KeyboardState {
    shift: bool,
    alt: bool,
    caps_lock: bool,
}

impl KeyboardState {
    const fn new() -> Self {
        Self { shift: false, alt: false, caps_lock: false }
    }
}

static STATE: Mutex<KeyboardState> = Mutex::new(KeyboardState::new());
static HANDLER: Mutex<Option<fn(KeyEvent)>> = Mutex::new(None);

fn wait_for_input_clear() {
    for _ in 0..10_000 {
        if unsafe { PS2_STATUS.read() } & STATUS_INPUT_FULL == 0 {
            return;
        }
    }
}

fn wait_for_output_ready() {
    for _ in 0..10_000 {
        if unsafe { PS2_STATUS.read() } & STATUS_OUTPUT_FULL != 0 {
            return;
        }
    }
}

/// Register the callback every decoded key event is delivered to, and
/// bring the 8042 controller up. Call once during boot.
///
/// # Safety
/// Must run after the IDT installs the keyboard IRQ1 handler.
pub unsafe fn keyboard_init(handler: fn(KeyEvent)) {
    *HANDLER.lock() = Some(handler);

    PS2_COMMAND.write(CMD_DISABLE_MOUSE);
    let _ = PS2_DATA.read(); // flush any stale byte

    PS2_COMMAND.write(CMD_READ_CONFIG);
    wait_for_output_ready();
    let mut config = PS2_DATA.read();

    config |= CONFIG_KEYBOARD_INTERRUPT | CONFIG_TRANSLATE;
    config &= !(CONFIG_MOUSE_INTERRUPT | CONFIG_KEYBOARD_DISABLE | CONFIG_MOUSE_DISABLE);

    PS2_COMMAND.write(CMD_WRITE_CONFIG);
    wait_for_input_clear();
    PS2_DATA.write(config);

    PS2_COMMAND.write(CMD_ENABLE_KEYBOARD);
}

/// Called from the IRQ1 handler with the just-read scancode.
pub fn handle_scancode(scancode: u8) {
    let mut state = STATE.lock();

    match scancode {
        SC_LSHIFT | SC_RSHIFT => { state.shift = true; return; }
        SC_LSHIFT_BREAK | SC_RSHIFT_BREAK => { state.shift = false; return; }
        SC_LALT => { state.alt = true; return; }
        SC_LALT_BREAK => { state.alt = false; return; }
        SC_CAPS => { state.caps_lock = !state.caps_lock; return; }
        _ => {}
    }

    if scancode & 0x80 != 0 {
        return; // break code for a key we don't otherwise track
    }

    if state.alt && (SC_F1..=SC_F12).contains(&scancode) {
        let event = KeyEvent::AltFn(scancode - SC_F1);
        drop(state);
        dispatch(event);
        return;
    }

    if let Some(event) = match scancode {
        0x48 => Some(KeyEvent::ArrowUp),
        0x50 => Some(KeyEvent::ArrowDown),
        0x4B => Some(KeyEvent::ArrowLeft),
        0x4D => Some(KeyEvent::ArrowRight),
        _ => None,
    } {
        drop(state);
        dispatch(event);
        return;
    }

    let shifted = state.shift || state.caps_lock;
    let ch = scancode_to_ascii(scancode, shifted);
    drop(state);

    if let Some(ch) = ch {
        dispatch(KeyEvent::Char(ch));
    }
}

fn dispatch(event: KeyEvent) {
    if let Some(handler) = *HANDLER.lock() {
        handler(event);
    }
}

fn scancode_to_ascii(scancode: u8, shifted: bool) -> Option<u8> {
    const TABLE: &[(u8, u8, u8)] = &[
        (0x02, b'1', b'!'), (0x03, b'2', b'@'), (0x04, b'3', b'#'), (0x05, b'4', b'$'),
        (0x06, b'5', b'%'), (0x07, b'6', b'^'), (0x08, b'7', b'&'), (0x09, b'8', b'*'),
        (0x0A, b'9', b'('), (0x0B, b'0', b')'), (0x0C, b'-', b'_'), (0x0D, b'=', b'+'),
        (0x0E, 0x08, 0x08), (0x0F, b'\t', b'\t'),
        (0x10, b'q', b'Q'), (0x11, b'w', b'W'), (0x12, b'e', b'E'), (0x13, b'r', b'R'),
        (0x14, b't', b'T'), (0x15, b'y', b'Y'), (0x16, b'u', b'U'), (0x17, b'i', b'I'),
        (0x18, b'o', b'O'), (0x19, b'p', b'P'), (0x1A, b'[', b'{'), (0x1B, b']', b'}'),
        (0x1C, b'\n', b'\n'),
        (0x1E, b'a', b'A'), (0x1F, b's', b'S'), (0x20, b'd', b'D'), (0x21, b'f', b'F'),
        (0x22, b'g', b'G'), (0x23, b'h', b'H'), (0x24, b'j', b'J'), (0x25, b'k', b'K'),
        (0x26, b'l', b'L'), (0x27, b';', b':'), (0x28, b'\'', b'"'), (0x29, b'`', b'~'),
        (0x2B, b'\\', b'|'),
        (0x2C, b'z', b'Z'), (0x2D, b'x', b'X'), (0x2E, b'c', b'C'), (0x2F, b'v', b'V'),
        (0x30, b'b', b'B'), (0x31, b'n', b'N'), (0x32, b'm', b'M'), (0x33, b',', b'<'),
        (0x34, b'.', b'>'), (0x35, b'/', b'?'),
        (0x39, b' ', b' '),
    ];

    for &(sc, normal, shift) in TABLE {
        if sc == scancode {
            return Some(if shifted { shift } else { normal });
        }
    }
    None
}
