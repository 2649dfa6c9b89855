//! Terminal subsystem: one `Tty` per virtual console, each with its own
//! input and output ring. The PS/2 driver feeds decoded key events to
//! whichever `Tty` is currently active; `/dev/tty*` files drain and fill
//! the rings from the process side. Console glyph rendering is out of
//! scope here -- the only sink for output is the UART, exactly as if this
//! were a headless serial console.

use crate::arch::x86::ps2_keyboard::KeyEvent;
use crate::lib::error::Errno;
use crate::process::wait::{self, WaitMode, WaitQueue};
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

pub const TTY_COUNT: usize = 4;
const TTY_INPUT_BUF_SIZE: usize = 256;
const TTY_OUTPUT_BUF_SIZE: usize = 4096;

/// Power-of-two ring buffer with unbounded head/tail counters, masked down
/// to an index on access. `head - tail` is always the number of bytes
/// currently buffered and never exceeds `N`.
struct Ring<const N: usize> {
    buf: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> Ring<N> {
    const fn new() -> Self {
        Self { buf: [0; N], head: 0, tail: 0 }
    }

    fn len(&self) -> usize {
        self.head - self.tail
    }

    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn push(&mut self, byte: u8) {
        if self.len() == N {
            // Full: drop the oldest byte to make room, per the TTY's
            // overwrite-on-full output policy.
            self.tail += 1;
        }
        let idx = self.head % N;
        self.buf[idx] = byte;
        self.head += 1;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let idx = self.tail % N;
        self.tail += 1;
        Some(self.buf[idx])
    }
}

struct TtyInner {
    input: Ring<TTY_INPUT_BUF_SIZE>,
    output: Ring<TTY_OUTPUT_BUF_SIZE>,
}

/// One virtual terminal: an input ring fed by the keyboard ISR and an
/// output ring fed by writers, plus the wait queue blocking reads park on.
pub struct Tty {
    index: usize,
    inner: Mutex<TtyInner>,
    in_wait: Mutex<WaitQueue>,
}

impl Tty {
    const fn new(index: usize) -> Self {
        Self {
            index,
            inner: Mutex::new(TtyInner {
                input: Ring::new(),
                output: Ring::new(),
            }),
            in_wait: Mutex::new(WaitQueue::new()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Block until at least one byte is available, then drain up to
    /// `buf.len()` bytes out of the input ring.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Errno> {
        if buf.is_empty() {
            return Ok(0);
        }

        wait::wait_event_locked(&self.in_wait, WaitMode::Interruptible, || {
            !self.inner.lock().input.is_empty()
        });

        let mut inner = self.inner.lock();
        let mut n = 0;
        while n < buf.len() {
            match inner.input.pop() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    /// Append bytes to the output ring (overwriting the oldest bytes if
    /// full) and mirror them to the UART when this is the active tty --
    /// the UART is this kernel's only console.
    pub fn write(&self, buf: &[u8]) {
        let mut inner = self.inner.lock();
        for &b in buf {
            inner.output.push(b);
        }
        drop(inner);

        if active_index() == self.index {
            unsafe { crate::uart_print(buf) };
        }
    }

    fn feed_char(&self, byte: u8) {
        self.inner.lock().input.push(byte);
        wait::wakeup(&mut self.in_wait.lock());
    }

    fn feed_bytes(&self, bytes: &[u8]) {
        {
            let mut inner = self.inner.lock();
            for &b in bytes {
                inner.input.push(b);
            }
        }
        wait::wakeup(&mut self.in_wait.lock());
    }
}

static TTYS: [Tty; TTY_COUNT] = [Tty::new(0), Tty::new(1), Tty::new(2), Tty::new(3)];
static ACTIVE: AtomicUsize = AtomicUsize::new(0);

/// Index of the tty currently receiving keyboard input and console output.
pub fn active_index() -> usize {
    ACTIVE.load(Ordering::Acquire)
}

fn set_active(index: usize) {
    if index < TTY_COUNT {
        ACTIVE.store(index, Ordering::Release);
    }
}

/// Look up a tty by index, e.g. for `/dev/ttyN`.
pub fn get(index: usize) -> Option<&'static Tty> {
    TTYS.get(index)
}

/// The tty a freshly spawned task without an explicit controlling
/// terminal should attach to, and the one `/dev/tty` resolves to.
pub fn active() -> &'static Tty {
    &TTYS[active_index()]
}

/// Wire the PS/2 driver's decoded key events into the active terminal.
/// Registered once at boot via `ps2_keyboard::keyboard_init`.
pub fn handle_key_event(event: KeyEvent) {
    match event {
        KeyEvent::Char(c) => active().feed_char(c),
        KeyEvent::AltFn(n) => set_active(n as usize),
        KeyEvent::ArrowUp => active().feed_bytes(b"\x1b[A"),
        KeyEvent::ArrowDown => active().feed_bytes(b"\x1b[B"),
        KeyEvent::ArrowRight => active().feed_bytes(b"\x1b[C"),
        KeyEvent::ArrowLeft => active().feed_bytes(b"\x1b[D"),
    }
}

/// Bring the terminal subsystem up and start routing keyboard interrupts
/// to it. Call once during boot, after the IDT is installed.
pub fn init() {
    unsafe { crate::arch::x86::ps2_keyboard::keyboard_init(handle_key_event) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_overwrites_oldest_on_full() {
        let mut ring: Ring<4> = Ring::new();
        for b in [1u8, 2, 3, 4, 5] {
            ring.push(b);
        }
        // Oldest byte (1) was dropped to make room for 5.
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), Some(4));
        assert_eq!(ring.pop(), Some(5));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn feed_char_then_read_round_trips() {
        let tty = Tty::new(0);
        tty.feed_char(b'a');
        tty.feed_char(b'b');
        let mut buf = [0u8; 4];
        assert_eq!(tty.inner.lock().input.len(), 2);
        let n = {
            let mut inner = tty.inner.lock();
            let mut n = 0;
            while let Some(b) = inner.input.pop() {
                buf[n] = b;
                n += 1;
            }
            n
        };
        assert_eq!(&buf[..n], b"ab");
    }

    #[test]
    fn set_active_ignores_out_of_range() {
        set_active(0);
        set_active(99);
        assert_eq!(active_index(), 0);
        set_active(2);
        assert_eq!(active_index(), 2);
        set_active(0);
    }
}
