//! Fixed-capacity string with truncation, used wherever the original C code
//! used a `char[N]` buffer (task name, cwd, file paths): task slots and the
//! task table itself are meant to have a fixed footprint, not grow with
//! whatever a process decides to put in `argv[0]`.

use core::fmt;

#[derive(Clone)]
pub struct BoundedString<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> BoundedString<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    /// Copies as much of `s` as fits in `N - 1` bytes (always leaves room for
    /// a NUL terminator, matching the C `strcpy`-into-fixed-buffer pattern).
    pub fn set(&mut self, s: &str) {
        let max = N - 1;
        let bytes = s.as_bytes();
        let take = bytes.len().min(max);
        self.buf[..take].copy_from_slice(&bytes[..take]);
        self.len = take;
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    pub fn capacity(&self) -> usize {
        N - 1
    }
}

impl<const N: usize> Default for BoundedString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> From<&str> for BoundedString<N> {
    fn from(s: &str) -> Self {
        let mut b = Self::new();
        b.set(s);
        b
    }
}

impl<const N: usize> fmt::Debug for BoundedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> fmt::Display for BoundedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_round_trips() {
        let s: BoundedString<8> = BoundedString::from("hi");
        assert_eq!(s.as_str(), "hi");
    }

    #[test]
    fn overlong_string_is_truncated_not_overrun() {
        let s: BoundedString<4> = BoundedString::from("abcdef");
        assert_eq!(s.as_str(), "abc");
        assert_eq!(s.as_str().len(), s.capacity());
    }
}
