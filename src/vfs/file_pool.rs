//! Bounded pool of concurrently open files, system-wide: `vfs::open`
//! reserves a slot here before it hands back a fresh fd, and the slot is
//! released when the `File`'s last reference -- an `Arc`, possibly shared
//! across a `fork` -- drops. Exhaustion reports `ENFILE`, distinct from
//! the per-task `RLIMIT_NOFILE` bound on a single `FileTable`'s fd array.

use crate::lib::error::Errno;
use spin::Mutex;

pub const MAX_FILE_CNT: usize = 256;

static OPEN_COUNT: Mutex<usize> = Mutex::new(0);

/// Held by an open `File`; releases its pool slot on drop.
pub struct PoolToken(());

/// Reserve one slot in the system-wide open-file pool.
pub fn reserve() -> Result<PoolToken, Errno> {
    let mut count = OPEN_COUNT.lock();
    if *count >= MAX_FILE_CNT {
        return Err(Errno::ENFILE);
    }
    *count += 1;
    Ok(PoolToken(()))
}

impl Drop for PoolToken {
    fn drop(&mut self) {
        let mut count = OPEN_COUNT.lock();
        *count = count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn reserve_fails_once_exhausted_then_recovers_on_release() {
        let mut tokens: Vec<PoolToken> = Vec::new();
        for _ in 0..MAX_FILE_CNT {
            tokens.push(reserve().expect("pool starts with room for MAX_FILE_CNT"));
        }
        assert_eq!(reserve().unwrap_err(), Errno::ENFILE);

        tokens.pop(); // drop one token, freeing its slot
        assert!(reserve().is_ok());
    }
}
