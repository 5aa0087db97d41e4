/*!
 * Thread Identity Tokens
 *
 * `std::thread::ThreadId` cannot live in an atomic, so each thread gets a
 * process-unique non-zero `u64` on first use. Zero marks a vacant slot.
 */

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static TOKEN: u64 = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Token of the calling thread
#[inline]
pub fn current_token() -> u64 {
    TOKEN.with(|token| *token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_token_stable_per_thread() {
        assert_eq!(current_token(), current_token());
        assert_ne!(current_token(), 0);
    }

    #[test]
    fn test_tokens_differ_across_threads() {
        let here = current_token();
        let there = thread::spawn(current_token).join().unwrap();
        assert_ne!(here, there);
    }
}
