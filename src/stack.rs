//! Stack growth for the recursive parser and evaluator.
//!
//! Deeply nested source recurses once per level in both passes. Wrapping the
//! recursive entry points in [`ensure_sufficient_stack`] grows the native stack
//! on demand instead of overflowing it.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f`, first growing the stack if it is close to running out.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: usize) -> usize {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn test_deep_recursion_grows_stack() {
        assert_eq!(depth(200_000), 200_000);
    }
}
