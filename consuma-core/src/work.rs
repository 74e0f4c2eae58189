//! The CPU-bound workload shared by both the sync and async endpoints.
//!
//! Pure and deterministic: the same `(input, iterations)` pair always
//! produces the same digest. Ported from the iterated-SHA-256 loop in the
//! original Python `compute_work`.

use sha2::{Digest, Sha256};
use std::time::Instant;

/// Result of running [`run`]: the final digest (as lowercase hex) and how
/// long the computation took.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkOutput {
    pub result: String,
    pub duration_ms: f64,
}

/// Run `iterations` rounds of SHA-256, seeding round 1 with `input` and
/// each subsequent round with the previous round's digest bytes.
///
/// Safe to call from any thread; does no I/O and holds no locks.
pub fn run(input: &[u8], iterations: u32) -> WorkOutput {
    let start = Instant::now();

    let mut digest = Sha256::digest(input);
    for _ in 1..iterations {
        digest = Sha256::digest(digest);
    }

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    WorkOutput {
        result: hex_encode(&digest),
        duration_ms,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String cannot fail");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = run(b"hello", 100);
        let b = run(b"hello", 100);
        assert_eq!(a.result, b.result);
    }

    #[test]
    fn different_input_differs() {
        let a = run(b"hello", 100);
        let b = run(b"world", 100);
        assert_ne!(a.result, b.result);
    }

    #[test]
    fn returns_64_hex_chars() {
        let out = run(b"test", 10);
        assert_eq!(out.result.len(), 64);
        assert!(u128::from_str_radix(&out.result[..32], 16).is_ok());
    }

    #[test]
    fn duration_is_non_negative() {
        let out = run(b"test", 10);
        assert!(out.duration_ms >= 0.0);
    }

    #[test]
    fn single_iteration_matches_plain_sha256() {
        let out = run(b"x", 1);
        let expected = hex_encode(&Sha256::digest(b"x"));
        assert_eq!(out.result, expected);
    }
}
