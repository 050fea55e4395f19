use std::time::{Duration, SystemTime};

/// Non-negative random integer for socket file names.
///
/// Falls back to a time/pid mix if the OS entropy source is unavailable.
pub fn random_suffix() -> u64 {
    let mut buf = [0u8; 8];
    let v = match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_ne_bytes(buf),
        Err(_) => {
            let nanos = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_else(|_| Duration::from_secs(0))
                .as_nanos() as u64;
            nanos ^ ((std::process::id() as u64) << 32)
        }
    };
    // Keep it in the signed 63-bit range so it prints the same as a non-negative i64.
    v >> 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_suffix_fits_signed_range() {
        for _ in 0..32 {
            assert!(random_suffix() <= i64::MAX as u64);
        }
    }

    #[test]
    fn test_random_suffix_varies() {
        let a = random_suffix();
        let b = random_suffix();
        let c = random_suffix();
        assert!(a != b || b != c);
    }
}
