use crate::error::{Error, Result};
use zeroize::Zeroize;

/// Constant-time comparison. Never short-circuits on the first
/// mismatching byte; a length mismatch is the only early exit.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Constant-time comparison over UTF-8 string bytes.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// Secure random number generation (OS-backed).
pub fn secure_random(buf: &mut [u8]) {
    use rand::RngCore;
    rand::rngs::OsRng.fill_bytes(buf);
}

/// Overwrite a secret buffer: two fill passes, then a volatile zeroing
/// pass, then a re-check that the zeros actually landed. Returns false
/// if any byte survived.
pub fn wipe(buf: &mut [u8]) -> bool {
    buf.fill(0xff);
    buf.fill(0xaa);
    buf.zeroize();
    buf.iter().all(|&b| b == 0)
}

/// Disable core dumps for the current process.
pub fn disable_core_dumps() -> Result<()> {
    #[cfg(unix)]
    {
        use libc::{rlimit, setrlimit, RLIMIT_CORE};
        let rlim = rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        let result = unsafe { setrlimit(RLIMIT_CORE, &rlim) };
        if result == 0 {
            Ok(())
        } else {
            Err(Error::ValidationFailed("failed to disable core dumps".into()))
        }
    }
    #[cfg(not(unix))]
    {
        // Not available off Unix; callers treat this as best-effort.
        Ok(())
    }
}
