//! Access to the host process environment.
//!
//! The injector must never call `std::env` or the C library's `getenv` while it is serving a
//! lookup: this library *is* `getenv` in the host process, so either would recurse into itself.
//! All reads go through [`EnvAccessor`] instead, and [`LiveEnviron`] is the only place that
//! touches the `environ` block directly.

use std::ffi::CStr;

use libc::c_char;

/// Read access to an environment block.
pub trait EnvAccessor: Send + Sync {
    /// Pointer to the NUL-terminated value of `name` inside the environment block, or null.
    ///
    /// The pointer is owned by whoever owns the block and must be handed back untouched when a
    /// lookup passes through.
    fn get_raw(&self, name: &[u8]) -> *const c_char;

    /// Owned UTF-8 copy of the value of `name`; invalid UTF-8 reads as absent.
    fn var(&self, name: &str) -> Option<String> {
        let p = self.get_raw(name.as_bytes());
        if p.is_null() {
            return None;
        }
        // SAFETY: get_raw returns either null or a pointer to a NUL-terminated value.
        let value = unsafe { CStr::from_ptr(p) };
        value.to_str().ok().map(str::to_string)
    }
}

extern "C" {
    static environ: *const *const c_char;
}

/// The live `environ` block of the current process.
///
/// `environ` is re-read on every call: the host may have grown or replaced the block with
/// `setenv`/`putenv` since the previous lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveEnviron;

impl EnvAccessor for LiveEnviron {
    fn get_raw(&self, name: &[u8]) -> *const c_char {
        if name.is_empty() || name.contains(&b'=') {
            return std::ptr::null();
        }
        // SAFETY: environ is either null or a null-terminated array of pointers to
        // NUL-terminated "KEY=VALUE" strings, as maintained by the C library. We only read it.
        unsafe {
            let mut cursor = environ;
            if cursor.is_null() {
                return std::ptr::null();
            }
            while !(*cursor).is_null() {
                let entry = *cursor;
                if let Some(value) = value_if_key_matches(entry, name) {
                    return value;
                }
                cursor = cursor.add(1);
            }
        }
        std::ptr::null()
    }
}

/// If `entry` is `name=...`, return a pointer to the first byte after `=`.
///
/// # Safety
/// `entry` must point to a NUL-terminated string.
unsafe fn value_if_key_matches(entry: *const c_char, name: &[u8]) -> Option<*const c_char> {
    for (i, &b) in name.iter().enumerate() {
        let c = *entry.add(i) as u8;
        // A NUL here ends the entry early; it never equals a byte of `name`.
        if c != b {
            return None;
        }
    }
    if *entry.add(name.len()) as u8 == b'=' {
        Some(entry.add(name.len() + 1))
    } else {
        None
    }
}
