//! `libotelinject`: an `LD_PRELOAD` library that shadows the C library's `getenv`.
//!
//! When a process asks for one of the variables that load OpenTelemetry auto-instrumentation
//! agents (`NODE_OPTIONS`, `JAVA_TOOL_OPTIONS`, `PYTHONPATH`, the .NET profiler variables,
//! `OTEL_RESOURCE_ATTRIBUTES`), the value it sees is rewritten so the agent is attached.
//! Everything else is answered straight from the live environment block.
//!
//! The decision logic lives in [`intercept::Injector`]; this file only holds the process-wide
//! instance and the exported symbol.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use libc::c_char;

pub mod config;
pub mod env;
pub mod errors;
pub mod glob;
pub mod intercept;
pub mod libc_flavor;
pub mod log;
pub mod process;
pub mod runtimes;
pub mod util;

#[cfg(test)]
mod test_utils;

use env::{EnvAccessor, LiveEnviron};
use intercept::Injector;

/// Process-wide injector; created on the first lookup and never dropped.
#[cfg(not(test))]
static INJECTOR: once_cell::sync::Lazy<Injector> = once_cell::sync::Lazy::new(Injector::live);

thread_local! {
    static IN_GETENV: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as serving a lookup; `None` when it already is.
struct ReentrancyGuard;

impl ReentrancyGuard {
    fn enter() -> Option<Self> {
        // A thread that is being torn down has no TLS left; treat it as re-entered.
        let entered = IN_GETENV.try_with(|flag| !flag.replace(true)).unwrap_or(false);
        entered.then_some(ReentrancyGuard)
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        let _ = IN_GETENV.try_with(|flag| flag.set(false));
    }
}

fn passthrough(env: &dyn EnvAccessor, name: &[u8]) -> *mut c_char {
    env.get_raw(name) as *mut c_char
}

/// Serve one lookup from `injector`. Re-entered and panicking calls are answered by `fallback`.
fn intercept_getenv(injector: &Injector, fallback: &dyn EnvAccessor, name: &[u8]) -> *mut c_char {
    let Some(_guard) = ReentrancyGuard::enter() else {
        return passthrough(fallback, name);
    };
    panic::catch_unwind(AssertUnwindSafe(|| {
        log::init(injector.env());
        injector.resolve_pointer(name) as *mut c_char
    }))
    .unwrap_or_else(|_| passthrough(fallback, name))
}

/// Exported replacement for `getenv(3)`.
///
/// # Safety
/// `name` must be null or point to a NUL-terminated string, as for the C library function.
/// Returned pointers either come from the live environment block or are owned by the
/// process-wide injector and stay valid for the lifetime of the process.
#[cfg(not(test))]
#[no_mangle]
pub unsafe extern "C" fn getenv(name: *const c_char) -> *mut c_char {
    if name.is_null() {
        return std::ptr::null_mut();
    }
    let name = std::ffi::CStr::from_ptr(name).to_bytes();
    intercept_getenv(&INJECTOR, &LiveEnviron, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InjectorConfiguration;
    use crate::errors::InjectorError;
    use crate::process::ProcessIntrospector;
    use crate::test_utils::{write_file, FixedProcess, MapEnv};
    use std::ffi::CStr;

    #[test]
    fn guard_is_exclusive_per_thread_and_released_on_drop() {
        let outer = ReentrancyGuard::enter();
        assert!(outer.is_some());
        assert!(ReentrancyGuard::enter().is_none());
        drop(outer);
        assert!(ReentrancyGuard::enter().is_some());
    }

    #[test]
    fn guard_is_per_thread() {
        let _outer = ReentrancyGuard::enter().expect("first entry");
        let other = std::thread::spawn(|| ReentrancyGuard::enter().is_some())
            .join()
            .expect("join");
        assert!(other);
    }

    /// Introspector whose every read panics.
    struct PanickingProcess;

    impl ProcessIntrospector for PanickingProcess {
        fn executable_path(&self) -> Result<String, InjectorError> {
            panic!("exe unavailable")
        }

        fn arguments(&self) -> Result<Vec<String>, InjectorError> {
            panic!("cmdline unavailable")
        }
    }

    fn node_injector(td: &tempfile::TempDir, process: Box<dyn ProcessIntrospector>) -> Injector {
        let mut cfg = InjectorConfiguration::default();
        cfg.nodejs_agent_path = write_file(td.path(), "register.js", "");
        cfg.include_paths = vec!["*/node".to_string()];
        Injector::with_configuration(
            cfg,
            Box::new(MapEnv::new(&[("NODE_OPTIONS", "--inspect")])),
            process,
        )
    }

    fn value_of(p: *mut c_char) -> Option<String> {
        if p.is_null() {
            return None;
        }
        // SAFETY: the pointer comes from a live CString owned by the test's injector or env.
        Some(unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned())
    }

    #[test]
    fn passthrough_returns_the_live_pointer() {
        let path = passthrough(&LiveEnviron, b"PATH");
        assert_eq!(path as *const c_char, LiveEnviron.get_raw(b"PATH"));
        assert!(passthrough(&LiveEnviron, b"OTEL_INJECTOR_SURELY_UNSET_VARIABLE").is_null());
    }

    #[test]
    fn intercept_serves_rewritten_value() {
        let td = tempfile::tempdir().expect("tmpdir");
        let agent = td.path().join("register.js").display().to_string();
        let inj = node_injector(&td, Box::new(FixedProcess::new("/usr/bin/node", &["node"])));
        let fallback = MapEnv::default();
        let p = intercept_getenv(&inj, &fallback, b"NODE_OPTIONS");
        assert_eq!(value_of(p), Some(format!("--require {agent} --inspect")));
    }

    #[test]
    fn panic_inside_lookup_degrades_to_the_original_value() {
        let td = tempfile::tempdir().expect("tmpdir");
        let inj = node_injector(&td, Box::new(PanickingProcess));
        let fallback = MapEnv::new(&[("NODE_OPTIONS", "--inspect")]);

        let p = intercept_getenv(&inj, &fallback, b"NODE_OPTIONS");
        assert_eq!(p as *const c_char, fallback.get_raw(b"NODE_OPTIONS"));
        assert_eq!(value_of(p).as_deref(), Some("--inspect"));

        // The poisoned lock does not wedge later lookups.
        let p = intercept_getenv(&inj, &fallback, b"NODE_OPTIONS");
        assert_eq!(value_of(p).as_deref(), Some("--inspect"));
        assert!(ReentrancyGuard::enter().is_some());
    }

    #[test]
    fn nested_lookup_passes_through() {
        let td = tempfile::tempdir().expect("tmpdir");
        let inj = node_injector(&td, Box::new(FixedProcess::new("/usr/bin/node", &["node"])));
        let fallback = MapEnv::new(&[("NODE_OPTIONS", "--trace-warnings")]);

        let _outer = ReentrancyGuard::enter().expect("first entry");
        let p = intercept_getenv(&inj, &fallback, b"NODE_OPTIONS");
        assert_eq!(value_of(p).as_deref(), Some("--trace-warnings"));
    }
}
