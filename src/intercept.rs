/*!
Interception context: decides, per lookup, whether the host sees its own value or ours.

Invariants
- Every rewriter runs at most once per variable per context, even under concurrent first use.
- A value handed out once stays valid and identical for the lifetime of the context; the
  process-wide context is never dropped, so returned pointers outlive every caller.
- Any failure (configuration, introspection, rewriting) degrades to the original value.
*/

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::sync::{Mutex, PoisonError};

use libc::c_char;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::{self, InjectorConfiguration};
use crate::env::{EnvAccessor, LiveEnviron};
use crate::glob::{any_matches_any, matches_any};
use crate::libc_flavor::{self, LibcFlavor};
use crate::process::{ProcSelf, ProcessIdentity, ProcessIntrospector};
use crate::runtimes::{ManagedVariable, RewriteContext};

/// Outcome of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Hand back whatever the host environment holds (possibly nothing).
    Original,
    /// Hand back this value, owned by the injector context.
    Value(&'a CStr),
}

/// Include/exclude decision for a process.
///
/// `allow` ORs the path clause with the argument clause, and each clause is vacuously true
/// when its list is empty. A process is intercepted when it is allowed and not denied.
pub fn process_allowed(cfg: &InjectorConfiguration, identity: &ProcessIdentity) -> bool {
    let allow_by_path =
        cfg.include_paths.is_empty() || matches_any(&identity.executable, &cfg.include_paths);
    let allow_by_args = cfg.include_with_arguments.is_empty()
        || any_matches_any(&identity.arguments, &cfg.include_with_arguments);
    let allow = allow_by_path || allow_by_args;

    let deny_by_path =
        !cfg.exclude_paths.is_empty() && matches_any(&identity.executable, &cfg.exclude_paths);
    let deny_by_args = !cfg.exclude_with_arguments.is_empty()
        && any_matches_any(&identity.arguments, &cfg.exclude_with_arguments);
    let deny = deny_by_path || deny_by_args;

    allow && !deny
}

/// Per-process injector state: configuration snapshot, rewrite caches and collaborators.
pub struct Injector {
    env: Box<dyn EnvAccessor>,
    process: Box<dyn ProcessIntrospector>,
    lock: Mutex<()>,
    config: OnceCell<InjectorConfiguration>,
    libc: OnceCell<Option<LibcFlavor>>,
    intercepted: OnceCell<bool>,
    slots: [OnceCell<Option<CString>>; ManagedVariable::ALL.len()],
    agents_env: OnceCell<BTreeMap<String, CString>>,
}

impl Injector {
    pub fn new(env: Box<dyn EnvAccessor>, process: Box<dyn ProcessIntrospector>) -> Self {
        Self {
            env,
            process,
            lock: Mutex::new(()),
            config: OnceCell::new(),
            libc: OnceCell::new(),
            intercepted: OnceCell::new(),
            slots: std::array::from_fn(|_| OnceCell::new()),
            agents_env: OnceCell::new(),
        }
    }

    /// Context over the real process: live `environ` and procfs.
    pub fn live() -> Self {
        Self::new(Box::new(LiveEnviron), Box::new(ProcSelf))
    }

    /// Context with a pre-resolved configuration.
    pub fn with_configuration(
        cfg: InjectorConfiguration,
        env: Box<dyn EnvAccessor>,
        process: Box<dyn ProcessIntrospector>,
    ) -> Self {
        let injector = Self::new(env, process);
        let _ = injector.config.set(cfg);
        injector
    }

    pub fn env(&self) -> &dyn EnvAccessor {
        &*self.env
    }

    /// The configuration snapshot, resolved on first use.
    pub fn configuration(&self) -> &InjectorConfiguration {
        self.config.get_or_init(|| {
            let cfg = config::resolve(&*self.env);
            debug!("resolved configuration: {cfg:?}");
            cfg
        })
    }

    fn libc_flavor(&self) -> Option<LibcFlavor> {
        *self.libc.get_or_init(|| match libc_flavor::detect() {
            Ok(flavor) => {
                debug!("detected C library flavor: {flavor}");
                Some(flavor)
            }
            Err(e) => {
                warn!("cannot detect the C library flavor: {e:#}");
                None
            }
        })
    }

    fn agents_env(&self, cfg: &InjectorConfiguration) -> &BTreeMap<String, CString> {
        self.agents_env.get_or_init(|| {
            cfg.all_agents_env
                .iter()
                .filter_map(|(k, v)| match CString::new(v.as_str()) {
                    Ok(c) => Some((k.clone(), c)),
                    Err(_) => {
                        warn!("value of {k} contains a NUL byte, ignoring it");
                        None
                    }
                })
                .collect()
        })
    }

    /// Decide what `getenv(name)` returns.
    pub fn lookup(&self, name: &[u8]) -> Lookup<'_> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.lookup_locked(name)
    }

    /// The pointer `getenv(name)` hands back: ours, or the one in the environment block.
    ///
    /// The environment block is read while the lock is still held.
    pub fn resolve_pointer(&self, name: &[u8]) -> *const c_char {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.lookup_locked(name) {
            Lookup::Value(v) => v.as_ptr(),
            Lookup::Original => self.env.get_raw(name),
        }
    }

    fn lookup_locked(&self, name: &[u8]) -> Lookup<'_> {
        let cfg = self.configuration();
        if cfg.disabled {
            return Lookup::Original;
        }

        let managed = ManagedVariable::from_name(name);
        let agent_value = match managed {
            Some(_) => None,
            None => {
                let Ok(name) = std::str::from_utf8(name) else {
                    return Lookup::Original;
                };
                match self.agents_env(cfg).get(name) {
                    Some(v) => Some(v),
                    None => return Lookup::Original,
                }
            }
        };

        if !*self.intercepted.get_or_init(|| self.intercepts_this_process(cfg)) {
            return Lookup::Original;
        }

        if let Some(var) = managed {
            let slot = self.slots[var.slot()].get_or_init(|| self.rewrite(var, cfg));
            return match slot {
                Some(v) => Lookup::Value(v.as_c_str()),
                None => Lookup::Original,
            };
        }

        match agent_value {
            Some(v) if self.env.get_raw(name).is_null() => Lookup::Value(v.as_c_str()),
            _ => Lookup::Original,
        }
    }

    /// Evaluated once per context: later argv rewrites (e.g. `process.title`) do not change
    /// the answer.
    fn intercepts_this_process(&self, cfg: &InjectorConfiguration) -> bool {
        if !cfg.has_process_filters() {
            return true;
        }
        match ProcessIdentity::current(&*self.process) {
            Ok(identity) => {
                let allowed = process_allowed(cfg, &identity);
                if !allowed {
                    debug!(
                        "{} is excluded by the include/exclude configuration",
                        identity.executable
                    );
                }
                allowed
            }
            Err(e) => {
                debug!("cannot determine the process identity ({e}), not intercepting");
                false
            }
        }
    }

    fn rewrite(&self, var: ManagedVariable, cfg: &InjectorConfiguration) -> Option<CString> {
        let rewriter = var.rewriter();
        let name = rewriter.variable();
        let raw = self.env.get_raw(name.as_bytes());
        let original = if raw.is_null() {
            None
        } else {
            // SAFETY: get_raw returns a pointer to a NUL-terminated value.
            match unsafe { CStr::from_ptr(raw) }.to_str() {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    warn!("{name} is not valid UTF-8, leaving it unchanged");
                    return None;
                }
            }
        };
        let cx = RewriteContext {
            config: cfg,
            env: &*self.env,
            libc: self.libc_flavor(),
        };
        let value = rewriter.rewrite(original.as_deref(), &cx)?;
        match CString::new(value) {
            Ok(c) => {
                debug!("{name}: injecting {c:?}");
                Some(c)
            }
            Err(e) => {
                warn!("{name}: computed value contains a NUL byte ({e}), leaving it unchanged");
                None
            }
        }
    }
}
