use std::collections::HashMap;
use std::ffi::CString;

use libc::c_char;

use crate::env::EnvAccessor;
use crate::errors::InjectorError;
use crate::process::ProcessIntrospector;

/// Map-backed environment block for tests.
#[derive(Debug, Default)]
pub struct MapEnv {
    vars: HashMap<String, CString>,
}

impl MapEnv {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CString::new(*v).expect("no NUL in test value")))
            .collect();
        Self { vars }
    }
}

impl EnvAccessor for MapEnv {
    fn get_raw(&self, name: &[u8]) -> *const c_char {
        std::str::from_utf8(name)
            .ok()
            .and_then(|n| self.vars.get(n))
            .map(|v| v.as_ptr())
            .unwrap_or(std::ptr::null())
    }
}

/// Process identity fixed at construction; `None` fields fail like an unreadable `/proc`.
#[derive(Debug, Clone)]
pub struct FixedProcess {
    pub exe: Option<String>,
    pub args: Option<Vec<String>>,
}

impl FixedProcess {
    pub fn new(exe: &str, args: &[&str]) -> Self {
        Self {
            exe: Some(exe.to_string()),
            args: Some(args.iter().map(|a| a.to_string()).collect()),
        }
    }

    pub fn unreadable() -> Self {
        Self {
            exe: None,
            args: None,
        }
    }
}

impl ProcessIntrospector for FixedProcess {
    fn executable_path(&self) -> Result<String, InjectorError> {
        self.exe.clone().ok_or_else(|| {
            InjectorError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "/proc/self/exe",
            ))
        })
    }

    fn arguments(&self) -> Result<Vec<String>, InjectorError> {
        match &self.args {
            Some(a) if a.is_empty() => Err(InjectorError::Empty("/proc/self/cmdline".into())),
            Some(a) => Ok(a.clone()),
            None => Err(InjectorError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "/proc/self/cmdline",
            ))),
        }
    }
}

/// Write `contents` to `dir/name` and return the path as a string.
pub fn write_file(dir: &std::path::Path, name: &str, contents: &str) -> String {
    let p = dir.join(name);
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(&p, contents).expect("write fixture");
    p.display().to_string()
}
