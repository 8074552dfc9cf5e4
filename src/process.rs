//! Identity of the current process: executable path and original command line.
//!
//! Both are best-effort. Callers treat any error as "skip filtering, pass the original value
//! through"; nothing here is allowed to fail the host process.

use crate::errors::InjectorError;

const PROC_SELF_EXE: &str = "/proc/self/exe";
const PROC_SELF_CMDLINE: &str = "/proc/self/cmdline";

/// Source of the current process identity.
pub trait ProcessIntrospector: Send + Sync {
    /// Absolute path of the running executable.
    fn executable_path(&self) -> Result<String, InjectorError>;

    /// Command-line arguments, executable first.
    fn arguments(&self) -> Result<Vec<String>, InjectorError>;
}

/// Process identity used for include/exclude decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub executable: String,
    pub arguments: Vec<String>,
}

impl ProcessIdentity {
    pub fn current(src: &dyn ProcessIntrospector) -> Result<Self, InjectorError> {
        Ok(Self {
            executable: src.executable_path()?,
            arguments: src.arguments()?,
        })
    }
}

/// Linux implementation backed by procfs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcSelf;

impl ProcessIntrospector for ProcSelf {
    fn executable_path(&self) -> Result<String, InjectorError> {
        let p = std::fs::read_link(PROC_SELF_EXE)?;
        if !p.is_absolute() {
            return Err(InjectorError::Message(format!(
                "{PROC_SELF_EXE} resolves to a relative path: {}",
                p.display()
            )));
        }
        Ok(p.to_string_lossy().into_owned())
    }

    fn arguments(&self) -> Result<Vec<String>, InjectorError> {
        let raw = crate::util::fs::read_file_fallible(std::path::Path::new(PROC_SELF_CMDLINE))?;
        parse_cmdline(&raw)
    }
}

/// Split a NUL-separated `/proc/<pid>/cmdline` buffer.
pub fn parse_cmdline(raw: &[u8]) -> Result<Vec<String>, InjectorError> {
    let body = raw.strip_suffix(&[0u8]).unwrap_or(raw);
    if body.is_empty() {
        return Err(InjectorError::Empty(PROC_SELF_CMDLINE.to_string()));
    }
    Ok(body
        .split(|b| *b == 0)
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cmdline_splits_on_nul_and_drops_trailing_terminator() {
        let args = parse_cmdline(b"/usr/bin/java\0-jar\0app.jar\0").expect("args");
        assert_eq!(args, vec!["/usr/bin/java", "-jar", "app.jar"]);
    }

    #[test]
    fn parse_cmdline_keeps_empty_inner_arguments() {
        let args = parse_cmdline(b"node\0\0index.js\0").expect("args");
        assert_eq!(args, vec!["node", "", "index.js"]);
    }

    #[test]
    fn parse_cmdline_rejects_empty_buffer() {
        assert!(matches!(parse_cmdline(b""), Err(InjectorError::Empty(_))));
        assert!(matches!(parse_cmdline(b"\0"), Err(InjectorError::Empty(_))));
    }

    #[test]
    fn proc_self_reports_test_binary() {
        let exe = ProcSelf.executable_path().expect("exe");
        assert!(exe.starts_with('/'), "expected absolute path, got {exe}");
        let args = ProcSelf.arguments().expect("args");
        assert!(!args.is_empty());
    }

    #[test]
    fn identity_propagates_introspection_failures() {
        let src = crate::test_utils::FixedProcess::unreadable();
        assert!(ProcessIdentity::current(&src).is_err());
        let src = crate::test_utils::FixedProcess::new("/usr/bin/node", &[]);
        assert!(matches!(
            ProcessIdentity::current(&src),
            Err(InjectorError::Empty(_))
        ));
    }
}
