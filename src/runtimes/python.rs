//! `PYTHONPATH`: put the Python agent directory (with its `sitecustomize`) first on the path.
//!
//! Opt-in: the agent path prefix defaults to empty, which disables Python injection.

use std::path::Path;

use tracing::{debug, error, info};

use super::{prepend_list_entry, RewriteContext, Rewriter};
use crate::util::fs::is_accessible;

pub const PYTHONPATH: &str = "PYTHONPATH";

pub struct PythonPathRewriter;

/// Agent directory for the configured prefix; `None` when it cannot be determined.
fn agent_dir(prefix: &str, cx: &RewriteContext<'_>) -> Option<String> {
    if cfg!(feature = "libc-flavor") {
        match cx.libc {
            Some(flavor) => Some(format!("{}/{}", prefix.trim_end_matches('/'), flavor)),
            None => {
                error!("C library flavor was not detected, cannot pick the Python agent build");
                None
            }
        }
    } else {
        Some(prefix.to_string())
    }
}

/// Pure value transformation once the agent directory is known to be reachable.
///
/// An original value that already contains the agent directory (for example inherited from a
/// parent process that was injected too) is left alone.
pub fn inject_python_path(original: Option<&str>, agent_dir: &str) -> Option<String> {
    if original.is_some_and(|orig| orig.contains(agent_dir)) {
        return None;
    }
    Some(prepend_list_entry(agent_dir, original, ':'))
}

impl Rewriter for PythonPathRewriter {
    fn variable(&self) -> &'static str {
        PYTHONPATH
    }

    fn rewrite(&self, original: Option<&str>, cx: &RewriteContext<'_>) -> Option<String> {
        if cx.config.disabled_runtimes.python {
            debug!("Python auto-instrumentation is disabled, not modifying {PYTHONPATH}");
            return None;
        }
        let prefix = cx.config.python_agent_path_prefix.as_str();
        if prefix.is_empty() {
            debug!("no Python agent path prefix configured, not modifying {PYTHONPATH}");
            return None;
        }
        let dir = agent_dir(prefix, cx)?;
        if !is_accessible(Path::new(&dir)) {
            info!("Python agent directory \"{dir}\" is not accessible, not modifying {PYTHONPATH}");
            return None;
        }
        let out = inject_python_path(original, &dir);
        if out.is_none() {
            debug!("{PYTHONPATH} already contains {dir}, leaving it unchanged");
        }
        out
    }
}
