//! `NODE_OPTIONS`: preload the Node.js agent with `--require`.

use std::path::Path;

use tracing::{debug, info};

use super::{RewriteContext, Rewriter};
use crate::util::fs::is_accessible;

pub const NODE_OPTIONS: &str = "NODE_OPTIONS";

pub struct NodeOptionsRewriter;

/// The flag that loads `agent_path` before the application's entry point.
pub fn require_flag(agent_path: &str) -> String {
    format!("--require {agent_path}")
}

/// Pure value transformation once the agent is known to be reachable.
pub fn inject_require(original: Option<&str>, agent_path: &str) -> Option<String> {
    let flag = require_flag(agent_path);
    match original {
        Some(orig) if orig.contains(&flag) => None,
        Some(orig) => Some(format!("{flag} {orig}")),
        None => Some(flag),
    }
}

impl Rewriter for NodeOptionsRewriter {
    fn variable(&self) -> &'static str {
        NODE_OPTIONS
    }

    fn rewrite(&self, original: Option<&str>, cx: &RewriteContext<'_>) -> Option<String> {
        if cx.config.disabled_runtimes.nodejs {
            debug!("Node.js auto-instrumentation is disabled, not modifying {NODE_OPTIONS}");
            return None;
        }
        let agent = cx.config.nodejs_agent_path.as_str();
        if agent.is_empty() || !is_accessible(Path::new(agent)) {
            info!(
                "Node.js agent \"{agent}\" is not accessible, not modifying {NODE_OPTIONS}"
            );
            return None;
        }
        let out = inject_require(original, agent);
        if out.is_none() {
            debug!("{NODE_OPTIONS} already requires {agent}, leaving it unchanged");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InjectorConfiguration;
    use crate::test_utils::{write_file, MapEnv};

    fn rewrite_with(cfg: &InjectorConfiguration, original: Option<&str>) -> Option<String> {
        let env = MapEnv::default();
        let cx = RewriteContext {
            config: cfg,
            env: &env,
            libc: None,
        };
        NodeOptionsRewriter.rewrite(original, &cx)
    }

    #[test]
    fn inject_require_without_original() {
        assert_eq!(
            inject_require(None, "/otel/register.js").as_deref(),
            Some("--require /otel/register.js")
        );
    }

    #[test]
    fn inject_require_prepends_to_original() {
        assert_eq!(
            inject_require(Some("--max-old-space-size=512"), "/otel/register.js").as_deref(),
            Some("--require /otel/register.js --max-old-space-size=512")
        );
    }

    #[test]
    fn inject_require_is_a_no_op_when_already_present() {
        assert_eq!(
            inject_require(
                Some("--require /otel/register.js --inspect"),
                "/otel/register.js"
            ),
            None
        );
    }

    #[test]
    fn declines_when_agent_is_missing() {
        let mut cfg = InjectorConfiguration::default();
        cfg.nodejs_agent_path = "/nonexistent/register.js".into();
        assert_eq!(rewrite_with(&cfg, None), None);
        assert_eq!(rewrite_with(&cfg, Some("--inspect")), None);
    }

    #[test]
    fn declines_when_disabled() {
        let td = tempfile::tempdir().expect("tmpdir");
        let mut cfg = InjectorConfiguration::default();
        cfg.nodejs_agent_path = write_file(td.path(), "register.js", "");
        cfg.disabled_runtimes.nodejs = true;
        assert_eq!(rewrite_with(&cfg, None), None);
    }

    #[test]
    fn injects_when_agent_is_present() {
        let td = tempfile::tempdir().expect("tmpdir");
        let mut cfg = InjectorConfiguration::default();
        cfg.nodejs_agent_path = write_file(td.path(), "register.js", "");
        let expected = format!("--require {}", cfg.nodejs_agent_path);
        assert_eq!(rewrite_with(&cfg, None), Some(expected.clone()));
        assert_eq!(
            rewrite_with(&cfg, Some("--trace-warnings")),
            Some(format!("{expected} --trace-warnings"))
        );
    }
}
