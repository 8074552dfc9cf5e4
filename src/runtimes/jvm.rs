//! `JAVA_TOOL_OPTIONS`: attach the Java agent with `-javaagent:` and forward resource
//! attributes as a system property (the agent reads `otel.resource.attributes`).

use std::path::Path;

use tracing::{debug, info};

use super::resource_attributes;
use super::{RewriteContext, Rewriter};
use crate::util::fs::is_accessible;

pub const JAVA_TOOL_OPTIONS: &str = "JAVA_TOOL_OPTIONS";
const RESOURCE_ATTRIBUTES_PROPERTY: &str = "-Dotel.resource.attributes=";

pub struct JavaToolOptionsRewriter;

/// Pure value transformation once the agent jar is known to be reachable.
///
/// `resource_attributes` is the already formatted attribute list, empty when there is none.
pub fn inject_java_tool_options(
    original: Option<&str>,
    agent_path: &str,
    resource_attributes: &str,
) -> Option<String> {
    let javaagent = format!("-javaagent:{agent_path}");
    let orig = original.unwrap_or("");

    let mut additions: Vec<String> = Vec::new();
    if !orig.contains(&javaagent) {
        additions.push(javaagent);
    }
    if !resource_attributes.is_empty() && !orig.contains(RESOURCE_ATTRIBUTES_PROPERTY) {
        additions.push(format!("{RESOURCE_ATTRIBUTES_PROPERTY}{resource_attributes}"));
    }
    if additions.is_empty() {
        return None;
    }
    let additions = additions.join(" ");
    if orig.is_empty() {
        Some(additions)
    } else {
        Some(format!("{orig} {additions}"))
    }
}

impl Rewriter for JavaToolOptionsRewriter {
    fn variable(&self) -> &'static str {
        JAVA_TOOL_OPTIONS
    }

    fn rewrite(&self, original: Option<&str>, cx: &RewriteContext<'_>) -> Option<String> {
        if cx.config.disabled_runtimes.jvm {
            debug!("JVM auto-instrumentation is disabled, not modifying {JAVA_TOOL_OPTIONS}");
            return None;
        }
        let agent = cx.config.jvm_agent_path.as_str();
        if agent.is_empty() || !is_accessible(Path::new(agent)) {
            info!("Java agent \"{agent}\" is not accessible, not modifying {JAVA_TOOL_OPTIONS}");
            return None;
        }
        let attrs = resource_attributes::format(&resource_attributes::collect(cx.env));
        let out = inject_java_tool_options(original, agent, &attrs);
        if out.is_none() {
            debug!("{JAVA_TOOL_OPTIONS} already attaches {agent}, leaving it unchanged");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InjectorConfiguration;
    use crate::test_utils::{write_file, MapEnv};

    #[test]
    fn javaagent_alone() {
        assert_eq!(
            inject_java_tool_options(None, "/otel/javaagent.jar", "").as_deref(),
            Some("-javaagent:/otel/javaagent.jar")
        );
    }

    #[test]
    fn appends_to_existing_options() {
        assert_eq!(
            inject_java_tool_options(Some("-Dsome-property=x"), "/otel/javaagent.jar", "")
                .as_deref(),
            Some("-Dsome-property=x -javaagent:/otel/javaagent.jar")
        );
    }

    #[test]
    fn adds_resource_attributes_property() {
        assert_eq!(
            inject_java_tool_options(None, "/a.jar", "k8s.pod.name=p,service.name=s").as_deref(),
            Some("-javaagent:/a.jar -Dotel.resource.attributes=k8s.pod.name=p,service.name=s")
        );
    }

    #[test]
    fn markers_prevent_double_injection() {
        assert_eq!(
            inject_java_tool_options(Some("-javaagent:/a.jar -Xmx1g"), "/a.jar", ""),
            None
        );
        assert_eq!(
            inject_java_tool_options(
                Some("-javaagent:/a.jar -Dotel.resource.attributes=x=y"),
                "/a.jar",
                "a=b"
            ),
            None
        );
        assert_eq!(
            inject_java_tool_options(Some("-javaagent:/a.jar"), "/a.jar", "a=b").as_deref(),
            Some("-javaagent:/a.jar -Dotel.resource.attributes=a=b")
        );
    }

    #[test]
    fn rewriter_checks_disabled_and_agent_presence() {
        let td = tempfile::tempdir().expect("tmpdir");
        let jar = write_file(td.path(), "javaagent.jar", "PK");
        let env = MapEnv::new(&[("OTEL_INJECTOR_K8S_POD_UID", "uid-1")]);

        let mut cfg = InjectorConfiguration::default();
        cfg.jvm_agent_path = jar.clone();
        let cx = RewriteContext {
            config: &cfg,
            env: &env,
            libc: None,
        };
        assert_eq!(
            JavaToolOptionsRewriter.rewrite(None, &cx),
            Some(format!(
                "-javaagent:{jar} -Dotel.resource.attributes=k8s.pod.uid=uid-1"
            ))
        );

        let mut disabled = cfg.clone();
        disabled.disabled_runtimes.jvm = true;
        let cx = RewriteContext {
            config: &disabled,
            env: &env,
            libc: None,
        };
        assert_eq!(JavaToolOptionsRewriter.rewrite(None, &cx), None);

        let mut missing = cfg.clone();
        missing.jvm_agent_path = td.path().join("gone.jar").display().to_string();
        let cx = RewriteContext {
            config: &missing,
            env: &env,
            libc: None,
        };
        assert_eq!(JavaToolOptionsRewriter.rewrite(Some("-Xmx1g"), &cx), None);
    }
}
