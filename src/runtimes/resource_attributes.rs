//! `OTEL_RESOURCE_ATTRIBUTES`: add resource attributes supplied to the injector
//! (explicit list plus Kubernetes downward-API variables).

use tracing::{debug, warn};

use super::{RewriteContext, Rewriter};
use crate::env::EnvAccessor;
use crate::util::{split_comma_list, trim_ws};

pub const OTEL_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";
pub const ENV_RESOURCE_ATTRIBUTES: &str = "OTEL_INJECTOR_RESOURCE_ATTRIBUTES";

/// Injector variables mapped onto well-known resource attribute keys.
const ATTRIBUTE_MAPPINGS: [(&str, &str); 5] = [
    ("OTEL_INJECTOR_K8S_NAMESPACE_NAME", "k8s.namespace.name"),
    ("OTEL_INJECTOR_K8S_POD_NAME", "k8s.pod.name"),
    ("OTEL_INJECTOR_K8S_POD_UID", "k8s.pod.uid"),
    ("OTEL_INJECTOR_K8S_CONTAINER_NAME", "k8s.container.name"),
    ("OTEL_INJECTOR_SERVICE_NAME", "service.name"),
];

pub struct ResourceAttributesRewriter;

/// Collect `key=value` attributes from the injector's environment, in a stable order.
pub fn collect(env: &dyn EnvAccessor) -> Vec<(String, String)> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    if let Some(raw) = env.var(ENV_RESOURCE_ATTRIBUTES) {
        for item in split_comma_list(&raw) {
            match item.split_once('=') {
                Some((k, v)) if !trim_ws(k).is_empty() => {
                    attrs.push((trim_ws(k).to_string(), trim_ws(v).to_string()))
                }
                _ => warn!("{ENV_RESOURCE_ATTRIBUTES}: cannot parse \"{item}\", expected key=value"),
            }
        }
    }
    for (var, key) in ATTRIBUTE_MAPPINGS {
        if let Some(v) = env.var(var) {
            let v = trim_ws(&v);
            if !v.is_empty() {
                attrs.push((key.to_string(), v.to_string()));
            }
        }
    }
    attrs
}

/// Render attributes in the `OTEL_RESOURCE_ATTRIBUTES` wire form.
pub fn format(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn keys_of(value: &str) -> Vec<String> {
    split_comma_list(value)
        .into_iter()
        .filter_map(|item| item.split_once('=').map(|(k, _)| trim_ws(k).to_string()))
        .collect()
}

/// Merge collected attributes into an original value. Keys the original already defines win.
pub fn merge(original: Option<&str>, attrs: &[(String, String)]) -> Option<String> {
    if attrs.is_empty() {
        return None;
    }
    match original.filter(|o| !trim_ws(o).is_empty()) {
        None => Some(format(attrs)),
        Some(orig) => {
            let existing = keys_of(orig);
            let extra: Vec<(String, String)> = attrs
                .iter()
                .filter(|(k, _)| !existing.iter().any(|e| e == k))
                .cloned()
                .collect();
            if extra.is_empty() {
                None
            } else {
                Some(format!("{orig},{}", format(&extra)))
            }
        }
    }
}

impl Rewriter for ResourceAttributesRewriter {
    fn variable(&self) -> &'static str {
        OTEL_RESOURCE_ATTRIBUTES
    }

    fn rewrite(&self, original: Option<&str>, cx: &RewriteContext<'_>) -> Option<String> {
        let attrs = collect(cx.env);
        if attrs.is_empty() {
            debug!("no resource attributes configured, not modifying {OTEL_RESOURCE_ATTRIBUTES}");
            return None;
        }
        merge(original, &attrs)
    }
}
