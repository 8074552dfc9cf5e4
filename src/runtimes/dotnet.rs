//! .NET CLR profiler and startup-hook variables.
//!
//! The agent home is `<prefix>/<libc flavor>`; the native profiler lives in a per-platform
//! subdirectory (`linux-x64`, `linux-musl-arm64`, ...).

use std::path::Path;

use tracing::{debug, error, info};

use super::{prepend_list_entry, RewriteContext, Rewriter};
use crate::libc_flavor::LibcFlavor;
use crate::util::fs::is_accessible;

/// CLSID of the OpenTelemetry .NET CLR profiler.
pub const PROFILER_CLSID: &str = "{918728DD-259F-4A6A-AC2B-B85E1B658318}";
const NATIVE_PROFILER_FILE: &str = "OpenTelemetry.AutoInstrumentation.Native.so";
const STARTUP_HOOK_FILE: &str = "net/OpenTelemetry.AutoInstrumentation.StartupHook.dll";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotnetVariable {
    CoreclrEnableProfiling,
    CoreclrProfiler,
    CoreclrProfilerPath,
    DotnetAdditionalDeps,
    DotnetSharedStore,
    DotnetStartupHooks,
    OtelDotnetAutoHome,
}

impl DotnetVariable {
    pub fn name(self) -> &'static str {
        match self {
            DotnetVariable::CoreclrEnableProfiling => "CORECLR_ENABLE_PROFILING",
            DotnetVariable::CoreclrProfiler => "CORECLR_PROFILER",
            DotnetVariable::CoreclrProfilerPath => "CORECLR_PROFILER_PATH",
            DotnetVariable::DotnetAdditionalDeps => "DOTNET_ADDITIONAL_DEPS",
            DotnetVariable::DotnetSharedStore => "DOTNET_SHARED_STORE",
            DotnetVariable::DotnetStartupHooks => "DOTNET_STARTUP_HOOKS",
            DotnetVariable::OtelDotnetAutoHome => "OTEL_DOTNET_AUTO_HOME",
        }
    }

    /// List-valued variables get our entry prepended; scalars are only set when absent.
    fn is_path_list(self) -> bool {
        matches!(
            self,
            DotnetVariable::DotnetAdditionalDeps
                | DotnetVariable::DotnetSharedStore
                | DotnetVariable::DotnetStartupHooks
        )
    }
}

/// Platform directory of the native profiler, `None` on unsupported architectures.
pub fn platform_dir(flavor: LibcFlavor, arch: &str) -> Option<String> {
    let arch = match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        _ => return None,
    };
    Some(match flavor {
        LibcFlavor::Glibc => format!("linux-{arch}"),
        LibcFlavor::Musl => format!("linux-musl-{arch}"),
    })
}

/// The value the agent wants for `var`, given its home directory and platform directory.
pub fn agent_value(var: DotnetVariable, home: &str, platform: &str) -> String {
    match var {
        DotnetVariable::CoreclrEnableProfiling => "1".to_string(),
        DotnetVariable::CoreclrProfiler => PROFILER_CLSID.to_string(),
        DotnetVariable::CoreclrProfilerPath => format!("{home}/{platform}/{NATIVE_PROFILER_FILE}"),
        DotnetVariable::DotnetAdditionalDeps => format!("{home}/AdditionalDeps"),
        DotnetVariable::DotnetSharedStore => format!("{home}/store"),
        DotnetVariable::DotnetStartupHooks => format!("{home}/{STARTUP_HOOK_FILE}"),
        DotnetVariable::OtelDotnetAutoHome => home.to_string(),
    }
}

/// Combine the agent's value with whatever the process already has.
pub fn inject_dotnet_value(var: DotnetVariable, original: Option<&str>, value: &str) -> Option<String> {
    match original {
        Some(orig) if var.is_path_list() => {
            if orig.split(':').any(|entry| entry == value) {
                None
            } else {
                Some(prepend_list_entry(value, Some(orig), ':'))
            }
        }
        Some(_) => None,
        None => Some(value.to_string()),
    }
}

pub struct DotnetRewriter(pub DotnetVariable);

impl Rewriter for DotnetRewriter {
    fn variable(&self) -> &'static str {
        self.0.name()
    }

    fn rewrite(&self, original: Option<&str>, cx: &RewriteContext<'_>) -> Option<String> {
        let name = self.0.name();
        if cx.config.disabled_runtimes.dotnet {
            debug!(".NET auto-instrumentation is disabled, not modifying {name}");
            return None;
        }
        let prefix = cx.config.dotnet_agent_path_prefix.as_str();
        if prefix.is_empty() {
            debug!("no .NET agent path prefix configured, not modifying {name}");
            return None;
        }
        let Some(flavor) = cx.libc else {
            error!("C library flavor was not detected, cannot pick the .NET agent build for {name}");
            return None;
        };
        let Some(platform) = platform_dir(flavor, std::env::consts::ARCH) else {
            info!(
                ".NET auto-instrumentation is not supported on {}, not modifying {name}",
                std::env::consts::ARCH
            );
            return None;
        };
        let home = format!("{}/{}", prefix.trim_end_matches('/'), flavor);
        if !is_accessible(Path::new(&home)) {
            info!(".NET agent directory \"{home}\" is not accessible, not modifying {name}");
            return None;
        }
        let value = agent_value(self.0, &home, &platform);
        inject_dotnet_value(self.0, original, &value)
    }
}
