/*!
Per-runtime rewriters for the environment variables the injector manages.

Every rewriter follows the same decision shape:
- disabled by configuration → decline
- agent not reachable → decline (with a diagnostic)
- agent already injected (marker present) → decline
- otherwise → construct the new value

Declining (`None`) means the caller sees the original value unchanged.
*/

pub mod dotnet;
pub mod jvm;
pub mod nodejs;
pub mod python;
pub mod resource_attributes;

use crate::config::InjectorConfiguration;
use crate::env::EnvAccessor;
use crate::libc_flavor::LibcFlavor;

use dotnet::{DotnetRewriter, DotnetVariable};

/// What a rewriter may consult besides the original value.
pub struct RewriteContext<'a> {
    pub config: &'a InjectorConfiguration,
    pub env: &'a dyn EnvAccessor,
    /// `None` when detection failed.
    pub libc: Option<LibcFlavor>,
}

/// Computes the injected value for one managed variable.
pub trait Rewriter: Send + Sync {
    fn variable(&self) -> &'static str;

    /// `Some(value)` to install `value`, `None` to leave the original untouched.
    fn rewrite(&self, original: Option<&str>, cx: &RewriteContext<'_>) -> Option<String>;
}

/// Environment variables intercepted by the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedVariable {
    NodeOptions,
    JavaToolOptions,
    PythonPath,
    ResourceAttributes,
    CoreclrEnableProfiling,
    CoreclrProfiler,
    CoreclrProfilerPath,
    DotnetAdditionalDeps,
    DotnetSharedStore,
    DotnetStartupHooks,
    OtelDotnetAutoHome,
}

impl ManagedVariable {
    pub const ALL: [ManagedVariable; 11] = [
        ManagedVariable::NodeOptions,
        ManagedVariable::JavaToolOptions,
        ManagedVariable::PythonPath,
        ManagedVariable::ResourceAttributes,
        ManagedVariable::CoreclrEnableProfiling,
        ManagedVariable::CoreclrProfiler,
        ManagedVariable::CoreclrProfilerPath,
        ManagedVariable::DotnetAdditionalDeps,
        ManagedVariable::DotnetSharedStore,
        ManagedVariable::DotnetStartupHooks,
        ManagedVariable::OtelDotnetAutoHome,
    ];

    pub fn from_name(name: &[u8]) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.rewriter().variable().as_bytes() == name)
    }

    /// Index of this variable's cache slot.
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn rewriter(self) -> &'static dyn Rewriter {
        match self {
            ManagedVariable::NodeOptions => &nodejs::NodeOptionsRewriter,
            ManagedVariable::JavaToolOptions => &jvm::JavaToolOptionsRewriter,
            ManagedVariable::PythonPath => &python::PythonPathRewriter,
            ManagedVariable::ResourceAttributes => {
                &resource_attributes::ResourceAttributesRewriter
            }
            ManagedVariable::CoreclrEnableProfiling => {
                &DotnetRewriter(DotnetVariable::CoreclrEnableProfiling)
            }
            ManagedVariable::CoreclrProfiler => &DotnetRewriter(DotnetVariable::CoreclrProfiler),
            ManagedVariable::CoreclrProfilerPath => {
                &DotnetRewriter(DotnetVariable::CoreclrProfilerPath)
            }
            ManagedVariable::DotnetAdditionalDeps => {
                &DotnetRewriter(DotnetVariable::DotnetAdditionalDeps)
            }
            ManagedVariable::DotnetSharedStore => {
                &DotnetRewriter(DotnetVariable::DotnetSharedStore)
            }
            ManagedVariable::DotnetStartupHooks => {
                &DotnetRewriter(DotnetVariable::DotnetStartupHooks)
            }
            ManagedVariable::OtelDotnetAutoHome => {
                &DotnetRewriter(DotnetVariable::OtelDotnetAutoHome)
            }
        }
    }
}

/// Prepend `entry` to a `sep`-separated list, or return it alone when there is no list yet.
pub(crate) fn prepend_list_entry(entry: &str, original: Option<&str>, sep: char) -> String {
    match original {
        Some(orig) if !orig.is_empty() => format!("{entry}{sep}{orig}"),
        _ => entry.to_string(),
    }
}
