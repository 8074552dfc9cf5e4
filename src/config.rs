/*!
Injector configuration: defaults, config file, environment overrides, "all agents" env file.

Precedence (lowest to highest):
1. built-in defaults
2. the config file (`OTEL_INJECTOR_CONFIG_FILE` or `/etc/opentelemetry/otelinject.conf`)
3. environment variables

List settings append across config file lines, but an environment variable replaces the whole
list. `auto_instrumentation_disabled` resets all runtime flags on every occurrence, so the last
occurrence (file, then environment) wins outright.
*/

pub mod file;

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, error, warn};

use crate::env::EnvAccessor;
use crate::errors::InjectorError;
use crate::util::{parse_bool, split_comma_list, trim_ws};
use file::{parse_lines, KeyValue};

pub const DEFAULT_CONFIG_FILE: &str = "/etc/opentelemetry/otelinject.conf";
pub const DEFAULT_DOTNET_AGENT_PATH_PREFIX: &str = "/usr/lib/opentelemetry/dotnet";
pub const DEFAULT_JVM_AGENT_PATH: &str = "/usr/lib/opentelemetry/jvm/javaagent.jar";
pub const DEFAULT_NODEJS_AGENT_PATH: &str = "/usr/lib/opentelemetry/nodejs/node_modules/@opentelemetry/auto-instrumentations-node/build/src/register.js";
pub const DEFAULT_PYTHON_AGENT_PATH_PREFIX: &str = "";
pub const DEFAULT_ALL_AGENTS_ENV_PATH: &str =
    "/etc/opentelemetry/default_auto_instrumentation_env.conf";

/// Keys from the "all agents" env file must carry this prefix.
pub const AGENTS_ENV_PREFIX: &str = "OTEL_";

pub const ENV_CONFIG_FILE: &str = "OTEL_INJECTOR_CONFIG_FILE";
pub const ENV_DISABLED: &str = "OTEL_INJECTOR_DISABLED";
pub const ENV_AUTO_INSTRUMENTATION_DISABLED: &str = "OTEL_INJECTOR_AUTO_INSTRUMENTATION_DISABLED";
pub const ENV_DOTNET_AGENT_PATH_PREFIX: &str = "DOTNET_AUTO_INSTRUMENTATION_AGENT_PATH_PREFIX";
pub const ENV_JVM_AGENT_PATH: &str = "JVM_AUTO_INSTRUMENTATION_AGENT_PATH";
pub const ENV_NODEJS_AGENT_PATH: &str = "NODEJS_AUTO_INSTRUMENTATION_AGENT_PATH";
pub const ENV_PYTHON_AGENT_PATH_PREFIX: &str = "PYTHON_AUTO_INSTRUMENTATION_AGENT_PATH_PREFIX";
pub const ENV_INCLUDE_PATHS: &str = "OTEL_INJECTOR_INCLUDE_PATHS";
pub const ENV_EXCLUDE_PATHS: &str = "OTEL_INJECTOR_EXCLUDE_PATHS";
pub const ENV_INCLUDE_WITH_ARGUMENTS: &str = "OTEL_INJECTOR_INCLUDE_WITH_ARGUMENTS";
pub const ENV_EXCLUDE_WITH_ARGUMENTS: &str = "OTEL_INJECTOR_EXCLUDE_WITH_ARGUMENTS";

/// Per-runtime opt-outs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisabledRuntimes {
    pub dotnet: bool,
    pub jvm: bool,
    pub nodejs: bool,
    pub python: bool,
}

impl DisabledRuntimes {
    pub fn all() -> Self {
        Self {
            dotnet: true,
            jvm: true,
            nodejs: true,
            python: true,
        }
    }

    /// Reset every flag, then apply `*` or a comma list of runtime names.
    fn reset_and_apply(&mut self, value: &str, source: &str) {
        *self = Self::default();
        if trim_ws(value) == "*" {
            *self = Self::all();
            return;
        }
        for token in split_comma_list(value) {
            match token.as_str() {
                "dotnet" => self.dotnet = true,
                "jvm" => self.jvm = true,
                "nodejs" => self.nodejs = true,
                "python" => self.python = true,
                other => warn!(
                    "{source}: unknown runtime \"{other}\" in auto_instrumentation_disabled, ignoring it"
                ),
            }
        }
    }
}

/// Resolved configuration snapshot. Never mutated after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorConfiguration {
    pub dotnet_agent_path_prefix: String,
    pub jvm_agent_path: String,
    pub nodejs_agent_path: String,
    pub python_agent_path_prefix: String,
    pub all_agents_env_path: String,
    pub all_agents_env: BTreeMap<String, String>,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub include_with_arguments: Vec<String>,
    pub exclude_with_arguments: Vec<String>,
    pub disabled: bool,
    pub disabled_runtimes: DisabledRuntimes,
}

impl Default for InjectorConfiguration {
    fn default() -> Self {
        Self {
            dotnet_agent_path_prefix: DEFAULT_DOTNET_AGENT_PATH_PREFIX.to_string(),
            jvm_agent_path: DEFAULT_JVM_AGENT_PATH.to_string(),
            nodejs_agent_path: DEFAULT_NODEJS_AGENT_PATH.to_string(),
            python_agent_path_prefix: DEFAULT_PYTHON_AGENT_PATH_PREFIX.to_string(),
            all_agents_env_path: DEFAULT_ALL_AGENTS_ENV_PATH.to_string(),
            all_agents_env: BTreeMap::new(),
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            include_with_arguments: Vec::new(),
            exclude_with_arguments: Vec::new(),
            disabled: false,
            disabled_runtimes: DisabledRuntimes::default(),
        }
    }
}

impl InjectorConfiguration {
    /// The kill-switch configuration: nothing configured, everything off.
    pub fn globally_disabled() -> Self {
        Self {
            dotnet_agent_path_prefix: String::new(),
            jvm_agent_path: String::new(),
            nodejs_agent_path: String::new(),
            python_agent_path_prefix: String::new(),
            all_agents_env_path: String::new(),
            all_agents_env: BTreeMap::new(),
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            include_with_arguments: Vec::new(),
            exclude_with_arguments: Vec::new(),
            disabled: true,
            disabled_runtimes: DisabledRuntimes::default(),
        }
    }

    /// True when any include or exclude list is configured.
    pub fn has_process_filters(&self) -> bool {
        !(self.include_paths.is_empty()
            && self.exclude_paths.is_empty()
            && self.include_with_arguments.is_empty()
            && self.exclude_with_arguments.is_empty())
    }
}

/// Accumulates settings from every source before freezing them into a snapshot.
#[derive(Debug, Default)]
struct ConfigBuilder {
    cfg: InjectorConfiguration,
}

impl ConfigBuilder {
    fn apply_config_file_entry(&mut self, kv: &KeyValue, source: &str) {
        let c = &mut self.cfg;
        match kv.key.as_str() {
            "dotnet_auto_instrumentation_agent_path_prefix" => {
                c.dotnet_agent_path_prefix = kv.value.clone()
            }
            "jvm_auto_instrumentation_agent_path" => c.jvm_agent_path = kv.value.clone(),
            "nodejs_auto_instrumentation_agent_path" => c.nodejs_agent_path = kv.value.clone(),
            "python_auto_instrumentation_agent_path_prefix" => {
                c.python_agent_path_prefix = kv.value.clone()
            }
            "all_auto_instrumentation_agents_env_path" => {
                c.all_agents_env_path = kv.value.clone()
            }
            "include_paths" => c.include_paths.extend(split_comma_list(&kv.value)),
            "exclude_paths" => c.exclude_paths.extend(split_comma_list(&kv.value)),
            "include_with_arguments" => c
                .include_with_arguments
                .extend(split_comma_list(&kv.value)),
            "exclude_with_arguments" => c
                .exclude_with_arguments
                .extend(split_comma_list(&kv.value)),
            "auto_instrumentation_disabled" => {
                let src = format!("{source}:{}", kv.line);
                c.disabled_runtimes.reset_and_apply(&kv.value, &src)
            }
            other => warn!(
                "{source}:{}: unknown configuration key \"{other}\", ignoring it",
                kv.line
            ),
        }
    }

    fn apply_env_overrides(&mut self, env: &dyn EnvAccessor) {
        let c = &mut self.cfg;
        let get = |name: &str| env.var(name).map(|v| trim_ws(&v).to_string());

        if let Some(v) = get(ENV_DOTNET_AGENT_PATH_PREFIX) {
            c.dotnet_agent_path_prefix = v;
        }
        if let Some(v) = get(ENV_JVM_AGENT_PATH) {
            c.jvm_agent_path = v;
        }
        if let Some(v) = get(ENV_NODEJS_AGENT_PATH) {
            c.nodejs_agent_path = v;
        }
        if let Some(v) = get(ENV_PYTHON_AGENT_PATH_PREFIX) {
            c.python_agent_path_prefix = v;
        }
        if let Some(v) = get(ENV_AUTO_INSTRUMENTATION_DISABLED) {
            c.disabled_runtimes
                .reset_and_apply(&v, ENV_AUTO_INSTRUMENTATION_DISABLED);
        }
        if let Some(v) = get(ENV_INCLUDE_PATHS) {
            c.include_paths = split_comma_list(&v);
        }
        if let Some(v) = get(ENV_EXCLUDE_PATHS) {
            c.exclude_paths = split_comma_list(&v);
        }
        if let Some(v) = get(ENV_INCLUDE_WITH_ARGUMENTS) {
            c.include_with_arguments = split_comma_list(&v);
        }
        if let Some(v) = get(ENV_EXCLUDE_WITH_ARGUMENTS) {
            c.exclude_with_arguments = split_comma_list(&v);
        }
    }

    fn apply_agents_env_entry(&mut self, kv: KeyValue, source: &str) {
        if !kv.key.starts_with(AGENTS_ENV_PREFIX) {
            warn!(
                "{source}:{}: \"{}\" does not start with {AGENTS_ENV_PREFIX}, ignoring it",
                kv.line, kv.key
            );
            return;
        }
        self.cfg.all_agents_env.insert(kv.key, kv.value);
    }

    fn build(self) -> InjectorConfiguration {
        self.cfg
    }
}

/// Read and parse a config-format file. A missing or unreadable file is not an error.
fn load_file(path: &str) -> Result<Option<Vec<KeyValue>>, InjectorError> {
    match crate::util::fs::read_file_fallible(Path::new(path)) {
        Ok(buf) => Ok(Some(parse_lines(&buf, path))),
        Err(e) if e.is_fatal_for_resolution() => Err(e),
        Err(e) => {
            debug!("cannot read {path}: {e}, skipping it");
            Ok(None)
        }
    }
}

fn config_file_path(env: &dyn EnvAccessor) -> String {
    env.var(ENV_CONFIG_FILE)
        .map(|v| trim_ws(&v).to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string())
}

/// Reads one config-format file; `Ok(None)` when the source is absent.
type FileLoader<'a> = &'a dyn Fn(&str) -> Result<Option<Vec<KeyValue>>, InjectorError>;

fn try_resolve(
    env: &dyn EnvAccessor,
    load: FileLoader<'_>,
) -> Result<InjectorConfiguration, InjectorError> {
    if env.var(ENV_DISABLED).is_some_and(|v| parse_bool(&v)) {
        debug!("{ENV_DISABLED} is set, the injector is disabled");
        return Ok(InjectorConfiguration::globally_disabled());
    }

    let mut builder = ConfigBuilder::default();

    let config_path = config_file_path(env);
    if let Some(entries) = load(&config_path)? {
        debug!("reading configuration from {config_path}");
        for kv in &entries {
            builder.apply_config_file_entry(kv, &config_path);
        }
    }

    builder.apply_env_overrides(env);

    let agents_env_path = builder.cfg.all_agents_env_path.clone();
    if !agents_env_path.is_empty() {
        if let Some(entries) = load(&agents_env_path)? {
            debug!("reading agent environment from {agents_env_path}");
            for kv in entries {
                builder.apply_agents_env_entry(kv, &agents_env_path);
            }
        }
    }

    Ok(builder.build())
}

/// Resolve the configuration from all sources.
///
/// Never fails: an allocation failure or panic while resolving yields the default configuration
/// instead of a partially built one.
pub fn resolve(env: &dyn EnvAccessor) -> InjectorConfiguration {
    resolve_using(env, &load_file)
}

fn resolve_using(env: &dyn EnvAccessor, load: FileLoader<'_>) -> InjectorConfiguration {
    match panic::catch_unwind(AssertUnwindSafe(|| try_resolve(env, load))) {
        Ok(Ok(cfg)) => cfg,
        Ok(Err(e)) => {
            error!("configuration resolution failed: {e}; using the default configuration");
            InjectorConfiguration::default()
        }
        Err(_) => {
            error!("configuration resolution panicked; using the default configuration");
            InjectorConfiguration::default()
        }
    }
}
