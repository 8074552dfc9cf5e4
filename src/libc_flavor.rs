//! Detect which C library the host process runs on.
//!
//! The .NET agent ships separate native builds for glibc and musl, and the Python agent
//! optionally does too. Detection looks at the shared objects mapped into the process.

use std::fmt;

use anyhow::{bail, Context};

const PROC_SELF_MAPS: &str = "/proc/self/maps";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibcFlavor {
    Glibc,
    Musl,
}

impl LibcFlavor {
    /// Directory name used by the agent packages for this flavor.
    pub fn dir_name(self) -> &'static str {
        match self {
            LibcFlavor::Glibc => "glibc",
            LibcFlavor::Musl => "musl",
        }
    }
}

impl fmt::Display for LibcFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Detect the flavor of the current process from `/proc/self/maps`.
pub fn detect() -> anyhow::Result<LibcFlavor> {
    let raw = crate::util::fs::read_file_fallible(std::path::Path::new(PROC_SELF_MAPS))
        .with_context(|| format!("reading {PROC_SELF_MAPS}"))?;
    let maps = String::from_utf8_lossy(&raw);
    flavor_from_maps(&maps).with_context(|| format!("inspecting {PROC_SELF_MAPS}"))
}

/// Classify a maps listing. musl wins if both appear (e.g. gcompat shims on Alpine).
pub fn flavor_from_maps(maps: &str) -> anyhow::Result<LibcFlavor> {
    let mut glibc = false;
    for line in maps.lines() {
        let Some(object) = line.split_whitespace().nth(5) else {
            continue;
        };
        let name = object.rsplit('/').next().unwrap_or(object);
        if name.starts_with("ld-musl-") || name.starts_with("libc.musl-") {
            return Ok(LibcFlavor::Musl);
        }
        if name == "libc.so.6" || name.starts_with("libc-2.") {
            glibc = true;
        }
    }
    if glibc {
        Ok(LibcFlavor::Glibc)
    } else {
        bail!("no known C library is mapped into the process")
    }
}
