use std::io::Read;
use std::path::Path;

use nix::unistd::{access, AccessFlags};

use crate::errors::InjectorError;

/// True when the current process can read `p` (file or directory).
pub fn is_accessible(p: &Path) -> bool {
    access(p, AccessFlags::R_OK).is_ok()
}

/// Read a whole file, reserving its buffer fallibly so allocation failures surface
/// as `InjectorError::OutOfMemory` instead of aborting the host process.
pub fn read_file_fallible(p: &Path) -> Result<Vec<u8>, InjectorError> {
    let mut f = std::fs::File::open(p)?;
    let hint = f.metadata().map(|m| m.len() as usize).unwrap_or(0);
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(hint)?;
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessible_file_and_missing_file() {
        let td = tempfile::tempdir().expect("tmpdir");
        let f = td.path().join("agent.js");
        std::fs::write(&f, "x").expect("write");
        assert!(is_accessible(&f));
        assert!(is_accessible(td.path()));
        assert!(!is_accessible(&td.path().join("missing.js")));
    }

    #[test]
    fn read_file_returns_contents_and_maps_not_found() {
        let td = tempfile::tempdir().expect("tmpdir");
        let f = td.path().join("otelinject.conf");
        std::fs::write(&f, "a=b\n").expect("write");
        assert_eq!(read_file_fallible(&f).expect("read"), b"a=b\n");

        match read_file_fallible(&td.path().join("nope.conf")) {
            Err(InjectorError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
