use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Resolve the program a stage names, the way a typical shell would.
///
/// - A name containing a `/` (absolute, `./foo`, `bin/sh`) is used as given.
/// - A bare name is searched for in each directory of `search_paths` (a `PATH`
///   value), first match wins.
/// - Only regular files with an execute bit qualify.
///
/// `None` means the child should report "command not found".
pub fn find_command_path(search_paths: &OsStr, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let path = Path::new(name);
        return is_executable(path).then(|| path.to_path_buf());
    }
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}
