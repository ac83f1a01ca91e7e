use std::path::{Path, PathBuf};

/// Replaces a leading `~` with the home directory of the current user.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Renders `path` relative to the home directory as `~/...` where possible.
pub fn abbreviate_home(path: &Path) -> String {
    dirs::home_dir()
        .and_then(|home| abbreviate(path, &home))
        .unwrap_or_else(|| path.display().to_string())
}

fn abbreviate(path: &Path, home: &Path) -> Option<String> {
    let rest = path.strip_prefix(home).ok()?;
    if rest.as_os_str().is_empty() {
        Some("~".to_string())
    } else {
        Some(Path::new("~").join(rest).display().to_string())
    }
}
