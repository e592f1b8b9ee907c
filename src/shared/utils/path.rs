use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Expands a leading `~` or `~/` to the home directory. `~user` forms are left alone.
/// Returns `None` when the path needs a home directory and none is known.
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    expand_tilde_in(path, home_dir().as_deref())
}

fn expand_tilde_in(path: &str, home: Option<&Path>) -> Option<PathBuf> {
    match path.strip_prefix('~') {
        Some("") => home.map(Path::to_path_buf),
        Some(rest) if rest.starts_with('/') => {
            home.map(|home| home.join(rest.trim_start_matches('/')))
        }
        _ => Some(PathBuf::from(path)),
    }
}

/// Renders a path for messages, showing the home directory as `~`.
pub fn display_path(path: &Path) -> String {
    let Some(home) = home_dir() else {
        return path.display().to_string();
    };

    match path.strip_prefix(&home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}
