//! Path helpers shared by the graph analyzer and the normalizer
//!
//! Graph nodes carry absolute paths; findings carry paths relative to the
//! project root. Both are handled as `/`-separated strings so ids do not
//! depend on the host platform.

use std::path::Path;

/// Convert `path` to a project-relative path. Paths outside `root` are
/// returned unchanged.
pub fn rel_path(root: &str, path: &str) -> String {
    let path = to_slash(path);
    let root = to_slash(root);
    let root = root.trim_end_matches('/');
    if root.is_empty() || root == "." {
        return path.trim_start_matches("./").to_string();
    }
    match path.strip_prefix(root) {
        Some(rest) if rest.is_empty() => ".".to_string(),
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').to_string(),
        _ => path.trim_start_matches("./").to_string(),
    }
}

/// Normalize a scan scope: `None`, `""`, `"."` and `"./"` mean the whole
/// project.
pub fn normalize_scope(scope: Option<&str>) -> Option<String> {
    let scope = scope?;
    let scope = to_slash(scope);
    let trimmed = scope.trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// True when `file` equals `dir` or lives below it
pub fn is_within(file: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    file == dir || file.starts_with(&format!("{dir}/"))
}

/// Final path component
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent directory of a `/`-separated path (empty for top-level files)
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Path without its final extension
pub fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

pub fn to_slash(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn path_to_string(path: &Path) -> String {
    to_slash(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rel_path() {
        assert_eq!(rel_path("/repo", "/repo/src/a.py"), "src/a.py");
        assert_eq!(rel_path("/repo/", "/repo/src/a.py"), "src/a.py");
        assert_eq!(rel_path("/repo", "/other/a.py"), "/other/a.py");
        assert_eq!(rel_path("/repo", "/repository/a.py"), "/repository/a.py");
        assert_eq!(rel_path("", "./src/a.py"), "src/a.py");
        assert_eq!(rel_path("/repo", "./src/a.py"), "src/a.py");
        assert_eq!(rel_path("/repo", "src/a.py"), "src/a.py");
    }

    #[test]
    fn test_normalize_scope() {
        assert_eq!(normalize_scope(None), None);
        assert_eq!(normalize_scope(Some(".")), None);
        assert_eq!(normalize_scope(Some("./")), None);
        assert_eq!(normalize_scope(Some("./src/")), Some("src".to_string()));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("src/a.py", "src"));
        assert!(is_within("src/a.py", "src/"));
        assert!(is_within("src", "src"));
        assert!(!is_within("srcx/a.py", "src"));
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(file_name("src/pkg/mod.py"), "mod.py");
        assert_eq!(parent_dir("src/pkg/mod.py"), "src/pkg");
        assert_eq!(parent_dir("mod.py"), "");
        assert_eq!(strip_extension("src/pkg/mod.py"), "src/pkg/mod");
        assert_eq!(strip_extension("src/.hidden"), "src/.hidden");
    }
}
