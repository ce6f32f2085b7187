use std::path::{Path, PathBuf};

/// Normalize a path string: backslashes become forward slashes, runs of
/// separators collapse to one. Idempotent.
pub fn sanitize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_sep = false;
    for c in path.chars() {
        let is_sep = c == '/' || c == '\\';
        if is_sep {
            if !prev_sep {
                out.push('/');
            }
        } else {
            out.push(c);
        }
        prev_sep = is_sep;
    }
    out
}

/// Walk a path and every prefix of it, nearest first: `/a/b/c` yields
/// `/a/b/c`, `/a/b`, `/a`. The filesystem root (or drive prefix) itself is
/// never yielded.
pub fn ancestors(path: &Path) -> impl Iterator<Item = &Path> {
    path.ancestors().filter(|p| p.parent().is_some())
}

/// Map a source file under `root` to its mirror location under `output_root`.
/// Falls back to joining the full source path if it is not under `root`.
pub fn dest_path(root: &Path, output_root: &Path, source: &Path) -> PathBuf {
    let rel = source.strip_prefix(root).unwrap_or(source);
    output_root.join(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_converts_and_collapses() {
        assert_eq!(sanitize("a\\b//c"), "a/b/c");
        assert_eq!(sanitize("a\\\\b///c"), "a/b/c");
        assert_eq!(sanitize("/already/clean"), "/already/clean");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize("C:\\some\\\\dir//file.txt");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn ancestors_nearest_first_stops_before_root() {
        let got: Vec<&Path> = ancestors(Path::new("/a/b/c")).collect();
        assert_eq!(
            got,
            vec![Path::new("/a/b/c"), Path::new("/a/b"), Path::new("/a")]
        );
    }

    #[test]
    fn ancestors_of_relative_path() {
        let got: Vec<&Path> = ancestors(Path::new("a/b")).collect();
        assert_eq!(got, vec![Path::new("a/b"), Path::new("a")]);
    }

    #[test]
    fn dest_path_remaps_under_output() {
        let dest = dest_path(
            Path::new("/src/root"),
            Path::new("/out"),
            Path::new("/src/root/sub/f.txt"),
        );
        assert_eq!(dest, PathBuf::from("/out/sub/f.txt"));
    }
}
