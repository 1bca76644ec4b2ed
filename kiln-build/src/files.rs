//! Locating files referenced by records.

use std::path::{Path, PathBuf};

use crate::BindPath;

const NAMED_PREFIX: &str = "bindpath.";

/// Find a referenced file.
///
/// `bindpath.<Name>\rest` searches only the roots named `Name`. Other
/// relative paths are tried under each unnamed root in order, then under
/// `base_dir` (the directory of the declaring source), then as given.
pub(crate) fn find_file(
    reference: &Path,
    bind_paths: &[BindPath],
    base_dir: Option<&Path>,
) -> Option<PathBuf> {
    let text = reference.to_string_lossy();

    if let Some(rest) = strip_prefix_ignore_case(&text, NAMED_PREFIX) {
        let (name, relative) = rest.split_once(['\\', '/'])?;
        return bind_paths
            .iter()
            .filter(|b| b.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .map(|b| b.path.join(relative))
            .find(|candidate| candidate.is_file());
    }

    if reference.is_absolute() {
        return reference.is_file().then(|| reference.to_path_buf());
    }

    bind_paths
        .iter()
        .filter(|b| b.name.is_none())
        .map(|b| b.path.as_path())
        .chain(base_dir)
        .map(|root| root.join(reference))
        .chain(std::iter::once(reference.to_path_buf()))
        .find(|candidate| candidate.is_file())
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn layout() -> TempDir {
        let temp = TempDir::new().unwrap();
        for dir in ["first", "second", "media", "src"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        fs::write(temp.path().join("second/app.exe"), b"second").unwrap();
        fs::write(temp.path().join("media/app.exe"), b"media").unwrap();
        fs::write(temp.path().join("src/readme.txt"), b"readme").unwrap();
        temp
    }

    #[test]
    fn test_unnamed_roots_in_order() {
        let temp = layout();
        let roots = vec![
            BindPath::new(temp.path().join("first")),
            BindPath::named("Media", temp.path().join("media")),
            BindPath::new(temp.path().join("second")),
        ];

        let found = find_file(Path::new("app.exe"), &roots, None).unwrap();
        assert_eq!(found, temp.path().join("second/app.exe"));
    }

    #[test]
    fn test_named_root() {
        let temp = layout();
        let roots = vec![
            BindPath::new(temp.path().join("second")),
            BindPath::named("Media", temp.path().join("media")),
        ];

        let found = find_file(Path::new("bindpath.media\\app.exe"), &roots, None).unwrap();
        assert_eq!(found, temp.path().join("media").join("app.exe"));
        assert!(find_file(Path::new("bindpath.Other/app.exe"), &roots, None).is_none());
    }

    #[test]
    fn test_falls_back_to_source_directory() {
        let temp = layout();
        let src = temp.path().join("src");

        let found = find_file(Path::new("readme.txt"), &[], Some(&src)).unwrap();
        assert_eq!(found, src.join("readme.txt"));
        assert!(find_file(Path::new("missing.txt"), &[], Some(&src)).is_none());
    }

    #[test]
    fn test_absolute_path() {
        let temp = layout();
        let path = temp.path().join("media/app.exe");

        assert_eq!(find_file(&path, &[], None), Some(path.clone()));
        assert!(find_file(&temp.path().join("nope"), &[], None).is_none());
    }
}
