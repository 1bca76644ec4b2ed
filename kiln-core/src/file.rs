use std::{io, path::Path};

/// Write bytes to a file, creating parent directories as needed.
pub fn write_file(path: &Path, content: impl AsRef<[u8]>) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}

/// How to handle existing files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overwrite {
    /// Always overwrite the destination
    #[default]
    Always,
    /// Only create if the destination doesn't exist
    IfMissing,
}

impl Overwrite {
    /// Whether writing to `path` should be skipped under this rule.
    pub fn skips(self, path: &Path) -> bool {
        matches!(self, Overwrite::IfMissing) && path.exists()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_write_file_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("b").join("out.bin");

        write_file(&path, b"nested").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"nested");
    }

    #[test]
    fn test_write_file_overwrites_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.txt");

        write_file(&path, "first").unwrap();
        write_file(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_overwrite_skips() {
        let temp = TempDir::new().unwrap();
        let existing = temp.path().join("existing.txt");
        fs::write(&existing, "original").unwrap();
        let missing = temp.path().join("missing.txt");

        assert!(Overwrite::IfMissing.skips(&existing));
        assert!(!Overwrite::IfMissing.skips(&missing));
        assert!(!Overwrite::Always.skips(&existing));
    }
}
