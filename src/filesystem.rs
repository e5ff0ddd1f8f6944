//! In-memory asset store for one repository
//!
//! A repository's files (fragment sources, SSH key sets, anything else the
//! rendering layer looks up) are held here, keyed by their path relative to
//! the repository root with `/` separators. Loading happens once; lookups
//! during a request never touch the disk.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A file with its raw content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// File content as bytes
    pub content: Vec<u8>,
}

impl File {
    /// Create a new file with content
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    /// Create a new file from string content
    pub fn from_string(content: &str) -> Self {
        Self::new(content.as_bytes().to_vec())
    }
}

/// In-memory filesystem keyed by normalized relative path
#[derive(Debug, Clone, Default)]
pub struct MemoryFS {
    files: BTreeMap<String, File>,
}

impl MemoryFS {
    /// Create a new empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every regular file below `root`
    ///
    /// Hidden files and directories (names starting with `.`) are skipped.
    pub fn load_dir(root: &Path) -> Result<Self> {
        let mut fs = Self::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

        for entry in walker {
            let entry = entry.map_err(|err| Error::Io(err.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).map_err(|_| Error::ConfigParse {
                message: format!("{} is outside {}", entry.path().display(), root.display()),
                hint: None,
            })?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            fs.add_file(&key, File::new(std::fs::read(entry.path())?));
        }

        debug!("Loaded {} files from {}", fs.len(), root.display());
        Ok(fs)
    }

    /// Add or update a file
    pub fn add_file(&mut self, path: &str, file: File) {
        self.files.insert(normalize(path), file);
    }

    /// Add a file with string content
    pub fn add_file_string(&mut self, path: &str, content: &str) {
        self.add_file(path, File::from_string(content));
    }

    /// Get a file by path
    pub fn get_file(&self, path: &str) -> Option<&File> {
        self.files.get(&normalize(path))
    }

    /// Get a file's content as UTF-8 text
    pub fn get_text(&self, path: &str) -> Result<Option<String>> {
        match self.get_file(path) {
            Some(file) => String::from_utf8(file.content.clone())
                .map(Some)
                .map_err(|_| Error::ConfigParse {
                    message: format!("{} is not valid UTF-8", path),
                    hint: None,
                }),
            None => Ok(None),
        }
    }

    /// Get the number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if filesystem is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

fn normalize(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut fs = MemoryFS::new();
        fs.add_file_string("cloud-config/base.yaml", "packages: [curl]");

        assert!(fs.get_file("./cloud-config//base.yaml").is_some());
        assert_eq!(
            fs.get_text("cloud-config/base.yaml").unwrap().as_deref(),
            Some("packages: [curl]")
        );
        assert!(fs.get_text("missing.yaml").unwrap().is_none());
        assert_eq!(fs.len(), 1);
    }

    #[test]
    fn test_get_text_invalid_utf8() {
        let mut fs = MemoryFS::new();
        fs.add_file("bin", File::new(vec![0xff, 0xfe]));
        assert!(fs.get_text("bin").is_err());
        assert_eq!(fs.get_file("bin").unwrap().content.len(), 2);
    }

    #[test]
    fn test_load_dir_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cloud-config")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("repository.yaml"), "name: r").unwrap();
        std::fs::write(dir.path().join("cloud-config/a.yaml"), "a: 1").unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();

        let fs = MemoryFS::load_dir(dir.path()).unwrap();
        assert_eq!(fs.len(), 2);
        assert!(fs.get_file("cloud-config/a.yaml").is_some());
        assert!(fs.get_file(".git/HEAD").is_none());
    }
}
