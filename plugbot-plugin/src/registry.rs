//! Plugin registry

use plugbot_core::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Immutable mapping from command name to executable path.
///
/// Built from a single non-recursive directory listing. Every entry is
/// registered under its file name, whatever its type or permissions; entries
/// that cannot be executed surface as launch failures when invoked.
#[derive(Debug, Clone)]
pub struct Registry {
    dir: PathBuf,
    commands: HashMap<String, PathBuf>,
}

impl Registry {
    /// Scan `dir` and register every entry in it.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let directory_error = |source| Error::Directory {
            path: dir.to_path_buf(),
            source,
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(directory_error)? {
            let entry = entry.map_err(directory_error)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        // read_dir order is platform dependent; sort so the scan is repeatable
        names.sort();

        let registry = Self::from_entries(
            dir,
            names.into_iter().map(|name| {
                tracing::debug!(command = %name, "found plugin");
                let path = dir.join(&name);
                (name, path)
            }),
        );
        Ok(registry)
    }

    /// Build a registry from explicit `(name, path)` pairs.
    ///
    /// A repeated name replaces the earlier entry.
    pub fn from_entries<I, N, P>(dir: impl Into<PathBuf>, entries: I) -> Self
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: Into<PathBuf>,
    {
        let mut commands = HashMap::new();
        for (name, path) in entries {
            commands.insert(name.into(), path.into());
        }
        Self {
            dir: dir.into(),
            commands,
        }
    }

    /// Directory this registry was built from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the executable path for a command
    pub fn lookup(&self, name: &str) -> Option<&Path> {
        self.commands.get(name).map(PathBuf::as_path)
    }

    /// Like [`lookup`](Self::lookup), but a miss is an `UnknownCommand` error
    pub fn resolve(&self, name: &str) -> Result<&Path> {
        self.lookup(name)
            .ok_or_else(|| Error::UnknownCommand(name.to_string()))
    }

    /// List all registered commands, sorted by name
    pub fn list(&self) -> Vec<(&str, &Path)> {
        let mut all: Vec<_> = self
            .commands
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    /// Number of registered commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no commands were found
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_registers_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uptime"), "#!/bin/sh\n").unwrap();
        std::fs::write(dir.path().join("deploy"), "#!/bin/sh\n").unwrap();
        std::fs::write(dir.path().join("README"), "not executable").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("inner"), "").unwrap();

        let registry = Registry::new(dir.path()).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.dir(), dir.path());

        let names: Vec<&str> = registry.list().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["README", "deploy", "nested", "uptime"]);
        assert_eq!(registry.lookup("uptime"), Some(dir.path().join("uptime").as_path()));
        // non-recursive
        assert!(registry.lookup("inner").is_none());
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        match Registry::new(&missing) {
            Err(Error::Directory { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected directory error, got {:?}", other),
        }
    }

    #[test]
    fn test_file_instead_of_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plugins");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(Registry::new(&file), Err(Error::Directory { .. })));
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let registry = Registry::from_entries(
            "/plugins",
            [
                ("echo", "/plugins/a/echo"),
                ("date", "/plugins/date"),
                ("echo", "/plugins/b/echo"),
            ],
        );
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("echo"), Some(Path::new("/plugins/b/echo")));
    }

    #[test]
    fn test_lookup_and_resolve() {
        let registry = Registry::from_entries("/plugins", [("echo", "/plugins/echo")]);
        assert!(registry.lookup("echo").is_some());
        assert!(registry.lookup("ech").is_none());
        assert!(registry.lookup("").is_none());
        assert!(matches!(
            registry.resolve("nope"),
            Err(Error::UnknownCommand(name)) if name == "nope"
        ));
    }
}
