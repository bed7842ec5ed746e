use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::spec::{is_spec_file, load_spec, SpecDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Operation,
    Request,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    /// Path relative to the registry root.
    pub file: PathBuf,
    pub summary: Option<String>,
    pub kind: EntryKind,
}

/// Index of every operation and standalone request under a requests root.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    root: PathBuf,
    entries: IndexMap<String, RegistryEntry>,
}

impl Registry {
    /// Walks `root` in file name order. Later files win on name collisions
    /// and files that fail to parse are skipped.
    pub fn gather(root: &Path) -> Self {
        let mut registry = Registry {
            root: root.to_path_buf(),
            entries: IndexMap::new(),
        };

        if !root.is_dir() {
            debug!(root = %root.display(), "requests folder missing");
            return registry;
        }

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_spec_file(entry.path()));

        for entry in walker {
            registry.register(entry.path());
        }

        debug!(root = %root.display(), count = registry.len(), "gathered requests");
        registry
    }

    fn register(&mut self, path: &Path) {
        let spec = match load_spec(path) {
            Ok(spec) => spec,
            Err(err) => {
                warn!(error = %err, "skipping request file");
                return;
            }
        };
        let file = path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();

        match spec.document {
            SpecDocument::Operations(api) => {
                for resolved in api.operations() {
                    let Some(id) = resolved.operation.operation_id.clone() else {
                        continue;
                    };
                    self.insert(
                        id,
                        RegistryEntry {
                            file: file.clone(),
                            summary: resolved.operation.summary.clone(),
                            kind: EntryKind::Operation,
                        },
                    );
                }
            }
            SpecDocument::Request(request) => {
                let name = request.request_id.clone().or_else(|| {
                    path.file_stem()
                        .map(|stem| stem.to_string_lossy().to_string())
                });
                if let Some(name) = name {
                    self.insert(
                        name,
                        RegistryEntry {
                            file,
                            summary: request.summary.clone(),
                            kind: EntryKind::Request,
                        },
                    );
                }
            }
        }
    }

    fn insert(&mut self, name: String, entry: RegistryEntry) {
        if let Some(previous) = self.entries.get(&name) {
            debug!(name = %name, previous = %previous.file.display(), "request redefined");
        }
        self.entries.insert(name, entry);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// Absolute path of the file defining `name`.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.get(name).map(|entry| self.root.join(&entry.file))
    }

    /// Entries sorted by name.
    pub fn list(&self) -> Vec<(&String, &RegistryEntry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
