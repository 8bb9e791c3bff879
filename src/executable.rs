use crate::arch::Architecture;
use crate::common::module_key;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What happened to a DLL that was mentioned in an import table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExecutableStatus {
    /// No file with the right name and architecture in the search path
    NotFound,
    /// Copied next to the target
    Copied { source: PathBuf, destination: PathBuf },
    /// Found, but the copy failed; the run went on anyway
    CopyFailed {
        source: PathBuf,
        destination: PathBuf,
        error: String,
    },
    /// Found in the directory of the target itself
    AlreadyInPlace { path: PathBuf },
    /// Found, not copied because of a dry run
    Planned { source: PathBuf, destination: PathBuf },
}

impl ExecutableStatus {
    /// File the DLL was found at, if it was found
    pub fn source(&self) -> Option<&Path> {
        match self {
            Self::NotFound => None,
            Self::Copied { source, .. }
            | Self::CopyFailed { source, .. }
            | Self::Planned { source, .. } => Some(source.as_path()),
            Self::AlreadyInPlace { path } => Some(path.as_path()),
        }
    }
}

/// Information about a DLL that was mentioned as target for the search
#[derive(Debug, Clone, Serialize)]
pub struct Executable {
    /// Name as it appears in the import table, lowercase
    pub dllname: String,
    /// depth at which the file was first processed (the imports of the target have depth 1)
    pub depth_first_appearance: usize,
    pub status: ExecutableStatus,
    /// files with the same name that were passed over because of their architecture
    pub skipped: Vec<PathBuf>,
    /// names of the DLLs this file depends on; None if it was not found or could not be parsed
    pub dependencies: Option<Vec<String>>,
}

impl Executable {
    pub fn found(&self) -> bool {
        self.status != ExecutableStatus::NotFound
    }
}

/// Collection of Executable objects, result of a bundling run, in processing order
#[derive(Debug, Clone, Serialize)]
pub struct Executables {
    /// The binary whose dependencies were bundled
    pub root: PathBuf,
    pub architecture: Architecture,
    executables: Vec<Executable>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Executables {
    pub fn new(root: PathBuf, architecture: Architecture) -> Self {
        Self {
            root,
            architecture,
            executables: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Record the outcome for a DLL; a name that was already recorded keeps its first entry
    pub fn insert(&mut self, lr: Executable) {
        let key = module_key(&lr.dllname);
        if !self.index.contains_key(&key) {
            self.index.insert(key, self.executables.len());
            self.executables.push(lr);
        }
    }

    pub fn get(&self, dllname: &str) -> Option<&Executable> {
        self.index
            .get(&module_key(dllname))
            .map(|&i| &self.executables[i])
    }

    pub fn contains(&self, dllname: &str) -> bool {
        self.index.contains_key(&module_key(dllname))
    }

    pub fn len(&self) -> usize {
        self.executables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Executable> {
        self.executables.iter()
    }

    /// Files written next to the target
    pub fn copied(&self) -> Vec<&Path> {
        self.executables
            .iter()
            .filter_map(|e| match &e.status {
                ExecutableStatus::Copied { destination, .. } => Some(destination.as_path()),
                _ => None,
            })
            .collect()
    }

    /// DLLs that were not found in the search path
    pub fn not_found(&self) -> Vec<&str> {
        self.executables
            .iter()
            .filter(|e| !e.found())
            .map(|e| e.dllname.as_str())
            .collect()
    }

    /// DLLs whose copy failed
    pub fn failed(&self) -> Vec<&Executable> {
        self.executables
            .iter()
            .filter(|e| matches!(e.status, ExecutableStatus::CopyFailed { .. }))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Executables {
    type Item = &'a Executable;
    type IntoIter = std::slice::Iter<'a, Executable>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
