use crate::arch::{matches_architecture, Architecture};
use crate::fs_cache::DirectoryCache;
use crate::query::BundleQuery;
use std::path::{Path, PathBuf};

/// Outcome of the search of a DLL in the lookup path
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LookupResult {
    /// First file with the requested name and the requested architecture
    pub fullpath: Option<PathBuf>,
    /// Files with the requested name that were passed over because of their architecture
    pub skipped: Vec<PathBuf>,
}

/// Sorted list of directories to be looked up when searching for a DLL
///
/// Directories are searched in order; the first one holding a file with the right name and the
/// right architecture wins.
pub struct LookupPath {
    pub entries: Vec<PathBuf>,
    fs_cache: std::cell::RefCell<DirectoryCache>,
}

impl LookupPath {
    pub fn new(query: &BundleQuery) -> Self {
        Self::from_entries(query.search_path.clone())
    }

    pub fn from_entries(entries: Vec<PathBuf>) -> Self {
        Self {
            entries,
            fs_cache: std::cell::RefCell::new(DirectoryCache::new()),
        }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.entries
    }

    /// looks for a DLL by name, built for the given architecture
    ///
    /// Directories that can't be read are skipped. Not finding the DLL anywhere is not an error:
    /// most imports of a Windows binary are system DLLs, which are not meant to be in the search
    /// path.
    pub fn search_dll(&self, library: &str, architecture: Architecture) -> LookupResult {
        let mut result = LookupResult::default();
        for dir in &self.entries {
            for candidate in self.search_file_in_folder(library, dir) {
                if matches_architecture(&candidate, architecture) {
                    result.fullpath = Some(candidate);
                    return result;
                }
                log::warn!(
                    "Skipped: {} (wrong architecture, expected {})",
                    candidate.display(),
                    architecture
                );
                result.skipped.push(candidate);
            }
        }
        result
    }

    fn search_file_in_folder<P: AsRef<Path>>(&self, filename: &str, p: P) -> Vec<PathBuf> {
        self.fs_cache
            .borrow_mut()
            .files_in_folder_case_insensitive(filename, p.as_ref())
    }
}
