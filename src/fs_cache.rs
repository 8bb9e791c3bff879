use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Caches the content of already scanned directories, to avoid repeated expensive filesystem access
///
/// Listings are sorted by file name, so that the first match within a directory does not depend on
/// the enumeration order of the underlying filesystem.
pub(crate) struct DirectoryCache {
    files_in_dirs: HashMap<PathBuf, Vec<(String, PathBuf)>>,
}

impl DirectoryCache {
    pub(crate) fn new() -> Self {
        Self {
            files_in_dirs: HashMap::new(),
        }
    }

    /// All files in `folder` whose name matches `filename` case-insensitively
    ///
    /// A folder that can't be listed yields no candidates.
    pub(crate) fn files_in_folder_case_insensitive<P: AsRef<Path>>(
        &mut self,
        filename: &str,
        folder: P,
    ) -> Vec<PathBuf> {
        let key = crate::common::module_key(filename);
        self.scan_folder(folder.as_ref())
            .iter()
            .filter(|(name, _)| *name == key)
            .map(|(_, path)| path.clone())
            .collect()
    }

    pub(crate) fn scan_folder(&mut self, folder: &Path) -> &[(String, PathBuf)] {
        self.files_in_dirs
            .entry(folder.to_owned())
            .or_insert_with(|| match list_files(folder) {
                Ok(entries) => entries,
                Err(e) => {
                    log::debug!("skipping search path {}: {}", folder.display(), e);
                    Vec::new()
                }
            })
    }
}

fn list_files(folder: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries: Vec<(String, PathBuf)> = fs_err::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|s| (s.to_owned(), entry.path()))
        })
        .collect();
    entries.sort();
    Ok(entries
        .into_iter()
        .map(|(name, path)| (crate::common::module_key(&name), path))
        .collect())
}
