use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("could not read the file")]
    CouldNotOpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not a valid PE image", path.display())]
    WrongFileFormat {
        path: PathBuf,
        source: goblin::error::Error,
    },

    #[error("at least one DLL search path is required")]
    NoSearchPath,

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Key under which a module name is tracked and compared
///
/// Import tables are not consistent about the case of DLL names (`KERNEL32.dll`, `kernel32.DLL`),
/// so every comparison between module names goes through this function.
pub fn module_key(name: &str) -> String {
    name.to_lowercase()
}
