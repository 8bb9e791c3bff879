//! Data structures that must be filled with the input and the parameters for the bundling run

use crate::common::BundleError;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct BundleTarget {
    /// Path to the target executable
    pub target_exe: PathBuf,
    /// Parent directory of target_exe, where the dependencies are copied
    pub app_dir: PathBuf,
}

#[derive(Clone, Debug, Default)]
pub struct BundleParameters {
    /// Walk the dependency tree and report the copies, without performing them
    pub dry_run: bool,
}

/// Complete specification of a bundling task
#[derive(Clone, Debug)]
pub struct BundleQuery {
    pub target: BundleTarget,
    /// Directories to look for DLLs in, by decreasing priority
    pub search_path: Vec<PathBuf>,
    pub parameters: BundleParameters,
}

impl BundleQuery {
    /// The dependencies will be copied in the directory containing the target
    ///
    /// Nothing is read from disk here; a missing or invalid target is reported when the run starts.
    pub fn new<P: AsRef<Path>>(target_exe: P, search_path: Vec<PathBuf>) -> Result<Self, BundleError> {
        if search_path.is_empty() {
            return Err(BundleError::NoSearchPath);
        }
        let target_exe = target_exe.as_ref().to_owned();
        let app_dir = target_exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            target: BundleTarget {
                target_exe,
                app_dir,
            },
            search_path,
            parameters: BundleParameters::default(),
        })
    }
}
