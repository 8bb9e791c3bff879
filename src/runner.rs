use crate::common::{module_key, BundleError};
use crate::executable::{Executable, ExecutableStatus, Executables};
use crate::lookup_path::LookupPath;
use crate::pe;
use crate::query::BundleQuery;
use std::collections::{HashSet, VecDeque};
use std::path::Path;

#[derive(Debug)]
struct Job {
    pub dllname: String,
    pub depth: usize,
}

/// Copies the dependencies of the specified executable next to it
/// The dependencies are resolved recursively, in a breadth-first fashion.
///
/// The queue and the set of processed names live as long as one run.
pub(crate) struct Runner<'a> {
    query: &'a BundleQuery,
    lookup_path: LookupPath,
    executables_to_lookup: VecDeque<Job>,
    processed: HashSet<String>, // lowercase DLL names that were already popped
}

impl<'a> Runner<'a> {
    pub(crate) fn new(query: &'a BundleQuery, lookup_path: LookupPath) -> Self {
        Self {
            query,
            lookup_path,
            executables_to_lookup: VecDeque::new(),
            processed: HashSet::new(),
        }
    }

    // the same name may be queued several times; it is processed only the first time it is popped
    fn enqueue(&mut self, dllname: &str, depth: usize) {
        self.executables_to_lookup.push_back(Job {
            dllname: dllname.to_owned(),
            depth,
        })
    }

    fn pop(&mut self) -> Option<Job> {
        self.executables_to_lookup.pop_front()
    }

    pub fn run(mut self) -> Result<Executables, BundleError> {
        let query = self.query;
        let target_exe = &query.target.target_exe;

        // nothing to do if the target itself can't be read
        let root = pe::read_imports(target_exe)?;
        let architecture = root.architecture;
        let mut executables = Executables::new(target_exe.clone(), architecture);

        for d in &root.dependencies {
            self.enqueue(d, 1);
        }

        while let Some(job) = self.pop() {
            let dllname = module_key(&job.dllname);
            if !self.processed.insert(dllname.clone()) {
                continue;
            }

            let lookup = self.lookup_path.search_dll(&dllname, architecture);
            let Some(source) = lookup.fullpath else {
                // expected for system DLLs
                log::debug!("{dllname} not found in the search path");
                executables.insert(Executable {
                    dllname,
                    depth_first_appearance: job.depth,
                    status: ExecutableStatus::NotFound,
                    skipped: lookup.skipped,
                    dependencies: None,
                });
                continue;
            };

            let status = self.deploy(&source);

            // read from the source, so that a failed copy or a dry run doesn't stop the descent
            let dependencies = match pe::read_imports(&source) {
                Ok(imports) => Some(imports.dependencies),
                Err(e) => {
                    log::debug!("not looking for the dependencies of {dllname}: {e}");
                    None
                }
            };
            for d in dependencies.iter().flatten() {
                self.enqueue(d, job.depth + 1);
            }

            executables.insert(Executable {
                dllname,
                depth_first_appearance: job.depth,
                status,
                skipped: lookup.skipped,
                dependencies,
            });
        }

        Ok(executables)
    }

    /// Copy a found DLL to the directory of the target, overwriting what is there
    ///
    /// Failures are reported and returned as a status, never as an error.
    fn deploy(&self, source: &Path) -> ExecutableStatus {
        let app_dir = &self.query.target.app_dir;
        let Some(filename) = source.file_name() else {
            return ExecutableStatus::CopyFailed {
                source: source.to_owned(),
                destination: app_dir.clone(),
                error: "path has no file name".to_owned(),
            };
        };
        let destination = app_dir.join(filename);

        if is_same_file(source, &destination) {
            log::debug!("{} is already in place", destination.display());
            return ExecutableStatus::AlreadyInPlace { path: destination };
        }

        log::info!("{} -> {}", source.display(), destination.display());

        if self.query.parameters.dry_run {
            return ExecutableStatus::Planned {
                source: source.to_owned(),
                destination,
            };
        }

        match fs_err::copy(source, &destination) {
            Ok(_) => ExecutableStatus::Copied {
                source: source.to_owned(),
                destination,
            },
            Err(e) => {
                log::warn!("{e}");
                ExecutableStatus::CopyFailed {
                    source: source.to_owned(),
                    destination,
                    error: e.to_string(),
                }
            }
        }
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs_err::canonicalize(a), fs_err::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
