extern crate thiserror;

mod fs_cache;
mod runner;
#[cfg(test)]
mod testutil;

pub mod arch;
pub mod common;
pub mod executable;
pub mod lookup_path;
pub mod pe;
pub mod query;

pub use arch::{matches_architecture, Architecture};
pub use common::{module_key, BundleError};
pub use executable::{Executable, ExecutableStatus, Executables};
pub use lookup_path::{LookupPath, LookupResult};
pub use query::BundleQuery;

/// Copy the DLLs the target of `query` depends on, found along `lookup_path`, next to it
///
/// Fails only if the target can't be read as a PE file; everything that goes wrong with a single
/// dependency is recorded in the returned report.
pub fn bundle(query: &BundleQuery, lookup_path: LookupPath) -> Result<Executables, BundleError> {
    runner::Runner::new(query, lookup_path).run()
}
