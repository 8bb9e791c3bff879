//! Target CPU architecture of PE images, and the filter used to reject DLLs built for another one

use crate::pe;
use goblin::pe::header::{
    COFF_MACHINE_ARM, COFF_MACHINE_ARM64, COFF_MACHINE_ARMNT, COFF_MACHINE_X86,
    COFF_MACHINE_X86_64,
};
use serde::Serialize;
use std::fmt;
use std::path::Path;

const COFF_MACHINE_ARM64EC: u16 = 0xa641;
const COFF_MACHINE_ARM64X: u16 = 0xa64e;

/// CPU architecture an executable file was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86,
    X86_64,
    Arm,
    Arm64,
    /// Machine type we don't know about; all unknown machine types compare equal
    Unknown,
}

impl Architecture {
    /// Map the `Machine` field of the COFF header
    pub fn from_machine(machine: u16) -> Self {
        match machine {
            COFF_MACHINE_X86 => Self::X86,
            COFF_MACHINE_X86_64 => Self::X86_64,
            COFF_MACHINE_ARM | COFF_MACHINE_ARMNT => Self::Arm,
            COFF_MACHINE_ARM64 | COFF_MACHINE_ARM64EC | COFF_MACHINE_ARM64X => Self::Arm64,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Whether the file at `path` is a PE image built for `required`
///
/// Files that can't be read or parsed are simply not a match: a search directory usually contains
/// plenty of files that are not DLLs at all.
pub fn matches_architecture<P: AsRef<Path>>(path: P, required: Architecture) -> bool {
    match pe::read_architecture(path.as_ref()) {
        Ok(architecture) => architecture == required,
        Err(e) => {
            log::debug!("{}: {e}", path.as_ref().display());
            false
        }
    }
}
