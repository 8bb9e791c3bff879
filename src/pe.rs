//! Low-level PE file format access
//!
//! goblin parses the headers and the section table; the import and delay-load import directories
//! are walked here, one descriptor at a time, so that a single broken entry does not make the
//! whole file unusable.

use crate::arch::Architecture;
use crate::common::BundleError;
use goblin::pe::header::{Header, SIZEOF_COFF_HEADER, SIZEOF_PE_MAGIC};
use goblin::pe::import::ImportDirectoryEntry;
use goblin::pe::options::ParseOptions;
use goblin::pe::section_table::SectionTable;
use goblin::pe::utils::find_offset;
use scroll::{Pread, LE};
use std::path::{Path, PathBuf};

/// `dlattrRva`: the delay-load descriptor holds RVAs rather than virtual addresses
const DELAY_LOAD_ATTRIBUTE_RVA: u32 = 0x1;

/// Entry of the delay-load import directory
#[allow(dead_code)]
#[derive(Clone, Copy, Debug, Pread)]
struct DelayLoadDescriptor {
    attributes: u32,
    dll_name_rva: u32,
    module_handle_rva: u32,
    import_address_table_rva: u32,
    import_name_table_rva: u32,
    bound_import_address_table_rva: u32,
    unload_information_table_rva: u32,
    time_date_stamp: u32,
}

/// Result of reading a binary: what it runs on, and what it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImports {
    pub architecture: Architecture,
    /// Import directory entries followed by delay-load import entries, in table order; may
    /// contain duplicates
    pub dependencies: Vec<String>,
}

/// Content of a file on disk, kept alive while a `PEFile` borrows from it
pub struct PEFileMap {
    path: PathBuf,
    content: Vec<u8>,
}

impl PEFileMap {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, BundleError> {
        let path = PathBuf::from(path.as_ref());
        let content = fs_err::read(&path).map_err(|source| BundleError::CouldNotOpenFile {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, content })
    }
}

pub struct PEFile<'a> {
    path: &'a Path,
    bytes: &'a [u8],
    header: Header<'a>,
    sections: Vec<SectionTable>,
}

impl<'a> PEFile<'a> {
    pub fn new(filemap: &'a PEFileMap) -> Result<Self, BundleError> {
        let wrong_format = |source: goblin::error::Error| BundleError::WrongFileFormat {
            path: filemap.path.clone(),
            source,
        };
        let bytes = filemap.content.as_slice();
        let header = Header::parse(bytes).map_err(wrong_format)?;
        if header.optional_header.is_none() {
            return Err(wrong_format(goblin::error::Error::Malformed(
                "missing optional header, this is an object file and not an image".to_owned(),
            )));
        }
        let mut offset = header.dos_header.pe_pointer as usize
            + SIZEOF_PE_MAGIC
            + SIZEOF_COFF_HEADER
            + header.coff_header.size_of_optional_header as usize;
        let sections = header
            .coff_header
            .sections(bytes, &mut offset)
            .map_err(wrong_format)?;
        Ok(Self {
            path: &filemap.path,
            bytes,
            header,
            sections,
        })
    }

    pub fn architecture(&self) -> Architecture {
        Architecture::from_machine(self.header.coff_header.machine)
    }

    /// read the names of the DLLs this executable depends on, both load-time and delay-loaded
    pub fn read_dependencies(&self) -> Vec<String> {
        let mut names = self.read_import_names();
        names.extend(self.read_delay_import_names());
        names
    }

    /// Names in the import directory
    pub fn read_import_names(&self) -> Vec<String> {
        let Some(table_rva) = self.import_table_rva() else {
            return Vec::new();
        };
        self.walk_descriptors(table_rva, "import", |offset| {
            let entry: ImportDirectoryEntry = self.bytes.gread_with(offset, LE).ok()?;
            (!entry.is_null()).then_some(entry.name_rva)
        })
    }

    /// Names in the delay-load import directory
    pub fn read_delay_import_names(&self) -> Vec<String> {
        let Some(table_rva) = self.delay_import_table_rva() else {
            return Vec::new();
        };
        let image_base = self.image_base();
        self.walk_descriptors(table_rva, "delay import", |offset| {
            let desc: DelayLoadDescriptor = self.bytes.gread_with(offset, LE).ok()?;
            if desc.dll_name_rva == 0 {
                None
            } else if desc.attributes & DELAY_LOAD_ATTRIBUTE_RVA != 0 {
                Some(desc.dll_name_rva)
            } else {
                // pre-VC7 layout, stores virtual addresses
                Some(desc.dll_name_rva.wrapping_sub(image_base as u32))
            }
        })
    }

    fn import_table_rva(&self) -> Option<u32> {
        let dirs = &self.header.optional_header.as_ref()?.data_directories;
        dirs.get_import_table()
            .map(|dd| dd.virtual_address)
            .filter(|&rva| rva != 0)
    }

    fn delay_import_table_rva(&self) -> Option<u32> {
        let dirs = &self.header.optional_header.as_ref()?.data_directories;
        dirs.get_delay_import_descriptor()
            .map(|dd| dd.virtual_address)
            .filter(|&rva| rva != 0)
    }

    fn image_base(&self) -> u64 {
        self.header
            .optional_header
            .as_ref()
            .map(|oh| oh.windows_fields.image_base)
            .unwrap_or(0)
    }

    fn file_alignment(&self) -> u32 {
        self.header
            .optional_header
            .as_ref()
            .map(|oh| oh.windows_fields.file_alignment)
            .unwrap_or(0)
    }

    /// Walk a null-terminated descriptor table starting at `table_rva`, collecting the DLL names
    /// it points to
    ///
    /// `next_name_rva` reads the descriptor at `offset`, advances it, and returns None at the end
    /// of the table. Descriptors whose name can't be decoded are reported and skipped.
    fn walk_descriptors(
        &self,
        table_rva: u32,
        table_kind: &str,
        next_name_rva: impl Fn(&mut usize) -> Option<u32>,
    ) -> Vec<String> {
        let mut names = Vec::new();
        let Some(mut offset) = self.rva_to_offset(table_rva) else {
            log::warn!(
                "{}: {} table at RVA {:#x} is outside of the file",
                self.path.display(),
                table_kind,
                table_rva
            );
            return names;
        };
        while let Some(rva) = next_name_rva(&mut offset) {
            match self.read_name(rva) {
                Ok(name) => names.push(name),
                Err(reason) => log::warn!(
                    "{}: skipping {} entry: {}",
                    self.path.display(),
                    table_kind,
                    reason
                ),
            }
        }
        names
    }

    fn read_name(&self, rva: u32) -> Result<String, String> {
        let offset = self
            .rva_to_offset(rva)
            .ok_or_else(|| format!("name RVA {rva:#x} is not mapped by any section"))?;
        let name: &str = self
            .bytes
            .pread(offset)
            .map_err(|e| format!("bad name at RVA {rva:#x}: {e}"))?;
        if name.is_empty() {
            return Err(format!("name at RVA {rva:#x} is empty"));
        }
        Ok(name.to_owned())
    }

    /// Translate a relative virtual address to an offset into the file
    fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        let offset = find_offset(
            rva as usize,
            &self.sections,
            self.file_alignment(),
            &ParseOptions::default(),
        )?;
        (offset < self.bytes.len()).then_some(offset)
    }
}

/// Read the architecture and the imported DLL names of the file at `path`
pub fn read_imports<P: AsRef<Path>>(path: P) -> Result<BinaryImports, BundleError> {
    let filemap = PEFileMap::new(path)?;
    let pefile = PEFile::new(&filemap)?;
    Ok(BinaryImports {
        architecture: pefile.architecture(),
        dependencies: pefile.read_dependencies(),
    })
}

/// Read just the architecture of the file at `path`
pub fn read_architecture<P: AsRef<Path>>(path: P) -> Result<Architecture, BundleError> {
    let filemap = PEFileMap::new(path)?;
    let pefile = PEFile::new(&filemap)?;
    Ok(pefile.architecture())
}
