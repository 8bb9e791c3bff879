//! Minimal PE images for tests
//!
//! The images have a single `.idata` section holding the import directory, the delay-load
//! directory and the DLL names. There is no code in them; they only need to look like the real
//! thing to a header and import table parser.

use std::path::{Path, PathBuf};

const PE_OFFSET: usize = 0x80;
const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: usize = 0x1000;
const SECTION_RVA: usize = 0x1000;
const SIZEOF_HEADERS: usize = 0x200;
const UNMAPPED_RVA: u32 = 0x7fff_0000;

const IMAGE_FILE_EXECUTABLE_IMAGE: u16 = 0x0002;
const IMAGE_FILE_LARGE_ADDRESS_AWARE: u16 = 0x0020;
const IMAGE_FILE_32BIT_MACHINE: u16 = 0x0100;
const IMAGE_FILE_DLL: u16 = 0x2000;

#[derive(Clone)]
enum Name {
    Text(String),
    Unmapped,
}

pub struct PeBuilder {
    machine: u16,
    dll: bool,
    legacy_delay_descriptors: bool,
    imports: Vec<Name>,
    delay_imports: Vec<Name>,
}

fn put_u16(buf: &mut [u8], offset: usize, v: u16) {
    buf[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

fn align_up(v: usize, alignment: usize) -> usize {
    v.div_ceil(alignment) * alignment
}

#[allow(dead_code)]
impl PeBuilder {
    pub fn exe(machine: u16) -> Self {
        Self {
            machine,
            dll: false,
            legacy_delay_descriptors: false,
            imports: Vec::new(),
            delay_imports: Vec::new(),
        }
    }

    pub fn dll(machine: u16) -> Self {
        Self {
            dll: true,
            ..Self::exe(machine)
        }
    }

    pub fn import(mut self, name: &str) -> Self {
        self.imports.push(Name::Text(name.to_owned()));
        self
    }

    /// An import descriptor whose name points outside of the image
    pub fn unmapped_import(mut self) -> Self {
        self.imports.push(Name::Unmapped);
        self
    }

    pub fn delay_import(mut self, name: &str) -> Self {
        self.delay_imports.push(Name::Text(name.to_owned()));
        self
    }

    /// Store virtual addresses instead of RVAs in the delay-load descriptors (32-bit images only)
    pub fn legacy_delay_descriptors(mut self) -> Self {
        self.legacy_delay_descriptors = true;
        self
    }

    fn is_pe32(&self) -> bool {
        self.machine == 0x14c
    }

    fn image_base(&self) -> u64 {
        if self.is_pe32() {
            0x0040_0000
        } else {
            0x0001_4000_0000
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let pe32 = self.is_pe32();
        let optional_header_size: usize = if pe32 { 224 } else { 240 };

        // .idata layout: import descriptors, delay-load descriptors, a zeroed thunk area, names
        let import_table_size = (self.imports.len() + 1) * 20;
        let delay_table_offset = import_table_size;
        let delay_table_size = (self.delay_imports.len() + 1) * 32;
        let zeros_offset = delay_table_offset + delay_table_size;
        let mut section = vec![0u8; zeros_offset + 16];
        let zeros_rva = (SECTION_RVA + zeros_offset) as u32;

        let name_rva = |section: &mut Vec<u8>, name: &Name| -> u32 {
            match name {
                Name::Text(s) => {
                    let rva = (SECTION_RVA + section.len()) as u32;
                    section.extend_from_slice(s.as_bytes());
                    section.push(0);
                    rva
                }
                Name::Unmapped => UNMAPPED_RVA,
            }
        };

        for (i, name) in self.imports.iter().enumerate() {
            let rva = name_rva(&mut section, name);
            let d = i * 20;
            put_u32(&mut section, d, zeros_rva);
            put_u32(&mut section, d + 12, rva);
            put_u32(&mut section, d + 16, zeros_rva);
        }
        for (i, name) in self.delay_imports.iter().enumerate() {
            let rva = name_rva(&mut section, name);
            let d = delay_table_offset + i * 32;
            if self.legacy_delay_descriptors {
                let base = self.image_base() as u32;
                put_u32(&mut section, d, 0);
                put_u32(&mut section, d + 4, base + rva);
                put_u32(&mut section, d + 8, base + zeros_rva);
                put_u32(&mut section, d + 12, base + zeros_rva);
                put_u32(&mut section, d + 16, base + zeros_rva);
            } else {
                put_u32(&mut section, d, 1);
                put_u32(&mut section, d + 4, rva);
                put_u32(&mut section, d + 8, zeros_rva);
                put_u32(&mut section, d + 12, zeros_rva);
                put_u32(&mut section, d + 16, zeros_rva);
            }
        }
        let section_virtual_size = section.len();
        section.resize(align_up(section.len(), FILE_ALIGNMENT), 0);
        let size_of_image = SECTION_RVA + align_up(section.len(), SECTION_ALIGNMENT);

        let mut image = vec![0u8; SIZEOF_HEADERS];
        image[0..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3c, PE_OFFSET as u32);
        image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let coff = PE_OFFSET + 4;
        let mut characteristics = IMAGE_FILE_EXECUTABLE_IMAGE;
        characteristics |= if pe32 {
            IMAGE_FILE_32BIT_MACHINE
        } else {
            IMAGE_FILE_LARGE_ADDRESS_AWARE
        };
        if self.dll {
            characteristics |= IMAGE_FILE_DLL;
        }
        put_u16(&mut image, coff, self.machine);
        put_u16(&mut image, coff + 2, 1);
        put_u16(&mut image, coff + 16, optional_header_size as u16);
        put_u16(&mut image, coff + 18, characteristics);

        let opt = coff + 20;
        put_u16(&mut image, opt, if pe32 { 0x10b } else { 0x20b });
        image[opt + 2] = 14;
        put_u32(&mut image, opt + 8, section.len() as u32);
        put_u32(&mut image, opt + 20, SECTION_RVA as u32);
        let windows_fields = if pe32 {
            put_u32(&mut image, opt + 24, SECTION_RVA as u32);
            put_u32(&mut image, opt + 28, self.image_base() as u32);
            opt + 32
        } else {
            put_u64(&mut image, opt + 24, self.image_base());
            opt + 32
        };
        put_u32(&mut image, windows_fields, SECTION_ALIGNMENT as u32);
        put_u32(&mut image, windows_fields + 4, FILE_ALIGNMENT as u32);
        put_u16(&mut image, windows_fields + 8, 6);
        put_u16(&mut image, windows_fields + 16, 6);
        put_u32(&mut image, windows_fields + 24, size_of_image as u32);
        put_u32(&mut image, windows_fields + 28, SIZEOF_HEADERS as u32);
        put_u16(&mut image, windows_fields + 36, 3);
        let data_directories = if pe32 {
            put_u32(&mut image, windows_fields + 40, 0x10_0000);
            put_u32(&mut image, windows_fields + 44, 0x1000);
            put_u32(&mut image, windows_fields + 48, 0x10_0000);
            put_u32(&mut image, windows_fields + 52, 0x1000);
            put_u32(&mut image, windows_fields + 60, 16);
            windows_fields + 64
        } else {
            put_u64(&mut image, windows_fields + 40, 0x10_0000);
            put_u64(&mut image, windows_fields + 48, 0x1000);
            put_u64(&mut image, windows_fields + 56, 0x10_0000);
            put_u64(&mut image, windows_fields + 64, 0x1000);
            put_u32(&mut image, windows_fields + 76, 16);
            windows_fields + 80
        };
        debug_assert_eq!(data_directories + 16 * 8, opt + optional_header_size);
        if !self.imports.is_empty() {
            put_u32(&mut image, data_directories + 8, SECTION_RVA as u32);
            put_u32(&mut image, data_directories + 12, import_table_size as u32);
        }
        if !self.delay_imports.is_empty() {
            let delay_rva = (SECTION_RVA + delay_table_offset) as u32;
            put_u32(&mut image, data_directories + 13 * 8, delay_rva);
            put_u32(&mut image, data_directories + 13 * 8 + 4, delay_table_size as u32);
        }

        let section_header = opt + optional_header_size;
        image[section_header..section_header + 6].copy_from_slice(b".idata");
        put_u32(&mut image, section_header + 8, section_virtual_size as u32);
        put_u32(&mut image, section_header + 12, SECTION_RVA as u32);
        put_u32(&mut image, section_header + 16, section.len() as u32);
        put_u32(&mut image, section_header + 20, SIZEOF_HEADERS as u32);
        put_u32(&mut image, section_header + 36, 0xc000_0040);

        image.extend_from_slice(&section);
        image
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> std::io::Result<PathBuf> {
        std::fs::write(path.as_ref(), self.build())?;
        Ok(path.as_ref().to_owned())
    }
}
