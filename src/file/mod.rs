//! Raw access to the bytes of an input component.
//!
//! A [`File`] owns its backing storage, either a memory mapped file ([`physical`]) or an
//! owned buffer ([`memory`]), and recognizes the two container shapes this crate reads:
//!
//! - PE images (`MZ`), parsed with `goblin` to locate the CLI header and translate RVAs
//! - Bare ECMA-335 metadata blobs (`BSJB`), as emitted for reference assemblies and tests
//!
//! Everything above this layer works on byte slices borrowed from the [`File`].

pub mod io;
pub mod parser;

mod memory;
mod physical;

pub(crate) use physical::Physical;

use std::path::Path;

use goblin::pe::PE;
use memory::Memory;
use ouroboros::self_referencing;

use crate::{
    Error::{Empty, GoblinErr, NotSupported},
    Result,
};

const METADATA_SIGNATURE: &[u8; 4] = b"BSJB";

/// Storage abstraction for the bytes of a [`File`].
pub trait Backend: Send + Sync {
    /// Returns a bounds checked slice of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns all of the data.
    fn data(&self) -> &[u8];

    /// Returns the length of the data.
    fn len(&self) -> usize;
}

/// An input component loaded from disk or memory.
///
/// For PE images the parsed headers are kept alive next to the bytes they borrow from.
#[self_referencing]
pub struct File {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: Option<PE<'this>>,
}

impl File {
    /// Memory-map and load the file at `file`.
    ///
    /// # Errors
    /// Returns an error if the file can't be read, is empty, or is neither a managed PE
    /// image nor a raw metadata blob.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;
        Self::load(input)
    }

    /// Load a component from an owned buffer.
    ///
    /// # Errors
    /// Same as [`File::from_file`], minus the I/O failures.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);
        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);
        File::try_new(data, |data| {
            let data = data.data();
            if data.starts_with(METADATA_SIGNATURE) {
                return Ok(None);
            }

            if !data.starts_with(b"MZ") {
                return Err(NotSupported);
            }

            let pe = PE::parse(data).map_err(GoblinErr)?;
            let Some(optional_header) = pe.header.optional_header else {
                return Err(malformed_error!("File does not have an OptionalHeader"));
            };

            match optional_header
                .data_directories
                .get_clr_runtime_header()
                .as_ref()
            {
                Some(directory) if directory.virtual_address != 0 => Ok(Some(pe)),
                _ => Err(malformed_error!(
                    "File does not have a CLR runtime header directory"
                )),
            }
        })
    }

    /// Returns the total size of the file.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns `true` if the file has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the file is a PE image rather than a bare metadata blob.
    #[must_use]
    pub fn is_pe(&self) -> bool {
        self.with_pe(|pe| pe.is_some())
    }

    /// Returns the RVA and size of the CLI header, if the file is a PE image.
    #[must_use]
    pub fn clr(&self) -> Option<(usize, usize)> {
        self.with_pe(|pe| {
            let optional_header = pe.as_ref()?.header.optional_header?;
            let clr_header = optional_header.data_directories.get_clr_runtime_header();
            let directory = clr_header.as_ref()?;
            Some((
                directory.virtual_address as usize,
                directory.size as usize,
            ))
        })
    }

    /// Returns all bytes of the file.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.data())
    }

    /// Returns a bounds checked slice of the file.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the file.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.data_slice(offset, len))
    }

    /// Translate a relative virtual address into a file offset.
    ///
    /// Raw metadata blobs have no sections, so every RVA is rejected for them.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains `rva`.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        self.with_pe(|pe| {
            let Some(pe) = pe else {
                return Err(malformed_error!(
                    "RVA {:#x} can not be resolved without a PE image",
                    rva
                ));
            };

            let rva_u32 = u32::try_from(rva)
                .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

            for section in &pe.sections {
                let extent = section.virtual_size.max(section.size_of_raw_data);
                let Some(section_max) = section.virtual_address.checked_add(extent) else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        extent
                    ));
                };

                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }
}
