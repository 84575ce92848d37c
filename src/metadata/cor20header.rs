//! The CLI header (ECMA-335 II.25.3.3) pointing from a PE image to its metadata.

use crate::{file::parser::Parser, Result};

/// The fields of the CLI header this crate needs to locate metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cor20Header {
    /// Size of the header in bytes, always 72
    pub cb: u32,
    /// Minimum runtime major version
    pub major_runtime_version: u16,
    /// Minimum runtime minor version
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata
    pub meta_data_size: u32,
    /// Runtime flags, `COMIMAGE_FLAGS_*`
    pub flags: u32,
    /// Entry point method token, or native entry point RVA
    pub entry_point_token: u32,
    /// RVA of managed resources
    pub resource_rva: u32,
    /// Size of managed resources
    pub resource_size: u32,
}

impl Cor20Header {
    /// Read the header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for truncated data and [`crate::Error::Malformed`]
    /// if the header size or metadata location are invalid.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < 72 {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != 72 {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!("CLR header does not point to metadata"));
        }

        let flags = parser.read_le::<u32>()?;
        let entry_point_token = parser.read_le::<u32>()?;
        let resource_rva = parser.read_le::<u32>()?;
        let resource_size = parser.read_le::<u32>()?;

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags,
            entry_point_token,
            resource_rva,
            resource_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let mut header_bytes = vec![
            0x48, 0x00, 0x00, 0x00, // cb = 72
            0x02, 0x00,             // major_runtime_version = 2
            0x05, 0x00,             // minor_runtime_version = 5
            0x00, 0x21, 0x00, 0x00, // meta_data_rva = 0x2100
            0x00, 0x04, 0x00, 0x00, // meta_data_size = 0x400
            0x01, 0x00, 0x00, 0x00, // flags = ILONLY
            0x00, 0x00, 0x00, 0x06, // entry_point_token = 0x06000000
            0x00, 0x00, 0x00, 0x00, // resource_rva
            0x00, 0x00, 0x00, 0x00, // resource_size
        ];
        header_bytes.resize(72, 0);

        let header = Cor20Header::read(&header_bytes).unwrap();

        assert_eq!(header.cb, 72);
        assert_eq!(header.major_runtime_version, 2);
        assert_eq!(header.minor_runtime_version, 5);
        assert_eq!(header.meta_data_rva, 0x2100);
        assert_eq!(header.meta_data_size, 0x400);
        assert_eq!(header.flags, 1);
        assert_eq!(header.entry_point_token, 0x0600_0000);
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            Cor20Header::read(&[0x48, 0x00]),
            Err(crate::Error::OutOfBounds { .. })
        ));

        let mut header_bytes = vec![0u8; 72];
        header_bytes[0] = 0x48;
        assert!(matches!(
            Cor20Header::read(&header_bytes),
            Err(crate::Error::Malformed { .. })
        ));

        header_bytes[0] = 0x40;
        assert!(Cor20Header::read(&header_bytes).is_err());
    }
}
