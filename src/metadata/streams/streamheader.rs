use crate::{file::io::read_le_at, Result};

/// One entry of the stream table in the metadata root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name of the stream, e.g. `#Strings`
    pub name: String,
}

impl StreamHeader {
    /// Read a stream header at `offset`, advancing past the 4-byte aligned name.
    ///
    /// # Errors
    /// Returns an error if the header is truncated or the name is not terminated within
    /// 32 bytes.
    pub fn read(data: &[u8], offset: &mut usize) -> Result<StreamHeader> {
        let stream_offset = read_le_at::<u32>(data, offset)?;
        let size = read_le_at::<u32>(data, offset)?;

        let name_start = *offset;
        let window = &data[name_start.min(data.len())..data.len().min(name_start + 32)];
        let Some(name_len) = window.iter().position(|byte| *byte == 0) else {
            return Err(malformed_error!(
                "Stream name at {} is not terminated",
                name_start
            ));
        };

        let name = String::from_utf8_lossy(&window[..name_len]).to_string();
        *offset = name_start + ((name_len + 1 + 3) & !3);

        Ok(StreamHeader {
            offset: stream_offset,
            size,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x6C, 0x00, 0x00, 0x00,
            0x10, 0x01, 0x00, 0x00,
            b'#', b'S', b't', b'r', b'i', b'n', b'g', b's', 0x00, 0x00, 0x00, 0x00,
            0xFF,
        ];

        let mut offset = 0;
        let header = StreamHeader::read(&data, &mut offset).unwrap();

        assert_eq!(header.offset, 0x6C);
        assert_eq!(header.size, 0x110);
        assert_eq!(header.name, "#Strings");
        assert_eq!(offset, 20);
    }

    #[test]
    fn unterminated() {
        let mut data = vec![0_u8; 8];
        data.extend_from_slice(&[b'#'; 40]);

        let mut offset = 0;
        assert!(StreamHeader::read(&data, &mut offset).is_err());
    }
}
