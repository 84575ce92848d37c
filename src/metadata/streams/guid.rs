use crate::Result;

/// The `#GUID` heap: a sequence of 16 byte GUIDs addressed by 1-based index.
#[derive(Clone, Copy)]
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Wrap the bytes of a `#GUID` stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the stream is not a multiple of 16 bytes.
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap has an invalid size - {}",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// A heap for images without a `#GUID` stream.
    #[must_use]
    pub fn empty() -> Guid<'a> {
        Guid { data: &[] }
    }

    /// Get the GUID at 1-based `index`; index 0 is the null GUID.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is past the end of the heap.
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index == 0 {
            return Ok(uguid::Guid::ZERO);
        }

        let start = (index - 1) * 16;
        let Some(bytes) = self.data.get(start..start + 16) else {
            return Err(out_of_bounds_error!());
        };

        let mut buffer = [0_u8; 16];
        buffer.copy_from_slice(bytes);
        Ok(uguid::Guid::from_bytes(buffer))
    }
}
