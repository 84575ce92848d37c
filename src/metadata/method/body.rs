use bitflags::bitflags;

use crate::{
    file::io::{read_le, read_le_at},
    metadata::token::Token,
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Flags of a method body header
    pub struct MethodBodyFlags: u16 {
        /// Tiny method header format
        const TINY_FORMAT = 0x2;
        /// Fat method header format
        const FAT_FORMAT = 0x3;
        /// More data sections follow the code
        const MORE_SECTS = 0x8;
        /// Locals are zero initialized
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Flags of an extra data section following the code
    pub struct SectionFlags: u8 {
        /// Exception handling table
        const EHTABLE = 0x1;
        /// Reserved, shall be 0
        const OPT_ILTABLE = 0x2;
        /// Fat section layout
        const FAT_FORMAT = 0x40;
        /// Another section follows
        const MORE_SECTS = 0x80;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Kind of an exception handling clause
    pub struct ExceptionClauseFlags: u16 {
        /// Typed catch clause
        const EXCEPTION = 0x0000;
        /// Filter clause
        const FILTER = 0x0001;
        /// Finally clause
        const FINALLY = 0x0002;
        /// Fault clause
        const FAULT = 0x0004;
    }
}

/// One exception handling clause of a fat method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionClause {
    /// Clause kind
    pub flags: ExceptionClauseFlags,
    /// Offset of the protected region
    pub try_offset: u32,
    /// Length of the protected region
    pub try_length: u32,
    /// Offset of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// Catch type token for typed clauses, filter offset for filter clauses
    pub class_token_or_filter: u32,
}

impl ExceptionClause {
    /// The caught type of a typed catch clause.
    #[must_use]
    pub fn catch_type(&self) -> Option<Token> {
        if self.flags == ExceptionClauseFlags::EXCEPTION && self.class_token_or_filter != 0 {
            Some(Token::new(self.class_token_or_filter))
        } else {
            None
        }
    }
}

/// The parsed body of a method compiled to CIL (ECMA-335 II.25.4).
#[derive(Debug, Clone)]
pub struct MethodBody<'a> {
    /// Size of the method header in bytes
    pub size_header: usize,
    /// `StandAloneSig` token of the local variable signature, 0 without locals
    pub local_var_sig_token: u32,
    /// Maximum number of items on the operand stack
    pub max_stack: usize,
    /// Set for fat headers
    pub is_fat: bool,
    /// Locals are zero initialized
    pub is_init_local: bool,
    /// The IL instruction stream
    pub code: &'a [u8],
    /// Exception handling clauses
    pub exception_clauses: Vec<ExceptionClause>,
}

impl<'a> MethodBody<'a> {
    /// Parse a method body from data starting at the method header.
    ///
    /// `data` may extend past the end of the body.
    ///
    /// # Errors
    /// Returns an error if the data is empty, truncated, or the header is malformed.
    pub fn from(data: &'a [u8]) -> Result<MethodBody<'a>> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b_0000_0011_u8)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                let Some(code) = data.get(1..=size_code) else {
                    return Err(out_of_bounds_error!());
                };

                Ok(MethodBody {
                    size_header: 1,
                    local_var_sig_token: 0,
                    max_stack: 8,
                    is_fat: false,
                    is_init_local: false,
                    code,
                    exception_clauses: Vec::new(),
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < 12 {
                    return Err(out_of_bounds_error!());
                }

                let first_duo = read_le::<u16>(data)?;
                let size_header = ((first_duo >> 12) * 4) as usize;
                if size_header < 12 {
                    return Err(malformed_error!(
                        "Fat method header of {} bytes",
                        size_header
                    ));
                }

                let flags_header = MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF);
                let max_stack = read_le::<u16>(&data[2..])? as usize;
                let size_code = read_le::<u32>(&data[4..])? as usize;
                let local_var_sig_token = read_le::<u32>(&data[8..])?;

                let Some(code) = size_header
                    .checked_add(size_code)
                    .and_then(|end| data.get(size_header..end))
                else {
                    return Err(out_of_bounds_error!());
                };

                let exception_clauses = if flags_header.contains(MethodBodyFlags::MORE_SECTS) {
                    Self::read_sections(data, (size_header + size_code + 3) & !3)?
                } else {
                    Vec::new()
                };

                Ok(MethodBody {
                    size_header,
                    local_var_sig_token,
                    max_stack,
                    is_fat: true,
                    is_init_local: flags_header.contains(MethodBodyFlags::INIT_LOCALS),
                    code,
                    exception_clauses,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    fn read_sections(data: &[u8], mut cursor: usize) -> Result<Vec<ExceptionClause>> {
        let mut clauses = Vec::new();

        loop {
            let section_start = cursor;
            let flags = SectionFlags::from_bits_truncate(read_le_at::<u8>(data, &mut cursor)?);
            let is_fat = flags.contains(SectionFlags::FAT_FORMAT);

            let size = if is_fat {
                let low = u32::from(read_le_at::<u8>(data, &mut cursor)?);
                let high = u32::from(read_le_at::<u16>(data, &mut cursor)?);
                (low | (high << 8)) as usize
            } else {
                let size = read_le_at::<u8>(data, &mut cursor)? as usize;
                cursor += 2;
                size
            };

            if size < 4 || section_start + size > data.len() {
                return Err(malformed_error!(
                    "Method data section of {} bytes at {}",
                    size,
                    section_start
                ));
            }

            if flags.contains(SectionFlags::EHTABLE) {
                let clause_size = if is_fat { 24 } else { 12 };
                for _ in 0..(size - 4) / clause_size {
                    clauses.push(if is_fat {
                        ExceptionClause {
                            #[allow(clippy::cast_possible_truncation)]
                            flags: ExceptionClauseFlags::from_bits_truncate(
                                read_le_at::<u32>(data, &mut cursor)? as u16,
                            ),
                            try_offset: read_le_at::<u32>(data, &mut cursor)?,
                            try_length: read_le_at::<u32>(data, &mut cursor)?,
                            handler_offset: read_le_at::<u32>(data, &mut cursor)?,
                            handler_length: read_le_at::<u32>(data, &mut cursor)?,
                            class_token_or_filter: read_le_at::<u32>(data, &mut cursor)?,
                        }
                    } else {
                        ExceptionClause {
                            flags: ExceptionClauseFlags::from_bits_truncate(read_le_at::<u16>(
                                data,
                                &mut cursor,
                            )?),
                            try_offset: u32::from(read_le_at::<u16>(data, &mut cursor)?),
                            try_length: u32::from(read_le_at::<u8>(data, &mut cursor)?),
                            handler_offset: u32::from(read_le_at::<u16>(data, &mut cursor)?),
                            handler_length: u32::from(read_le_at::<u8>(data, &mut cursor)?),
                            class_token_or_filter: read_le_at::<u32>(data, &mut cursor)?,
                        }
                    });
                }
            }

            if !flags.contains(SectionFlags::MORE_SECTS) {
                break;
            }
            cursor = (section_start + size + 3) & !3;
        }

        Ok(clauses)
    }
}
