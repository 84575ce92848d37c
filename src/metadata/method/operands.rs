use crate::{file::parser::Parser, metadata::token::Token, Result};

/// Operand encodings of CIL instructions (ECMA-335 III.1.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand
    InlineNone,
    /// 1 byte immediate, local, argument or branch target
    ShortInline,
    /// 2 byte local or argument index
    InlineVar,
    /// 4 byte immediate or branch target
    Inline32,
    /// 8 byte immediate
    Inline64,
    /// `TypeDef`, `TypeRef` or `TypeSpec` token
    InlineType,
    /// `MethodDef`, `MemberRef` or `MethodSpec` token
    InlineMethod,
    /// `Field` or `MemberRef` token
    InlineField,
    /// Any type, method or field token, used by `ldtoken`
    InlineTok,
    /// `StandAloneSig` token
    InlineSig,
    /// `#US` heap token
    InlineString,
    /// Jump table
    InlineSwitch,
}

impl OperandKind {
    /// Operand of a single byte opcode, `None` for undefined opcodes.
    #[must_use]
    pub fn of_opcode(opcode: u8) -> Option<OperandKind> {
        use OperandKind::*;

        Some(match opcode {
            0x00..=0x0D | 0x14..=0x1E | 0x25 | 0x26 | 0x2A | 0x46..=0x6E | 0x76 | 0x7A
            | 0x82..=0x8B | 0x8E | 0x90..=0xA2 | 0xB3..=0xBA | 0xC3 | 0xD1..=0xDC | 0xDF
            | 0xE0 => InlineNone,
            0x0E..=0x13 | 0x1F | 0x2B..=0x37 | 0xDE => ShortInline,
            0x20 | 0x22 | 0x38..=0x44 | 0xDD => Inline32,
            0x21 | 0x23 => Inline64,
            0x27 | 0x28 | 0x6F | 0x73 => InlineMethod,
            0x29 => InlineSig,
            0x45 => InlineSwitch,
            0x70 | 0x71 | 0x74 | 0x75 | 0x79 | 0x81 | 0x8C | 0x8D | 0x8F | 0xA3..=0xA5 | 0xC2
            | 0xC6 => InlineType,
            0x72 => InlineString,
            0x7B..=0x80 => InlineField,
            0xD0 => InlineTok,
            _ => return None,
        })
    }

    /// Operand of a `0xFE` prefixed opcode, `None` for undefined opcodes.
    #[must_use]
    pub fn of_extended_opcode(opcode: u8) -> Option<OperandKind> {
        use OperandKind::*;

        Some(match opcode {
            0x00..=0x05 | 0x0F | 0x11 | 0x13 | 0x14 | 0x17 | 0x18 | 0x1A | 0x1D | 0x1E => {
                InlineNone
            }
            0x06 | 0x07 => InlineMethod,
            0x09..=0x0E => InlineVar,
            0x12 | 0x19 => ShortInline,
            0x15 | 0x16 | 0x1C => InlineType,
            _ => return None,
        })
    }

    /// Returns `true` for operands holding a type or member token.
    #[must_use]
    pub fn is_member_token(&self) -> bool {
        matches!(
            self,
            OperandKind::InlineType
                | OperandKind::InlineMethod
                | OperandKind::InlineField
                | OperandKind::InlineTok
        )
    }
}

/// A type or member token found in an instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandToken {
    /// Offset of the instruction within the code
    pub offset: usize,
    /// Encoding of the operand
    pub kind: OperandKind,
    /// The referenced entity
    pub token: Token,
}

/// Walk an IL instruction stream and collect the operands referencing types and members.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for undefined opcodes and
/// [`crate::Error::OutOfBounds`] for a truncated final instruction.
pub fn scan_operand_tokens(code: &[u8]) -> Result<Vec<OperandToken>> {
    let mut parser = Parser::new(code);
    let mut tokens = Vec::new();

    while parser.has_more_data() {
        let offset = parser.pos();
        let opcode = parser.read_le::<u8>()?;
        let kind = if opcode == 0xFE {
            let extended = parser.read_le::<u8>()?;
            OperandKind::of_extended_opcode(extended).ok_or_else(|| {
                malformed_error!("Invalid opcode 0xFE {:#04x} at {}", extended, offset)
            })?
        } else {
            OperandKind::of_opcode(opcode)
                .ok_or_else(|| malformed_error!("Invalid opcode {:#04x} at {}", opcode, offset))?
        };

        match kind {
            OperandKind::InlineNone => {}
            OperandKind::ShortInline => parser.advance_by(1)?,
            OperandKind::InlineVar => parser.advance_by(2)?,
            OperandKind::Inline32 | OperandKind::InlineSig | OperandKind::InlineString => {
                parser.advance_by(4)?;
            }
            OperandKind::Inline64 => parser.advance_by(8)?,
            OperandKind::InlineSwitch => {
                let targets = parser.read_le::<u32>()? as usize;
                parser.advance_by(targets.checked_mul(4).ok_or_else(|| out_of_bounds_error!())?)?;
            }
            OperandKind::InlineType
            | OperandKind::InlineMethod
            | OperandKind::InlineField
            | OperandKind::InlineTok => {
                tokens.push(OperandToken {
                    offset,
                    kind,
                    token: Token::new(parser.read_le::<u32>()?),
                });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_in_order() {
        #[rustfmt::skip]
        let code = [
            0x02,                               // ldarg.0
            0x28, 0x01, 0x00, 0x00, 0x0A,       // call MemberRef 1
            0x1F, 0x10,                         // ldc.i4.s 16
            0x8D, 0x02, 0x00, 0x00, 0x01,       // newarr TypeRef 2
            0x21, 0, 0, 0, 0, 0, 0, 0, 0,       // ldc.i8
            0x45, 0x02, 0x00, 0x00, 0x00,       // switch (2 targets)
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x7E, 0x03, 0x00, 0x00, 0x04,       // ldsfld Field 3
            0xFE, 0x0C, 0x01, 0x00,             // ldloc 1
            0xFE, 0x16, 0x04, 0x00, 0x00, 0x1B, // constrained. TypeSpec 4
            0xD0, 0x05, 0x00, 0x00, 0x2B,       // ldtoken MethodSpec 5
            0x72, 0x01, 0x00, 0x00, 0x70,       // ldstr
            0x2A,                               // ret
        ];

        let tokens = scan_operand_tokens(&code).unwrap();
        let values: Vec<(OperandKind, u32)> = tokens
            .iter()
            .map(|operand| (operand.kind, operand.token.value()))
            .collect();

        assert_eq!(
            values,
            vec![
                (OperandKind::InlineMethod, 0x0A00_0001),
                (OperandKind::InlineType, 0x0100_0002),
                (OperandKind::InlineField, 0x0400_0003),
                (OperandKind::InlineType, 0x1B00_0004),
                (OperandKind::InlineTok, 0x2B00_0005),
            ]
        );
        assert_eq!(tokens[0].offset, 1);
    }

    #[test]
    fn opcode_table() {
        assert_eq!(OperandKind::of_opcode(0x2A), Some(OperandKind::InlineNone));
        assert_eq!(OperandKind::of_opcode(0x73), Some(OperandKind::InlineMethod));
        assert_eq!(OperandKind::of_opcode(0xA5), Some(OperandKind::InlineType));
        assert_eq!(OperandKind::of_opcode(0x24), None);
        assert_eq!(OperandKind::of_extended_opcode(0x06), Some(OperandKind::InlineMethod));
        assert_eq!(OperandKind::of_extended_opcode(0x1C), Some(OperandKind::InlineType));
        assert_eq!(OperandKind::of_extended_opcode(0x08), None);
        assert!(OperandKind::InlineTok.is_member_token());
        assert!(!OperandKind::InlineString.is_member_token());
    }

    #[test]
    fn invalid() {
        assert!(scan_operand_tokens(&[0x24]).is_err());
        assert!(scan_operand_tokens(&[0x28, 0x01, 0x00]).is_err());
        assert!(scan_operand_tokens(&[0xFE]).is_err());
        assert!(scan_operand_tokens(&[0x45, 0xFF, 0xFF, 0xFF, 0xFF]).is_err());
        assert!(scan_operand_tokens(&[]).unwrap().is_empty());
    }
}
