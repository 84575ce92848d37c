use strum::{Display, EnumIter};

/// Element type codes used in signature blobs (ECMA-335 II.23.1.16).
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1B;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
    pub const MVAR: u8 = 0x1E;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const MODIFIER: u8 = 0x40;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// The built-in types with a dedicated element type code.
///
/// The `Display` form is the type's name in the `System` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[allow(missing_docs)]
pub enum PrimitiveTypeCode {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    TypedReference,
    IntPtr,
    UIntPtr,
    Object,
}

impl PrimitiveTypeCode {
    /// Map an element type code to a primitive, if it denotes one.
    #[must_use]
    pub fn from_element_type(code: u8) -> Option<PrimitiveTypeCode> {
        Some(match code {
            ELEMENT_TYPE::VOID => PrimitiveTypeCode::Void,
            ELEMENT_TYPE::BOOLEAN => PrimitiveTypeCode::Boolean,
            ELEMENT_TYPE::CHAR => PrimitiveTypeCode::Char,
            ELEMENT_TYPE::I1 => PrimitiveTypeCode::SByte,
            ELEMENT_TYPE::U1 => PrimitiveTypeCode::Byte,
            ELEMENT_TYPE::I2 => PrimitiveTypeCode::Int16,
            ELEMENT_TYPE::U2 => PrimitiveTypeCode::UInt16,
            ELEMENT_TYPE::I4 => PrimitiveTypeCode::Int32,
            ELEMENT_TYPE::U4 => PrimitiveTypeCode::UInt32,
            ELEMENT_TYPE::I8 => PrimitiveTypeCode::Int64,
            ELEMENT_TYPE::U8 => PrimitiveTypeCode::UInt64,
            ELEMENT_TYPE::R4 => PrimitiveTypeCode::Single,
            ELEMENT_TYPE::R8 => PrimitiveTypeCode::Double,
            ELEMENT_TYPE::STRING => PrimitiveTypeCode::String,
            ELEMENT_TYPE::TYPEDBYREF => PrimitiveTypeCode::TypedReference,
            ELEMENT_TYPE::I => PrimitiveTypeCode::IntPtr,
            ELEMENT_TYPE::U => PrimitiveTypeCode::UIntPtr,
            ELEMENT_TYPE::OBJECT => PrimitiveTypeCode::Object,
            _ => return None,
        })
    }
}

/// What a signature blob describes, from the low nibble of its header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    /// A method, with the given calling convention
    Method(SignatureCallingConvention),
    /// A field
    Field,
    /// A local variable list
    LocalVariables,
    /// A property
    Property,
    /// A generic method instantiation
    MethodSpecification,
}

/// Calling conventions of method signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SignatureCallingConvention {
    Default,
    CDecl,
    StdCall,
    ThisCall,
    FastCall,
    VarArgs,
    Unmanaged,
}

/// The leading byte of a signature blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHeader(pub u8);

impl SignatureHeader {
    const GENERIC: u8 = 0x10;
    const HAS_THIS: u8 = 0x20;
    const EXPLICIT_THIS: u8 = 0x40;

    /// The kind of signature, `None` for reserved values.
    #[must_use]
    pub fn kind(&self) -> Option<SignatureKind> {
        Some(match self.0 & 0x0F {
            0x00 => SignatureKind::Method(SignatureCallingConvention::Default),
            0x01 => SignatureKind::Method(SignatureCallingConvention::CDecl),
            0x02 => SignatureKind::Method(SignatureCallingConvention::StdCall),
            0x03 => SignatureKind::Method(SignatureCallingConvention::ThisCall),
            0x04 => SignatureKind::Method(SignatureCallingConvention::FastCall),
            0x05 => SignatureKind::Method(SignatureCallingConvention::VarArgs),
            0x06 => SignatureKind::Field,
            0x07 => SignatureKind::LocalVariables,
            0x08 => SignatureKind::Property,
            0x09 => SignatureKind::Method(SignatureCallingConvention::Unmanaged),
            0x0A => SignatureKind::MethodSpecification,
            _ => return None,
        })
    }

    /// Returns `true` for generic method signatures.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.0 & Self::GENERIC != 0
    }

    /// Returns `true` for instance members.
    #[must_use]
    pub fn has_this(&self) -> bool {
        self.0 & Self::HAS_THIS != 0
    }

    /// Returns `true` if `this` is passed explicitly as the first parameter.
    #[must_use]
    pub fn explicit_this(&self) -> bool {
        self.0 & Self::EXPLICIT_THIS != 0
    }
}

/// The shape of a general (`ELEMENT_TYPE_ARRAY`) array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArrayShape {
    /// Number of dimensions
    pub rank: u32,
    /// Known sizes, for a prefix of the dimensions
    pub sizes: Vec<u32>,
    /// Known lower bounds, for a prefix of the dimensions
    pub lower_bounds: Vec<i32>,
}

/// A decoded method, property or function pointer signature.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature<T> {
    /// The header byte
    pub header: SignatureHeader,
    /// Number of generic parameters of a generic method
    pub generic_parameter_count: u32,
    /// Number of parameters before the vararg sentinel, or all of them
    pub required_parameter_count: usize,
    /// Return type, or the property type for property signatures
    pub return_type: T,
    /// Parameter types in declaration order, including varargs after the sentinel
    pub parameter_types: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_flags() {
        let header = SignatureHeader(0x30);
        assert!(header.is_generic());
        assert!(header.has_this());
        assert!(!header.explicit_this());
        assert_eq!(
            header.kind(),
            Some(SignatureKind::Method(SignatureCallingConvention::Default))
        );

        assert_eq!(SignatureHeader(0x06).kind(), Some(SignatureKind::Field));
        assert_eq!(SignatureHeader(0x28).kind(), Some(SignatureKind::Property));
        assert_eq!(SignatureHeader(0x0A).kind(), Some(SignatureKind::MethodSpecification));
        assert_eq!(SignatureHeader(0x0C).kind(), None);
    }

    #[test]
    fn primitive_names() {
        assert_eq!(
            PrimitiveTypeCode::from_element_type(ELEMENT_TYPE::I4),
            Some(PrimitiveTypeCode::Int32)
        );
        assert_eq!(PrimitiveTypeCode::Int32.to_string(), "Int32");
        assert_eq!(PrimitiveTypeCode::UIntPtr.to_string(), "UIntPtr");
        assert_eq!(PrimitiveTypeCode::from_element_type(ELEMENT_TYPE::CLASS), None);
    }
}
