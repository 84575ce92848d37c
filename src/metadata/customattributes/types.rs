use crate::metadata::typename::AssemblyQualifiedTypeName;

/// A decoded custom attribute blob.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeValue {
    /// Constructor arguments, in parameter order
    pub fixed_args: Vec<CustomAttributeArgument>,
    /// Field and property assignments, in blob order
    pub named_args: Vec<CustomAttributeNamedArgument>,
}

/// One argument value of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomAttributeArgument {
    /// Boolean value
    Bool(bool),
    /// UTF-16 code unit
    Char(u16),
    /// Signed 8-bit integer
    I1(i8),
    /// Unsigned 8-bit integer
    U1(u8),
    /// Signed 16-bit integer
    I2(i16),
    /// Unsigned 16-bit integer
    U2(u16),
    /// Signed 32-bit integer
    I4(i32),
    /// Unsigned 32-bit integer
    U4(u32),
    /// Signed 64-bit integer
    I8(i64),
    /// Unsigned 64-bit integer
    U8(u64),
    /// 32-bit floating point
    R4(f32),
    /// 64-bit floating point
    R8(f64),
    /// A string, `None` for the null string
    String(Option<String>),
    /// A `System.Type` value, `None` for a null type
    Type(Option<AssemblyQualifiedTypeName>),
    /// An enum value: the enum's `T:` id and its underlying integer
    Enum(String, Box<CustomAttributeArgument>),
    /// A single dimensional array, `None` for a null array
    Array(Option<Vec<CustomAttributeArgument>>),
}

/// A field or property assignment of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeNamedArgument {
    /// Whether this is a field (true) or property (false)
    pub is_field: bool,
    /// Field or property name
    pub name: String,
    /// The declared type of the field or property
    pub arg_type: AttributeArgumentType,
    /// The assigned value
    pub value: CustomAttributeArgument,
}

/// The types a custom attribute argument can be declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeArgumentType {
    /// `bool`
    Boolean,
    /// `char`
    Char,
    /// `sbyte`
    SByte,
    /// `byte`
    Byte,
    /// `short`
    Int16,
    /// `ushort`
    UInt16,
    /// `int`
    Int32,
    /// `uint`
    UInt32,
    /// `long`
    Int64,
    /// `ulong`
    UInt64,
    /// `float`
    Single,
    /// `double`
    Double,
    /// `string`
    String,
    /// `System.Type`
    Type,
    /// `object`; the value carries its own type
    TaggedObject,
    /// An enum, by `T:` id
    Enum(String),
    /// A single dimensional array of a non-array type
    SzArray(Box<AttributeArgumentType>),
}

/// .NET `CorSerializationType` constants as defined in corhdr.h
#[allow(non_snake_case, missing_docs)]
pub mod SERIALIZATION_TYPE {
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
    pub const SZARRAY: u8 = 0x1D;
    pub const TYPE: u8 = 0x50;
    pub const TAGGED_OBJECT: u8 = 0x51;
    pub const FIELD: u8 = 0x53;
    pub const PROPERTY: u8 = 0x54;
    pub const ENUM: u8 = 0x55;
}

impl AttributeArgumentType {
    /// Map a scalar serialization type code.
    #[must_use]
    pub fn from_scalar_code(code: u8) -> Option<AttributeArgumentType> {
        Some(match code {
            SERIALIZATION_TYPE::BOOLEAN => AttributeArgumentType::Boolean,
            SERIALIZATION_TYPE::CHAR => AttributeArgumentType::Char,
            SERIALIZATION_TYPE::I1 => AttributeArgumentType::SByte,
            SERIALIZATION_TYPE::U1 => AttributeArgumentType::Byte,
            SERIALIZATION_TYPE::I2 => AttributeArgumentType::Int16,
            SERIALIZATION_TYPE::U2 => AttributeArgumentType::UInt16,
            SERIALIZATION_TYPE::I4 => AttributeArgumentType::Int32,
            SERIALIZATION_TYPE::U4 => AttributeArgumentType::UInt32,
            SERIALIZATION_TYPE::I8 => AttributeArgumentType::Int64,
            SERIALIZATION_TYPE::U8 => AttributeArgumentType::UInt64,
            SERIALIZATION_TYPE::R4 => AttributeArgumentType::Single,
            SERIALIZATION_TYPE::R8 => AttributeArgumentType::Double,
            SERIALIZATION_TYPE::STRING => AttributeArgumentType::String,
            SERIALIZATION_TYPE::TYPE => AttributeArgumentType::Type,
            SERIALIZATION_TYPE::TAGGED_OBJECT => AttributeArgumentType::TaggedObject,
            _ => return None,
        })
    }
}

impl CustomAttributeArgument {
    /// Every `System.Type` value in this argument, looking into arrays.
    #[must_use]
    pub fn type_values(&self) -> Vec<&AssemblyQualifiedTypeName> {
        let mut values = Vec::new();
        let mut pending = vec![self];
        while let Some(argument) = pending.pop() {
            match argument {
                CustomAttributeArgument::Type(Some(name)) => values.push(name),
                CustomAttributeArgument::Array(Some(elements)) => {
                    pending.extend(elements.iter().rev());
                }
                _ => {}
            }
        }
        values
    }
}
