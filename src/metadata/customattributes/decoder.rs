use crate::{
    file::parser::Parser,
    metadata::{
        customattributes::{
            AttributeArgumentType, CustomAttributeArgument, CustomAttributeNamedArgument,
            CustomAttributeValue, EnumWidth, EnumWidthGuesses, SERIALIZATION_TYPE,
        },
        docid,
        model::{
            AttributeConstructor, GenericContext, MetadataModule, MetadataType,
            ModuleTypeProvider,
        },
        signatures::{MethodSignature, PrimitiveTypeCode, SignatureDecoder},
        typename::AssemblyQualifiedTypeName,
    },
    Error::RecursionLimit,
    Result,
};

/// Maximum nesting of arrays and boxed values inside one argument.
const MAX_NESTING_DEPTH: usize = 64;

/// The custom attribute prolog (ECMA-335 II.23.3).
const PROLOG: u16 = 0x0001;

/// Decodes custom attribute blobs of one module against their constructor signatures.
///
/// Decoding is all or nothing: any structural problem in the signature or the blob,
/// including unconsumed trailing bytes in either, yields `None`. The widths of enum
/// arguments are taken from an [`EnumWidthGuesses`] owned by the caller.
pub struct CustomAttributeDecoder<'a> {
    module: &'a MetadataModule<'a>,
}

impl<'a> CustomAttributeDecoder<'a> {
    /// Create a decoder for attributes of `module`.
    #[must_use]
    pub fn new(module: &'a MetadataModule<'a>) -> CustomAttributeDecoder<'a> {
        CustomAttributeDecoder { module }
    }

    /// Decode `blob` as the value of an attribute constructed by `constructor`.
    ///
    /// Returns `None` if the constructor signature can't be used for attributes or the blob
    /// doesn't match it under the current enum width guesses.
    pub fn try_decode(
        &self,
        constructor: AttributeConstructor<'a>,
        blob: &[u8],
        guesses: &mut EnumWidthGuesses,
    ) -> Option<CustomAttributeValue> {
        match self.decode(constructor, blob, guesses) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::trace!("Custom attribute not decoded: {}", error);
                None
            }
        }
    }

    fn decode(
        &self,
        constructor: AttributeConstructor<'a>,
        blob: &[u8],
        guesses: &mut EnumWidthGuesses,
    ) -> Result<CustomAttributeValue> {
        let parameters = self.parameter_types(constructor)?;

        let mut reader = ValueReader {
            parser: Parser::new(blob),
            module: self.module,
            guesses,
        };

        let prolog = reader.parser.read_le::<u16>()?;
        if prolog != PROLOG {
            return Err(malformed_error!("Invalid custom attribute prolog 0x{:04x}", prolog));
        }

        let mut fixed_args = Vec::with_capacity(parameters.len());
        for parameter in &parameters {
            fixed_args.push(reader.read_value(parameter, 0)?);
        }

        let count = reader.parser.read_le::<u16>()?;
        let mut named_args = Vec::with_capacity(usize::from(count).min(reader.parser.remaining()));
        for _ in 0..count {
            named_args.push(reader.read_named_argument()?);
        }

        if reader.parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after custom attribute value",
                reader.parser.remaining()
            ));
        }

        Ok(CustomAttributeValue {
            fixed_args,
            named_args,
        })
    }

    /// Decode the constructor signature and map its parameters to argument types.
    fn parameter_types(
        &self,
        constructor: AttributeConstructor<'a>,
    ) -> Result<Vec<AttributeArgumentType>> {
        let (blob, context) = match constructor {
            AttributeConstructor::Method(method) => {
                (self.module.blob(method.row()?.signature)?, GenericContext::empty())
            }
            AttributeConstructor::Reference(reference) => {
                (reference.signature_blob()?, reference.parent_context()?)
            }
        };

        let provider = ModuleTypeProvider::new(self.module);
        let mut decoder = SignatureDecoder::new(&provider, blob, &context);
        let signature: MethodSignature<MetadataType<'a>> = decoder.decode_method_signature()?;
        if !decoder.is_at_end() {
            return Err(malformed_error!("Trailing bytes after constructor signature"));
        }

        if signature.header.is_generic() || signature.generic_parameter_count > 0 {
            return Err(malformed_error!("Generic attribute constructor"));
        }
        if signature.return_type != MetadataType::Primitive(PrimitiveTypeCode::Void) {
            return Err(malformed_error!("Attribute constructor does not return void"));
        }

        signature
            .parameter_types
            .iter()
            .map(|parameter| argument_type(parameter, false))
            .collect()
    }
}

/// Map a parameter type of an attribute constructor to the type its argument is
/// serialized as.
fn argument_type(parameter: &MetadataType<'_>, in_array: bool) -> Result<AttributeArgumentType> {
    Ok(match parameter {
        MetadataType::Primitive(code) => match code {
            PrimitiveTypeCode::Boolean => AttributeArgumentType::Boolean,
            PrimitiveTypeCode::Char => AttributeArgumentType::Char,
            PrimitiveTypeCode::SByte => AttributeArgumentType::SByte,
            PrimitiveTypeCode::Byte => AttributeArgumentType::Byte,
            PrimitiveTypeCode::Int16 => AttributeArgumentType::Int16,
            PrimitiveTypeCode::UInt16 => AttributeArgumentType::UInt16,
            PrimitiveTypeCode::Int32 => AttributeArgumentType::Int32,
            PrimitiveTypeCode::UInt32 => AttributeArgumentType::UInt32,
            PrimitiveTypeCode::Int64 => AttributeArgumentType::Int64,
            PrimitiveTypeCode::UInt64 => AttributeArgumentType::UInt64,
            PrimitiveTypeCode::Single => AttributeArgumentType::Single,
            PrimitiveTypeCode::Double => AttributeArgumentType::Double,
            PrimitiveTypeCode::String => AttributeArgumentType::String,
            PrimitiveTypeCode::Object => AttributeArgumentType::TaggedObject,
            other => return Err(malformed_error!("{} is not an attribute argument type", other)),
        },
        MetadataType::Named { named, value_type } => {
            if named.is("System", "Type")? {
                AttributeArgumentType::Type
            } else if named.is("System", "String")? {
                AttributeArgumentType::String
            } else if named.is("System", "Object")? {
                AttributeArgumentType::TaggedObject
            } else if *value_type {
                match docid::type_id(named) {
                    Some(id) => AttributeArgumentType::Enum(id),
                    None => return Err(malformed_error!("Enum type without a name")),
                }
            } else {
                return Err(malformed_error!("Class types can't be attribute arguments"));
            }
        }
        MetadataType::Array {
            element, rank: 0, ..
        } if !in_array => AttributeArgumentType::SzArray(Box::new(argument_type(element, true)?)),
        MetadataType::Modified { unmodified, .. } => argument_type(unmodified, in_array)?,
        other => {
            return Err(malformed_error!(
                "{:?} is not an attribute argument type",
                other
            ))
        }
    })
}

struct ValueReader<'d, 'g, 'a> {
    parser: Parser<'d>,
    module: &'a MetadataModule<'a>,
    guesses: &'g mut EnumWidthGuesses,
}

impl ValueReader<'_, '_, '_> {
    fn read_named_argument(&mut self) -> Result<CustomAttributeNamedArgument> {
        let is_field = match self.parser.read_le::<u8>()? {
            SERIALIZATION_TYPE::FIELD => true,
            SERIALIZATION_TYPE::PROPERTY => false,
            other => {
                return Err(malformed_error!(
                    "Invalid field/property indicator: 0x{:02X}",
                    other
                ))
            }
        };

        let arg_type = self.read_field_or_property_type(0)?;
        let Some(name) = self.parser.read_serialized_string()? else {
            return Err(malformed_error!("Named argument without a name"));
        };
        let name = name.to_string();
        let value = self.read_value(&arg_type, 0)?;

        Ok(CustomAttributeNamedArgument {
            is_field,
            name,
            arg_type,
            value,
        })
    }

    /// Read the type encoding of a named argument or boxed value.
    fn read_field_or_property_type(&mut self, depth: usize) -> Result<AttributeArgumentType> {
        if depth > MAX_NESTING_DEPTH {
            return Err(RecursionLimit(MAX_NESTING_DEPTH));
        }

        let code = self.parser.read_le::<u8>()?;
        if let Some(scalar) = AttributeArgumentType::from_scalar_code(code) {
            return Ok(scalar);
        }

        match code {
            SERIALIZATION_TYPE::SZARRAY => {
                let element = self.read_field_or_property_type(depth + 1)?;
                if matches!(element, AttributeArgumentType::SzArray(_)) {
                    return Err(malformed_error!("Jagged arrays can't be attribute arguments"));
                }
                Ok(AttributeArgumentType::SzArray(Box::new(element)))
            }
            SERIALIZATION_TYPE::ENUM => {
                let Some(name) = self.parser.read_serialized_string()? else {
                    return Err(malformed_error!("Enum argument without a type name"));
                };
                match AssemblyQualifiedTypeName::decode(name)?.documentation_id() {
                    Some(id) => Ok(AttributeArgumentType::Enum(id)),
                    None => Err(malformed_error!("Enum argument with an empty type name")),
                }
            }
            other => Err(malformed_error!(
                "Unsupported argument type code 0x{:02X}",
                other
            )),
        }
    }

    fn read_value(
        &mut self,
        arg_type: &AttributeArgumentType,
        depth: usize,
    ) -> Result<CustomAttributeArgument> {
        if depth > MAX_NESTING_DEPTH {
            return Err(RecursionLimit(MAX_NESTING_DEPTH));
        }

        Ok(match arg_type {
            AttributeArgumentType::Boolean => {
                CustomAttributeArgument::Bool(self.parser.read_le::<u8>()? != 0)
            }
            AttributeArgumentType::Char => CustomAttributeArgument::Char(self.parser.read_le()?),
            AttributeArgumentType::SByte => CustomAttributeArgument::I1(self.parser.read_le()?),
            AttributeArgumentType::Byte => CustomAttributeArgument::U1(self.parser.read_le()?),
            AttributeArgumentType::Int16 => CustomAttributeArgument::I2(self.parser.read_le()?),
            AttributeArgumentType::UInt16 => CustomAttributeArgument::U2(self.parser.read_le()?),
            AttributeArgumentType::Int32 => CustomAttributeArgument::I4(self.parser.read_le()?),
            AttributeArgumentType::UInt32 => CustomAttributeArgument::U4(self.parser.read_le()?),
            AttributeArgumentType::Int64 => CustomAttributeArgument::I8(self.parser.read_le()?),
            AttributeArgumentType::UInt64 => CustomAttributeArgument::U8(self.parser.read_le()?),
            AttributeArgumentType::Single => CustomAttributeArgument::R4(self.parser.read_le()?),
            AttributeArgumentType::Double => CustomAttributeArgument::R8(self.parser.read_le()?),
            AttributeArgumentType::String => CustomAttributeArgument::String(
                self.parser.read_serialized_string()?.map(str::to_string),
            ),
            AttributeArgumentType::Type => match self.parser.read_serialized_string()? {
                Some(name) => {
                    CustomAttributeArgument::Type(Some(AssemblyQualifiedTypeName::decode(name)?))
                }
                None => CustomAttributeArgument::Type(None),
            },
            AttributeArgumentType::TaggedObject => {
                let boxed = self.read_field_or_property_type(depth + 1)?;
                self.read_value(&boxed, depth + 1)?
            }
            AttributeArgumentType::Enum(id) => {
                let width = self.guesses.width_of(self.module.enum_widths(), id);
                let value = match width {
                    EnumWidth::One => CustomAttributeArgument::U1(self.parser.read_le()?),
                    EnumWidth::Two => CustomAttributeArgument::U2(self.parser.read_le()?),
                    EnumWidth::Four => CustomAttributeArgument::I4(self.parser.read_le()?),
                    EnumWidth::Eight => CustomAttributeArgument::I8(self.parser.read_le()?),
                };
                CustomAttributeArgument::Enum(id.clone(), Box::new(value))
            }
            AttributeArgumentType::SzArray(element) => {
                let count = self.parser.read_le::<u32>()?;
                if count == u32::MAX {
                    return Ok(CustomAttributeArgument::Array(None));
                }
                if count as usize > self.parser.remaining() {
                    return Err(malformed_error!(
                        "Array of {} elements exceeds the remaining {} bytes",
                        count,
                        self.parser.remaining()
                    ));
                }

                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(self.read_value(element, depth + 1)?);
                }
                CustomAttributeArgument::Array(Some(elements))
            }
        })
    }
}
