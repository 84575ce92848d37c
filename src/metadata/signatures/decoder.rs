use crate::{
    file::parser::Parser,
    metadata::{
        signatures::{
            ArrayShape, MethodSignature, PrimitiveTypeCode, SignatureHeader, SignatureKind,
            SignatureTypeProvider, ELEMENT_TYPE,
        },
        tables::TableId,
    },
    Error::RecursionLimit,
    Result,
};

/// Nesting depth at which decoding gives up. Legitimate signatures stay far below it.
const MAX_RECURSION_DEPTH: usize = 50;

/// Decodes one signature blob through a [`SignatureTypeProvider`].
pub struct SignatureDecoder<'p, 'd, P: SignatureTypeProvider> {
    provider: &'p P,
    context: &'p P::Context,
    parser: Parser<'d>,
    depth: usize,
}

impl<'p, 'd, P: SignatureTypeProvider> SignatureDecoder<'p, 'd, P> {
    /// Create a decoder over `blob`, resolving generic parameters against `context`.
    pub fn new(provider: &'p P, blob: &'d [u8], context: &'p P::Context) -> Self {
        SignatureDecoder {
            provider,
            context,
            parser: Parser::new(blob),
            depth: 0,
        }
    }

    /// Returns `true` once the whole blob has been consumed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        !self.parser.has_more_data()
    }

    /// Decode a single type.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown or misplaced element types,
    /// [`crate::Error::OutOfBounds`] for truncated blobs and
    /// [`crate::Error::RecursionLimit`] for excessive nesting.
    pub fn decode_type(&mut self) -> Result<P::Type> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let result = self.decode_type_inner();
        self.depth -= 1;
        result
    }

    fn decode_type_inner(&mut self) -> Result<P::Type> {
        let element_type = self.parser.read_le::<u8>()?;
        if let Some(code) = PrimitiveTypeCode::from_element_type(element_type) {
            return self.provider.primitive_type(code);
        }

        match element_type {
            ELEMENT_TYPE::CLASS => self.decode_type_handle(false),
            ELEMENT_TYPE::VALUETYPE => self.decode_type_handle(true),
            ELEMENT_TYPE::PTR => {
                let element = self.decode_type()?;
                Ok(self.provider.pointer_type(element))
            }
            ELEMENT_TYPE::BYREF => {
                let element = self.decode_type()?;
                Ok(self.provider.by_reference_type(element))
            }
            ELEMENT_TYPE::PINNED => {
                let element = self.decode_type()?;
                Ok(self.provider.pinned_type(element))
            }
            ELEMENT_TYPE::SZARRAY => {
                let element = self.decode_type()?;
                Ok(self.provider.sz_array_type(element))
            }
            ELEMENT_TYPE::ARRAY => {
                let element = self.decode_type()?;
                let shape = self.decode_array_shape()?;
                Ok(self.provider.array_type(element, shape))
            }
            ELEMENT_TYPE::GENERICINST => self.decode_generic_instantiation(),
            ELEMENT_TYPE::VAR => {
                let index = self.parser.read_compressed_uint()?;
                Ok(self.provider.generic_type_parameter(self.context, index))
            }
            ELEMENT_TYPE::MVAR => {
                let index = self.parser.read_compressed_uint()?;
                Ok(self.provider.generic_method_parameter(self.context, index))
            }
            ELEMENT_TYPE::FNPTR => {
                let signature = self.decode_method_signature()?;
                Ok(self.provider.function_pointer_type(signature))
            }
            ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                let modifier = self.decode_type_handle(false)?;
                let unmodified = self.decode_type()?;
                Ok(self.provider.modified_type(
                    modifier,
                    unmodified,
                    element_type == ELEMENT_TYPE::CMOD_REQD,
                ))
            }
            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - {:#x} at {}",
                element_type,
                self.parser.pos() - 1
            )),
        }
    }

    fn decode_type_handle(&mut self, is_value_type: bool) -> Result<P::Type> {
        let token = self.parser.read_compressed_token()?;
        if token.table() == TableId::TypeSpec as u8 {
            let blob = self.provider.type_specification_blob(token.row())?;
            let mut nested = SignatureDecoder {
                provider: self.provider,
                context: self.context,
                parser: Parser::new(blob),
                depth: self.depth,
            };
            return nested.decode_type();
        }

        self.provider.type_from_handle(token, is_value_type)
    }

    fn decode_generic_instantiation(&mut self) -> Result<P::Type> {
        let kind = self.parser.read_le::<u8>()?;
        let is_value_type = match kind {
            ELEMENT_TYPE::CLASS => false,
            ELEMENT_TYPE::VALUETYPE => true,
            _ => {
                return Err(malformed_error!(
                    "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {:#x}",
                    kind
                ))
            }
        };

        let generic = self.decode_type_handle(is_value_type)?;
        let count = self.parser.read_compressed_uint()?;
        if count == 0 {
            return Err(malformed_error!("GENERICINST - Instantiation without arguments"));
        }

        let mut arguments = Vec::with_capacity((count as usize).min(self.parser.remaining()));
        for _ in 0..count {
            arguments.push(self.decode_type()?);
        }

        self.provider.generic_instantiation(generic, arguments)
    }

    fn decode_array_shape(&mut self) -> Result<ArrayShape> {
        let rank = self.parser.read_compressed_uint()?;
        if rank == 0 {
            return Err(malformed_error!("ARRAY - Rank must be at least 1"));
        }

        let size_count = self.parser.read_compressed_uint()?;
        if size_count > rank {
            return Err(malformed_error!(
                "ARRAY - {} sizes for rank {}",
                size_count,
                rank
            ));
        }
        let mut sizes = Vec::with_capacity((size_count as usize).min(self.parser.remaining()));
        for _ in 0..size_count {
            sizes.push(self.parser.read_compressed_uint()?);
        }

        let bound_count = self.parser.read_compressed_uint()?;
        if bound_count > rank {
            return Err(malformed_error!(
                "ARRAY - {} lower bounds for rank {}",
                bound_count,
                rank
            ));
        }
        let mut lower_bounds =
            Vec::with_capacity((bound_count as usize).min(self.parser.remaining()));
        for _ in 0..bound_count {
            lower_bounds.push(self.parser.read_compressed_int()?);
        }

        Ok(ArrayShape {
            rank,
            sizes,
            lower_bounds,
        })
    }

    fn decode_header(&mut self) -> Result<(SignatureHeader, SignatureKind)> {
        let header = SignatureHeader(self.parser.read_le::<u8>()?);
        match header.kind() {
            Some(kind) => Ok((header, kind)),
            None => Err(malformed_error!(
                "Invalid signature header - {:#x}",
                header.0
            )),
        }
    }

    /// Decode a `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`.
    ///
    /// # Errors
    /// Fails if the header is not a method header or the blob is malformed.
    pub fn decode_method_signature(&mut self) -> Result<MethodSignature<P::Type>> {
        let (header, kind) = self.decode_header()?;
        if !matches!(kind, SignatureKind::Method(_)) {
            return Err(malformed_error!(
                "Expected a method signature, found {:?}",
                kind
            ));
        }

        let generic_parameter_count = if header.is_generic() {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let parameter_count = self.parser.read_compressed_uint()? as usize;
        let return_type = self.decode_type()?;

        let mut required_parameter_count = parameter_count;
        let mut parameter_types = Vec::with_capacity(parameter_count.min(self.parser.remaining()));
        for index in 0..parameter_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                if required_parameter_count != parameter_count {
                    return Err(malformed_error!("Duplicate vararg sentinel"));
                }
                self.parser.advance()?;
                required_parameter_count = index;
            }

            parameter_types.push(self.decode_type()?);
        }

        Ok(MethodSignature {
            header,
            generic_parameter_count,
            required_parameter_count,
            return_type,
            parameter_types,
        })
    }

    /// Decode a `FieldSig`.
    ///
    /// # Errors
    /// Fails if the header is not a field header or the blob is malformed.
    pub fn decode_field_signature(&mut self) -> Result<P::Type> {
        let (_, kind) = self.decode_header()?;
        if kind != SignatureKind::Field {
            return Err(malformed_error!(
                "Expected a field signature, found {:?}",
                kind
            ));
        }

        self.decode_type()
    }

    /// Decode a `PropertySig`; the property type is reported as the return type and
    /// indexer parameters as parameters.
    ///
    /// # Errors
    /// Fails if the header is not a property header or the blob is malformed.
    pub fn decode_property_signature(&mut self) -> Result<MethodSignature<P::Type>> {
        let (header, kind) = self.decode_header()?;
        if kind != SignatureKind::Property {
            return Err(malformed_error!(
                "Expected a property signature, found {:?}",
                kind
            ));
        }

        let parameter_count = self.parser.read_compressed_uint()? as usize;
        let return_type = self.decode_type()?;

        let mut parameter_types = Vec::with_capacity(parameter_count.min(self.parser.remaining()));
        for _ in 0..parameter_count {
            parameter_types.push(self.decode_type()?);
        }

        Ok(MethodSignature {
            header,
            generic_parameter_count: 0,
            required_parameter_count: parameter_count,
            return_type,
            parameter_types,
        })
    }

    /// Decode a `MethodSpec` instantiation into its type arguments.
    ///
    /// # Errors
    /// Fails if the header is not a generic instantiation header or the blob is malformed.
    pub fn decode_method_spec_signature(&mut self) -> Result<Vec<P::Type>> {
        let (_, kind) = self.decode_header()?;
        if kind != SignatureKind::MethodSpecification {
            return Err(malformed_error!(
                "Expected a method instantiation, found {:?}",
                kind
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        if count == 0 {
            return Err(malformed_error!("Method instantiation without arguments"));
        }

        let mut arguments = Vec::with_capacity((count as usize).min(self.parser.remaining()));
        for _ in 0..count {
            arguments.push(self.decode_type()?);
        }

        Ok(arguments)
    }

    /// Decode a `LocalVarSig`.
    ///
    /// # Errors
    /// Fails if the header is not a local variable header or the blob is malformed.
    pub fn decode_local_signature(&mut self) -> Result<Vec<P::Type>> {
        let (_, kind) = self.decode_header()?;
        if kind != SignatureKind::LocalVariables {
            return Err(malformed_error!(
                "Expected a local variable signature, found {:?}",
                kind
            ));
        }

        let count = self.parser.read_compressed_uint()? as usize;
        let mut locals = Vec::with_capacity(count.min(self.parser.remaining()));
        for _ in 0..count {
            locals.push(self.decode_type()?);
        }

        Ok(locals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    /// Renders types as compact strings, resolving generic parameters from the context.
    struct TextProvider {
        specs: Vec<Vec<u8>>,
    }

    struct TextContext {
        type_arguments: Vec<&'static str>,
    }

    impl SignatureTypeProvider for TextProvider {
        type Type = String;
        type Context = TextContext;

        fn primitive_type(&self, code: PrimitiveTypeCode) -> Result<String> {
            Ok(code.to_string())
        }

        fn type_from_handle(&self, token: Token, is_value_type: bool) -> Result<String> {
            let prefix = if is_value_type { "valuetype " } else { "" };
            Ok(format!("{}{:#010x}", prefix, token.value()))
        }

        fn type_specification_blob(&self, row: u32) -> Result<&[u8]> {
            match self.specs.get(row as usize - 1) {
                Some(blob) => Ok(blob),
                None => Err(out_of_bounds_error!()),
            }
        }

        fn sz_array_type(&self, element: String) -> String {
            format!("{}[]", element)
        }

        fn array_type(&self, element: String, shape: ArrayShape) -> String {
            format!(
                "{}[rank {} sizes {:?} bounds {:?}]",
                element, shape.rank, shape.sizes, shape.lower_bounds
            )
        }

        fn by_reference_type(&self, element: String) -> String {
            format!("{}&", element)
        }

        fn pointer_type(&self, element: String) -> String {
            format!("{}*", element)
        }

        fn pinned_type(&self, element: String) -> String {
            format!("pinned {}", element)
        }

        fn function_pointer_type(&self, signature: MethodSignature<String>) -> String {
            format!(
                "fnptr {}({})",
                signature.return_type,
                signature.parameter_types.join(",")
            )
        }

        fn modified_type(&self, modifier: String, unmodified: String, is_required: bool) -> String {
            let keyword = if is_required { "modreq" } else { "modopt" };
            format!("{} {}({})", unmodified, keyword, modifier)
        }

        fn generic_instantiation(&self, generic: String, arguments: Vec<String>) -> Result<String> {
            Ok(format!("{}<{}>", generic, arguments.join(",")))
        }

        fn generic_type_parameter(&self, context: &TextContext, index: u32) -> String {
            match context.type_arguments.get(index as usize) {
                Some(argument) => (*argument).to_string(),
                None => format!("!{}", index),
            }
        }

        fn generic_method_parameter(&self, _context: &TextContext, index: u32) -> String {
            format!("!!{}", index)
        }
    }

    fn decode_method(blob: &[u8]) -> Result<MethodSignature<String>> {
        let provider = TextProvider { specs: Vec::new() };
        let context = TextContext {
            type_arguments: vec!["Int64"],
        };
        let mut decoder = SignatureDecoder::new(&provider, blob, &context);
        let signature = decoder.decode_method_signature()?;
        assert!(decoder.is_at_end());
        Ok(signature)
    }

    #[test]
    fn method_signature() {
        // instance void (int32, string[], class 0x01000002&)
        #[rustfmt::skip]
        let blob = [
            0x20, 0x03, 0x01,
            0x08,
            0x1D, 0x0E,
            0x10, 0x12, 0x09,
        ];

        let signature = decode_method(&blob).unwrap();

        assert!(signature.header.has_this());
        assert_eq!(signature.return_type, "Void");
        assert_eq!(
            signature.parameter_types,
            vec!["Int32", "String[]", "0x01000002&"]
        );
        assert_eq!(signature.required_parameter_count, 3);
    }

    #[test]
    fn generic_method_signature() {
        // !!0 <1> (!0, valuetype 0x02000001<!!0>)
        #[rustfmt::skip]
        let blob = [
            0x10, 0x01, 0x02,
            0x1E, 0x00,
            0x13, 0x00,
            0x15, 0x11, 0x04, 0x01, 0x1E, 0x00,
        ];

        let signature = decode_method(&blob).unwrap();

        assert_eq!(signature.generic_parameter_count, 1);
        assert_eq!(signature.return_type, "!!0");
        assert_eq!(
            signature.parameter_types,
            vec!["Int64", "valuetype 0x02000001<!!0>"]
        );
    }

    #[test]
    fn vararg_sentinel() {
        #[rustfmt::skip]
        let blob = [
            0x05, 0x02, 0x01,
            0x08,
            0x41, 0x0E,
        ];

        let signature = decode_method(&blob).unwrap();
        assert_eq!(signature.required_parameter_count, 1);
        assert_eq!(signature.parameter_types, vec!["Int32", "String"]);
    }

    #[test]
    fn general_array_and_modifiers() {
        // int32[0...3, -1...] and int32 modreq(0x01000001)* as field signatures
        let provider = TextProvider { specs: Vec::new() };
        let context = TextContext {
            type_arguments: Vec::new(),
        };

        #[rustfmt::skip]
        let blob = [0x06, 0x14, 0x08, 0x02, 0x01, 0x04, 0x02, 0x00, 0x7F];
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);
        assert_eq!(
            decoder.decode_field_signature().unwrap(),
            "Int32[rank 2 sizes [4] bounds [0, -1]]"
        );
        assert!(decoder.is_at_end());

        let blob = [0x06, 0x0F, 0x1F, 0x05, 0x08];
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);
        assert_eq!(
            decoder.decode_field_signature().unwrap(),
            "Int32 modreq(0x01000001)*"
        );
    }

    #[test]
    fn function_pointer_and_spec() {
        let provider = TextProvider {
            specs: vec![vec![0x1D, 0x13, 0x00]],
        };
        let context = TextContext {
            type_arguments: vec!["Byte"],
        };

        // method void *(class 0x1B000001)
        let blob = [0x06, 0x1B, 0x00, 0x01, 0x01, 0x12, 0x06];
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);
        assert_eq!(
            decoder.decode_field_signature().unwrap(),
            "fnptr Void(Byte[])"
        );
    }

    #[test]
    fn property_and_method_spec() {
        let provider = TextProvider { specs: Vec::new() };
        let context = TextContext {
            type_arguments: Vec::new(),
        };

        let blob = [0x28, 0x01, 0x0E, 0x08];
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);
        let property = decoder.decode_property_signature().unwrap();
        assert!(property.header.has_this());
        assert_eq!(property.return_type, "String");
        assert_eq!(property.parameter_types, vec!["Int32"]);

        let blob = [0x0A, 0x02, 0x0E, 0x1C];
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);
        assert_eq!(
            decoder.decode_method_spec_signature().unwrap(),
            vec!["String", "Object"]
        );

        let blob = [0x07, 0x02, 0x45, 0x08, 0x16];
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);
        assert_eq!(
            decoder.decode_local_signature().unwrap(),
            vec!["pinned Int32", "TypedReference"]
        );
    }

    #[test]
    fn malformed() {
        assert!(decode_method(&[0x00, 0x01, 0x01, 0x42]).is_err());
        assert!(decode_method(&[0x00, 0x02, 0x01, 0x08]).is_err());
        assert!(decode_method(&[0x06, 0x08]).is_err());
        assert!(decode_method(&[0x00, 0x01, 0x01, 0x15, 0x08, 0x00]).is_err());
        assert!(decode_method(&[0x00, 0x01, 0x01, 0x15, 0x12, 0x04, 0x00]).is_err());
        assert!(decode_method(&[0x00, 0x00, 0x14, 0x08, 0x00, 0x00, 0x00]).is_err());
    }

    #[test]
    fn array_shape_counts_exceed_blob() {
        // rank and size count of 0x1FFFFFFF followed by a single size
        #[rustfmt::skip]
        let blob = [
            0x06, 0x14, 0x08,
            0xDF, 0xFF, 0xFF, 0xFF,
            0xDF, 0xFF, 0xFF, 0xFF,
            0x01,
        ];

        let provider = TextProvider { specs: Vec::new() };
        let context = TextContext {
            type_arguments: Vec::new(),
        };
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);
        assert!(decoder.decode_field_signature().is_err());
    }

    #[test]
    fn recursion_limit() {
        let mut blob = vec![0x06];
        blob.extend(std::iter::repeat(0x0F).take(100));
        blob.push(0x08);

        let provider = TextProvider { specs: Vec::new() };
        let context = TextContext {
            type_arguments: Vec::new(),
        };
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);

        assert!(matches!(
            decoder.decode_field_signature(),
            Err(crate::Error::RecursionLimit(_))
        ));
    }

    #[test]
    fn self_referencing_spec() {
        // TypeSpec 1 is an array of itself
        let provider = TextProvider {
            specs: vec![vec![0x1D, 0x12, 0x06]],
        };
        let context = TextContext {
            type_arguments: Vec::new(),
        };

        let blob = [0x06, 0x12, 0x06];
        let mut decoder = SignatureDecoder::new(&provider, &blob, &context);
        assert!(matches!(
            decoder.decode_field_signature(),
            Err(crate::Error::RecursionLimit(_))
        ));
    }
}
