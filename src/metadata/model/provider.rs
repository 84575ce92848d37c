use crate::{
    metadata::{
        model::{
            GenericContext, MetadataModule, MetadataType, NamedType, TypeDefinition,
            TypeInstance, TypeReference,
        },
        signatures::{
            ArrayShape, MethodSignature, PrimitiveTypeCode, SignatureDecoder,
            SignatureTypeProvider,
        },
        tables::{CodedIndex, TableId, TypeSpecRaw},
        token::Token,
    },
    Result,
};

/// Builds [`MetadataType`] trees for signatures of one module.
///
/// `TypeDef` and `TypeRef` tokens become [`NamedType`]s of the module; generic parameter
/// references are substituted from a [`GenericContext`].
#[derive(Clone, Copy)]
pub struct ModuleTypeProvider<'a> {
    module: &'a MetadataModule<'a>,
}

impl<'a> ModuleTypeProvider<'a> {
    /// Create a provider for `module`.
    #[must_use]
    pub fn new(module: &'a MetadataModule<'a>) -> ModuleTypeProvider<'a> {
        ModuleTypeProvider { module }
    }

    fn named_type(&self, token: Token) -> Result<NamedType<'a>> {
        let row = token.row();
        match token.table_id() {
            Some(TableId::TypeDef)
                if row >= 1 && row <= self.module.tables().row_count(TableId::TypeDef) =>
            {
                Ok(NamedType::Definition(TypeDefinition::new(self.module, row)))
            }
            Some(TableId::TypeRef)
                if row >= 1 && row <= self.module.tables().row_count(TableId::TypeRef) =>
            {
                Ok(NamedType::Reference(TypeReference::new(self.module, row)))
            }
            _ => Err(malformed_error!("Token {} is not a type definition or reference", token)),
        }
    }
}

impl<'a> SignatureTypeProvider for ModuleTypeProvider<'a> {
    type Type = MetadataType<'a>;
    type Context = GenericContext<'a>;

    fn primitive_type(&self, code: PrimitiveTypeCode) -> Result<MetadataType<'a>> {
        Ok(MetadataType::Primitive(code))
    }

    fn type_from_handle(&self, token: Token, is_value_type: bool) -> Result<MetadataType<'a>> {
        Ok(MetadataType::Named {
            named: self.named_type(token)?,
            value_type: is_value_type,
        })
    }

    fn type_specification_blob(&self, row: u32) -> Result<&[u8]> {
        let spec = self.module.tables().get::<TypeSpecRaw>(row)?;
        self.module.blob(spec.signature)
    }

    fn sz_array_type(&self, element: MetadataType<'a>) -> MetadataType<'a> {
        MetadataType::Array {
            element: Box::new(element),
            rank: 0,
            sizes: Vec::new(),
            lower_bounds: Vec::new(),
        }
    }

    fn array_type(&self, element: MetadataType<'a>, shape: ArrayShape) -> MetadataType<'a> {
        MetadataType::Array {
            element: Box::new(element),
            rank: shape.rank,
            sizes: shape.sizes,
            lower_bounds: shape.lower_bounds,
        }
    }

    fn by_reference_type(&self, element: MetadataType<'a>) -> MetadataType<'a> {
        MetadataType::ByRef(Box::new(element))
    }

    fn pointer_type(&self, element: MetadataType<'a>) -> MetadataType<'a> {
        MetadataType::Pointer(Box::new(element))
    }

    fn pinned_type(&self, element: MetadataType<'a>) -> MetadataType<'a> {
        MetadataType::Pinned(Box::new(element))
    }

    fn function_pointer_type(
        &self,
        signature: MethodSignature<MetadataType<'a>>,
    ) -> MetadataType<'a> {
        MetadataType::FunctionPointer(Box::new(signature))
    }

    fn modified_type(
        &self,
        modifier: MetadataType<'a>,
        unmodified: MetadataType<'a>,
        is_required: bool,
    ) -> MetadataType<'a> {
        MetadataType::Modified {
            modifier: Box::new(modifier),
            unmodified: Box::new(unmodified),
            required: is_required,
        }
    }

    fn generic_instantiation(
        &self,
        generic: MetadataType<'a>,
        arguments: Vec<MetadataType<'a>>,
    ) -> Result<MetadataType<'a>> {
        match generic {
            MetadataType::Named { named, .. } => Ok(MetadataType::Instance(Box::new(
                TypeInstance::new(named, arguments),
            ))),
            other => Err(malformed_error!("Cannot instantiate {:?}", other)),
        }
    }

    fn generic_type_parameter(&self, context: &GenericContext<'a>, index: u32) -> MetadataType<'a> {
        context.type_parameter(index)
    }

    fn generic_method_parameter(
        &self,
        context: &GenericContext<'a>,
        index: u32,
    ) -> MetadataType<'a> {
        context.method_parameter(index)
    }
}

impl<'a> MetadataModule<'a> {
    /// Decode a method signature blob of this module.
    ///
    /// # Errors
    /// Fails if the blob is malformed.
    pub fn decode_method_signature(
        &'a self,
        blob: &[u8],
        context: &GenericContext<'a>,
    ) -> Result<MethodSignature<MetadataType<'a>>> {
        let provider = ModuleTypeProvider::new(self);
        SignatureDecoder::new(&provider, blob, context).decode_method_signature()
    }

    /// Decode a field signature blob of this module.
    ///
    /// # Errors
    /// Fails if the blob is malformed.
    pub fn decode_field_signature(
        &'a self,
        blob: &[u8],
        context: &GenericContext<'a>,
    ) -> Result<MetadataType<'a>> {
        let provider = ModuleTypeProvider::new(self);
        SignatureDecoder::new(&provider, blob, context).decode_field_signature()
    }

    /// Decode a property signature blob of this module.
    ///
    /// # Errors
    /// Fails if the blob is malformed.
    pub fn decode_property_signature(
        &'a self,
        blob: &[u8],
        context: &GenericContext<'a>,
    ) -> Result<MethodSignature<MetadataType<'a>>> {
        let provider = ModuleTypeProvider::new(self);
        SignatureDecoder::new(&provider, blob, context).decode_property_signature()
    }

    /// Decode the type arguments of a `MethodSpec` instantiation blob.
    ///
    /// # Errors
    /// Fails if the blob is malformed.
    pub fn decode_method_spec_signature(
        &'a self,
        blob: &[u8],
        context: &GenericContext<'a>,
    ) -> Result<Vec<MetadataType<'a>>> {
        let provider = ModuleTypeProvider::new(self);
        SignatureDecoder::new(&provider, blob, context).decode_method_spec_signature()
    }

    /// Decode the signature of `TypeSpec` row `rid`.
    ///
    /// # Errors
    /// Fails if the row doesn't exist or its blob is malformed.
    pub fn decode_type_specification(
        &'a self,
        rid: u32,
        context: &GenericContext<'a>,
    ) -> Result<MetadataType<'a>> {
        let provider = ModuleTypeProvider::new(self);
        let blob = provider.type_specification_blob(rid)?;
        SignatureDecoder::new(&provider, blob, context).decode_type()
    }

    /// The type denoted by a `TypeDef`, `TypeRef` or `TypeSpec` token.
    ///
    /// # Errors
    /// Fails for tokens of other tables, missing rows and malformed `TypeSpec` blobs.
    pub fn type_from_token(
        &'a self,
        token: Token,
        context: &GenericContext<'a>,
    ) -> Result<MetadataType<'a>> {
        match token.table_id() {
            Some(TableId::TypeSpec) => self.decode_type_specification(token.row(), context),
            _ => Ok(MetadataType::class(ModuleTypeProvider::new(self).named_type(token)?)),
        }
    }

    /// The type denoted by a `TypeDefOrRef` coded index.
    ///
    /// # Errors
    /// See [`MetadataModule::type_from_token`].
    pub fn type_from_coded_index(
        &'a self,
        index: &CodedIndex,
        context: &GenericContext<'a>,
    ) -> Result<MetadataType<'a>> {
        self.type_from_token(index.token(), context)
    }
}
