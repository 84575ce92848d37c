use crate::{
    metadata::{
        signatures::{ArrayShape, MethodSignature, PrimitiveTypeCode},
        token::Token,
    },
    Result,
};

/// Builds the nodes of a decoded type expression.
///
/// `Context` carries whatever the provider needs to resolve `VAR` and `MVAR` references,
/// typically the generic parameters or arguments of the enclosing type and method.
pub trait SignatureTypeProvider {
    /// The type representation being built.
    type Type;
    /// Generic context used to resolve generic parameter references.
    type Context;

    /// A built-in type.
    ///
    /// # Errors
    /// Implementations may fail if the primitive can't be represented.
    fn primitive_type(&self, code: PrimitiveTypeCode) -> Result<Self::Type>;

    /// A `TypeDef` or `TypeRef` token appearing in the signature.
    ///
    /// # Errors
    /// Implementations fail for rows that don't exist.
    fn type_from_handle(&self, token: Token, is_value_type: bool) -> Result<Self::Type>;

    /// The signature blob of a `TypeSpec` row, decoded in place by the decoder.
    ///
    /// # Errors
    /// Implementations fail for rows that don't exist.
    fn type_specification_blob(&self, row: u32) -> Result<&[u8]>;

    /// A single dimensional, zero based array.
    fn sz_array_type(&self, element: Self::Type) -> Self::Type;

    /// A general array.
    fn array_type(&self, element: Self::Type, shape: ArrayShape) -> Self::Type;

    /// A managed reference.
    fn by_reference_type(&self, element: Self::Type) -> Self::Type;

    /// An unmanaged pointer.
    fn pointer_type(&self, element: Self::Type) -> Self::Type;

    /// A pinned local.
    fn pinned_type(&self, element: Self::Type) -> Self::Type;

    /// A function pointer.
    fn function_pointer_type(&self, signature: MethodSignature<Self::Type>) -> Self::Type;

    /// A type annotated with a required or optional custom modifier.
    fn modified_type(
        &self,
        modifier: Self::Type,
        unmodified: Self::Type,
        is_required: bool,
    ) -> Self::Type;

    /// An instantiation of a generic type.
    ///
    /// # Errors
    /// Implementations fail if `generic` can't be instantiated.
    fn generic_instantiation(
        &self,
        generic: Self::Type,
        arguments: Vec<Self::Type>,
    ) -> Result<Self::Type>;

    /// A reference to the generic parameter `index` of the enclosing type.
    fn generic_type_parameter(&self, context: &Self::Context, index: u32) -> Self::Type;

    /// A reference to the generic parameter `index` of the enclosing method.
    fn generic_method_parameter(&self, context: &Self::Context, index: u32) -> Self::Type;
}
