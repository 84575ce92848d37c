use crate::{
    metadata::{
        customattributes::{
            decode_custom_attribute, decode_custom_attribute_with, CustomAttributeValue,
            EnumWidthGuesses, Plausibility,
        },
        model::{
            GenericContext, MemberReference, MemberReferenceParent, MetadataType,
            MethodDefinition, NamedType,
        },
        tables::TableId,
        token::Token,
    },
    Result,
};

/// The constructor a custom attribute is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeConstructor<'a> {
    /// A constructor defined in this module
    Method(MethodDefinition<'a>),
    /// A constructor referenced from another module
    Reference(MemberReference<'a>),
}

impl<'a> AttributeConstructor<'a> {
    /// The constructor's name, `.ctor` for well formed metadata.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        match self {
            AttributeConstructor::Method(method) => method.name(),
            AttributeConstructor::Reference(reference) => reference.name(),
        }
    }

    /// The attribute type, the generic type for constructors of generic attribute instances.
    ///
    /// # Errors
    /// Fails if the declaring type can't be decoded.
    pub fn declaring_type(&self) -> Result<Option<NamedType<'a>>> {
        match self {
            AttributeConstructor::Method(method) => {
                Ok(Some(NamedType::Definition(method.declaring_type()?)))
            }
            AttributeConstructor::Reference(reference) => Ok(match reference.parent()? {
                MemberReferenceParent::Type(named) => Some(named),
                MemberReferenceParent::TypeSpecification(MetadataType::Instance(instance)) => {
                    Some(instance.generic())
                }
                MemberReferenceParent::Method(method) => {
                    Some(NamedType::Definition(method.declaring_type()?))
                }
                _ => None,
            }),
        }
    }
}

metadata_view! {
    /// A custom attribute applied to a metadata entity.
    CustomAttribute(CustomAttribute, CustomAttributeRaw)
}

impl<'a> CustomAttribute<'a> {
    /// The token of the entity the attribute is applied to.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn parent(&self) -> Result<Token> {
        Ok(self.row()?.parent.token())
    }

    /// The attribute constructor.
    ///
    /// # Errors
    /// Fails if the row can't be read or the constructor index points outside the method
    /// tables.
    pub fn constructor(&self) -> Result<AttributeConstructor<'a>> {
        let constructor = self.row()?.constructor;
        match constructor.tag {
            TableId::MethodDef => Ok(AttributeConstructor::Method(
                self.module.method_definition(constructor.row)?,
            )),
            TableId::MemberRef
                if constructor.row >= 1
                    && constructor.row <= self.module.tables().row_count(TableId::MemberRef) =>
            {
                Ok(AttributeConstructor::Reference(MemberReference::new(
                    self.module,
                    constructor.row,
                )))
            }
            _ => Err(malformed_error!(
                "Custom attribute {} has constructor {}",
                self.token(),
                constructor.token()
            )),
        }
    }

    /// The raw value blob.
    ///
    /// # Errors
    /// Fails if the row or the blob can't be read.
    pub fn value_blob(&self) -> Result<&'a [u8]> {
        self.module.blob(self.row()?.value)
    }

    /// The attribute type.
    ///
    /// # Errors
    /// Fails if the constructor can't be read.
    pub fn attribute_type(&self) -> Result<Option<NamedType<'a>>> {
        self.constructor()?.declaring_type()
    }

    /// Returns `true` if the attribute type is `namespace.name`.
    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        matches!(
            self.attribute_type()
                .and_then(|named| named.map_or(Ok(false), |named| named.is(namespace, name))),
            Ok(true)
        )
    }

    /// Decode the value. See [`decode_custom_attribute`].
    #[must_use]
    pub fn value(&self) -> Option<CustomAttributeValue> {
        decode_custom_attribute(self, None)
    }

    /// Decode the value with caller provided guesses and plausibility check.
    pub fn value_with(
        &self,
        guesses: &mut EnumWidthGuesses,
        plausible: Option<Plausibility<'_>>,
    ) -> Option<CustomAttributeValue> {
        decode_custom_attribute_with(self, guesses, plausible)
    }

    /// The generic context the constructor signature is decoded in.
    ///
    /// # Errors
    /// Fails if a referenced parent can't be decoded.
    pub fn constructor_context(&self) -> Result<GenericContext<'a>> {
        match self.constructor()? {
            AttributeConstructor::Method(_) => Ok(GenericContext::empty()),
            AttributeConstructor::Reference(reference) => reference.parent_context(),
        }
    }
}
