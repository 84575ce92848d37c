use crate::{
    metadata::{
        model::{GenericContext, MetadataType, MethodDefinition, NamedType},
        signatures::{MethodSignature, SignatureHeader, SignatureKind},
        tables::{ModuleRefRaw, TableId},
    },
    Result,
};

/// Where a [`TypeReference`] says its type lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionScope<'a> {
    /// The referencing module itself
    Module,
    /// Another module of the same assembly, by name
    ModuleReference(&'a str),
    /// Another assembly
    AssemblyReference(AssemblyReference<'a>),
    /// The enclosing type of a nested type
    TypeReference(TypeReference<'a>),
    /// No scope; the type is looked up through the `ExportedType` table
    None,
}

metadata_view! {
    /// A reference to a type by name.
    TypeReference(TypeRef, TypeRefRaw)
}

impl<'a> TypeReference<'a> {
    /// The simple name, including any arity suffix.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.type_name)
    }

    /// The namespace, usually empty for nested types.
    ///
    /// # Errors
    /// Fails if the row or the namespace can't be read.
    pub fn namespace(&self) -> Result<&'a str> {
        self.module.string(self.row()?.type_namespace)
    }

    /// The resolution scope.
    ///
    /// # Errors
    /// Fails if the row or a referenced `ModuleRef` can't be read.
    pub fn resolution_scope(&self) -> Result<ResolutionScope<'a>> {
        let scope = self.row()?.resolution_scope;
        if scope.is_null() {
            return Ok(ResolutionScope::None);
        }

        Ok(match scope.tag {
            TableId::Module => ResolutionScope::Module,
            TableId::ModuleRef => {
                let row = self.module.tables().get::<ModuleRefRaw>(scope.row)?;
                ResolutionScope::ModuleReference(self.module.string(row.name)?)
            }
            TableId::AssemblyRef => {
                ResolutionScope::AssemblyReference(AssemblyReference::new(self.module, scope.row))
            }
            TableId::TypeRef => {
                ResolutionScope::TypeReference(TypeReference::new(self.module, scope.row))
            }
            _ => ResolutionScope::None,
        })
    }

    /// The referenced enclosing type, for nested type references.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn containing_type(&self) -> Result<Option<TypeReference<'a>>> {
        let scope = self.row()?.resolution_scope;
        if scope.tag == TableId::TypeRef && !scope.is_null() {
            if scope.row == self.rid {
                return Err(malformed_error!("Type reference {} is its own scope", self.token()));
            }
            Ok(Some(TypeReference::new(self.module, scope.row)))
        } else {
            Ok(None)
        }
    }
}

metadata_view! {
    /// A reference to another assembly.
    AssemblyReference(AssemblyRef, AssemblyRefRaw)
}

impl<'a> AssemblyReference<'a> {
    /// The assembly name.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.name)
    }

    /// The version as `major.minor.build.revision`.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn version(&self) -> Result<String> {
        let row = self.row()?;
        Ok(format!(
            "{}.{}.{}.{}",
            row.major_version, row.minor_version, row.build_number, row.revision_number
        ))
    }

    /// The culture, empty for neutral assemblies.
    ///
    /// # Errors
    /// Fails if the row or the culture can't be read.
    pub fn culture(&self) -> Result<&'a str> {
        self.module.string(self.row()?.culture)
    }
}

/// The entity a [`MemberReference`] is declared on.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberReferenceParent<'a> {
    /// A type definition or reference
    Type(NamedType<'a>),
    /// A type specification, typically a generic instance
    TypeSpecification(MetadataType<'a>),
    /// A global member of another module
    ModuleReference(&'a str),
    /// A vararg call site of a method definition
    Method(MethodDefinition<'a>),
}

/// Whether a [`MemberReference`] names a method or a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberReferenceKind {
    /// A method reference
    Method,
    /// A field reference
    Field,
}

metadata_view! {
    /// A reference to a method or field by parent, name and signature.
    MemberReference(MemberRef, MemberRefRaw)
}

impl<'a> MemberReference<'a> {
    /// The member name.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.name)
    }

    /// The raw signature blob.
    ///
    /// # Errors
    /// Fails if the row or the blob can't be read.
    pub fn signature_blob(&self) -> Result<&'a [u8]> {
        self.module.blob(self.row()?.signature)
    }

    /// The declaring entity.
    ///
    /// # Errors
    /// Fails if the row, a `ModuleRef` name or a `TypeSpec` signature can't be decoded.
    pub fn parent(&self) -> Result<MemberReferenceParent<'a>> {
        let class = self.row()?.class;
        match class.tag {
            TableId::TypeDef | TableId::TypeRef => match self
                .module
                .type_from_coded_index(&class, &GenericContext::empty())?
            {
                MetadataType::Named { named, .. } => Ok(MemberReferenceParent::Type(named)),
                other => Ok(MemberReferenceParent::TypeSpecification(other)),
            },
            TableId::TypeSpec => Ok(MemberReferenceParent::TypeSpecification(
                self.module
                    .decode_type_specification(class.row, &GenericContext::empty())?,
            )),
            TableId::ModuleRef => {
                let row = self.module.tables().get::<ModuleRefRaw>(class.row)?;
                Ok(MemberReferenceParent::ModuleReference(
                    self.module.string(row.name)?,
                ))
            }
            TableId::MethodDef => Ok(MemberReferenceParent::Method(
                self.module.method_definition(class.row)?,
            )),
            other => Err(malformed_error!(
                "Member reference {} has a {} parent",
                self.token(),
                other
            )),
        }
    }

    /// Method or field, from the signature header.
    ///
    /// # Errors
    /// Fails if the signature blob is empty or has an unexpected kind.
    pub fn kind(&self) -> Result<MemberReferenceKind> {
        let Some(first) = self.signature_blob()?.first() else {
            return Err(malformed_error!("Member reference {} has no signature", self.token()));
        };

        match SignatureHeader(*first).kind() {
            Some(SignatureKind::Field) => Ok(MemberReferenceKind::Field),
            Some(SignatureKind::Method(_)) => Ok(MemberReferenceKind::Method),
            _ => Err(malformed_error!(
                "Member reference {} has signature kind 0x{:02x}",
                self.token(),
                first
            )),
        }
    }

    /// The generic context of the parent: the arguments of a generic instance parent.
    ///
    /// # Errors
    /// Fails if the parent can't be decoded.
    pub fn parent_context(&self) -> Result<GenericContext<'a>> {
        Ok(match self.parent()? {
            MemberReferenceParent::TypeSpecification(MetadataType::Instance(instance)) => {
                GenericContext {
                    type_arguments: instance.arguments().to_vec(),
                    method_arguments: Vec::new(),
                }
            }
            _ => GenericContext::empty(),
        })
    }

    /// The decoded method signature, with the parent's instance arguments substituted
    /// when `substitute` is set.
    ///
    /// # Errors
    /// Fails if the signature blob is not a valid method signature.
    pub fn method_signature(&self, substitute: bool) -> Result<MethodSignature<MetadataType<'a>>> {
        let context = if substitute {
            self.parent_context()?
        } else {
            GenericContext::empty()
        };
        self.module
            .decode_method_signature(self.signature_blob()?, &context)
    }

    /// The decoded field type, with the parent's instance arguments substituted when
    /// `substitute` is set.
    ///
    /// # Errors
    /// Fails if the signature blob is not a valid field signature.
    pub fn field_type(&self, substitute: bool) -> Result<MetadataType<'a>> {
        let context = if substitute {
            self.parent_context()?
        } else {
            GenericContext::empty()
        };
        self.module
            .decode_field_signature(self.signature_blob()?, &context)
    }
}

/// A method, by definition or by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodReference<'a> {
    /// A method of this module
    Definition(MethodDefinition<'a>),
    /// A method reached through a `MemberRef`
    Reference(MemberReference<'a>),
}

metadata_view! {
    /// An instantiation of a generic method.
    MethodSpecification(MethodSpec, MethodSpecRaw)
}

impl<'a> MethodSpecification<'a> {
    /// The generic method being instantiated.
    ///
    /// # Errors
    /// Fails if the row can't be read or points to another table.
    pub fn method(&self) -> Result<MethodReference<'a>> {
        let method = self.row()?.method;
        match method.tag {
            TableId::MethodDef => Ok(MethodReference::Definition(
                self.module.method_definition(method.row)?,
            )),
            TableId::MemberRef
                if method.row >= 1
                    && method.row <= self.module.tables().row_count(TableId::MemberRef) =>
            {
                Ok(MethodReference::Reference(MemberReference::new(
                    self.module,
                    method.row,
                )))
            }
            _ => Err(malformed_error!(
                "Method specification {} points to {}",
                self.token(),
                method.token()
            )),
        }
    }

    /// The method type arguments.
    ///
    /// # Errors
    /// Fails if the instantiation blob is malformed.
    pub fn instantiation(&self) -> Result<Vec<MetadataType<'a>>> {
        let blob = self.module.blob(self.row()?.instantiation)?;
        self.module
            .decode_method_spec_signature(blob, &GenericContext::empty())
    }
}
