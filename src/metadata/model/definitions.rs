use bitflags::bitflags;
use strum::Display;

use crate::{
    metadata::{
        method::{scan_operand_tokens, MethodBody, OperandKind, OperandToken},
        model::{CustomAttribute, GenericContext, MetadataModule, MetadataType, NamedType},
        signatures::MethodSignature,
        tables::{CodedIndex, GenericParamConstraintRaw, InterfaceImplRaw, MethodSemanticsRaw, TableId},
        token::Token,
    },
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `TypeDef` flags (ECMA-335 II.23.1.15)
    pub struct TypeAttributes: u32 {
        /// Mask of the visibility bits
        const VISIBILITY_MASK = 0x0000_0007;
        /// Top level, visible outside the assembly
        const PUBLIC = 0x0000_0001;
        /// Nested, public
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested, private
        const NESTED_PRIVATE = 0x0000_0003;
        /// Nested, family
        const NESTED_FAMILY = 0x0000_0004;
        /// Nested, assembly
        const NESTED_ASSEMBLY = 0x0000_0005;
        /// Nested, family and assembly
        const NESTED_FAM_AND_ASSEM = 0x0000_0006;
        /// Nested, family or assembly
        const NESTED_FAM_OR_ASSEM = 0x0000_0007;
        /// Interface
        const INTERFACE = 0x0000_0020;
        /// Abstract
        const ABSTRACT = 0x0000_0080;
        /// Sealed
        const SEALED = 0x0000_0100;
        /// Special name
        const SPECIAL_NAME = 0x0000_0400;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `MethodDef` flags (ECMA-335 II.23.1.10)
    pub struct MethodAttributes: u32 {
        /// Mask of the accessibility bits
        const MEMBER_ACCESS_MASK = 0x0007;
        /// Static
        const STATIC = 0x0010;
        /// Final
        const FINAL = 0x0020;
        /// Virtual
        const VIRTUAL = 0x0040;
        /// Hide by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Abstract
        const ABSTRACT = 0x0400;
        /// Special name
        const SPECIAL_NAME = 0x0800;
        /// Runtime special name
        const RT_SPECIAL_NAME = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `Field` flags (ECMA-335 II.23.1.5)
    pub struct FieldAttributes: u32 {
        /// Mask of the accessibility bits
        const FIELD_ACCESS_MASK = 0x0007;
        /// Static
        const STATIC = 0x0010;
        /// Read only after initialization
        const INIT_ONLY = 0x0020;
        /// Compile time constant
        const LITERAL = 0x0040;
        /// Special name
        const SPECIAL_NAME = 0x0200;
        /// Runtime special name
        const RT_SPECIAL_NAME = 0x0400;
        /// Has a default value
        const HAS_DEFAULT = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Role of an accessor method (ECMA-335 II.23.1.12)
    pub struct MethodSemanticsAttributes: u32 {
        /// Property setter
        const SETTER = 0x0001;
        /// Property getter
        const GETTER = 0x0002;
        /// Other accessor
        const OTHER = 0x0004;
        /// Event adder
        const ADD_ON = 0x0008;
        /// Event remover
        const REMOVE_ON = 0x0010;
        /// Event raiser
        const FIRE = 0x0020;
    }
}

/// Member accessibility shared by types, methods and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Accessibility {
    /// Only accessible to the compiler
    CompilerControlled,
    /// `private`
    Private,
    /// `private protected`
    FamilyAndAssembly,
    /// `internal`
    Assembly,
    /// `protected`
    Family,
    /// `protected internal`
    FamilyOrAssembly,
    /// `public`
    Public,
}

impl Accessibility {
    fn from_member_flags(flags: u32) -> Accessibility {
        match flags & 0x7 {
            1 => Accessibility::Private,
            2 => Accessibility::FamilyAndAssembly,
            3 => Accessibility::Assembly,
            4 => Accessibility::Family,
            5 => Accessibility::FamilyOrAssembly,
            6 => Accessibility::Public,
            _ => Accessibility::CompilerControlled,
        }
    }

    fn from_type_flags(flags: u32) -> Accessibility {
        match flags & 0x7 {
            1 | 2 => Accessibility::Public,
            3 => Accessibility::Private,
            4 => Accessibility::Family,
            6 => Accessibility::FamilyAndAssembly,
            7 => Accessibility::FamilyOrAssembly,
            _ => Accessibility::Assembly,
        }
    }

    /// Returns `true` if code outside of the assembly can reach the member, given that its
    /// containing type is reachable.
    #[must_use]
    pub fn is_visible_outside_assembly(&self) -> bool {
        matches!(
            self,
            Accessibility::Public | Accessibility::Family | Accessibility::FamilyOrAssembly
        )
    }
}

/// The flavor of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TypeKind {
    /// A reference type
    Class,
    /// An interface
    Interface,
    /// A value type other than an enum
    Struct,
    /// An enum
    Enum,
    /// A delegate
    Delegate,
}

/// A member of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member<'a> {
    /// A method, including constructors and accessors
    Method(MethodDefinition<'a>),
    /// A field
    Field(FieldDefinition<'a>),
    /// A property
    Property(PropertyDefinition<'a>),
    /// An event
    Event(EventDefinition<'a>),
    /// A nested type
    NestedType(TypeDefinition<'a>),
}

metadata_view! {
    /// A type defined in a module.
    TypeDefinition(TypeDef, TypeDefRaw)
}

impl<'a> TypeDefinition<'a> {
    /// The simple name, including any arity suffix.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.type_name)
    }

    /// The namespace, empty for nested types and the global namespace.
    ///
    /// # Errors
    /// Fails if the row or the namespace can't be read.
    pub fn namespace(&self) -> Result<&'a str> {
        self.module.string(self.row()?.type_namespace)
    }

    /// The type flags.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn flags(&self) -> Result<TypeAttributes> {
        Ok(TypeAttributes::from_bits_retain(self.row()?.flags))
    }

    /// Declared accessibility.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn accessibility(&self) -> Result<Accessibility> {
        Ok(Accessibility::from_type_flags(self.row()?.flags))
    }

    /// Returns `true` if the type is reachable from outside its assembly, taking containing
    /// types into account.
    ///
    /// # Errors
    /// Fails if a row of the nesting chain can't be read.
    pub fn is_visible_outside_assembly(&self) -> Result<bool> {
        let mut current = Some(*self);
        while let Some(definition) = current {
            if !definition.accessibility()?.is_visible_outside_assembly() {
                return Ok(false);
            }
            current = definition.containing_type();
        }
        Ok(true)
    }

    /// The type this one is nested in.
    #[must_use]
    pub fn containing_type(&self) -> Option<TypeDefinition<'a>> {
        self.module
            .enclosing_type(self.rid)
            .map(|rid| TypeDefinition::new(self.module, rid))
    }

    /// Types nested directly in this one.
    #[must_use]
    pub fn nested_types(&self) -> Vec<TypeDefinition<'a>> {
        self.module
            .nested_types(self.rid)
            .iter()
            .map(|rid| TypeDefinition::new(self.module, *rid))
            .collect()
    }

    /// Generic parameters, ordered by position. Nested types repeat the parameters of
    /// their containing types.
    #[must_use]
    pub fn generic_parameters(&self) -> Vec<GenericParameter<'a>> {
        self.module.generic_parameters_of(self.token())
    }

    /// A context resolving `!n` to this type's generic parameters.
    #[must_use]
    pub fn generic_context(&self) -> GenericContext<'a> {
        GenericContext {
            type_arguments: parameter_types(&self.generic_parameters(), false),
            method_arguments: Vec::new(),
        }
    }

    /// The base type, `None` for interfaces and `System.Object`.
    ///
    /// # Errors
    /// Fails if the row or a `TypeSpec` signature can't be decoded.
    pub fn base_type(&self) -> Result<Option<MetadataType<'a>>> {
        let extends = self.row()?.extends;
        if extends.is_null() {
            return Ok(None);
        }

        Ok(Some(self.module.type_from_coded_index(
            &extends,
            &self.generic_context(),
        )?))
    }

    /// Implemented interfaces, in declaration order.
    ///
    /// # Errors
    /// Fails if an `InterfaceImpl` row or a `TypeSpec` signature can't be decoded.
    pub fn interfaces(&self) -> Result<Vec<MetadataType<'a>>> {
        let rows = self.module.interface_rows(self.rid);
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let context = self.generic_context();
        rows.iter()
            .map(|rid| {
                let row = self.module.tables().get::<InterfaceImplRaw>(*rid)?;
                self.module.type_from_coded_index(&row.interface, &context)
            })
            .collect()
    }

    /// Custom attributes applied to an `InterfaceImpl` of this type, in declaration order.
    #[must_use]
    pub fn interface_custom_attributes(&self) -> Vec<CustomAttribute<'a>> {
        self.module
            .interface_rows(self.rid)
            .iter()
            .flat_map(|rid| {
                self.module
                    .custom_attributes_of(Token::from_parts(TableId::InterfaceImpl, *rid))
            })
            .collect()
    }

    /// Methods, in declaration order.
    ///
    /// # Errors
    /// Fails if the method list points outside of the `MethodDef` table.
    pub fn methods(&self) -> Result<Vec<MethodDefinition<'a>>> {
        Ok(self
            .module
            .list_members(TableId::TypeDef, self.rid, 5, TableId::MethodDef, TableId::MethodPtr)?
            .into_iter()
            .map(|rid| MethodDefinition::new(self.module, rid))
            .collect())
    }

    /// Fields, in declaration order.
    ///
    /// # Errors
    /// Fails if the field list points outside of the `Field` table.
    pub fn fields(&self) -> Result<Vec<FieldDefinition<'a>>> {
        Ok(self
            .module
            .list_members(TableId::TypeDef, self.rid, 4, TableId::Field, TableId::FieldPtr)?
            .into_iter()
            .map(|rid| FieldDefinition::new(self.module, rid))
            .collect())
    }

    /// Properties, in declaration order.
    ///
    /// # Errors
    /// Fails if the property map is damaged.
    pub fn properties(&self) -> Result<Vec<PropertyDefinition<'a>>> {
        Ok(self
            .module
            .property_rows(self.rid)?
            .into_iter()
            .map(|rid| self.module.property_definition(rid))
            .collect())
    }

    /// Events, in declaration order.
    ///
    /// # Errors
    /// Fails if the event map is damaged.
    pub fn events(&self) -> Result<Vec<EventDefinition<'a>>> {
        Ok(self
            .module
            .event_rows(self.rid)?
            .into_iter()
            .map(|rid| self.module.event_definition(rid))
            .collect())
    }

    /// All members: nested types, fields, methods, properties and events.
    ///
    /// # Errors
    /// Fails if any member list is damaged.
    pub fn members(&self) -> Result<Vec<Member<'a>>> {
        let mut members: Vec<Member<'a>> = self
            .nested_types()
            .into_iter()
            .map(Member::NestedType)
            .collect();
        members.extend(self.fields()?.into_iter().map(Member::Field));
        members.extend(self.methods()?.into_iter().map(Member::Method));
        members.extend(self.properties()?.into_iter().map(Member::Property));
        members.extend(self.events()?.into_iter().map(Member::Event));
        Ok(members)
    }

    /// Custom attributes applied to the type.
    #[must_use]
    pub fn custom_attributes(&self) -> Vec<CustomAttribute<'a>> {
        self.module.custom_attributes_of(self.token())
    }

    /// Classify the type from its flags and base type.
    ///
    /// # Errors
    /// Fails if the row or the base type can't be read.
    pub fn kind(&self) -> Result<TypeKind> {
        if self.flags()?.contains(TypeAttributes::INTERFACE) {
            return Ok(TypeKind::Interface);
        }

        let Some(named) = self.base_type()?.and_then(|base| base.element_named_type()) else {
            return Ok(TypeKind::Class);
        };

        let own = NamedType::Definition(*self);
        Ok(if named.is("System", "Enum")? {
            TypeKind::Enum
        } else if named.is("System", "ValueType")? && !own.is("System", "Enum")? {
            TypeKind::Struct
        } else if named.is("System", "MulticastDelegate")? {
            TypeKind::Delegate
        } else {
            TypeKind::Class
        })
    }
}

fn parameter_types<'a>(parameters: &[GenericParameter<'a>], is_method: bool) -> Vec<MetadataType<'a>> {
    parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| MetadataType::GenericParameter {
            index: u32::try_from(index).unwrap_or(u32::MAX),
            is_method,
            definition: Some(*parameter),
        })
        .collect()
}

metadata_view! {
    /// A method defined in a module.
    MethodDefinition(MethodDef, MethodDefRaw)
}

impl<'a> MethodDefinition<'a> {
    /// The method name, `.ctor` and `.cctor` for constructors.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.name)
    }

    /// The method flags.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn flags(&self) -> Result<MethodAttributes> {
        Ok(MethodAttributes::from_bits_retain(self.row()?.flags))
    }

    /// Declared accessibility.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn accessibility(&self) -> Result<Accessibility> {
        Ok(Accessibility::from_member_flags(self.row()?.flags))
    }

    /// The type declaring this method.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no type lists the method.
    pub fn declaring_type(&self) -> Result<TypeDefinition<'a>> {
        match self.module.method_owner(self.rid) {
            Some(rid) => Ok(TypeDefinition::new(self.module, rid)),
            None => Err(malformed_error!("Method {} has no declaring type", self.token())),
        }
    }

    /// Generic parameters of the method itself.
    #[must_use]
    pub fn generic_parameters(&self) -> Vec<GenericParameter<'a>> {
        self.module.generic_parameters_of(self.token())
    }

    /// A context resolving `!n` and `!!n` to the declaring type's and this method's
    /// generic parameters.
    ///
    /// # Errors
    /// Fails if the declaring type can't be found.
    pub fn generic_context(&self) -> Result<GenericContext<'a>> {
        let mut context = self.declaring_type()?.generic_context();
        context.method_arguments = parameter_types(&self.generic_parameters(), true);
        Ok(context)
    }

    /// The decoded signature.
    ///
    /// # Errors
    /// Fails if the signature blob is damaged.
    pub fn signature(&self) -> Result<MethodSignature<MetadataType<'a>>> {
        let blob = self.module.blob(self.row()?.signature)?;
        let context = self
            .generic_context()
            .unwrap_or_else(|_| GenericContext::empty());
        self.module.decode_method_signature(blob, &context)
    }

    /// Parameters with a `Param` row, in sequence order; the return value's row, if any,
    /// is only available through [`MethodDefinition::return_parameter`].
    ///
    /// # Errors
    /// Fails if the parameter list is damaged.
    pub fn parameters(&self) -> Result<Vec<Parameter<'a>>> {
        let mut parameters = Vec::new();
        for rid in self.module.list_members(
            TableId::MethodDef,
            self.rid,
            5,
            TableId::Param,
            TableId::ParamPtr,
        )? {
            let parameter = Parameter::new(self.module, rid);
            if parameter.sequence()? > 0 {
                parameters.push(parameter);
            }
        }
        Ok(parameters)
    }

    /// The `Param` row describing the return value, carrier of return value attributes.
    ///
    /// # Errors
    /// Fails if the parameter list is damaged.
    pub fn return_parameter(&self) -> Result<Option<Parameter<'a>>> {
        for rid in self.module.list_members(
            TableId::MethodDef,
            self.rid,
            5,
            TableId::Param,
            TableId::ParamPtr,
        )? {
            let parameter = Parameter::new(self.module, rid);
            if parameter.sequence()? == 0 {
                return Ok(Some(parameter));
            }
        }
        Ok(None)
    }

    /// Custom attributes applied to the method.
    #[must_use]
    pub fn custom_attributes(&self) -> Vec<CustomAttribute<'a>> {
        self.module.custom_attributes_of(self.token())
    }

    /// Custom attributes applied to the return value.
    ///
    /// # Errors
    /// Fails if the parameter list is damaged.
    pub fn return_custom_attributes(&self) -> Result<Vec<CustomAttribute<'a>>> {
        Ok(self
            .return_parameter()?
            .map(|parameter| parameter.custom_attributes())
            .unwrap_or_default())
    }

    /// The IL body, `None` for abstract, runtime provided and extern methods.
    ///
    /// # Errors
    /// Fails if the RVA can't be mapped or the body header is damaged.
    pub fn body(&self) -> Result<Option<MethodBody<'a>>> {
        let rva = self.row()?.rva;
        if rva == 0 {
            return Ok(None);
        }

        let file = self.module.file();
        if !file.is_pe() {
            return Ok(None);
        }

        let offset = file.rva_to_offset(rva as usize)?;
        let Some(data) = file.data().get(offset..) else {
            return Err(out_of_bounds_error!());
        };
        Ok(Some(MethodBody::from(data)?))
    }

    /// Type and member tokens referenced by the IL instructions, in code order.
    ///
    /// # Errors
    /// Fails if the body or its instruction stream is damaged.
    pub fn operands(&self) -> Result<Vec<OperandToken>> {
        match self.body()? {
            Some(body) => {
                let mut tokens = scan_operand_tokens(body.code)?;
                for clause in &body.exception_clauses {
                    if let Some(token) = clause.catch_type() {
                        tokens.push(OperandToken {
                            offset: clause.handler_offset as usize,
                            kind: OperandKind::InlineType,
                            token,
                        });
                    }
                }
                Ok(tokens)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Returns `true` for instance and static constructors.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn is_constructor(&self) -> Result<bool> {
        Ok(self.flags()?.contains(MethodAttributes::RT_SPECIAL_NAME)
            && matches!(self.name()?, ".ctor" | ".cctor"))
    }
}

metadata_view! {
    /// A field defined in a module.
    FieldDefinition(Field, FieldRaw)
}

impl<'a> FieldDefinition<'a> {
    /// The field name.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.name)
    }

    /// The field flags.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn flags(&self) -> Result<FieldAttributes> {
        Ok(FieldAttributes::from_bits_retain(self.row()?.flags))
    }

    /// Declared accessibility.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn accessibility(&self) -> Result<Accessibility> {
        Ok(Accessibility::from_member_flags(self.row()?.flags))
    }

    /// The type declaring this field.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no type lists the field.
    pub fn declaring_type(&self) -> Result<TypeDefinition<'a>> {
        match self.module.field_owner(self.rid) {
            Some(rid) => Ok(TypeDefinition::new(self.module, rid)),
            None => Err(malformed_error!("Field {} has no declaring type", self.token())),
        }
    }

    /// The decoded field type.
    ///
    /// # Errors
    /// Fails if the signature blob is damaged.
    pub fn field_type(&self) -> Result<MetadataType<'a>> {
        let blob = self.module.blob(self.row()?.signature)?;
        let context = self
            .declaring_type()
            .map(|declaring| declaring.generic_context())
            .unwrap_or_default();
        self.module.decode_field_signature(blob, &context)
    }

    /// Custom attributes applied to the field.
    #[must_use]
    pub fn custom_attributes(&self) -> Vec<CustomAttribute<'a>> {
        self.module.custom_attributes_of(self.token())
    }
}

fn accessors<'a>(
    module: &'a MetadataModule<'a>,
    association: Token,
) -> Result<Vec<(MethodSemanticsAttributes, MethodDefinition<'a>)>> {
    module
        .semantics_rows(association)
        .iter()
        .map(|rid| {
            let row = module.tables().get::<MethodSemanticsRaw>(*rid)?;
            Ok((
                MethodSemanticsAttributes::from_bits_retain(row.semantics),
                module.method_definition(row.method)?,
            ))
        })
        .collect()
}

metadata_view! {
    /// A property defined in a module.
    PropertyDefinition(Property, PropertyRaw)
}

impl<'a> PropertyDefinition<'a> {
    /// The property name.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.name)
    }

    /// The type declaring this property.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no property map lists the property.
    pub fn declaring_type(&self) -> Result<TypeDefinition<'a>> {
        match self.module.property_owner(self.rid) {
            Some(rid) => Ok(TypeDefinition::new(self.module, rid)),
            None => Err(malformed_error!("Property {} has no declaring type", self.token())),
        }
    }

    /// The decoded signature: the property type is the return type, indexer parameters are
    /// the parameters.
    ///
    /// # Errors
    /// Fails if the signature blob is damaged.
    pub fn signature(&self) -> Result<MethodSignature<MetadataType<'a>>> {
        let blob = self.module.blob(self.row()?.signature)?;
        let context = self
            .declaring_type()
            .map(|declaring| declaring.generic_context())
            .unwrap_or_default();
        self.module.decode_property_signature(blob, &context)
    }

    /// Accessor methods with their roles.
    ///
    /// # Errors
    /// Fails if a `MethodSemantics` row is damaged.
    pub fn accessors(&self) -> Result<Vec<(MethodSemanticsAttributes, MethodDefinition<'a>)>> {
        accessors(self.module, self.token())
    }

    /// The getter.
    ///
    /// # Errors
    /// Fails if a `MethodSemantics` row is damaged.
    pub fn getter(&self) -> Result<Option<MethodDefinition<'a>>> {
        Ok(self
            .accessors()?
            .into_iter()
            .find(|(semantics, _)| semantics.contains(MethodSemanticsAttributes::GETTER))
            .map(|(_, method)| method))
    }

    /// The setter.
    ///
    /// # Errors
    /// Fails if a `MethodSemantics` row is damaged.
    pub fn setter(&self) -> Result<Option<MethodDefinition<'a>>> {
        Ok(self
            .accessors()?
            .into_iter()
            .find(|(semantics, _)| semantics.contains(MethodSemanticsAttributes::SETTER))
            .map(|(_, method)| method))
    }

    /// Custom attributes applied to the property.
    #[must_use]
    pub fn custom_attributes(&self) -> Vec<CustomAttribute<'a>> {
        self.module.custom_attributes_of(self.token())
    }
}

metadata_view! {
    /// An event defined in a module.
    EventDefinition(Event, EventRaw)
}

impl<'a> EventDefinition<'a> {
    /// The event name.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.name)
    }

    /// The type declaring this event.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no event map lists the event.
    pub fn declaring_type(&self) -> Result<TypeDefinition<'a>> {
        match self.module.event_owner(self.rid) {
            Some(rid) => Ok(TypeDefinition::new(self.module, rid)),
            None => Err(malformed_error!("Event {} has no declaring type", self.token())),
        }
    }

    /// The delegate type of the event.
    ///
    /// # Errors
    /// Fails if the row or a `TypeSpec` signature can't be decoded.
    pub fn event_type(&self) -> Result<Option<MetadataType<'a>>> {
        let event_type = self.row()?.event_type;
        if event_type.is_null() {
            return Ok(None);
        }

        let context = self
            .declaring_type()
            .map(|declaring| declaring.generic_context())
            .unwrap_or_default();
        Ok(Some(self.module.type_from_coded_index(&event_type, &context)?))
    }

    /// Accessor methods with their roles.
    ///
    /// # Errors
    /// Fails if a `MethodSemantics` row is damaged.
    pub fn accessors(&self) -> Result<Vec<(MethodSemanticsAttributes, MethodDefinition<'a>)>> {
        accessors(self.module, self.token())
    }

    /// Custom attributes applied to the event.
    #[must_use]
    pub fn custom_attributes(&self) -> Vec<CustomAttribute<'a>> {
        self.module.custom_attributes_of(self.token())
    }
}

metadata_view! {
    /// A `Param` row of a method.
    Parameter(Param, ParamRaw)
}

impl<'a> Parameter<'a> {
    /// The parameter name, empty if none was recorded.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.name)
    }

    /// Position of the parameter, 0 being the return value.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn sequence(&self) -> Result<u32> {
        Ok(self.row()?.sequence)
    }

    /// Raw `ParamAttributes`.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn flags(&self) -> Result<u32> {
        Ok(self.row()?.flags)
    }

    /// Custom attributes applied to the parameter.
    #[must_use]
    pub fn custom_attributes(&self) -> Vec<CustomAttribute<'a>> {
        self.module.custom_attributes_of(self.token())
    }
}

metadata_view! {
    /// A generic parameter of a type or method definition.
    GenericParameter(GenericParam, GenericParamRaw)
}

impl<'a> GenericParameter<'a> {
    /// The parameter name.
    ///
    /// # Errors
    /// Fails if the row or the name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        self.module.string(self.row()?.name)
    }

    /// Position within the owner's parameter list.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn number(&self) -> Result<u32> {
        Ok(self.row()?.number)
    }

    /// The owning `TypeDef` or `MethodDef`.
    ///
    /// # Errors
    /// Fails if the row can't be read.
    pub fn owner(&self) -> Result<CodedIndex> {
        Ok(self.row()?.owner)
    }

    /// Types the argument is constrained to.
    ///
    /// # Errors
    /// Fails if a constraint row or its type can't be decoded.
    pub fn constraints(&self) -> Result<Vec<MetadataType<'a>>> {
        self.module
            .constraint_rows(self.rid)
            .iter()
            .map(|rid| {
                let row = self.module.tables().get::<GenericParamConstraintRaw>(*rid)?;
                self.module
                    .type_from_coded_index(&row.constraint, &GenericContext::empty())
            })
            .collect()
    }

    /// Custom attributes applied to the parameter.
    #[must_use]
    pub fn custom_attributes(&self) -> Vec<CustomAttribute<'a>> {
        self.module.custom_attributes_of(self.token())
    }
}
