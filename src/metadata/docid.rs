//! Documentation ids of namespaces, types and members.
//!
//! These are the ids the C# compiler writes into XML documentation files
//! (`T:System.Collections.Generic.List`1`, `M:System.String.Concat(System.Object[])`), and
//! they serve as the stable cross-version identity of an API. Ids are built purely from
//! names and signatures, so a [`TypeReference`](crate::metadata::model::TypeReference)
//! produces the same id as the definition it refers to.
//!
//! # Format
//!
//! | Prefix | Entity | Example |
//! |--------|--------|---------|
//! | `N:` | namespace | `N:System.IO` |
//! | `T:` | type | `T:System.Collections.Generic.Dictionary`2.KeyCollection` |
//! | `M:` | method | `M:System.Array.Empty``1` |
//! | `F:` | field | `F:System.String.Empty` |
//! | `P:` | property | `P:System.String.Chars(System.Int32)` |
//! | `E:` | event | `E:System.AppDomain.ProcessExit` |
//!
//! Member names have `.` replaced by `#` (`#ctor`). Parameter lists are omitted when empty.
//! Within parameter lists:
//!
//! - generic instances are written `List{System.Int32}`, nested instances
//!   `Outer{`0}.Inner{System.String}`
//! - type parameters are `` `n ``, method parameters ```` ``n ````
//! - `[]` marks SZ arrays, `[0:,0:]` multi-dimensional arrays
//! - `*` pointers, `@` by-ref, `^` pinned
//! - `|T` required and `!T` optional modifiers
//! - `=FUNC:R(P)` function pointers
//!
//! `op_Implicit` and `op_Explicit` get their return type appended as `~T`.
//!
//! Every function returns `None` when a name or signature can't be read or has a shape that
//! has no id, such as a member on an array type.

use std::fmt::Write;

use crate::metadata::{
    model::{
        EventDefinition, FieldDefinition, GenericContext, MemberReference,
        MemberReferenceKind, MemberReferenceParent, MetadataType, MethodDefinition,
        MethodReference, MethodSpecification, NamedType, PropertyDefinition, TypeInstance,
    },
    signatures::MethodSignature,
};

/// Longest chain of containing types followed before giving up.
const MAX_NESTING: usize = 64;

/// Deepest type expression encoded before giving up.
const MAX_TYPE_DEPTH: usize = 64;

/// `N:` id of a namespace.
#[must_use]
pub fn namespace_id(namespace: &str) -> String {
    format!("N:{}", namespace)
}

/// The dotted full name of a type, including its namespace and containing types.
#[must_use]
pub fn type_name(named: &NamedType<'_>) -> Option<String> {
    let mut chain = vec![*named];
    while let Some(containing) = chain.last()?.containing_type().ok()? {
        if chain.len() >= MAX_NESTING {
            return None;
        }
        chain.push(containing);
    }

    let outermost = chain.last()?;
    let mut name = String::new();
    let namespace = outermost.namespace().ok()?;
    if !namespace.is_empty() {
        name.push_str(namespace);
        name.push('.');
    }

    for (index, segment) in chain.iter().rev().enumerate() {
        if index > 0 {
            name.push('.');
        }
        name.push_str(segment.name().ok()?);
    }

    (!name.is_empty()).then_some(name)
}

/// `T:` id of a type.
#[must_use]
pub fn type_id(named: &NamedType<'_>) -> Option<String> {
    Some(format!("T:{}", type_name(named)?))
}

/// `T:` id of the named type behind a type expression: the generic type of an instance.
#[must_use]
pub fn type_expression_id(metadata_type: &MetadataType<'_>) -> Option<String> {
    match metadata_type {
        MetadataType::Named { named, .. } => type_id(named),
        MetadataType::Instance(instance) => type_id(&instance.generic()),
        _ => None,
    }
}

/// `M:` id of a method definition.
#[must_use]
pub fn method_id(method: &MethodDefinition<'_>) -> Option<String> {
    let declaring = NamedType::Definition(method.declaring_type().ok()?);
    let blob = method.module().blob(method.row().ok()?.signature).ok()?;
    let signature = method
        .module()
        .decode_method_signature(blob, &GenericContext::empty())
        .ok()?;
    method_id_from_parts(&declaring, method.name().ok()?, &signature)
}

/// `F:` id of a field definition.
#[must_use]
pub fn field_id(field: &FieldDefinition<'_>) -> Option<String> {
    let declaring = NamedType::Definition(field.declaring_type().ok()?);
    member_id('F', &declaring, field.name().ok()?)
}

/// `P:` id of a property definition; indexers list their parameters.
#[must_use]
pub fn property_id(property: &PropertyDefinition<'_>) -> Option<String> {
    let declaring = NamedType::Definition(property.declaring_type().ok()?);
    let blob = property
        .module()
        .blob(property.row().ok()?.signature)
        .ok()?;
    let signature = property
        .module()
        .decode_property_signature(blob, &GenericContext::empty())
        .ok()?;

    let mut id = member_id('P', &declaring, property.name().ok()?)?;
    write_parameters(&mut id, &signature.parameter_types)?;
    Some(id)
}

/// `E:` id of an event definition.
#[must_use]
pub fn event_id(event: &EventDefinition<'_>) -> Option<String> {
    let declaring = NamedType::Definition(event.declaring_type().ok()?);
    member_id('E', &declaring, event.name().ok()?)
}

/// `M:` or `F:` id of a member reference.
///
/// Members of generic instances are identified through the generic type, with signature
/// references to its parameters kept as `` `n ``. Members of other type specifications
/// (arrays, pointers) have no id.
#[must_use]
pub fn member_reference_id(reference: &MemberReference<'_>) -> Option<String> {
    let declaring = match reference.parent().ok()? {
        MemberReferenceParent::Type(named) => named,
        MemberReferenceParent::TypeSpecification(MetadataType::Instance(instance)) => {
            instance.generic()
        }
        MemberReferenceParent::Method(method) => return method_id(&method),
        _ => return None,
    };

    let name = reference.name().ok()?;
    match reference.kind().ok()? {
        MemberReferenceKind::Method => {
            let signature = reference.method_signature(false).ok()?;
            method_id_from_parts(&declaring, name, &signature)
        }
        MemberReferenceKind::Field => member_id('F', &declaring, name),
    }
}

/// `M:` id of the generic method a method specification instantiates.
#[must_use]
pub fn method_specification_id(specification: &MethodSpecification<'_>) -> Option<String> {
    match specification.method().ok()? {
        MethodReference::Definition(method) => method_id(&method),
        MethodReference::Reference(reference) => member_reference_id(&reference),
    }
}

fn member_id(prefix: char, declaring: &NamedType<'_>, name: &str) -> Option<String> {
    Some(format!(
        "{}:{}.{}",
        prefix,
        type_name(declaring)?,
        name.replace('.', "#")
    ))
}

fn method_id_from_parts(
    declaring: &NamedType<'_>,
    name: &str,
    signature: &MethodSignature<MetadataType<'_>>,
) -> Option<String> {
    let mut id = member_id('M', declaring, name)?;
    if signature.generic_parameter_count > 0 {
        write!(id, "``{}", signature.generic_parameter_count).ok()?;
    }

    let count = signature
        .required_parameter_count
        .min(signature.parameter_types.len());
    write_parameters(&mut id, &signature.parameter_types[..count])?;

    if matches!(name, "op_Implicit" | "op_Explicit") {
        id.push('~');
        write_type(&mut id, &signature.return_type, 0)?;
    }
    Some(id)
}

fn write_parameters(id: &mut String, parameters: &[MetadataType<'_>]) -> Option<()> {
    if parameters.is_empty() {
        return Some(());
    }

    id.push('(');
    for (index, parameter) in parameters.iter().enumerate() {
        if index > 0 {
            id.push(',');
        }
        write_type(id, parameter, 0)?;
    }
    id.push(')');
    Some(())
}

/// Append the documentation id encoding of a parameter type.
fn write_type(id: &mut String, metadata_type: &MetadataType<'_>, depth: usize) -> Option<()> {
    if depth > MAX_TYPE_DEPTH {
        return None;
    }

    match metadata_type {
        MetadataType::Primitive(code) => write!(id, "System.{}", code).ok()?,
        MetadataType::Named { named, .. } => id.push_str(&type_name(named)?),
        MetadataType::Instance(instance) => write_instance(id, instance, depth)?,
        MetadataType::Array {
            element,
            rank,
            sizes,
            lower_bounds,
        } => {
            write_type(id, element, depth + 1)?;
            if *rank == 0 {
                id.push_str("[]");
            } else {
                id.push('[');
                for dimension in 0..*rank as usize {
                    if dimension > 0 {
                        id.push(',');
                    }
                    write!(id, "{}:", lower_bounds.get(dimension).copied().unwrap_or(0)).ok()?;
                    if let Some(size) = sizes.get(dimension) {
                        write!(id, "{}", size).ok()?;
                    }
                }
                id.push(']');
            }
        }
        MetadataType::ByRef(element) => {
            write_type(id, element, depth + 1)?;
            id.push('@');
        }
        MetadataType::Pointer(element) => {
            write_type(id, element, depth + 1)?;
            id.push('*');
        }
        MetadataType::Pinned(element) => {
            write_type(id, element, depth + 1)?;
            id.push('^');
        }
        MetadataType::FunctionPointer(signature) => {
            id.push_str("=FUNC:");
            write_type(id, &signature.return_type, depth + 1)?;
            if !signature.parameter_types.is_empty() {
                id.push('(');
                for (index, parameter) in signature.parameter_types.iter().enumerate() {
                    if index > 0 {
                        id.push(',');
                    }
                    write_type(id, parameter, depth + 1)?;
                }
                id.push(')');
            }
        }
        MetadataType::Modified {
            modifier,
            unmodified,
            required,
        } => {
            write_type(id, unmodified, depth + 1)?;
            id.push(if *required { '|' } else { '!' });
            write_type(id, modifier, depth + 1)?;
        }
        MetadataType::GenericParameter {
            index, is_method, ..
        } => {
            let ticks = if *is_method { "``" } else { "`" };
            write!(id, "{}{}", ticks, index).ok()?;
        }
    }
    Some(())
}

fn write_instance(id: &mut String, instance: &TypeInstance<'_>, depth: usize) -> Option<()> {
    for (index, segment) in instance.segments().iter().enumerate() {
        if index == 0 {
            let namespace = segment.named.namespace().ok()?;
            if !namespace.is_empty() {
                id.push_str(namespace);
                id.push('.');
            }
        } else {
            id.push('.');
        }

        let name = segment.named.name().ok()?;
        let arguments = instance.segment_arguments(segment);
        if arguments.is_empty() {
            id.push_str(name);
            continue;
        }

        id.push_str(name.rfind('`').map_or(name, |tick| &name[..tick]));
        id.push('{');
        for (position, argument) in arguments.iter().enumerate() {
            if position > 0 {
                id.push(',');
            }
            write_type(id, argument, depth + 1)?;
        }
        id.push('}');
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        file::File,
        metadata::{model::MetadataModule, token::Token},
        test::*,
    };

    fn with_module(builder: &MetadataBuilder, check: impl Fn(&MetadataModule<'_>)) {
        let file = File::from_mem(builder.build_metadata()).unwrap();
        let module = MetadataModule::from_file(&file).unwrap();
        check(&module);
    }

    fn coded(token: Token) -> u8 {
        let tag = match token.table() {
            0x02 => 0,
            0x01 => 1,
            _ => 2,
        };
        (token.row() << 2 | tag) as u8
    }

    #[test]
    fn namespaces() {
        assert_eq!(namespace_id("System.IO"), "N:System.IO");
    }

    #[test]
    fn types_and_nesting() {
        let mut builder = MetadataBuilder::new();
        let runtime = builder.assembly_ref("System.Runtime");
        let dictionary = builder.type_ref(runtime, "System.Collections.Generic", "Dictionary`2");
        let keys = builder.type_ref(dictionary, "", "KeyCollection");
        let outer = builder.type_def(PUBLIC_CLASS, "Test", "Outer`1", None);
        let inner = builder.nested_type(outer, NESTED_PUBLIC, "Inner", None);

        with_module(&builder, |module| {
            let keys = NamedType::Reference(module.type_references().nth(keys.row() as usize - 1).unwrap());
            assert_eq!(
                type_id(&keys).as_deref(),
                Some("T:System.Collections.Generic.Dictionary`2.KeyCollection")
            );

            let outer = NamedType::Definition(module.type_definition(outer.row()).unwrap());
            let inner = NamedType::Definition(module.type_definition(inner.row()).unwrap());
            assert_eq!(type_id(&outer).as_deref(), Some("T:Test.Outer`1"));
            assert_eq!(type_id(&inner).as_deref(), Some("T:Test.Outer`1.Inner"));
        });
    }

    #[test]
    fn method_ids() {
        let mut builder = MetadataBuilder::new();
        let runtime = builder.assembly_ref("System.Runtime");
        let list = builder.type_ref(runtime, "System.Collections.Generic", "List`1");
        let widget = builder.type_def(PUBLIC_CLASS, "Test", "Widget", None);

        // instance void .ctor()
        let ctor = builder.method(PUBLIC_CTOR, ".ctor", &[0x20, 0x00, 0x01]);
        // static T Make<T>(class List<!!0>, int32[0...,0...], string&)
        #[rustfmt::skip]
        let make = builder.method(PUBLIC_STATIC, "Make", &[
            0x10, 0x01, 0x03, 0x1E, 0x00,
            0x15, 0x12, coded(list), 0x01, 0x1E, 0x00,
            0x14, 0x08, 0x02, 0x00, 0x02, 0x00, 0x00,
            0x10, 0x0E,
        ]);
        // static int32 op_Implicit(valuetype Widget)
        let implicit = builder.method(
            PUBLIC_STATIC,
            "op_Implicit",
            &[0x00, 0x01, 0x08, 0x11, coded(widget)],
        );
        // instance void Run(void*, method void *(int32), int32 modreq(List`1))
        #[rustfmt::skip]
        let run = builder.method(PUBLIC_METHOD, "Run", &[
            0x20, 0x03, 0x01,
            0x0F, 0x01,
            0x1B, 0x00, 0x01, 0x01, 0x08,
            0x1F, coded(list), 0x08,
        ]);

        with_module(&builder, |module| {
            let id = |token: Token| method_id(&module.method_definition(token.row()).unwrap());

            assert_eq!(id(ctor).as_deref(), Some("M:Test.Widget.#ctor"));
            assert_eq!(
                id(make).as_deref(),
                Some("M:Test.Widget.Make``1(System.Collections.Generic.List{``0},System.Int32[0:,0:],System.String@)")
            );
            assert_eq!(
                id(implicit).as_deref(),
                Some("M:Test.Widget.op_Implicit(Test.Widget)~System.Int32")
            );
            assert_eq!(
                id(run).as_deref(),
                Some("M:Test.Widget.Run(System.Void*,=FUNC:System.Void(System.Int32),System.Int32|System.Collections.Generic.List`1)")
            );
        });
    }

    #[test]
    fn field_property_event_ids() {
        let mut builder = MetadataBuilder::new();
        let runtime = builder.assembly_ref("System.Runtime");
        let handler = builder.type_ref(runtime, "System", "EventHandler");
        builder.type_def(PUBLIC_CLASS, "Test", "Widget`1", None);
        let field = builder.field(PUBLIC_FIELD, "Count", &[0x06, 0x08]);
        // instance !0 Item(int32)
        let indexer = builder.property("Item", &[0x28, 0x01, 0x13, 0x00, 0x08]);
        let name = builder.property("Name", &[0x28, 0x00, 0x0E]);
        let event = builder.event("Changed", handler);

        with_module(&builder, |module| {
            let field = module.field_definition(field.row()).unwrap();
            assert_eq!(field_id(&field).as_deref(), Some("F:Test.Widget`1.Count"));

            let indexer = module.property_definition(indexer.row());
            assert_eq!(
                property_id(&indexer).as_deref(),
                Some("P:Test.Widget`1.Item(System.Int32)")
            );
            let name = module.property_definition(name.row());
            assert_eq!(property_id(&name).as_deref(), Some("P:Test.Widget`1.Name"));

            let event = module.event_definition(event.row());
            assert_eq!(event_id(&event).as_deref(), Some("E:Test.Widget`1.Changed"));
        });
    }

    #[test]
    fn references_through_instances() {
        let mut builder = MetadataBuilder::new();
        let runtime = builder.assembly_ref("System.Runtime");
        let list = builder.type_ref(runtime, "System.Collections.Generic", "List`1");
        let object = builder.type_ref(runtime, "System", "Object");
        // List<int32>
        let instance = builder.type_spec(&[0x15, 0x12, coded(list), 0x01, 0x08]);
        // int32[]
        let array = builder.type_spec(&[0x1D, 0x08]);

        let add = builder.member_ref(instance, "Add", &[0x20, 0x01, 0x01, 0x13, 0x00]);
        let to_string = builder.member_ref(object, "ToString", &[0x20, 0x00, 0x0E]);
        let field = builder.member_ref(instance, "_size", &[0x06, 0x08]);
        let on_array = builder.member_ref(array, "Get", &[0x20, 0x01, 0x08, 0x08]);
        // static !!0 Empty<T>()
        let empty = builder.member_ref(object, "Empty", &[0x10, 0x01, 0x00, 0x1E, 0x00]);
        let instantiation = builder.method_spec(empty, &[0x0A, 0x01, 0x0E]);

        with_module(&builder, |module| {
            let reference = |token: Token| {
                module
                    .member_references()
                    .nth(token.row() as usize - 1)
                    .unwrap()
            };

            assert_eq!(
                member_reference_id(&reference(add)).as_deref(),
                Some("M:System.Collections.Generic.List`1.Add(`0)")
            );
            assert_eq!(
                member_reference_id(&reference(to_string)).as_deref(),
                Some("M:System.Object.ToString")
            );
            assert_eq!(
                member_reference_id(&reference(field)).as_deref(),
                Some("F:System.Collections.Generic.List`1._size")
            );
            assert_eq!(member_reference_id(&reference(on_array)), None);

            let specification = module
                .method_specifications()
                .nth(instantiation.row() as usize - 1)
                .unwrap();
            assert_eq!(
                method_specification_id(&specification).as_deref(),
                Some("M:System.Object.Empty``1")
            );
        });
    }

    #[test]
    fn nested_instance_encoding() {
        let mut builder = MetadataBuilder::new();
        let runtime = builder.assembly_ref("System.Runtime");
        let outer = builder.type_ref(runtime, "N", "Outer`1");
        let inner = builder.type_ref(outer, "", "Inner`1");
        builder.type_def(PUBLIC_CLASS, "Test", "User", None);
        // void Use(Outer`1/Inner`1<int32, string>)
        let method = builder.method(
            PUBLIC_STATIC,
            "Use",
            &[0x00, 0x01, 0x01, 0x15, 0x12, coded(inner), 0x02, 0x08, 0x0E],
        );

        with_module(&builder, |module| {
            let method = module.method_definition(method.row()).unwrap();
            assert_eq!(
                method_id(&method).as_deref(),
                Some("M:Test.User.Use(N.Outer{System.Int32}.Inner{System.String})")
            );
        });
    }
}
