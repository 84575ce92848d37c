//! Typed views over single table rows.
//!
//! Only the tables the model consumes get a typed row; everything else stays reachable
//! through the untyped [`Row`] accessors.

use crate::{
    file::io::read_le_at,
    metadata::tables::{columns, CodedIndex, ColumnKind, TableId, TableInfo},
    Result,
};

/// One row of a metadata table, with column access driven by the table schema.
#[derive(Clone, Copy)]
pub struct Row<'r> {
    rid: u32,
    table: TableId,
    data: &'r [u8],
    info: &'r TableInfo,
}

impl<'r> Row<'r> {
    pub(crate) fn new(rid: u32, table: TableId, data: &'r [u8], info: &'r TableInfo) -> Self {
        Row {
            rid,
            table,
            data,
            info,
        }
    }

    /// The 1-based row id.
    #[must_use]
    pub fn rid(&self) -> u32 {
        self.rid
    }

    /// The table this row belongs to.
    #[must_use]
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Read a column as a raw value, widened to `u32`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `column` does not exist.
    pub fn get(&self, column: usize) -> Result<u32> {
        let schema = columns(self.table);
        let Some(kind) = schema.get(column) else {
            return Err(out_of_bounds_error!());
        };

        let mut offset: usize = schema[..column]
            .iter()
            .map(|kind| self.info.column_size(*kind))
            .sum();

        match self.info.column_size(*kind) {
            1 => Ok(u32::from(read_le_at::<u8>(self.data, &mut offset)?)),
            2 => Ok(u32::from(read_le_at::<u16>(self.data, &mut offset)?)),
            _ => read_le_at::<u32>(self.data, &mut offset),
        }
    }

    /// Read a coded index column.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the column is not a coded index or holds an
    /// invalid tag.
    pub fn coded(&self, column: usize) -> Result<CodedIndex> {
        let value = self.get(column)?;
        match columns(self.table)[column] {
            ColumnKind::Coded(kind) => kind.decode(value),
            other => Err(malformed_error!(
                "Column {} of {} is {:?}, not a coded index",
                column,
                self.table,
                other
            )),
        }
    }
}

/// A typed row that can be decoded from a [`Row`].
pub trait RowRead: Sized {
    /// The table the row type belongs to.
    const TABLE: TableId;

    /// Decode the typed row.
    ///
    /// # Errors
    /// Propagates column decoding failures.
    fn read(row: &Row<'_>) -> Result<Self>;
}

macro_rules! raw_rows {
    ($(
        $(#[$meta:meta])*
        $name:ident($table:ident) {
            $( $(#[$field_meta:meta])* $field:ident: $kind:ident ),* $(,)?
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $name {
                /// The 1-based row id
                pub rid: u32,
                $( $(#[$field_meta])* pub $field: raw_rows!(@type $kind), )*
            }

            impl RowRead for $name {
                const TABLE: TableId = TableId::$table;

                fn read(row: &Row<'_>) -> Result<Self> {
                    let mut column = 0_usize;
                    $(
                        let $field = raw_rows!(@read row, column, $kind);
                        column += 1;
                    )*
                    let _ = column;

                    Ok($name { rid: row.rid(), $( $field, )* })
                }
            }
        )*
    };
    (@type value) => { u32 };
    (@type coded) => { CodedIndex };
    (@read $row:ident, $column:ident, value) => { $row.get($column)? };
    (@read $row:ident, $column:ident, coded) => { $row.coded($column)? };
}

raw_rows! {
    /// A row of the `Module` table.
    ModuleRaw(Module) {
        /// Reserved, 0
        generation: value,
        /// `#Strings` index of the module name
        name: value,
        /// `#GUID` index of the module version id
        mvid: value,
        /// Reserved, 0
        enc_id: value,
        /// Reserved, 0
        enc_base_id: value,
    }

    /// A row of the `TypeRef` table.
    TypeRefRaw(TypeRef) {
        /// Module, ModuleRef, AssemblyRef or enclosing TypeRef
        resolution_scope: coded,
        /// `#Strings` index of the type name
        type_name: value,
        /// `#Strings` index of the namespace
        type_namespace: value,
    }

    /// A row of the `TypeDef` table.
    TypeDefRaw(TypeDef) {
        /// `TypeAttributes`
        flags: value,
        /// `#Strings` index of the type name
        type_name: value,
        /// `#Strings` index of the namespace
        type_namespace: value,
        /// The base type, if any
        extends: coded,
        /// First row of the field run owned by this type
        field_list: value,
        /// First row of the method run owned by this type
        method_list: value,
    }

    /// A row of the `Field` table.
    FieldRaw(Field) {
        /// `FieldAttributes`
        flags: value,
        /// `#Strings` index of the field name
        name: value,
        /// `#Blob` index of the field signature
        signature: value,
    }

    /// A row of the `MethodDef` table.
    MethodDefRaw(MethodDef) {
        /// RVA of the method body, 0 for abstract and extern methods
        rva: value,
        /// `MethodImplAttributes`
        impl_flags: value,
        /// `MethodAttributes`
        flags: value,
        /// `#Strings` index of the method name
        name: value,
        /// `#Blob` index of the method signature
        signature: value,
        /// First row of the parameter run owned by this method
        param_list: value,
    }

    /// A row of the `Param` table.
    ParamRaw(Param) {
        /// `ParamAttributes`
        flags: value,
        /// 0 for the return value, else the 1-based parameter position
        sequence: value,
        /// `#Strings` index of the parameter name
        name: value,
    }

    /// A row of the `InterfaceImpl` table.
    InterfaceImplRaw(InterfaceImpl) {
        /// The implementing `TypeDef` row
        class: value,
        /// The implemented interface
        interface: coded,
    }

    /// A row of the `MemberRef` table.
    MemberRefRaw(MemberRef) {
        /// The declaring entity
        class: coded,
        /// `#Strings` index of the member name
        name: value,
        /// `#Blob` index of the member signature
        signature: value,
    }

    /// A row of the `CustomAttribute` table.
    CustomAttributeRaw(CustomAttribute) {
        /// The attributed entity
        parent: coded,
        /// The attribute constructor, MethodDef or MemberRef
        constructor: coded,
        /// `#Blob` index of the serialized value
        value: value,
    }

    /// A row of the `EventMap` table.
    EventMapRaw(EventMap) {
        /// The owning `TypeDef` row
        parent: value,
        /// First row of the event run
        event_list: value,
    }

    /// A row of the `Event` table.
    EventRaw(Event) {
        /// `EventAttributes`
        flags: value,
        /// `#Strings` index of the event name
        name: value,
        /// The delegate type of the event
        event_type: coded,
    }

    /// A row of the `PropertyMap` table.
    PropertyMapRaw(PropertyMap) {
        /// The owning `TypeDef` row
        parent: value,
        /// First row of the property run
        property_list: value,
    }

    /// A row of the `Property` table.
    PropertyRaw(Property) {
        /// `PropertyAttributes`
        flags: value,
        /// `#Strings` index of the property name
        name: value,
        /// `#Blob` index of the property signature
        signature: value,
    }

    /// A row of the `MethodSemantics` table.
    MethodSemanticsRaw(MethodSemantics) {
        /// `MethodSemanticsAttributes`
        semantics: value,
        /// The accessor `MethodDef` row
        method: value,
        /// The owning event or property
        association: coded,
    }

    /// A row of the `ModuleRef` table.
    ModuleRefRaw(ModuleRef) {
        /// `#Strings` index of the module name
        name: value,
    }

    /// A row of the `TypeSpec` table.
    TypeSpecRaw(TypeSpec) {
        /// `#Blob` index of the type signature
        signature: value,
    }

    /// A row of the `Assembly` table.
    AssemblyRaw(Assembly) {
        /// `AssemblyHashAlgorithm`
        hash_alg_id: value,
        /// Major version
        major_version: value,
        /// Minor version
        minor_version: value,
        /// Build number
        build_number: value,
        /// Revision number
        revision_number: value,
        /// `AssemblyFlags`
        flags: value,
        /// `#Blob` index of the public key
        public_key: value,
        /// `#Strings` index of the assembly name
        name: value,
        /// `#Strings` index of the culture
        culture: value,
    }

    /// A row of the `AssemblyRef` table.
    AssemblyRefRaw(AssemblyRef) {
        /// Major version
        major_version: value,
        /// Minor version
        minor_version: value,
        /// Build number
        build_number: value,
        /// Revision number
        revision_number: value,
        /// `AssemblyFlags`
        flags: value,
        /// `#Blob` index of the public key or its token
        public_key_or_token: value,
        /// `#Strings` index of the assembly name
        name: value,
        /// `#Strings` index of the culture
        culture: value,
        /// `#Blob` index of the hash value
        hash_value: value,
    }

    /// A row of the `File` table.
    FileRaw(File) {
        /// `FileAttributes`, bit 0 set for files without metadata
        flags: value,
        /// `#Strings` index of the file name
        name: value,
        /// `#Blob` index of the hash value
        hash_value: value,
    }

    /// A row of the `NestedClass` table.
    NestedClassRaw(NestedClass) {
        /// The nested `TypeDef` row
        nested_class: value,
        /// The enclosing `TypeDef` row
        enclosing_class: value,
    }

    /// A row of the `GenericParam` table.
    GenericParamRaw(GenericParam) {
        /// 0-based position in the owner's parameter list
        number: value,
        /// `GenericParamAttributes`
        flags: value,
        /// The owning TypeDef or MethodDef
        owner: coded,
        /// `#Strings` index of the parameter name
        name: value,
    }

    /// A row of the `MethodSpec` table.
    MethodSpecRaw(MethodSpec) {
        /// The instantiated method
        method: coded,
        /// `#Blob` index of the instantiation signature
        instantiation: value,
    }

    /// A row of the `GenericParamConstraint` table.
    GenericParamConstraintRaw(GenericParamConstraint) {
        /// The constrained `GenericParam` row
        owner: value,
        /// The constraint type
        constraint: coded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_row() {
        let info = TableInfo::new(&[(TableId::TypeDef, 2)], 0);

        #[rustfmt::skip]
        let data = [
            0x01, 0x00, 0x10, 0x00,
            0x0A, 0x00,
            0x14, 0x00,
            0x05, 0x00,
            0x01, 0x00,
            0x03, 0x00,
        ];

        let row = Row::new(2, TableId::TypeDef, &data, &info);
        let type_def = TypeDefRaw::read(&row).unwrap();

        assert_eq!(type_def.rid, 2);
        assert_eq!(type_def.flags, 0x0010_0001);
        assert_eq!(type_def.type_name, 0x0A);
        assert_eq!(type_def.type_namespace, 0x14);
        assert_eq!(type_def.extends, CodedIndex::new(TableId::TypeRef, 1));
        assert_eq!(type_def.field_list, 1);
        assert_eq!(type_def.method_list, 3);

        assert!(row.get(6).is_err());
        assert!(row.coded(0).is_err());
    }
}
