//! Synthesizes metadata images for tests.
//!
//! Rows are collected per table as raw column values and serialized with the same
//! [`TableInfo`] logic the reader uses, so every image is laid out exactly as the reader
//! expects it. Members are attached to the most recently added type (and parameters to the
//! most recently added method), mirroring how the list columns of `TypeDef` and `MethodDef`
//! describe runs of rows.

use std::collections::HashMap;

use strum::IntoEnumIterator;

use crate::metadata::{
    tables::{columns, CodedIndexType, TableId, TableInfo},
    token::Token,
};

const TEXT_RVA: u32 = 0x2000;
const TEXT_FILE_OFFSET: usize = 0x200;
const CLI_HEADER_SIZE: usize = 72;
const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: usize = 0x2000;

/// Type flags of a public class.
pub const PUBLIC_CLASS: u32 = 0x0010_0001;
/// Type flags of a public sealed value type.
pub const PUBLIC_SEALED: u32 = 0x0010_0101;
/// Type flags of a public interface.
pub const PUBLIC_INTERFACE: u32 = 0x0000_00A1;
/// Type flags of a nested public type.
pub const NESTED_PUBLIC: u32 = 0x0000_0002;
/// Method flags of a public instance method.
pub const PUBLIC_METHOD: u32 = 0x0086;
/// Method flags of a public constructor.
pub const PUBLIC_CTOR: u32 = 0x1886;
/// Method flags of a public static method.
pub const PUBLIC_STATIC: u32 = 0x0096;
/// Field flags of a public instance field.
pub const PUBLIC_FIELD: u32 = 0x0006;

#[derive(Clone)]
struct Heap {
    data: Vec<u8>,
    offsets: HashMap<Vec<u8>, u32>,
}

impl Heap {
    fn new() -> Heap {
        Heap {
            data: vec![0],
            offsets: HashMap::new(),
        }
    }

    fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }

        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.intern(bytes)
    }

    fn blob(&mut self, value: &[u8]) -> u32 {
        if value.is_empty() {
            return 0;
        }

        let mut bytes = compressed_uint(value.len() as u32);
        bytes.extend_from_slice(value);
        self.intern(bytes)
    }

    fn intern(&mut self, bytes: Vec<u8>) -> u32 {
        if let Some(offset) = self.offsets.get(&bytes) {
            return *offset;
        }

        let offset = self.data.len() as u32;
        self.data.extend_from_slice(&bytes);
        self.offsets.insert(bytes, offset);
        offset
    }
}

/// ECMA-335 II.23.2 compressed unsigned integer.
#[must_use]
pub fn compressed_uint(value: u32) -> Vec<u8> {
    if value < 0x80 {
        vec![value as u8]
    } else if value < 0x4000 {
        vec![0x80 | (value >> 8) as u8, value as u8]
    } else {
        (0xC000_0000 | value).to_be_bytes().to_vec()
    }
}

/// A tiny format method body around `code`.
#[must_use]
pub fn tiny_body(code: &[u8]) -> Vec<u8> {
    assert!(code.len() < 64, "tiny bodies hold at most 63 bytes of IL");
    let mut body = vec![((code.len() as u8) << 2) | 0x02];
    body.extend_from_slice(code);
    body
}

/// Builder for synthetic metadata images.
pub struct MetadataBuilder {
    assembly: Option<String>,
    module: String,
    strings: Heap,
    blobs: Heap,
    rows: Vec<Vec<Vec<u32>>>,
    bodies: Vec<(u32, Vec<u8>)>,
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataBuilder {
    /// An assembly `Test` with module `Test.dll` and the `<Module>` type.
    #[must_use]
    pub fn new() -> MetadataBuilder {
        let mut builder = MetadataBuilder {
            assembly: Some("Test".to_string()),
            module: "Test.dll".to_string(),
            strings: Heap::new(),
            blobs: Heap::new(),
            rows: vec![Vec::new(); 64],
            bodies: Vec::new(),
        };
        builder.type_def(0, "", "<Module>", None);
        builder
    }

    /// Rename the assembly.
    #[must_use]
    pub fn assembly_name(mut self, name: &str) -> Self {
        self.assembly = Some(name.to_string());
        self
    }

    /// Drop the manifest, producing a standalone module.
    #[must_use]
    pub fn without_assembly(mut self) -> Self {
        self.assembly = None;
        self
    }

    /// Rename the module.
    #[must_use]
    pub fn module_name(mut self, name: &str) -> Self {
        self.module = name.to_string();
        self
    }

    fn push(&mut self, table: TableId, row: Vec<u32>) -> Token {
        let rows = &mut self.rows[table as usize];
        rows.push(row);
        Token::from_parts(table, rows.len() as u32)
    }

    fn count(&self, table: TableId) -> u32 {
        self.rows[table as usize].len() as u32
    }

    fn coded(kind: CodedIndexType, token: Option<Token>) -> u32 {
        match token {
            Some(token) => {
                let table = token.table_id().expect("token of a known table");
                kind.encode(table, token.row())
                    .unwrap_or_else(|| panic!("{:?} can't reference {}", kind, table))
            }
            None => 0,
        }
    }

    fn last_type(&self) -> u32 {
        self.count(TableId::TypeDef)
    }

    /// Add a reference to assembly `name`, version 4.0.0.0.
    pub fn assembly_ref(&mut self, name: &str) -> Token {
        let name = self.strings.string(name);
        self.push(TableId::AssemblyRef, vec![4, 0, 0, 0, 0, 0, name, 0, 0])
    }

    /// Add a module reference.
    pub fn module_ref(&mut self, name: &str) -> Token {
        let name = self.strings.string(name);
        self.push(TableId::ModuleRef, vec![name])
    }

    /// Add a `File` table entry.
    pub fn file(&mut self, name: &str, has_metadata: bool) -> Token {
        let name = self.strings.string(name);
        self.push(TableId::File, vec![u32::from(!has_metadata), name, 0])
    }

    /// Add a type reference resolved through `scope`.
    pub fn type_ref(&mut self, scope: Token, namespace: &str, name: &str) -> Token {
        let scope = Self::coded(CodedIndexType::ResolutionScope, Some(scope));
        let name = self.strings.string(name);
        let namespace = self.strings.string(namespace);
        self.push(TableId::TypeRef, vec![scope, name, namespace])
    }

    /// Add a type definition; following members belong to it.
    pub fn type_def(
        &mut self,
        flags: u32,
        namespace: &str,
        name: &str,
        extends: Option<Token>,
    ) -> Token {
        let name = self.strings.string(name);
        let namespace = self.strings.string(namespace);
        let extends = Self::coded(CodedIndexType::TypeDefOrRef, extends);
        let fields = self.count(TableId::Field) + 1;
        let methods = self.count(TableId::MethodDef) + 1;
        self.push(
            TableId::TypeDef,
            vec![flags, name, namespace, extends, fields, methods],
        )
    }

    /// Add a nested type definition inside `enclosing`.
    pub fn nested_type(
        &mut self,
        enclosing: Token,
        flags: u32,
        name: &str,
        extends: Option<Token>,
    ) -> Token {
        let nested = self.type_def(flags, "", name, extends);
        self.push(TableId::NestedClass, vec![nested.row(), enclosing.row()]);
        nested
    }

    /// Add a method to the last type.
    pub fn method(&mut self, flags: u32, name: &str, signature: &[u8]) -> Token {
        let name = self.strings.string(name);
        let signature = self.blobs.blob(signature);
        let params = self.count(TableId::Param) + 1;
        self.push(TableId::MethodDef, vec![0, 0, flags, name, signature, params])
    }

    /// Add a method with an IL body to the last type.
    pub fn method_with_body(
        &mut self,
        flags: u32,
        name: &str,
        signature: &[u8],
        body: Vec<u8>,
    ) -> Token {
        let method = self.method(flags, name, signature);
        self.bodies.push((method.row(), body));
        method
    }

    /// Add a parameter row to the last method.
    pub fn param(&mut self, sequence: u32, name: &str) -> Token {
        let name = self.strings.string(name);
        self.push(TableId::Param, vec![0, sequence, name])
    }

    /// Add a field to the last type.
    pub fn field(&mut self, flags: u32, name: &str, signature: &[u8]) -> Token {
        let name = self.strings.string(name);
        let signature = self.blobs.blob(signature);
        self.push(TableId::Field, vec![flags, name, signature])
    }

    /// Add a property to the last type.
    pub fn property(&mut self, name: &str, signature: &[u8]) -> Token {
        let owner = self.last_type();
        let start = self.count(TableId::Property) + 1;
        if self.rows[TableId::PropertyMap as usize]
            .last()
            .map_or(true, |map| map[0] != owner)
        {
            self.push(TableId::PropertyMap, vec![owner, start]);
        }

        let name = self.strings.string(name);
        let signature = self.blobs.blob(signature);
        self.push(TableId::Property, vec![0, name, signature])
    }

    /// Add an event to the last type.
    pub fn event(&mut self, name: &str, event_type: Token) -> Token {
        let owner = self.last_type();
        let start = self.count(TableId::Event) + 1;
        if self.rows[TableId::EventMap as usize]
            .last()
            .map_or(true, |map| map[0] != owner)
        {
            self.push(TableId::EventMap, vec![owner, start]);
        }

        let name = self.strings.string(name);
        let event_type = Self::coded(CodedIndexType::TypeDefOrRef, Some(event_type));
        self.push(TableId::Event, vec![0, name, event_type])
    }

    /// Link `method` to a property or event.
    pub fn semantics(&mut self, semantics: u32, method: Token, association: Token) -> Token {
        let association = Self::coded(CodedIndexType::HasSemantics, Some(association));
        self.push(
            TableId::MethodSemantics,
            vec![semantics, method.row(), association],
        )
    }

    /// Declare that `class` implements `interface`.
    pub fn interface_impl(&mut self, class: Token, interface: Token) -> Token {
        let interface = Self::coded(CodedIndexType::TypeDefOrRef, Some(interface));
        self.push(TableId::InterfaceImpl, vec![class.row(), interface])
    }

    /// Add a member reference.
    pub fn member_ref(&mut self, parent: Token, name: &str, signature: &[u8]) -> Token {
        let parent = Self::coded(CodedIndexType::MemberRefParent, Some(parent));
        let name = self.strings.string(name);
        let signature = self.blobs.blob(signature);
        self.push(TableId::MemberRef, vec![parent, name, signature])
    }

    /// Add a type specification.
    pub fn type_spec(&mut self, signature: &[u8]) -> Token {
        let signature = self.blobs.blob(signature);
        self.push(TableId::TypeSpec, vec![signature])
    }

    /// Add a generic method instantiation.
    pub fn method_spec(&mut self, method: Token, instantiation: &[u8]) -> Token {
        let method = Self::coded(CodedIndexType::MethodDefOrRef, Some(method));
        let instantiation = self.blobs.blob(instantiation);
        self.push(TableId::MethodSpec, vec![method, instantiation])
    }

    /// Add generic parameter `number` to a type or method.
    pub fn generic_param(&mut self, owner: Token, number: u32, name: &str) -> Token {
        let owner = Self::coded(CodedIndexType::TypeOrMethodDef, Some(owner));
        let name = self.strings.string(name);
        self.push(TableId::GenericParam, vec![number, 0, owner, name])
    }

    /// Constrain a generic parameter.
    pub fn generic_param_constraint(&mut self, owner: Token, constraint: Token) -> Token {
        let constraint = Self::coded(CodedIndexType::TypeDefOrRef, Some(constraint));
        self.push(
            TableId::GenericParamConstraint,
            vec![owner.row(), constraint],
        )
    }

    /// Apply a custom attribute.
    pub fn custom_attribute(&mut self, parent: Token, constructor: Token, value: &[u8]) -> Token {
        let parent = Self::coded(CodedIndexType::HasCustomAttribute, Some(parent));
        let constructor = Self::coded(CodedIndexType::CustomAttributeType, Some(constructor));
        let value = self.blobs.blob(value);
        self.push(TableId::CustomAttribute, vec![parent, constructor, value])
    }

    /// Offsets of the method bodies relative to the start of the body area.
    fn body_layout(&self) -> (Vec<u8>, HashMap<u32, u32>) {
        let mut area = Vec::new();
        let mut offsets = HashMap::new();
        for (method, body) in &self.bodies {
            while area.len() % 4 != 0 {
                area.push(0);
            }
            offsets.insert(*method, area.len() as u32);
            area.extend_from_slice(body);
        }
        (area, offsets)
    }

    /// Serialize as a bare metadata blob starting with `BSJB`.
    #[must_use]
    pub fn build_metadata(&self) -> Vec<u8> {
        self.metadata(TEXT_RVA + CLI_HEADER_SIZE as u32)
    }

    fn metadata(&self, body_rva: u32) -> Vec<u8> {
        let mut strings = self.strings.clone();
        let blobs = self.blobs.clone();
        let mut rows = self.rows.clone();

        let module_name = strings.string(&self.module);
        rows[TableId::Module as usize] = vec![vec![0, module_name, 1, 0, 0]];
        if let Some(assembly) = &self.assembly {
            let name = strings.string(assembly);
            rows[TableId::Assembly as usize] =
                vec![vec![0x8004, 1, 0, 0, 0, 0, 0, name, 0]];
        }

        let (_, offsets) = self.body_layout();
        for (method, offset) in offsets {
            rows[TableId::MethodDef as usize][method as usize - 1][0] = body_rva + offset;
        }

        let tables = Self::table_stream(&rows);
        let guid: Vec<u8> = (1..=16).collect();
        let user_strings = vec![0, 0, 0, 0];

        let streams: [(&str, Vec<u8>); 5] = [
            ("#~", tables),
            ("#Strings", pad4(strings.data)),
            ("#US", user_strings),
            ("#GUID", guid),
            ("#Blob", pad4(blobs.data)),
        ];

        let version = b"v4.0.30319\0\0";
        let mut header_size = 16 + version.len() + 4;
        for (name, _) in &streams {
            header_size += 8 + ((name.len() + 1 + 3) & !3);
        }

        let mut root = Vec::new();
        root.extend_from_slice(b"BSJB");
        root.extend_from_slice(&1_u16.to_le_bytes());
        root.extend_from_slice(&1_u16.to_le_bytes());
        root.extend_from_slice(&0_u32.to_le_bytes());
        root.extend_from_slice(&(version.len() as u32).to_le_bytes());
        root.extend_from_slice(version);
        root.extend_from_slice(&0_u16.to_le_bytes());
        root.extend_from_slice(&(streams.len() as u16).to_le_bytes());

        let mut offset = header_size;
        for (name, data) in &streams {
            root.extend_from_slice(&(offset as u32).to_le_bytes());
            root.extend_from_slice(&(data.len() as u32).to_le_bytes());
            let mut name = name.as_bytes().to_vec();
            name.push(0);
            root.extend_from_slice(&pad4(name));
            offset += data.len();
        }

        for (_, data) in &streams {
            root.extend_from_slice(data);
        }
        root
    }

    fn table_stream(rows: &[Vec<Vec<u32>>]) -> Vec<u8> {
        let counts: Vec<(TableId, u32)> = TableId::iter()
            .filter(|table| !rows[*table as usize].is_empty())
            .map(|table| (table, rows[table as usize].len() as u32))
            .collect();
        let info = TableInfo::new(&counts, 0);

        let mut valid = 0_u64;
        for (table, _) in &counts {
            valid |= 1 << *table as u8;
        }

        let mut data = Vec::new();
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&[2, 0, 0, 1]);
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0_u64.to_le_bytes());
        for (_, count) in &counts {
            data.extend_from_slice(&count.to_le_bytes());
        }

        for (table, _) in &counts {
            for row in &rows[*table as usize] {
                for (column, value) in columns(*table).iter().zip(row) {
                    let size = info.column_size(*column);
                    data.extend_from_slice(&value.to_le_bytes()[..size]);
                }
            }
        }

        pad4(data)
    }

    /// Serialize as a minimal PE32 image with one `.text` section holding the CLI header,
    /// the method bodies and the metadata.
    #[must_use]
    pub fn build_pe(&self) -> Vec<u8> {
        let (bodies, _) = self.body_layout();
        let body_rva = TEXT_RVA + CLI_HEADER_SIZE as u32;
        let metadata_offset = (CLI_HEADER_SIZE + bodies.len() + 3) & !3;
        let metadata = self.metadata(body_rva);

        let mut text = Vec::new();
        text.extend_from_slice(&(CLI_HEADER_SIZE as u32).to_le_bytes());
        text.extend_from_slice(&2_u16.to_le_bytes());
        text.extend_from_slice(&5_u16.to_le_bytes());
        text.extend_from_slice(&(TEXT_RVA + metadata_offset as u32).to_le_bytes());
        text.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
        text.extend_from_slice(&1_u32.to_le_bytes());
        text.resize(CLI_HEADER_SIZE, 0);
        text.extend_from_slice(&bodies);
        text.resize(metadata_offset, 0);
        text.extend_from_slice(&metadata);

        let virtual_size = text.len();
        let raw_size = align(virtual_size, FILE_ALIGNMENT);
        text.resize(raw_size, 0);

        let mut image = vec![0_u8; TEXT_FILE_OFFSET];
        image[0] = b'M';
        image[1] = b'Z';
        image[0x3C..0x40].copy_from_slice(&0x80_u32.to_le_bytes());

        let mut pe = Vec::new();
        pe.extend_from_slice(b"PE\0\0");
        // COFF header
        pe.extend_from_slice(&0x014C_u16.to_le_bytes());
        pe.extend_from_slice(&1_u16.to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        pe.extend_from_slice(&0xE0_u16.to_le_bytes());
        pe.extend_from_slice(&0x2102_u16.to_le_bytes());
        // Optional header, standard fields
        pe.extend_from_slice(&0x010B_u16.to_le_bytes());
        pe.extend_from_slice(&[8, 0]);
        pe.extend_from_slice(&(raw_size as u32).to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        pe.extend_from_slice(&TEXT_RVA.to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        // Windows fields
        pe.extend_from_slice(&0x0040_0000_u32.to_le_bytes());
        pe.extend_from_slice(&(SECTION_ALIGNMENT as u32).to_le_bytes());
        pe.extend_from_slice(&(FILE_ALIGNMENT as u32).to_le_bytes());
        pe.extend_from_slice(&4_u16.to_le_bytes());
        pe.extend_from_slice(&0_u16.to_le_bytes());
        pe.extend_from_slice(&0_u16.to_le_bytes());
        pe.extend_from_slice(&0_u16.to_le_bytes());
        pe.extend_from_slice(&4_u16.to_le_bytes());
        pe.extend_from_slice(&0_u16.to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        let image_size = TEXT_RVA as usize + align(virtual_size, SECTION_ALIGNMENT);
        pe.extend_from_slice(&(image_size as u32).to_le_bytes());
        pe.extend_from_slice(&(TEXT_FILE_OFFSET as u32).to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        pe.extend_from_slice(&3_u16.to_le_bytes());
        pe.extend_from_slice(&0x8540_u16.to_le_bytes());
        pe.extend_from_slice(&0x0010_0000_u32.to_le_bytes());
        pe.extend_from_slice(&0x1000_u32.to_le_bytes());
        pe.extend_from_slice(&0x0010_0000_u32.to_le_bytes());
        pe.extend_from_slice(&0x1000_u32.to_le_bytes());
        pe.extend_from_slice(&0_u32.to_le_bytes());
        pe.extend_from_slice(&16_u32.to_le_bytes());
        // Data directories, only the CLI header is present
        for index in 0..16 {
            if index == 14 {
                pe.extend_from_slice(&TEXT_RVA.to_le_bytes());
                pe.extend_from_slice(&(CLI_HEADER_SIZE as u32).to_le_bytes());
            } else {
                pe.extend_from_slice(&[0; 8]);
            }
        }
        // Section table
        pe.extend_from_slice(b".text\0\0\0");
        pe.extend_from_slice(&(virtual_size as u32).to_le_bytes());
        pe.extend_from_slice(&TEXT_RVA.to_le_bytes());
        pe.extend_from_slice(&(raw_size as u32).to_le_bytes());
        pe.extend_from_slice(&(TEXT_FILE_OFFSET as u32).to_le_bytes());
        pe.extend_from_slice(&[0; 12]);
        pe.extend_from_slice(&0x6000_0020_u32.to_le_bytes());

        image[0x80..0x80 + pe.len()].copy_from_slice(&pe);
        image.extend_from_slice(&text);
        image
    }
}

fn pad4(mut data: Vec<u8>) -> Vec<u8> {
    while data.len() % 4 != 0 {
        data.push(0);
    }
    data
}

fn align(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}
