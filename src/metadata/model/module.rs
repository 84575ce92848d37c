use std::{collections::HashMap, ops::Range, sync::OnceLock};

use dashmap::DashMap;
use strum::IntoEnumIterator;

use crate::{
    file::File,
    metadata::{
        cor20header::Cor20Header,
        customattributes::EnumWidth,
        model::{
            namespaces::NamespaceTree, AssemblyReference, CustomAttribute, EventDefinition,
            FieldDefinition, GenericParameter, MemberReference, MethodDefinition,
            MethodSpecification, Namespace, PropertyDefinition, TypeDefinition, TypeReference,
        },
        root::Root,
        signatures::PrimitiveTypeCode,
        streams::{Blob, Guid, Strings, TablesHeader, UserStrings},
        tables::{
            AssemblyRaw, CustomAttributeRaw, EventMapRaw, FileRaw, GenericParamConstraintRaw,
            GenericParamRaw, InterfaceImplRaw, MethodSemanticsRaw, ModuleRaw, NestedClassRaw,
            PropertyMapRaw, TableId, TypeDefRaw,
        },
        token::Token,
    },
    Error::NotSupported,
    Result,
};

/// `File` table flag marking entries without metadata.
const FILE_CONTAINS_NO_METADATA: u32 = 0x0001;

#[derive(Default)]
struct Nesting {
    enclosing: HashMap<u32, u32>,
    nested: HashMap<u32, Vec<u32>>,
}

#[derive(Default)]
struct MemberOwners {
    fields: HashMap<u32, u32>,
    methods: HashMap<u32, u32>,
    properties: HashMap<u32, u32>,
    events: HashMap<u32, u32>,
}

/// An entry of the `File` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFile<'a> {
    /// File name, relative to the manifest module
    pub name: &'a str,
    /// Whether the file is a module carrying metadata
    pub has_metadata: bool,
}

/// One physical set of metadata streams.
///
/// Rows are decoded on access. Relations that need a scan over a whole table (nesting,
/// custom attributes, interfaces, generic parameters, property and event ownership) are
/// indexed on first use and kept for the lifetime of the module. Rows that fail to decode
/// while building an index are left out of it.
pub struct MetadataModule<'a> {
    file: &'a File,
    root: Root,
    strings: Strings<'a>,
    blobs: Blob<'a>,
    guids: Guid<'a>,
    user_strings: UserStrings<'a>,
    tables: TablesHeader<'a>,
    namespaces: OnceLock<NamespaceTree>,
    nesting: OnceLock<Nesting>,
    owners: OnceLock<MemberOwners>,
    attributes: OnceLock<HashMap<Token, Vec<u32>>>,
    interfaces: OnceLock<HashMap<u32, Vec<u32>>>,
    generic_params: OnceLock<HashMap<Token, Vec<u32>>>,
    constraints: OnceLock<HashMap<u32, Vec<u32>>>,
    semantics: OnceLock<HashMap<Token, Vec<u32>>>,
    property_ranges: OnceLock<HashMap<u32, Range<u32>>>,
    event_ranges: OnceLock<HashMap<u32, Range<u32>>>,
    special_types: OnceLock<HashMap<PrimitiveTypeCode, u32>>,
    enum_widths: DashMap<String, EnumWidth>,
}

impl<'a> MetadataModule<'a> {
    /// Locate and parse the metadata of `file`.
    ///
    /// PE images are followed through their CLI header; anything else must start with the
    /// metadata root.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for PE images without a CLI header, and
    /// parsing errors for damaged metadata.
    pub fn from_file(file: &'a File) -> Result<MetadataModule<'a>> {
        let metadata = if file.is_pe() {
            let Some((clr_rva, clr_size)) = file.clr() else {
                return Err(NotSupported);
            };

            let header = Cor20Header::read(file.data_slice(file.rva_to_offset(clr_rva)?, clr_size)?)?;
            file.data_slice(
                file.rva_to_offset(header.meta_data_rva as usize)?,
                header.meta_data_size as usize,
            )?
        } else {
            file.data()
        };

        Self::from_metadata(file, metadata)
    }

    /// Parse the metadata root at the start of `metadata`, a slice of `file`.
    ///
    /// # Errors
    /// Returns parsing errors for a damaged root or streams, and
    /// [`crate::Error::Malformed`] if there is no table stream.
    pub fn from_metadata(file: &'a File, metadata: &'a [u8]) -> Result<MetadataModule<'a>> {
        let root = Root::read(metadata)?;

        let mut strings = Strings::empty();
        let mut blobs = Blob::empty();
        let mut guids = Guid::empty();
        let mut user_strings = UserStrings::empty();
        let mut tables = None;

        for header in &root.stream_headers {
            let start = header.offset as usize;
            let Some(data) = metadata.get(start..start + header.size as usize) else {
                return Err(out_of_bounds_error!());
            };

            match header.name.as_str() {
                "#~" | "#-" => tables = Some(TablesHeader::from(data)?),
                "#Strings" => strings = Strings::from(data)?,
                "#Blob" => blobs = Blob::from(data)?,
                "#GUID" => guids = Guid::from(data)?,
                "#US" => user_strings = UserStrings::from(data)?,
                other => tracing::debug!("Ignoring unknown metadata stream {}", other),
            }
        }

        let Some(tables) = tables else {
            return Err(malformed_error!("Metadata has no table stream"));
        };

        Ok(MetadataModule {
            file,
            root,
            strings,
            blobs,
            guids,
            user_strings,
            tables,
            namespaces: OnceLock::new(),
            nesting: OnceLock::new(),
            owners: OnceLock::new(),
            attributes: OnceLock::new(),
            interfaces: OnceLock::new(),
            generic_params: OnceLock::new(),
            constraints: OnceLock::new(),
            semantics: OnceLock::new(),
            property_ranges: OnceLock::new(),
            event_ranges: OnceLock::new(),
            special_types: OnceLock::new(),
            enum_widths: DashMap::new(),
        })
    }

    /// The file backing this module.
    #[must_use]
    pub fn file(&self) -> &'a File {
        self.file
    }

    /// The metadata root.
    #[must_use]
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// The `#Strings` heap.
    #[must_use]
    pub fn strings(&self) -> &Strings<'a> {
        &self.strings
    }

    /// The `#Blob` heap.
    #[must_use]
    pub fn blobs(&self) -> &Blob<'a> {
        &self.blobs
    }

    /// The `#GUID` heap.
    #[must_use]
    pub fn guids(&self) -> &Guid<'a> {
        &self.guids
    }

    /// The `#US` heap.
    #[must_use]
    pub fn user_strings(&self) -> &UserStrings<'a> {
        &self.user_strings
    }

    /// The table stream.
    #[must_use]
    pub fn tables(&self) -> &TablesHeader<'a> {
        &self.tables
    }

    /// Enum widths that led to successful custom attribute decodes, by enum type id.
    #[must_use]
    pub fn enum_widths(&self) -> &DashMap<String, EnumWidth> {
        &self.enum_widths
    }

    pub(crate) fn string(&self, index: u32) -> Result<&'a str> {
        self.strings.get(index as usize)
    }

    pub(crate) fn blob(&self, index: u32) -> Result<&'a [u8]> {
        self.blobs.get(index as usize)
    }

    /// The module name.
    ///
    /// # Errors
    /// Fails if the `Module` table is empty or damaged.
    pub fn name(&self) -> Result<&'a str> {
        let module = self.tables.get::<ModuleRaw>(1)?;
        self.string(module.name)
    }

    /// The module version id.
    ///
    /// # Errors
    /// Fails if the `Module` table is empty or damaged.
    pub fn mvid(&self) -> Result<uguid::Guid> {
        let module = self.tables.get::<ModuleRaw>(1)?;
        self.guids.get(module.mvid as usize)
    }

    /// The assembly name, `None` for modules without a manifest.
    ///
    /// # Errors
    /// Fails if the `Assembly` row is damaged.
    pub fn assembly_name(&self) -> Result<Option<&'a str>> {
        if self.tables.row_count(TableId::Assembly) == 0 {
            return Ok(None);
        }

        let assembly = self.tables.get::<AssemblyRaw>(1)?;
        Ok(Some(self.string(assembly.name)?))
    }

    /// The assembly version as `major.minor.build.revision`.
    ///
    /// # Errors
    /// Fails if the `Assembly` row is damaged.
    pub fn assembly_version(&self) -> Result<Option<String>> {
        if self.tables.row_count(TableId::Assembly) == 0 {
            return Ok(None);
        }

        let assembly = self.tables.get::<AssemblyRaw>(1)?;
        Ok(Some(format!(
            "{}.{}.{}.{}",
            assembly.major_version,
            assembly.minor_version,
            assembly.build_number,
            assembly.revision_number
        )))
    }

    /// Entries of the `File` table.
    ///
    /// # Errors
    /// Fails if a row or its name can't be read.
    pub fn files(&self) -> Result<Vec<ModuleFile<'a>>> {
        self.tables
            .rows::<FileRaw>()
            .map(|row| {
                let row = row?;
                Ok(ModuleFile {
                    name: self.string(row.name)?,
                    has_metadata: row.flags & FILE_CONTAINS_NO_METADATA == 0,
                })
            })
            .collect()
    }

    /// The root of the namespace tree.
    #[must_use]
    pub fn namespace_root(&'a self) -> Namespace<'a> {
        Namespace::new(self, 0)
    }

    pub(crate) fn namespace_tree(&'a self) -> &'a NamespaceTree {
        self.namespaces.get_or_init(|| NamespaceTree::build(self))
    }

    /// All type definitions in row order, including nested types and `<Module>`.
    pub fn types(&'a self) -> impl Iterator<Item = TypeDefinition<'a>> + 'a {
        (1..=self.tables.row_count(TableId::TypeDef)).map(move |rid| TypeDefinition::new(self, rid))
    }

    /// The type definition in row `rid`.
    #[must_use]
    pub fn type_definition(&'a self, rid: u32) -> Option<TypeDefinition<'a>> {
        (rid >= 1 && rid <= self.tables.row_count(TableId::TypeDef))
            .then(|| TypeDefinition::new(self, rid))
    }

    /// All type references.
    pub fn type_references(&'a self) -> impl Iterator<Item = TypeReference<'a>> + 'a {
        (1..=self.tables.row_count(TableId::TypeRef)).map(move |rid| TypeReference::new(self, rid))
    }

    /// All member references.
    pub fn member_references(&'a self) -> impl Iterator<Item = MemberReference<'a>> + 'a {
        (1..=self.tables.row_count(TableId::MemberRef))
            .map(move |rid| MemberReference::new(self, rid))
    }

    /// All generic method instantiations.
    pub fn method_specifications(&'a self) -> impl Iterator<Item = MethodSpecification<'a>> + 'a {
        (1..=self.tables.row_count(TableId::MethodSpec))
            .map(move |rid| MethodSpecification::new(self, rid))
    }

    /// All assembly references.
    pub fn assembly_references(&'a self) -> impl Iterator<Item = AssemblyReference<'a>> + 'a {
        (1..=self.tables.row_count(TableId::AssemblyRef))
            .map(move |rid| AssemblyReference::new(self, rid))
    }

    /// Custom attributes applied to the assembly.
    #[must_use]
    pub fn assembly_custom_attributes(&'a self) -> Vec<CustomAttribute<'a>> {
        self.custom_attributes_of(Token::from_parts(TableId::Assembly, 1))
    }

    /// Custom attributes applied to the module.
    #[must_use]
    pub fn module_custom_attributes(&'a self) -> Vec<CustomAttribute<'a>> {
        self.custom_attributes_of(Token::from_parts(TableId::Module, 1))
    }

    /// The definition of a built-in type, if this module defines it (as a core library does).
    #[must_use]
    pub fn special_type(&'a self, code: PrimitiveTypeCode) -> Option<TypeDefinition<'a>> {
        let special = self.special_types.get_or_init(|| {
            let mut special = HashMap::new();
            for definition in self.types() {
                let (Ok("System"), Ok(name)) = (definition.namespace(), definition.name()) else {
                    continue;
                };
                if definition.containing_type().is_some() {
                    continue;
                }
                if let Some(code) = PrimitiveTypeCode::iter().find(|code| code.to_string() == name) {
                    special.insert(code, definition.rid());
                }
            }
            special
        });

        special.get(&code).map(|rid| TypeDefinition::new(self, *rid))
    }

    /// Custom attributes applied to the entity `parent`.
    #[must_use]
    pub fn custom_attributes_of(&'a self, parent: Token) -> Vec<CustomAttribute<'a>> {
        let index = self.attributes.get_or_init(|| {
            let mut index: HashMap<Token, Vec<u32>> = HashMap::new();
            for row in self.tables.rows::<CustomAttributeRaw>() {
                match row {
                    Ok(row) => index.entry(row.parent.token()).or_default().push(row.rid),
                    Err(error) => tracing::debug!("Skipping custom attribute row: {}", error),
                }
            }
            index
        });

        index
            .get(&parent)
            .map(|rids| rids.iter().map(|rid| CustomAttribute::new(self, *rid)).collect())
            .unwrap_or_default()
    }

    fn nesting(&self) -> &Nesting {
        self.nesting.get_or_init(|| {
            let mut nesting = Nesting::default();
            for row in self.tables.rows::<NestedClassRaw>().flatten() {
                nesting.enclosing.insert(row.nested_class, row.enclosing_class);
                nesting
                    .nested
                    .entry(row.enclosing_class)
                    .or_default()
                    .push(row.nested_class);
            }
            nesting
        })
    }

    pub(crate) fn enclosing_type(&self, type_rid: u32) -> Option<u32> {
        self.nesting().enclosing.get(&type_rid).copied()
    }

    pub(crate) fn nested_types(&self, type_rid: u32) -> &[u32] {
        self.nesting()
            .nested
            .get(&type_rid)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn interface_rows(&self, type_rid: u32) -> &[u32] {
        let index = self.interfaces.get_or_init(|| {
            let mut index: HashMap<u32, Vec<u32>> = HashMap::new();
            for row in self.tables.rows::<InterfaceImplRaw>().flatten() {
                index.entry(row.class).or_default().push(row.rid);
            }
            index
        });

        index.get(&type_rid).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn generic_parameters_of(&'a self, owner: Token) -> Vec<GenericParameter<'a>> {
        let index = self.generic_params.get_or_init(|| {
            let mut index: HashMap<Token, Vec<(u32, u32)>> = HashMap::new();
            for row in self.tables.rows::<GenericParamRaw>().flatten() {
                index
                    .entry(row.owner.token())
                    .or_default()
                    .push((row.number, row.rid));
            }
            index
                .into_iter()
                .map(|(owner, mut params)| {
                    params.sort_unstable();
                    (owner, params.into_iter().map(|(_, rid)| rid).collect())
                })
                .collect()
        });

        index
            .get(&owner)
            .map(|rids| rids.iter().map(|rid| GenericParameter::new(self, *rid)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn constraint_rows(&self, generic_param_rid: u32) -> &[u32] {
        let index = self.constraints.get_or_init(|| {
            let mut index: HashMap<u32, Vec<u32>> = HashMap::new();
            for row in self.tables.rows::<GenericParamConstraintRaw>().flatten() {
                index.entry(row.owner).or_default().push(row.rid);
            }
            index
        });

        index
            .get(&generic_param_rid)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn semantics_rows(&self, association: Token) -> &[u32] {
        let index = self.semantics.get_or_init(|| {
            let mut index: HashMap<Token, Vec<u32>> = HashMap::new();
            for row in self.tables.rows::<MethodSemanticsRaw>().flatten() {
                index
                    .entry(row.association.token())
                    .or_default()
                    .push(row.rid);
            }
            index
        });

        index.get(&association).map(Vec::as_slice).unwrap_or_default()
    }

    /// Map a list index through the indirection table `pointer`, if the module has one.
    pub(crate) fn resolve_indirection(&self, pointer: TableId, index: u32) -> Result<u32> {
        if self.tables.row_count(pointer) == 0 {
            return Ok(index);
        }

        self.tables.row(pointer, index)?.get(0)
    }

    /// The row range of a member list owned by row `rid` of `table`, before indirection.
    ///
    /// Lists run from the owner's list column up to the next owner's, or to the end of the
    /// listed table for the last owner.
    pub(crate) fn list_range(
        &self,
        table: TableId,
        rid: u32,
        column: usize,
        list: TableId,
        pointer: TableId,
    ) -> Result<Range<u32>> {
        let start = self.tables.row(table, rid)?.get(column)?;
        let end = if rid < self.tables.row_count(table) {
            self.tables.row(table, rid + 1)?.get(column)?
        } else {
            let listed = if self.tables.row_count(pointer) > 0 {
                self.tables.row_count(pointer)
            } else {
                self.tables.row_count(list)
            };
            listed + 1
        };

        Ok(start..end.max(start))
    }

    /// Resolved member rows of a list owned by row `rid` of `table`.
    pub(crate) fn list_members(
        &self,
        table: TableId,
        rid: u32,
        column: usize,
        list: TableId,
        pointer: TableId,
    ) -> Result<Vec<u32>> {
        let range = self.list_range(table, rid, column, list, pointer)?;
        let mut members = Vec::with_capacity(range.len());
        for index in range {
            let member = self.resolve_indirection(pointer, index)?;
            if member == 0 || member > self.tables.row_count(list) {
                return Err(malformed_error!(
                    "{} list of {} row {} points to missing row {}",
                    list,
                    table,
                    rid,
                    member
                ));
            }
            members.push(member);
        }
        Ok(members)
    }

    fn map_ranges(&self, map: TableId, list: TableId, pointer: TableId) -> HashMap<u32, Range<u32>> {
        let mut ranges = HashMap::new();
        for rid in 1..=self.tables.row_count(map) {
            let (Ok(row), Ok(range)) = (
                self.tables.row(map, rid),
                self.list_range(map, rid, 1, list, pointer),
            ) else {
                continue;
            };
            if let Ok(parent) = row.get(0) {
                ranges.insert(parent, range);
            }
        }
        ranges
    }

    pub(crate) fn property_rows(&self, type_rid: u32) -> Result<Vec<u32>> {
        let ranges = self.property_ranges.get_or_init(|| {
            self.map_ranges(TableId::PropertyMap, TableId::Property, TableId::PropertyPtr)
        });

        let Some(range) = ranges.get(&type_rid) else {
            return Ok(Vec::new());
        };
        range
            .clone()
            .map(|index| self.resolve_indirection(TableId::PropertyPtr, index))
            .collect()
    }

    pub(crate) fn event_rows(&self, type_rid: u32) -> Result<Vec<u32>> {
        let ranges = self.event_ranges.get_or_init(|| {
            self.map_ranges(TableId::EventMap, TableId::Event, TableId::EventPtr)
        });

        let Some(range) = ranges.get(&type_rid) else {
            return Ok(Vec::new());
        };
        range
            .clone()
            .map(|index| self.resolve_indirection(TableId::EventPtr, index))
            .collect()
    }

    fn owners(&self) -> &MemberOwners {
        self.owners.get_or_init(|| {
            let mut owners = MemberOwners::default();
            for type_rid in 1..=self.tables.row_count(TableId::TypeDef) {
                if let Ok(fields) =
                    self.list_members(TableId::TypeDef, type_rid, 4, TableId::Field, TableId::FieldPtr)
                {
                    owners.fields.extend(fields.into_iter().map(|rid| (rid, type_rid)));
                }
                if let Ok(methods) = self.list_members(
                    TableId::TypeDef,
                    type_rid,
                    5,
                    TableId::MethodDef,
                    TableId::MethodPtr,
                ) {
                    owners.methods.extend(methods.into_iter().map(|rid| (rid, type_rid)));
                }
            }

            for row in self.tables.rows::<PropertyMapRaw>().flatten() {
                if let Ok(properties) = self.property_rows(row.parent) {
                    owners
                        .properties
                        .extend(properties.into_iter().map(|rid| (rid, row.parent)));
                }
            }
            for row in self.tables.rows::<EventMapRaw>().flatten() {
                if let Ok(events) = self.event_rows(row.parent) {
                    owners.events.extend(events.into_iter().map(|rid| (rid, row.parent)));
                }
            }
            owners
        })
    }

    pub(crate) fn field_owner(&self, field_rid: u32) -> Option<u32> {
        self.owners().fields.get(&field_rid).copied()
    }

    pub(crate) fn method_owner(&self, method_rid: u32) -> Option<u32> {
        self.owners().methods.get(&method_rid).copied()
    }

    pub(crate) fn property_owner(&self, property_rid: u32) -> Option<u32> {
        self.owners().properties.get(&property_rid).copied()
    }

    pub(crate) fn event_owner(&self, event_rid: u32) -> Option<u32> {
        self.owners().events.get(&event_rid).copied()
    }

    pub(crate) fn method_definition(&'a self, rid: u32) -> Result<MethodDefinition<'a>> {
        if rid == 0 || rid > self.tables.row_count(TableId::MethodDef) {
            return Err(out_of_bounds_error!());
        }
        Ok(MethodDefinition::new(self, rid))
    }

    pub(crate) fn field_definition(&'a self, rid: u32) -> Result<FieldDefinition<'a>> {
        if rid == 0 || rid > self.tables.row_count(TableId::Field) {
            return Err(out_of_bounds_error!());
        }
        Ok(FieldDefinition::new(self, rid))
    }

    pub(crate) fn property_definition(&'a self, rid: u32) -> PropertyDefinition<'a> {
        PropertyDefinition::new(self, rid)
    }

    pub(crate) fn event_definition(&'a self, rid: u32) -> EventDefinition<'a> {
        EventDefinition::new(self, rid)
    }

    pub(crate) fn type_def_row(&self, rid: u32) -> Result<TypeDefRaw> {
        self.tables.get::<TypeDefRaw>(rid)
    }
}
