//! Random access to a written catalog.
//!
//! [`ApiCatalog`] validates the header, decompresses the body once and then hands out `Copy`
//! views addressing rows by handle. Every read is bounds checked; a damaged catalog surfaces
//! as [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] from the accessor that hit
//! the damage.

use std::{
    collections::HashMap,
    fmt,
    io::Read,
    ops::Range,
    path::Path,
    sync::OnceLock,
};

use strum::{EnumCount, IntoEnumIterator};
use uguid::Guid;

use crate::{
    catalog::format::{
        ApiKind, CatalogTable, SyntaxTokenKind, CATALOG_MAGIC, FORMAT_VERSION, HEADER_SIZE, NIL,
    },
    file::{
        io::{read_le, CilIO},
        parser::Parser,
        Backend, Physical,
    },
    Error::{Empty, NotSupported},
    Result,
};

const BROTLI_BUFFER_SIZE: usize = 4096;

fn field<T: CilIO>(row: &[u8], offset: usize) -> Result<T> {
    match row.get(offset..) {
        Some(data) => read_le(data),
        None => Err(out_of_bounds_error!()),
    }
}

fn guid_field(row: &[u8], offset: usize) -> Result<Guid> {
    let Some(bytes) = row.get(offset..offset + 16) else {
        return Err(out_of_bounds_error!());
    };

    let mut buffer = [0_u8; 16];
    buffer.copy_from_slice(bytes);
    Ok(Guid::from_bytes(buffer))
}

fn to_handle(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| out_of_bounds_error!())
}

macro_rules! catalog_view {
    ($(#[$meta:meta])* $name:ident($table:ident)) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name<'a> {
            catalog: &'a ApiCatalog,
            handle: i32,
        }

        impl<'a> $name<'a> {
            fn new(catalog: &'a ApiCatalog, handle: i32) -> $name<'a> {
                $name { catalog, handle }
            }

            /// The row index in its table.
            #[must_use]
            pub fn handle(&self) -> i32 {
                self.handle
            }

            fn row(&self) -> Result<&'a [u8]> {
                self.catalog.row(CatalogTable::$table, self.handle)
            }
        }

        impl PartialEq for $name<'_> {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(self.catalog, other.catalog) && self.handle == other.handle
            }
        }

        impl Eq for $name<'_> {}

        impl std::hash::Hash for $name<'_> {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.handle.hash(state);
            }
        }

        impl fmt::Debug for $name<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.handle)
            }
        }
    };
}

/// Row and heap sizes of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogStatistics {
    /// Size of the file
    pub size_compressed: usize,
    /// Size of the decompressed body
    pub size_uncompressed: usize,
    /// Bytes in the string heap
    pub string_heap_size: usize,
    /// Bytes in the blob heap
    pub blob_heap_size: usize,
    /// Platform rows
    pub platforms: usize,
    /// Framework rows
    pub frameworks: usize,
    /// Package rows
    pub packages: usize,
    /// Assembly rows
    pub assemblies: usize,
    /// Usage source rows
    pub usage_sources: usize,
    /// API rows
    pub apis: usize,
    /// Root API rows
    pub root_apis: usize,
    /// Extension method rows
    pub extension_methods: usize,
    /// Obsoletion rows
    pub obsoletions: usize,
    /// Platform support rows
    pub platform_supports: usize,
    /// Preview requirement rows
    pub preview_requirements: usize,
    /// Experimental rows
    pub experimentals: usize,
}

impl fmt::Display for CatalogStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Size on disk       : {:>12} bytes", self.size_compressed)?;
        writeln!(f, "Size in memory     : {:>12} bytes", self.size_uncompressed)?;
        writeln!(f, "String heap        : {:>12} bytes", self.string_heap_size)?;
        writeln!(f, "Blob heap          : {:>12} bytes", self.blob_heap_size)?;
        writeln!(f, "Platforms          : {:>12}", self.platforms)?;
        writeln!(f, "Frameworks         : {:>12}", self.frameworks)?;
        writeln!(f, "Packages           : {:>12}", self.packages)?;
        writeln!(f, "Assemblies         : {:>12}", self.assemblies)?;
        writeln!(f, "Usage sources      : {:>12}", self.usage_sources)?;
        writeln!(f, "APIs               : {:>12}", self.apis)?;
        writeln!(f, "Root APIs          : {:>12}", self.root_apis)?;
        writeln!(f, "Extension methods  : {:>12}", self.extension_methods)?;
        writeln!(f, "Obsoletions        : {:>12}", self.obsoletions)?;
        writeln!(f, "Platform supports  : {:>12}", self.platform_supports)?;
        writeln!(f, "Preview requirements: {:>11}", self.preview_requirements)?;
        write!(f, "Experimentals      : {:>12}", self.experimentals)
    }
}

/// A loaded catalog.
///
/// # Examples
///
/// ```rust,no_run
/// use apiscope::catalog::ApiCatalog;
/// use std::path::Path;
///
/// let catalog = ApiCatalog::open(Path::new("apicatalog.dat"))?;
/// for root in catalog.root_apis()? {
///     println!("{} ({})", root.name()?, root.kind()?);
///     for declaration in root.declarations()? {
///         println!("  {}: {}", declaration.assembly().name()?, declaration.text()?);
///     }
/// }
/// # Ok::<(), apiscope::Error>(())
/// ```
pub struct ApiCatalog {
    size: usize,
    body: Vec<u8>,
    ranges: Vec<Range<usize>>,
    fingerprints: OnceLock<HashMap<Guid, i32>>,
}

impl ApiCatalog {
    /// Read a catalog from the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can't be read, and everything
    /// [`ApiCatalog::from_bytes`] returns.
    pub fn open(path: &Path) -> Result<ApiCatalog> {
        let input = Physical::new(path)?;
        Self::from_bytes(input.data())
    }

    /// Read a catalog from `reader`.
    ///
    /// # Errors
    /// See [`ApiCatalog::from_bytes`].
    pub fn load<R: Read>(mut reader: R) -> Result<ApiCatalog> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Read a catalog from `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for empty input, [`crate::Error::NotSupported`] for
    /// other format versions and [`crate::Error::Malformed`] for anything that isn't a valid
    /// catalog.
    pub fn from_bytes(data: &[u8]) -> Result<ApiCatalog> {
        if data.is_empty() {
            return Err(Empty);
        }
        if data.len() < HEADER_SIZE {
            return Err(malformed_error!("catalog is too small for its header"));
        }

        let mut parser = Parser::new(data);
        let magic = parser.read_le::<u32>()?;
        if magic != CATALOG_MAGIC {
            return Err(malformed_error!("not a catalog, magic is {:#010x}", magic));
        }
        let version = parser.read_le::<u32>()?;
        if version != FORMAT_VERSION {
            return Err(NotSupported);
        }
        let count = parser.read_le::<i32>()?;
        if usize::try_from(count).ok() != Some(CatalogTable::COUNT) {
            return Err(malformed_error!("catalog declares {} tables", count));
        }

        let mut ranges = Vec::with_capacity(CatalogTable::COUNT);
        let mut end = 0_usize;
        for table in CatalogTable::iter() {
            let length = parser.read_le::<i32>()?;
            let Ok(length) = usize::try_from(length) else {
                return Err(malformed_error!("{} has negative length {}", table, length));
            };
            if let Some(size) = table.row_size() {
                if length % size != 0 {
                    return Err(malformed_error!(
                        "{} length {} is not a multiple of its row size {}",
                        table,
                        length,
                        size
                    ));
                }
            }

            let start = end;
            end = start
                .checked_add(length)
                .ok_or_else(|| malformed_error!("catalog table lengths overflow"))?;
            ranges.push(start..end);
        }

        // The declared size is unchecked until the body is decompressed
        let mut body = Vec::new();
        brotli::Decompressor::new(&data[HEADER_SIZE..], BROTLI_BUFFER_SIZE)
            .take(end as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|error| malformed_error!("catalog body can't be decompressed - {}", error))?;
        if body.len() != end {
            return Err(malformed_error!(
                "catalog body has {} bytes, header declares {}",
                body.len(),
                end
            ));
        }

        tracing::debug!("loaded catalog, {} bytes decompressed to {}", data.len(), end);
        Ok(ApiCatalog {
            size: data.len(),
            body,
            ranges,
            fingerprints: OnceLock::new(),
        })
    }

    fn table(&self, table: CatalogTable) -> &[u8] {
        &self.body[self.ranges[table as usize].clone()]
    }

    fn row_count(&self, table: CatalogTable) -> usize {
        table
            .row_size()
            .map_or(0, |size| self.table(table).len() / size)
    }

    fn row(&self, table: CatalogTable, handle: i32) -> Result<&[u8]> {
        let Some(size) = table.row_size() else {
            return Err(malformed_error!("{} has no rows", table));
        };
        let Ok(index) = usize::try_from(handle) else {
            return Err(out_of_bounds_error!());
        };

        let Some(start) = index.checked_mul(size) else {
            return Err(out_of_bounds_error!());
        };
        self.table(table)
            .get(start..start.saturating_add(size))
            .ok_or_else(|| out_of_bounds_error!())
    }

    fn string(&self, offset: i32) -> Result<&str> {
        let Ok(offset) = usize::try_from(offset) else {
            return Err(out_of_bounds_error!());
        };

        let mut parser = Parser::new(self.table(CatalogTable::StringHeap));
        parser.seek(offset)?;
        let length = parser.read_le::<i32>()?;
        let Ok(length) = usize::try_from(length) else {
            return Err(malformed_error!("string at {} has negative length", offset));
        };

        std::str::from_utf8(parser.read_bytes(length)?)
            .map_err(|_| malformed_error!("string at {} is not UTF-8", offset))
    }

    fn optional_string(&self, offset: i32) -> Result<Option<&str>> {
        if offset == NIL {
            return Ok(None);
        }
        self.string(offset).map(Some)
    }

    /// The entry count of the list at `offset`, and a parser positioned on its first entry.
    fn list(&self, offset: i32) -> Result<(usize, Parser<'_>)> {
        if offset == NIL {
            return Ok((0, Parser::new(&[])));
        }
        let Ok(offset) = usize::try_from(offset) else {
            return Err(out_of_bounds_error!());
        };

        let mut parser = Parser::new(self.table(CatalogTable::BlobHeap));
        parser.seek(offset)?;
        let count = parser.read_le::<i32>()?;
        match usize::try_from(count) {
            Ok(count) if count <= parser.remaining() => Ok((count, parser)),
            _ => Err(malformed_error!("list at {} has invalid count {}", offset, count)),
        }
    }

    /// A list of handles.
    fn handles(&self, offset: i32) -> Result<Vec<i32>> {
        let (count, mut parser) = self.list(offset)?;
        (0..count).map(|_| parser.read_le::<i32>()).collect()
    }

    fn optional_api(&self, handle: i32) -> Result<Option<ApiView<'_>>> {
        if handle == NIL {
            return Ok(None);
        }
        self.api(handle).map(Some)
    }

    /// Binary search the annotation table `table` for the row of (`assembly`, `api`).
    fn annotation(&self, table: CatalogTable, assembly: i32, api: i32) -> Result<Option<&[u8]>> {
        let (mut low, mut high) = (0, self.row_count(table));
        while low < high {
            let middle = low + (high - low) / 2;
            let row = self.row(table, to_handle(middle)?)?;
            let key = (field::<i32>(row, 4)?, field::<i32>(row, 0)?);
            match key.cmp(&(assembly, api)) {
                std::cmp::Ordering::Less => low = middle + 1,
                std::cmp::Ordering::Greater => high = middle,
                std::cmp::Ordering::Equal => return Ok(Some(row)),
            }
        }
        Ok(None)
    }

    fn obsoletion(&self, assembly: i32, api: i32) -> Result<Option<Obsoletion<'_>>> {
        let Some(row) = self.annotation(CatalogTable::Obsoletion, assembly, api)? else {
            return Ok(None);
        };

        Ok(Some(Obsoletion {
            message: self.optional_string(field(row, 8)?)?,
            is_error: field::<u8>(row, 12)? != 0,
            diagnostic_id: self.optional_string(field(row, 13)?)?,
            url_format: self.optional_string(field(row, 17)?)?,
        }))
    }

    fn platform_support(&self, assembly: i32, api: i32) -> Result<Vec<PlatformSupport<'_>>> {
        let Some(row) = self.annotation(CatalogTable::PlatformSupport, assembly, api)? else {
            return Ok(Vec::new());
        };

        let (count, mut parser) = self.list(field(row, 8)?)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let platform = parser.read_le::<i32>()?;
            let is_supported = parser.read_le::<u8>()? != 0;
            entries.push(PlatformSupport {
                platform: self.platform(platform)?.name()?,
                is_supported,
            });
        }
        Ok(entries)
    }

    fn preview_requirement(&self, assembly: i32, api: i32) -> Result<Option<PreviewRequirement<'_>>> {
        let Some(row) = self.annotation(CatalogTable::PreviewRequirement, assembly, api)? else {
            return Ok(None);
        };

        Ok(Some(PreviewRequirement {
            message: self.optional_string(field(row, 8)?)?,
            url: self.optional_string(field(row, 12)?)?,
        }))
    }

    fn experimental(&self, assembly: i32, api: i32) -> Result<Option<Experimental<'_>>> {
        let Some(row) = self.annotation(CatalogTable::Experimental, assembly, api)? else {
            return Ok(None);
        };

        Ok(Some(Experimental {
            diagnostic_id: self.optional_string(field(row, 8)?)?,
            url_format: self.optional_string(field(row, 12)?)?,
        }))
    }

    fn views<'a, T: 'a>(
        &'a self,
        table: CatalogTable,
        new: fn(&'a ApiCatalog, i32) -> T,
    ) -> impl Iterator<Item = T> + 'a {
        (0..self.row_count(table))
            .filter_map(|index| i32::try_from(index).ok())
            .map(move |handle| new(self, handle))
    }

    fn view<'a, T>(
        &'a self,
        table: CatalogTable,
        handle: i32,
        new: fn(&'a ApiCatalog, i32) -> T,
    ) -> Result<T> {
        match usize::try_from(handle) {
            Ok(index) if index < self.row_count(table) => Ok(new(self, handle)),
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// The API with `handle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there is no such API.
    pub fn api(&self, handle: i32) -> Result<ApiView<'_>> {
        self.view(CatalogTable::Api, handle, ApiView::new)
    }

    /// Every API, parents before their children.
    pub fn apis(&self) -> impl Iterator<Item = ApiView<'_>> {
        self.views(CatalogTable::Api, ApiView::new)
    }

    /// APIs without a parent, in definition order.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn root_apis(&self) -> Result<Vec<ApiView<'_>>> {
        (0..self.row_count(CatalogTable::RootApi))
            .map(|index| {
                let row = self.row(CatalogTable::RootApi, to_handle(index)?)?;
                self.api(field(row, 0)?)
            })
            .collect()
    }

    /// The API with `fingerprint`.
    ///
    /// The fingerprint index is built on first use.
    #[must_use]
    pub fn api_by_fingerprint(&self, fingerprint: &Guid) -> Option<ApiView<'_>> {
        let index = self.fingerprints.get_or_init(|| {
            self.apis()
                .filter_map(|api| Some((api.fingerprint().ok()?, api.handle())))
                .collect()
        });
        index
            .get(fingerprint)
            .map(|&handle| ApiView::new(self, handle))
    }

    /// The assembly with `handle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there is no such assembly.
    pub fn assembly(&self, handle: i32) -> Result<AssemblyView<'_>> {
        self.view(CatalogTable::Assembly, handle, AssemblyView::new)
    }

    /// Every assembly, in indexing order.
    pub fn assemblies(&self) -> impl Iterator<Item = AssemblyView<'_>> {
        self.views(CatalogTable::Assembly, AssemblyView::new)
    }

    /// The assembly with `fingerprint`.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn assembly_by_fingerprint(&self, fingerprint: &Guid) -> Result<Option<AssemblyView<'_>>> {
        for assembly in self.assemblies() {
            if assembly.fingerprint()? == *fingerprint {
                return Ok(Some(assembly));
            }
        }
        Ok(None)
    }

    /// The framework with `handle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there is no such framework.
    pub fn framework(&self, handle: i32) -> Result<FrameworkView<'_>> {
        self.view(CatalogTable::Framework, handle, FrameworkView::new)
    }

    /// Every framework.
    pub fn frameworks(&self) -> impl Iterator<Item = FrameworkView<'_>> {
        self.views(CatalogTable::Framework, FrameworkView::new)
    }

    /// The framework called `name`.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn framework_by_name(&self, name: &str) -> Result<Option<FrameworkView<'_>>> {
        for framework in self.frameworks() {
            if framework.name()? == name {
                return Ok(Some(framework));
            }
        }
        Ok(None)
    }

    /// The package with `handle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there is no such package.
    pub fn package(&self, handle: i32) -> Result<PackageView<'_>> {
        self.view(CatalogTable::Package, handle, PackageView::new)
    }

    /// Every package.
    pub fn packages(&self) -> impl Iterator<Item = PackageView<'_>> {
        self.views(CatalogTable::Package, PackageView::new)
    }

    /// The platform with `handle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there is no such platform.
    pub fn platform(&self, handle: i32) -> Result<PlatformView<'_>> {
        self.view(CatalogTable::Platform, handle, PlatformView::new)
    }

    /// Every platform, sorted by name.
    pub fn platforms(&self) -> impl Iterator<Item = PlatformView<'_>> {
        self.views(CatalogTable::Platform, PlatformView::new)
    }

    /// The usage source with `handle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there is no such usage source.
    pub fn usage_source(&self, handle: i32) -> Result<UsageSourceView<'_>> {
        self.view(CatalogTable::UsageSource, handle, UsageSourceView::new)
    }

    /// Every usage source.
    pub fn usage_sources(&self) -> impl Iterator<Item = UsageSourceView<'_>> {
        self.views(CatalogTable::UsageSource, UsageSourceView::new)
    }

    /// Every extension method.
    pub fn extension_methods(&self) -> impl Iterator<Item = ExtensionMethodView<'_>> {
        self.views(CatalogTable::ExtensionMethod, ExtensionMethodView::new)
    }

    /// Sizes and row counts.
    #[must_use]
    pub fn statistics(&self) -> CatalogStatistics {
        CatalogStatistics {
            size_compressed: self.size,
            size_uncompressed: self.body.len(),
            string_heap_size: self.table(CatalogTable::StringHeap).len(),
            blob_heap_size: self.table(CatalogTable::BlobHeap).len(),
            platforms: self.row_count(CatalogTable::Platform),
            frameworks: self.row_count(CatalogTable::Framework),
            packages: self.row_count(CatalogTable::Package),
            assemblies: self.row_count(CatalogTable::Assembly),
            usage_sources: self.row_count(CatalogTable::UsageSource),
            apis: self.row_count(CatalogTable::Api),
            root_apis: self.row_count(CatalogTable::RootApi),
            extension_methods: self.row_count(CatalogTable::ExtensionMethod),
            obsoletions: self.row_count(CatalogTable::Obsoletion),
            platform_supports: self.row_count(CatalogTable::PlatformSupport),
            preview_requirements: self.row_count(CatalogTable::PreviewRequirement),
            experimentals: self.row_count(CatalogTable::Experimental),
        }
    }
}

/// Obsoletion of an API or assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obsoletion<'a> {
    /// Text shown at use sites
    pub message: Option<&'a str>,
    /// Whether use is a compile error
    pub is_error: bool,
    /// Diagnostic id reported at use sites
    pub diagnostic_id: Option<&'a str>,
    /// Documentation link, `{0}` is the diagnostic id
    pub url_format: Option<&'a str>,
}

/// Support for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformSupport<'a> {
    /// Platform name
    pub platform: &'a str,
    /// `false` if the platform is explicitly unsupported
    pub is_supported: bool,
}

/// Requirement to opt into preview features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewRequirement<'a> {
    /// Text shown at use sites
    pub message: Option<&'a str>,
    /// Documentation link
    pub url: Option<&'a str>,
}

/// Marker of experimental APIs and assemblies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Experimental<'a> {
    /// Diagnostic id reported at use sites
    pub diagnostic_id: Option<&'a str>,
    /// Documentation link, `{0}` is the diagnostic id
    pub url_format: Option<&'a str>,
}

/// One piece of declaration syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxToken<'a> {
    /// What the text is
    pub kind: SyntaxTokenKind,
    /// The text itself
    pub text: &'a str,
    /// The cataloged API a reference points at
    pub reference: Option<ApiView<'a>>,
}

catalog_view! {
    /// A namespace, type or member.
    ApiView(Api)
}

impl<'a> ApiView<'a> {
    /// The fingerprint.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn fingerprint(&self) -> Result<Guid> {
        guid_field(self.row()?, 0)
    }

    /// What the API is.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn kind(&self) -> Result<ApiKind> {
        let kind = field::<u8>(self.row()?, 16)?;
        ApiKind::from_repr(kind).ok_or_else(|| malformed_error!("invalid API kind {}", kind))
    }

    /// The containing API.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn parent(&self) -> Result<Option<ApiView<'a>>> {
        self.catalog.optional_api(field(self.row()?, 17)?)
    }

    /// The name.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn name(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 21)?)
    }

    /// The name qualified with the names of all ancestors.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn full_name(&self) -> Result<String> {
        let mut names = vec![self.name()?];
        let mut current = self.parent()?;
        while let Some(api) = current {
            names.push(api.name()?);
            current = api.parent()?;
        }
        names.reverse();
        Ok(names.join("."))
    }

    /// Contained APIs.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn children(&self) -> Result<Vec<ApiView<'a>>> {
        self.catalog
            .handles(field(self.row()?, 25)?)?
            .into_iter()
            .map(|handle| self.catalog.api(handle))
            .collect()
    }

    /// The declarations of this API, one per declaring assembly.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn declarations(&self) -> Result<Vec<DeclarationView<'a>>> {
        let (count, mut parser) = self.catalog.list(field(self.row()?, 29)?)?;
        let mut declarations = Vec::with_capacity(count);
        for _ in 0..count {
            let assembly = self.catalog.assembly(parser.read_le::<i32>()?)?;
            let syntax = parser.read_le::<i32>()?;
            declarations.push(DeclarationView {
                api: *self,
                assembly,
                syntax,
            });
        }
        Ok(declarations)
    }

    /// The declaration in `assembly`.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn declaration_in(&self, assembly: AssemblyView<'_>) -> Result<Option<DeclarationView<'a>>> {
        Ok(self
            .declarations()?
            .into_iter()
            .find(|declaration| declaration.assembly.handle == assembly.handle))
    }

    /// The share of files referencing this API, per usage source.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn usages(&self) -> Result<Vec<(UsageSourceView<'a>, f32)>> {
        let (count, mut parser) = self.catalog.list(field(self.row()?, 33)?)?;
        let mut usages = Vec::with_capacity(count);
        for _ in 0..count {
            let source = self.catalog.usage_source(parser.read_le::<i32>()?)?;
            usages.push((source, parser.read_le::<f32>()?));
        }
        Ok(usages)
    }

    /// Frameworks shipping an assembly that declares this API.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn frameworks(&self) -> Result<Vec<FrameworkView<'a>>> {
        let mut frameworks = Vec::new();
        for declaration in self.declarations()? {
            for framework in declaration.assembly().frameworks()? {
                if !frameworks.contains(&framework) {
                    frameworks.push(framework);
                }
            }
        }
        Ok(frameworks)
    }
}

/// The syntax of an API in one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclarationView<'a> {
    api: ApiView<'a>,
    assembly: AssemblyView<'a>,
    syntax: i32,
}

impl<'a> DeclarationView<'a> {
    /// The declared API.
    #[must_use]
    pub fn api(&self) -> ApiView<'a> {
        self.api
    }

    /// The declaring assembly.
    #[must_use]
    pub fn assembly(&self) -> AssemblyView<'a> {
        self.assembly
    }

    /// The declaration syntax.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn syntax(&self) -> Result<Vec<SyntaxToken<'a>>> {
        let catalog = self.api.catalog;
        let (count, mut parser) = catalog.list(self.syntax)?;
        let mut tokens = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = parser.read_le::<u8>()?;
            let kind = SyntaxTokenKind::from_repr(kind)
                .ok_or_else(|| malformed_error!("invalid syntax token kind {}", kind))?;
            let text = catalog.string(parser.read_le::<i32>()?)?;
            let reference = catalog.optional_api(parser.read_le::<i32>()?)?;
            tokens.push(SyntaxToken {
                kind,
                text,
                reference,
            });
        }
        Ok(tokens)
    }

    /// The declaration syntax as plain text.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn text(&self) -> Result<String> {
        Ok(self.syntax()?.iter().map(|token| token.text).collect())
    }

    /// Obsoletion of this declaration.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn obsoletion(&self) -> Result<Option<Obsoletion<'a>>> {
        self.api
            .catalog
            .obsoletion(self.assembly.handle, self.api.handle)
    }

    /// Platform support of this declaration.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn platform_support(&self) -> Result<Vec<PlatformSupport<'a>>> {
        self.api
            .catalog
            .platform_support(self.assembly.handle, self.api.handle)
    }

    /// Preview requirement of this declaration.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn preview_requirement(&self) -> Result<Option<PreviewRequirement<'a>>> {
        self.api
            .catalog
            .preview_requirement(self.assembly.handle, self.api.handle)
    }

    /// Experimental marker of this declaration.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn experimental(&self) -> Result<Option<Experimental<'a>>> {
        self.api
            .catalog
            .experimental(self.assembly.handle, self.api.handle)
    }
}

catalog_view! {
    /// An indexed assembly.
    AssemblyView(Assembly)
}

impl<'a> AssemblyView<'a> {
    /// The fingerprint.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn fingerprint(&self) -> Result<Guid> {
        guid_field(self.row()?, 0)
    }

    /// The simple name.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn name(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 16)?)
    }

    /// The public key token, empty for unsigned assemblies.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn public_key_token(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 20)?)
    }

    /// The version.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn version(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 24)?)
    }

    /// Top level ancestors of the APIs this assembly declares.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn root_apis(&self) -> Result<Vec<ApiView<'a>>> {
        self.catalog
            .handles(field(self.row()?, 28)?)?
            .into_iter()
            .map(|handle| self.catalog.api(handle))
            .collect()
    }

    /// Frameworks shipping this assembly.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn frameworks(&self) -> Result<Vec<FrameworkView<'a>>> {
        self.catalog
            .handles(field(self.row()?, 32)?)?
            .into_iter()
            .map(|handle| self.catalog.framework(handle))
            .collect()
    }

    /// Packages shipping this assembly.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn packages(&self) -> Result<Vec<PackageView<'a>>> {
        self.catalog
            .handles(field(self.row()?, 36)?)?
            .into_iter()
            .map(|handle| self.catalog.package(handle))
            .collect()
    }

    /// Every declaration in this assembly, parents before their children.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn declarations(&self) -> Result<Vec<DeclarationView<'a>>> {
        let mut declarations = Vec::new();
        let mut stack = self.root_apis()?;
        stack.reverse();

        while let Some(api) = stack.pop() {
            let declaration = api.declaration_in(*self)?;
            // Types and members only contain APIs declared in the same assembly.
            if declaration.is_none() && api.kind()? != ApiKind::Namespace {
                continue;
            }
            if let Some(declaration) = declaration {
                declarations.push(declaration);
            }

            let mut children = api.children()?;
            children.reverse();
            stack.extend(children);
        }
        Ok(declarations)
    }

    /// Assembly level obsoletion.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn obsoletion(&self) -> Result<Option<Obsoletion<'a>>> {
        self.catalog.obsoletion(self.handle, NIL)
    }

    /// Assembly level platform support.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn platform_support(&self) -> Result<Vec<PlatformSupport<'a>>> {
        self.catalog.platform_support(self.handle, NIL)
    }

    /// Assembly level preview requirement.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn preview_requirement(&self) -> Result<Option<PreviewRequirement<'a>>> {
        self.catalog.preview_requirement(self.handle, NIL)
    }

    /// Assembly level experimental marker.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn experimental(&self) -> Result<Option<Experimental<'a>>> {
        self.catalog.experimental(self.handle, NIL)
    }
}

/// An assembly as part of a framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkAssembly<'a> {
    /// The assembly
    pub assembly: AssemblyView<'a>,
    /// Targeting pack the assembly comes from
    pub pack: Option<&'a str>,
    /// Profiles the assembly is part of
    pub profiles: Vec<&'a str>,
}

catalog_view! {
    /// A framework such as `net9.0`.
    FrameworkView(Framework)
}

impl<'a> FrameworkView<'a> {
    /// The target framework moniker.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn name(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 0)?)
    }

    /// Assemblies of this framework.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn assemblies(&self) -> Result<Vec<FrameworkAssembly<'a>>> {
        let (count, mut parser) = self.catalog.list(field(self.row()?, 4)?)?;
        let mut assemblies = Vec::with_capacity(count);
        for _ in 0..count {
            let assembly = self.catalog.assembly(parser.read_le::<i32>()?)?;
            let pack = self.catalog.optional_string(parser.read_le::<i32>()?)?;

            let profile_count = parser.read_le::<i32>()?;
            let Ok(profile_count) = usize::try_from(profile_count) else {
                return Err(malformed_error!("negative profile count {}", profile_count));
            };
            let mut profiles = Vec::with_capacity(profile_count.min(parser.remaining() / 4));
            for _ in 0..profile_count {
                profiles.push(self.catalog.string(parser.read_le::<i32>()?)?);
            }

            assemblies.push(FrameworkAssembly {
                assembly,
                pack,
                profiles,
            });
        }
        Ok(assemblies)
    }
}

catalog_view! {
    /// A package version.
    PackageView(Package)
}

impl<'a> PackageView<'a> {
    /// The fingerprint.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn fingerprint(&self) -> Result<Guid> {
        guid_field(self.row()?, 0)
    }

    /// The package id.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn name(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 16)?)
    }

    /// The package version.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn version(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 20)?)
    }

    /// Assemblies of this package and the framework they target.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn assemblies(&self) -> Result<Vec<(FrameworkView<'a>, AssemblyView<'a>)>> {
        let (count, mut parser) = self.catalog.list(field(self.row()?, 24)?)?;
        let mut assemblies = Vec::with_capacity(count);
        for _ in 0..count {
            let framework = self.catalog.framework(parser.read_le::<i32>()?)?;
            let assembly = self.catalog.assembly(parser.read_le::<i32>()?)?;
            assemblies.push((framework, assembly));
        }
        Ok(assemblies)
    }
}

catalog_view! {
    /// A platform named by platform support annotations.
    PlatformView(Platform)
}

impl<'a> PlatformView<'a> {
    /// The platform name.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn name(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 0)?)
    }
}

catalog_view! {
    /// A source of usage data.
    UsageSourceView(UsageSource)
}

impl<'a> UsageSourceView<'a> {
    /// The name.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn name(&self) -> Result<&'a str> {
        self.catalog.string(field(self.row()?, 0)?)
    }

    /// When the usage data was collected.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn date(&self) -> Result<chrono::NaiveDate> {
        let days = field::<i32>(self.row()?, 4)?;
        chrono::NaiveDate::from_num_days_from_ce_opt(days)
            .ok_or_else(|| malformed_error!("invalid usage source date {}", days))
    }
}

catalog_view! {
    /// An extension method.
    ExtensionMethodView(ExtensionMethod)
}

impl<'a> ExtensionMethodView<'a> {
    /// The fingerprint.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn fingerprint(&self) -> Result<Guid> {
        guid_field(self.row()?, 0)
    }

    /// The extended type.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn extended_type(&self) -> Result<ApiView<'a>> {
        self.catalog.api(field(self.row()?, 16)?)
    }

    /// The extension method itself.
    ///
    /// # Errors
    /// Fails if the catalog is damaged.
    pub fn extension_method(&self) -> Result<ApiView<'a>> {
        self.catalog.api(field(self.row()?, 20)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{CatalogBuilder, CatalogWriter},
        file::io::append_le,
        Error,
    };

    const ASSEMBLY: &str = "aaaaaaaa-0000-0000-0000-000000000001";

    fn catalog() -> ApiCatalog {
        let mut builder = CatalogBuilder::new();
        builder
            .index_str(&format!(
                r#"<assembly fingerprint="{ASSEMBLY}" name="System.Runtime" publicKeyToken="b03f5f7f11d50a3a" version="9.0.0.0">
  <api fingerprint="00000000-0000-0000-0000-00000000000a" kind="Namespace" name="System" />
  <api fingerprint="00000000-0000-0000-0000-00000000000b" kind="Class" parent="00000000-0000-0000-0000-00000000000a" name="Object" />
  <api fingerprint="00000000-0000-0000-0000-00000000000c" kind="Method" parent="00000000-0000-0000-0000-00000000000b" name="ToString()" />
  <syntax id="00000000-0000-0000-0000-00000000000b"><k>public</k> <k>class</k> <r id="00000000-0000-0000-0000-00000000000b">Object</r></syntax>
  <syntax id="00000000-0000-0000-0000-00000000000c"><k>public</k> <k>virtual</k> <k>string</k> ToString<p>()</p></syntax>
  <obsolete id="00000000-0000-0000-0000-00000000000c" message="Use Format" diagnosticId="SYSLIB0042" />
  <supportedPlatform name="windows" />
  <experimental diagnosticId="EXP001" />
</assembly>"#
            ))
            .unwrap();
        builder
            .index_str(&format!(
                r#"<framework name="net9.0"><assembly fingerprint="{ASSEMBLY}" packName="Microsoft.NETCore.App.Ref" /></framework>"#
            ))
            .unwrap();
        builder
            .define_usage_source(
                "nuget.org",
                chrono::NaiveDate::from_ymd_opt(2024, 11, 12).unwrap(),
            )
            .unwrap();
        builder
            .add_usage(
                "nuget.org",
                Guid::try_parse("00000000-0000-0000-0000-00000000000b").unwrap(),
                0.75,
            )
            .unwrap();

        let bytes = CatalogWriter::to_bytes(&builder.build().unwrap()).unwrap();
        ApiCatalog::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn apis_and_declarations() {
        let catalog = catalog();
        let roots = catalog.root_apis().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name().unwrap(), "System");
        assert_eq!(roots[0].parent().unwrap(), None);

        let object = roots[0].children().unwrap()[0];
        assert_eq!(object.kind().unwrap(), ApiKind::Class);
        assert_eq!(object.parent().unwrap(), Some(roots[0]));

        let declaration = object.declarations().unwrap()[0];
        assert_eq!(declaration.text().unwrap(), "public class Object");
        let syntax = declaration.syntax().unwrap();
        assert_eq!(syntax.last().unwrap().reference, Some(object));
        assert_eq!(declaration.assembly().name().unwrap(), "System.Runtime");

        let method = catalog
            .api_by_fingerprint(&Guid::try_parse("00000000-0000-0000-0000-00000000000c").unwrap())
            .unwrap();
        assert_eq!(method.full_name().unwrap(), "System.Object.ToString()");
        assert_eq!(method.frameworks().unwrap()[0].name().unwrap(), "net9.0");

        let (source, usage) = object.usages().unwrap()[0];
        assert_eq!(source.name().unwrap(), "nuget.org");
        assert_eq!(
            source.date().unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 11, 12).unwrap()
        );
        assert_eq!(usage, 0.75);
    }

    #[test]
    fn annotations() {
        let catalog = catalog();
        let assembly = catalog.assembly(0).unwrap();
        assert_eq!(assembly.obsoletion().unwrap(), None);
        assert_eq!(
            assembly.platform_support().unwrap(),
            vec![PlatformSupport {
                platform: "windows",
                is_supported: true
            }]
        );
        assert_eq!(
            assembly.experimental().unwrap().unwrap().diagnostic_id,
            Some("EXP001")
        );

        let declarations = assembly.declarations().unwrap();
        assert_eq!(declarations.len(), 2);
        let obsoletion = declarations[1].obsoletion().unwrap().unwrap();
        assert_eq!(obsoletion.message, Some("Use Format"));
        assert!(!obsoletion.is_error);
        assert_eq!(obsoletion.url_format, None);
        assert!(declarations[0].obsoletion().unwrap().is_none());
        assert!(declarations[1].platform_support().unwrap().is_empty());
    }

    #[test]
    fn statistics() {
        let statistics = catalog().statistics();
        assert_eq!(statistics.apis, 3);
        assert_eq!(statistics.root_apis, 1);
        assert_eq!(statistics.assemblies, 1);
        assert_eq!(statistics.frameworks, 1);
        assert_eq!(statistics.platforms, 1);
        assert_eq!(statistics.obsoletions, 1);
        assert_eq!(statistics.platform_supports, 1);
        assert_eq!(statistics.experimentals, 1);
        assert!(statistics.to_string().contains("APIs"));
    }

    #[test]
    fn bad_magic() {
        let catalog = CatalogBuilder::new().build().unwrap();
        let mut bytes = CatalogWriter::to_bytes(&catalog).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            ApiCatalog::from_bytes(&bytes),
            Err(Error::Malformed { .. })
        ));

        assert!(matches!(ApiCatalog::from_bytes(&[]), Err(Error::Empty)));
        assert!(matches!(
            ApiCatalog::from_bytes(&bytes[..20]),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn declared_lengths_exceeding_input() {
        let mut bytes = Vec::new();
        append_le(&mut bytes, CATALOG_MAGIC);
        append_le(&mut bytes, FORMAT_VERSION);
        append_le(&mut bytes, CatalogTable::COUNT as i32);
        for table in CatalogTable::iter() {
            let size = table.row_size().unwrap_or(1) as i32;
            append_le(&mut bytes, i32::MAX / size * size);
        }
        bytes.extend_from_slice(&[0; 16]);

        assert!(matches!(
            ApiCatalog::from_bytes(&bytes),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn truncated_body() {
        let mut builder = CatalogBuilder::new();
        builder
            .index_str(
                r#"<assembly fingerprint="aaaaaaaa-0000-0000-0000-000000000001" name="A">
  <api fingerprint="00000000-0000-0000-0000-00000000000a" kind="Namespace" name="N" />
</assembly>"#,
            )
            .unwrap();
        let bytes = CatalogWriter::to_bytes(&builder.build().unwrap()).unwrap();
        assert!(ApiCatalog::from_bytes(&bytes).is_ok());

        let truncated = &bytes[..bytes.len() - 4];
        assert!(matches!(
            ApiCatalog::from_bytes(truncated),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn handles_are_bounds_checked() {
        let catalog = catalog();
        assert!(matches!(catalog.api(3), Err(Error::OutOfBounds { .. })));
        assert!(matches!(catalog.api(-1), Err(Error::OutOfBounds { .. })));
        assert!(catalog.api(2).is_ok());
        assert!(catalog.framework_by_name("net9.0").unwrap().is_some());
        assert!(catalog.framework_by_name("net8.0").unwrap().is_none());
    }
}
