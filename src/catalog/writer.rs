//! Serialization of an [`IntermediateCatalog`] into the binary catalog format.
//!
//! Writing happens in two phases. First every entity is assigned a handle, its row index, by
//! walking the `ordered_*` sequences of the graph. Then the same sequences are walked again
//! to emit rows, resolving every reference through the handles of the first phase. Both
//! phases use the same ordering functions, so a handle always equals the position of its row.
//!
//! Variable length data lives in the blob heap, strings in the string heap. Both are
//! deduplicated where it pays off: strings always, blobs only for platform support lists.

use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
    io::Write,
    path::Path,
};

use chrono::Datelike;
use uguid::Guid;

use crate::{
    catalog::{
        format::{CatalogTable, CATALOG_MAGIC, FORMAT_VERSION, NIL},
        intermediate::{IntermediateAnnotations, IntermediateCatalog},
    },
    file::io::append_le,
    Error, Result,
};

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW: u32 = 22;

fn to_handle(offset: usize) -> Result<i32> {
    i32::try_from(offset).map_err(|_| Error::Catalog(format!("offset {} exceeds the format", offset)))
}

/// Length prefixed UTF-8 strings, each distinct string stored once.
#[derive(Default)]
struct StringHeap {
    data: Vec<u8>,
    offsets: HashMap<String, i32>,
}

impl StringHeap {
    fn add(&mut self, value: &str) -> Result<i32> {
        if let Some(&offset) = self.offsets.get(value) {
            return Ok(offset);
        }

        let offset = to_handle(self.data.len())?;
        append_le(&mut self.data, to_handle(value.len())?);
        self.data.extend_from_slice(value.as_bytes());
        self.offsets.insert(value.to_string(), offset);
        Ok(offset)
    }

    fn add_optional(&mut self, value: Option<&str>) -> Result<i32> {
        match value {
            Some(value) => self.add(value),
            None => Ok(NIL),
        }
    }
}

/// Append-only blob storage.
#[derive(Default)]
struct BlobHeap {
    data: Vec<u8>,
    /// Content hash to the offsets of deduplicated payloads with that hash
    buckets: HashMap<u64, Vec<i32>>,
}

impl BlobHeap {
    fn add(&mut self, payload: &[u8]) -> Result<i32> {
        let offset = to_handle(self.data.len())?;
        self.data.extend_from_slice(payload);
        Ok(offset)
    }

    /// Like [`BlobHeap::add`], but an identical payload added this way before is reused.
    fn add_deduplicated(&mut self, payload: &[u8]) -> Result<i32> {
        let mut hasher = DefaultHasher::new();
        payload.hash(&mut hasher);
        let hash = hasher.finish();

        if let Some(offsets) = self.buckets.get(&hash) {
            for &offset in offsets {
                let start = offset as usize;
                if self.data.get(start..start + payload.len()) == Some(payload) {
                    return Ok(offset);
                }
            }
        }

        let offset = self.add(payload)?;
        self.buckets.entry(hash).or_default().push(offset);
        Ok(offset)
    }
}

/// A count prefixed list under construction. Empty lists are stored as [`NIL`].
struct ListBlob {
    count: i32,
    payload: Vec<u8>,
}

impl ListBlob {
    fn new() -> Self {
        ListBlob {
            count: 0,
            payload: Vec::new(),
        }
    }

    fn entry(&mut self) -> &mut Vec<u8> {
        self.count += 1;
        &mut self.payload
    }

    fn encode(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(4 + self.payload.len());
        append_le(&mut blob, self.count);
        blob.extend_from_slice(&self.payload);
        blob
    }

    fn store(self, heap: &mut BlobHeap) -> Result<i32> {
        if self.count == 0 {
            return Ok(NIL);
        }
        heap.add(&self.encode())
    }

    fn store_deduplicated(self, heap: &mut BlobHeap) -> Result<i32> {
        if self.count == 0 {
            return Ok(NIL);
        }
        heap.add_deduplicated(&self.encode())
    }
}

/// Row indexes assigned in the first phase.
struct Handles<'a> {
    platforms: HashMap<&'a str, i32>,
    frameworks: HashMap<&'a str, i32>,
    packages: HashMap<&'a Guid, i32>,
    assemblies: HashMap<&'a Guid, i32>,
    usage_sources: HashMap<&'a str, i32>,
    apis: HashMap<&'a Guid, i32>,
}

fn assign<K: Eq + Hash>(keys: impl Iterator<Item = K>) -> Result<HashMap<K, i32>> {
    keys.enumerate()
        .map(|(row, key)| Ok((key, to_handle(row)?)))
        .collect()
}

fn resolve<K: Eq + Hash + std::fmt::Display + ?Sized>(
    handles: &HashMap<&K, i32>,
    key: &K,
    what: &str,
) -> Result<i32> {
    handles
        .get(key)
        .copied()
        .ok_or_else(|| Error::Catalog(format!("{} {} was never assigned a handle", what, key)))
}

/// An annotation row, sortable by its target.
struct AnnotationRow {
    assembly: i32,
    api: i32,
    data: Vec<u8>,
}

#[derive(Default)]
struct AnnotationRows {
    obsoletion: Vec<AnnotationRow>,
    platform_support: Vec<AnnotationRow>,
    preview_requirement: Vec<AnnotationRow>,
    experimental: Vec<AnnotationRow>,
}

impl AnnotationRows {
    fn add(
        &mut self,
        assembly: i32,
        api: i32,
        annotations: &IntermediateAnnotations,
        handles: &Handles<'_>,
        strings: &mut StringHeap,
        blobs: &mut BlobHeap,
    ) -> Result<()> {
        let row = |data: Vec<u8>| AnnotationRow { assembly, api, data };

        if let Some(obsoletion) = &annotations.obsoletion {
            let mut data = Vec::with_capacity(13);
            append_le(&mut data, strings.add_optional(obsoletion.message.as_deref())?);
            append_le(&mut data, u8::from(obsoletion.is_error));
            append_le(&mut data, strings.add_optional(obsoletion.diagnostic_id.as_deref())?);
            append_le(&mut data, strings.add_optional(obsoletion.url_format.as_deref())?);
            self.obsoletion.push(row(data));
        }

        if !annotations.platform_support.is_empty() {
            let mut entries = Vec::with_capacity(annotations.platform_support.len());
            for support in &annotations.platform_support {
                let platform = resolve(&handles.platforms, support.platform.as_str(), "platform")?;
                entries.push((platform, u8::from(support.is_supported)));
            }
            // Platforms are sorted by name, so are their handles.
            entries.sort_unstable();
            entries.dedup();

            let mut list = ListBlob::new();
            for (platform, is_supported) in entries {
                let entry = list.entry();
                append_le(entry, platform);
                append_le(entry, is_supported);
            }

            let mut data = Vec::with_capacity(4);
            append_le(&mut data, list.store_deduplicated(blobs)?);
            self.platform_support.push(row(data));
        }

        if let Some(preview) = &annotations.preview_requirement {
            let mut data = Vec::with_capacity(8);
            append_le(&mut data, strings.add_optional(preview.message.as_deref())?);
            append_le(&mut data, strings.add_optional(preview.url.as_deref())?);
            self.preview_requirement.push(row(data));
        }

        if let Some(experimental) = &annotations.experimental {
            let mut data = Vec::with_capacity(8);
            append_le(&mut data, strings.add_optional(experimental.diagnostic_id.as_deref())?);
            append_le(&mut data, strings.add_optional(experimental.url_format.as_deref())?);
            self.experimental.push(row(data));
        }

        Ok(())
    }

    fn emit(rows: &mut [AnnotationRow]) -> Vec<u8> {
        rows.sort_by_key(|row| (row.assembly, row.api));

        let mut table = Vec::new();
        for row in rows.iter() {
            append_le(&mut table, row.api);
            append_le(&mut table, row.assembly);
            table.extend_from_slice(&row.data);
        }
        table
    }
}

/// Writes an [`IntermediateCatalog`] in the binary catalog format.
///
/// # Examples
///
/// ```rust,no_run
/// use apiscope::catalog::{ApiCatalog, CatalogBuilder, CatalogWriter};
/// use std::path::Path;
///
/// let mut builder = CatalogBuilder::new();
/// builder.index_file(Path::new("index/System.Runtime.xml"))?;
/// let catalog = builder.build()?;
///
/// CatalogWriter::write_file(&catalog, Path::new("apicatalog.dat"))?;
/// let loaded = ApiCatalog::open(Path::new("apicatalog.dat"))?;
/// println!("{} APIs", loaded.statistics().apis);
/// # Ok::<(), apiscope::Error>(())
/// ```
pub struct CatalogWriter;

impl CatalogWriter {
    /// Serialize `catalog` into `output`.
    ///
    /// # Errors
    /// Returns [`Error::Catalog`] if a row references an entity that has no handle, and
    /// [`Error::FileError`] if `output` fails.
    pub fn write<W: Write>(catalog: &IntermediateCatalog, mut output: W) -> Result<()> {
        let tables = Self::tables(catalog)?;

        let mut body_length = 0_usize;
        let mut header = Vec::with_capacity(crate::catalog::format::HEADER_SIZE);
        append_le(&mut header, CATALOG_MAGIC);
        append_le(&mut header, FORMAT_VERSION);
        append_le(&mut header, to_handle(tables.len())?);
        for (table, data) in &tables {
            tracing::debug!("{}: {} bytes", table, data.len());
            append_le(&mut header, to_handle(data.len())?);
            body_length += data.len();
        }

        let mut compressed = Vec::new();
        {
            let mut encoder = brotli::CompressorWriter::new(
                &mut compressed,
                BROTLI_BUFFER_SIZE,
                BROTLI_QUALITY,
                BROTLI_WINDOW,
            );
            for (_, data) in &tables {
                encoder.write_all(data)?;
            }
        }
        tracing::debug!(
            "catalog body compressed from {} to {} bytes",
            body_length,
            compressed.len()
        );

        output.write_all(&header)?;
        output.write_all(&compressed)?;
        output.flush()?;
        Ok(())
    }

    /// Serialize `catalog` into a new buffer.
    ///
    /// # Errors
    /// See [`CatalogWriter::write`].
    pub fn to_bytes(catalog: &IntermediateCatalog) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        Self::write(catalog, &mut buffer)?;
        Ok(buffer)
    }

    /// Serialize `catalog` into the file at `path`, replacing it.
    ///
    /// # Errors
    /// See [`CatalogWriter::write`].
    pub fn write_file(catalog: &IntermediateCatalog, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        Self::write(catalog, std::io::BufWriter::new(file))
    }

    /// The heaps and tables of `catalog`, in header order.
    fn tables(catalog: &IntermediateCatalog) -> Result<Vec<(CatalogTable, Vec<u8>)>> {
        let apis = catalog.ordered_apis();

        let handles = Handles {
            platforms: assign(catalog.ordered_platforms())?,
            frameworks: assign(catalog.ordered_frameworks().map(|f| f.name.as_str()))?,
            packages: assign(catalog.ordered_packages().map(|p| &p.fingerprint))?,
            assemblies: assign(catalog.ordered_assemblies().map(|a| &a.fingerprint))?,
            usage_sources: assign(catalog.ordered_usage_sources().map(|s| s.name.as_str()))?,
            apis: assign(apis.iter().map(|api| &api.fingerprint))?,
        };

        let mut strings = StringHeap::default();
        let mut blobs = BlobHeap::default();
        let mut annotations = AnnotationRows::default();

        let mut platform_table = Vec::new();
        for platform in catalog.ordered_platforms() {
            append_le(&mut platform_table, strings.add(platform)?);
        }

        let mut framework_table = Vec::new();
        for framework in catalog.ordered_frameworks() {
            let mut list = ListBlob::new();
            for assembly in &framework.assemblies {
                let handle = resolve(&handles.assemblies, &assembly.assembly, "assembly")?;
                let pack = strings.add_optional(assembly.pack.as_deref())?;
                let mut profiles = Vec::with_capacity(assembly.profiles.len());
                for profile in &assembly.profiles {
                    profiles.push(strings.add(profile)?);
                }

                let entry = list.entry();
                append_le(entry, handle);
                append_le(entry, pack);
                append_le(entry, to_handle(profiles.len())?);
                for profile in profiles {
                    append_le(entry, profile);
                }
            }

            append_le(&mut framework_table, strings.add(&framework.name)?);
            append_le(&mut framework_table, list.store(&mut blobs)?);
        }

        let mut package_table = Vec::new();
        for package in catalog.ordered_packages() {
            let mut list = ListBlob::new();
            for (framework, assembly) in &package.assemblies {
                let framework = resolve(&handles.frameworks, framework.as_str(), "framework")?;
                let assembly = resolve(&handles.assemblies, assembly, "assembly")?;
                let entry = list.entry();
                append_le(entry, framework);
                append_le(entry, assembly);
            }

            package_table.extend_from_slice(&package.fingerprint.to_bytes());
            append_le(&mut package_table, strings.add(&package.name)?);
            append_le(&mut package_table, strings.add(&package.version)?);
            append_le(&mut package_table, list.store(&mut blobs)?);
        }

        let mut assembly_table = Vec::new();
        for assembly in catalog.ordered_assemblies() {
            let mut roots = ListBlob::new();
            for api in &assembly.root_apis {
                append_le(roots.entry(), resolve(&handles.apis, api, "API")?);
            }
            let mut frameworks = ListBlob::new();
            for framework in &assembly.frameworks {
                append_le(
                    frameworks.entry(),
                    resolve(&handles.frameworks, framework.as_str(), "framework")?,
                );
            }
            let mut packages = ListBlob::new();
            for package in &assembly.packages {
                append_le(
                    packages.entry(),
                    resolve(&handles.packages, package, "package")?,
                );
            }

            assembly_table.extend_from_slice(&assembly.fingerprint.to_bytes());
            append_le(&mut assembly_table, strings.add(&assembly.name)?);
            append_le(&mut assembly_table, strings.add(&assembly.public_key_token)?);
            append_le(&mut assembly_table, strings.add(&assembly.version)?);
            append_le(&mut assembly_table, roots.store(&mut blobs)?);
            append_le(&mut assembly_table, frameworks.store(&mut blobs)?);
            append_le(&mut assembly_table, packages.store(&mut blobs)?);

            let handle = resolve(&handles.assemblies, &assembly.fingerprint, "assembly")?;
            annotations.add(
                handle,
                NIL,
                &assembly.annotations,
                &handles,
                &mut strings,
                &mut blobs,
            )?;
        }

        let mut usage_source_table = Vec::new();
        for source in catalog.ordered_usage_sources() {
            append_le(&mut usage_source_table, strings.add(&source.name)?);
            append_le(&mut usage_source_table, source.date.num_days_from_ce());
        }

        let mut api_table = Vec::new();
        for api in &apis {
            let handle = resolve(&handles.apis, &api.fingerprint, "API")?;
            let parent = match &api.parent {
                Some(parent) => resolve(&handles.apis, parent, "API")?,
                None => NIL,
            };

            let mut children = ListBlob::new();
            for child in &api.children {
                append_le(children.entry(), resolve(&handles.apis, child, "API")?);
            }

            let mut declarations = ListBlob::new();
            for declaration in &api.declarations {
                let assembly = resolve(&handles.assemblies, &declaration.assembly, "assembly")?;

                let mut syntax = ListBlob::new();
                for token in &declaration.syntax {
                    let text = strings.add(&token.text)?;
                    let reference = token
                        .reference
                        .and_then(|api| handles.apis.get(&api).copied())
                        .unwrap_or(NIL);

                    let entry = syntax.entry();
                    append_le(entry, token.kind as u8);
                    append_le(entry, text);
                    append_le(entry, reference);
                }

                let entry = declarations.entry();
                append_le(entry, assembly);
                append_le(entry, syntax.store(&mut blobs)?);

                annotations.add(
                    assembly,
                    handle,
                    &declaration.annotations,
                    &handles,
                    &mut strings,
                    &mut blobs,
                )?;
            }

            let mut usages = ListBlob::new();
            for (source, usage) in &api.usages {
                let source = resolve(&handles.usage_sources, source.as_str(), "usage source")?;
                let entry = usages.entry();
                append_le(entry, source);
                append_le(entry, *usage);
            }

            api_table.extend_from_slice(&api.fingerprint.to_bytes());
            append_le(&mut api_table, api.kind as u8);
            append_le(&mut api_table, parent);
            append_le(&mut api_table, strings.add(&api.name)?);
            append_le(&mut api_table, children.store(&mut blobs)?);
            append_le(&mut api_table, declarations.store(&mut blobs)?);
            append_le(&mut api_table, usages.store(&mut blobs)?);
        }

        let mut root_api_table = Vec::new();
        for root in catalog.roots() {
            append_le(&mut root_api_table, resolve(&handles.apis, root, "API")?);
        }

        let mut extension_table = Vec::new();
        for extension in catalog.ordered_extensions() {
            extension_table.extend_from_slice(&extension.fingerprint.to_bytes());
            append_le(
                &mut extension_table,
                resolve(&handles.apis, &extension.extended_type, "API")?,
            );
            append_le(
                &mut extension_table,
                resolve(&handles.apis, &extension.extension_method, "API")?,
            );
        }

        let obsoletion_table = AnnotationRows::emit(&mut annotations.obsoletion);
        let platform_support_table = AnnotationRows::emit(&mut annotations.platform_support);
        let preview_table = AnnotationRows::emit(&mut annotations.preview_requirement);
        let experimental_table = AnnotationRows::emit(&mut annotations.experimental);

        Ok(vec![
            (CatalogTable::StringHeap, strings.data),
            (CatalogTable::BlobHeap, blobs.data),
            (CatalogTable::Platform, platform_table),
            (CatalogTable::Framework, framework_table),
            (CatalogTable::Package, package_table),
            (CatalogTable::Assembly, assembly_table),
            (CatalogTable::UsageSource, usage_source_table),
            (CatalogTable::Api, api_table),
            (CatalogTable::RootApi, root_api_table),
            (CatalogTable::ExtensionMethod, extension_table),
            (CatalogTable::Obsoletion, obsoletion_table),
            (CatalogTable::PlatformSupport, platform_support_table),
            (CatalogTable::PreviewRequirement, preview_table),
            (CatalogTable::Experimental, experimental_table),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;
    use crate::file::io::read_le;

    #[test]
    fn strings_are_deduplicated() {
        let mut heap = StringHeap::default();
        let first = heap.add("System").unwrap();
        let second = heap.add("Object").unwrap();
        assert_eq!(heap.add("System").unwrap(), first);
        assert_eq!(second, 10);
        assert_eq!(heap.add_optional(None).unwrap(), NIL);
        assert_eq!(heap.add("").unwrap(), 20);
        assert_eq!(heap.data.len(), 24);
    }

    #[test]
    fn blobs_deduplicate_on_request() {
        let mut heap = BlobHeap::default();
        let a = heap.add_deduplicated(&[1, 2, 3]).unwrap();
        let plain = heap.add(&[1, 2, 3]).unwrap();
        let b = heap.add_deduplicated(&[1, 2, 3]).unwrap();
        let c = heap.add_deduplicated(&[1, 2]).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, plain);
        assert_eq!(c, 6);
        assert_eq!(heap.data.len(), 8);

        assert_eq!(ListBlob::new().store(&mut heap).unwrap(), NIL);
    }

    #[test]
    fn header_lists_every_table() {
        let catalog = CatalogBuilder::new().build().unwrap();
        let bytes = CatalogWriter::to_bytes(&catalog).unwrap();

        assert_eq!(read_le::<u32>(&bytes).unwrap(), CATALOG_MAGIC);
        assert_eq!(read_le::<u32>(&bytes[4..]).unwrap(), FORMAT_VERSION);
        assert_eq!(read_le::<i32>(&bytes[8..]).unwrap(), 14);
        assert!(bytes[12..68].iter().all(|&b| b == 0));
        assert!(bytes.len() > 68);
    }

    #[test]
    fn platform_support_lists_share_a_blob() {
        let mut builder = CatalogBuilder::new();
        builder
            .index_str(
                r#"<assembly fingerprint="aaaaaaaa-0000-0000-0000-000000000001" name="A">
  <api fingerprint="00000000-0000-0000-0000-00000000000a" kind="Namespace" name="N" />
  <api fingerprint="00000000-0000-0000-0000-00000000000b" kind="Class" parent="00000000-0000-0000-0000-00000000000a" name="T" />
  <syntax id="00000000-0000-0000-0000-00000000000a">namespace N</syntax>
  <syntax id="00000000-0000-0000-0000-00000000000b">class T</syntax>
  <supportedPlatform id="00000000-0000-0000-0000-00000000000a" name="windows" />
  <unsupportedPlatform id="00000000-0000-0000-0000-00000000000a" name="browser" />
  <unsupportedPlatform id="00000000-0000-0000-0000-00000000000b" name="browser" />
  <supportedPlatform id="00000000-0000-0000-0000-00000000000b" name="windows" />
  <supportedPlatform name="windows" />
</assembly>"#,
            )
            .unwrap();
        let catalog = builder.build().unwrap();
        let tables = CatalogWriter::tables(&catalog).unwrap();

        let (table, rows) = &tables[CatalogTable::PlatformSupport as usize];
        assert_eq!(*table, CatalogTable::PlatformSupport);
        assert_eq!(rows.len(), 3 * 12);

        // Rows sorted by (assembly, api): the assembly level row comes first.
        assert_eq!(read_le::<i32>(&rows[0..]).unwrap(), NIL);
        let namespace_entries = read_le::<i32>(&rows[12 + 8..]).unwrap();
        let type_entries = read_le::<i32>(&rows[24 + 8..]).unwrap();
        assert_eq!(namespace_entries, type_entries);
        assert_ne!(read_le::<i32>(&rows[8..]).unwrap(), namespace_entries);
    }

    #[test]
    fn unassigned_reference_is_fatal() {
        let assigned = Guid::from_bytes([1; 16]);
        let mut handles = HashMap::new();
        handles.insert(&assigned, 0);
        assert_eq!(resolve(&handles, &Guid::from_bytes([1; 16]), "API").unwrap(), 0);
        assert!(matches!(
            resolve(&handles, &Guid::from_bytes([2; 16]), "API"),
            Err(Error::Catalog(_))
        ));
    }
}
