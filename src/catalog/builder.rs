//! Ingestion of index documents into an [`IntermediateCatalog`].
//!
//! Indexers emit one XML document per assembly, framework and package. Documents may arrive
//! in any order as long as an assembly is indexed before the frameworks and packages that
//! mention it. Inconsistencies in the input are handled according to [`BuilderConfig`]: the
//! lenient default records a [`crate::diagnostics::Diagnostic`] and drops the offending
//! entity, strict mode fails with [`crate::Error::Catalog`]. XML that cannot be read always
//! fails.

use std::{
    borrow::Cow,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
    sync::Arc,
};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use uguid::Guid;

use crate::{
    catalog::{
        format::{ApiKind, SyntaxTokenKind},
        intermediate::{
            IntermediateAnnotations, IntermediateApi, IntermediateAssembly, IntermediateCatalog,
            IntermediateDeclaration, IntermediateExperimental, IntermediateExtension,
            IntermediateFrameworkAssembly, IntermediateObsoletion, IntermediatePackage,
            IntermediatePlatformSupport, IntermediatePreviewRequirement, IntermediateSyntaxToken,
            IntermediateUsageSource,
        },
    },
    diagnostics::{DiagnosticCategory, Diagnostics},
    usage::UsageAggregator,
    Error, Result,
};

/// How a [`CatalogBuilder`] treats inconsistent input.
///
/// # Examples
///
/// ```rust
/// use apiscope::catalog::BuilderConfig;
///
/// assert!(!BuilderConfig::default().strict);
/// assert!(BuilderConfig::strict().strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuilderConfig {
    /// Fail on the first integrity problem instead of dropping the entity
    pub strict: bool,
}

impl BuilderConfig {
    /// Drop inconsistent entities and record a diagnostic. This is the default.
    #[must_use]
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    /// Fail with [`Error::Catalog`] on the first inconsistency.
    #[must_use]
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// The root element of the document being read.
enum Document {
    /// `None` once the assembly turned out to be indexed already
    Assembly(Option<Guid>),
    Framework(String),
    /// `None` once the package turned out to be indexed already
    Package(Option<Guid>),
    Unknown,
}

struct Markup {
    kind: SyntaxTokenKind,
    reference: Option<Guid>,
    text: String,
}

/// A `<syntax>` element being read.
struct PendingSyntax {
    api: Option<Guid>,
    tokens: Vec<IntermediateSyntaxToken>,
    markup: Option<Markup>,
}

impl PendingSyntax {
    fn text(&mut self, text: &str) {
        if let Some(markup) = &mut self.markup {
            markup.text.push_str(text);
            return;
        }

        match self.tokens.last_mut() {
            Some(last) if last.kind == SyntaxTokenKind::Text => last.text.push_str(text),
            _ => self
                .tokens
                .push(IntermediateSyntaxToken::new(SyntaxTokenKind::Text, text)),
        }
    }

    fn close_markup(&mut self) {
        if let Some(markup) = self.markup.take() {
            self.tokens.push(IntermediateSyntaxToken {
                kind: markup.kind,
                text: markup.text,
                reference: markup.reference,
            });
        }
    }
}

/// Builds an [`IntermediateCatalog`] from index documents and usage data.
///
/// # Examples
///
/// ```rust
/// use apiscope::catalog::CatalogBuilder;
///
/// let mut builder = CatalogBuilder::new();
/// builder.index_str(
///     r#"<assembly fingerprint="11111111-1111-1111-1111-111111111111" name="Lib" version="1.0.0.0">
///          <api fingerprint="22222222-2222-2222-2222-222222222222" kind="Namespace" name="Lib" />
///          <syntax id="22222222-2222-2222-2222-222222222222"><k>namespace</k> Lib</syntax>
///        </assembly>"#,
/// )?;
/// builder.index_str(
///     r#"<framework name="net9.0">
///          <assembly fingerprint="11111111-1111-1111-1111-111111111111" />
///        </framework>"#,
/// )?;
///
/// let catalog = builder.build()?;
/// assert_eq!(catalog.roots().len(), 1);
/// assert!(catalog.framework("net9.0").is_some());
/// # Ok::<(), apiscope::Error>(())
/// ```
pub struct CatalogBuilder {
    config: BuilderConfig,
    diagnostics: Arc<Diagnostics>,
    catalog: IntermediateCatalog,
    pending_extensions: Vec<IntermediateExtension>,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogBuilder {
    /// Create a lenient builder.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    /// Create a builder with `config`.
    #[must_use]
    pub fn with_config(config: BuilderConfig) -> Self {
        CatalogBuilder {
            config,
            diagnostics: Arc::new(Diagnostics::new()),
            catalog: IntermediateCatalog::new(),
            pending_extensions: Vec::new(),
        }
    }

    /// Problems found so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// The graph built so far. Extensions only appear after [`CatalogBuilder::resolve_extensions`].
    #[must_use]
    pub fn catalog(&self) -> &IntermediateCatalog {
        &self.catalog
    }

    /// Index the document in `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file can't be opened, and everything
    /// [`CatalogBuilder::index_document`] returns.
    pub fn index_file(&mut self, path: &Path) -> Result<()> {
        let file = std::fs::File::open(path)?;
        self.index_document(BufReader::new(file))
    }

    /// Index the document in `text`.
    ///
    /// # Errors
    /// See [`CatalogBuilder::index_document`].
    pub fn index_str(&mut self, text: &str) -> Result<()> {
        self.index_document(text.as_bytes())
    }

    /// Index one `assembly`, `framework` or `package` document.
    ///
    /// # Errors
    /// Returns [`Error::Xml`] or [`Error::XmlAttribute`] if the document is not well formed,
    /// and [`Error::Catalog`] for inconsistent content in strict mode.
    pub fn index_document<R: BufRead>(&mut self, input: R) -> Result<()> {
        let mut reader = Reader::from_reader(input);
        let mut buffer = Vec::new();

        let mut document: Option<Document> = None;
        let mut syntax: Option<PendingSyntax> = None;
        let mut depth = 0_usize;

        loop {
            match reader.read_event_into(&mut buffer)? {
                Event::Start(element) => {
                    self.element(&element, depth, &mut document, &mut syntax, false)?;
                    depth += 1;
                }
                Event::Empty(element) => {
                    self.element(&element, depth, &mut document, &mut syntax, true)?;
                }
                Event::Text(text) => {
                    if let Some(pending) = &mut syntax {
                        pending.text(&text.unescape()?);
                    }
                }
                Event::CData(text) => {
                    if let Some(pending) = &mut syntax {
                        pending.text(&String::from_utf8_lossy(&text));
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    match depth {
                        1 => {
                            if let Some(pending) = syntax.take() {
                                self.finish_syntax(&document, pending)?;
                            }
                        }
                        2 => {
                            if let Some(pending) = &mut syntax {
                                pending.close_markup();
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buffer.clear();
        }

        match &document {
            Some(Document::Assembly(Some(fingerprint))) => tracing::debug!(
                "indexed assembly {}, {} APIs in catalog",
                fingerprint,
                self.catalog.api_count()
            ),
            Some(Document::Framework(name)) => tracing::debug!("indexed framework {}", name),
            Some(Document::Package(Some(fingerprint))) => {
                tracing::debug!("indexed package {}", fingerprint);
            }
            Some(_) => {}
            None => {
                self.report(DiagnosticCategory::Assembly, "empty index document".to_string())?;
            }
        }

        Ok(())
    }

    fn element(
        &mut self,
        element: &BytesStart<'_>,
        depth: usize,
        document: &mut Option<Document>,
        syntax: &mut Option<PendingSyntax>,
        empty: bool,
    ) -> Result<()> {
        match depth {
            0 => {
                *document = Some(self.document(element)?);
                Ok(())
            }
            1 => match document {
                Some(Document::Assembly(Some(assembly))) => {
                    let assembly = *assembly;
                    if element.name().as_ref() == b"syntax" {
                        let api = self.fingerprint_attribute(
                            element,
                            "id",
                            DiagnosticCategory::Declaration,
                        )?;
                        let pending = PendingSyntax {
                            api,
                            tokens: Vec::new(),
                            markup: None,
                        };
                        if empty {
                            self.finish_syntax(document, pending)?;
                        } else {
                            *syntax = Some(pending);
                        }
                        Ok(())
                    } else {
                        self.assembly_child(assembly, element)
                    }
                }
                Some(Document::Framework(name)) => {
                    let name = name.clone();
                    self.framework_child(&name, element)
                }
                Some(Document::Package(Some(package))) => {
                    let package = *package;
                    self.package_child(package, element)
                }
                _ => Ok(()),
            },
            2 => {
                let Some(pending) = syntax else {
                    return Ok(());
                };
                let Some(kind) = SyntaxTokenKind::from_element(element.name().as_ref()) else {
                    self.diagnostics.warning(
                        DiagnosticCategory::Declaration,
                        format!("unknown syntax markup <{}>", element_name(element)),
                    );
                    return Ok(());
                };

                let reference = match attribute(element, "id")? {
                    Some(text) => Guid::try_parse(&text).ok(),
                    None => None,
                };
                if !empty {
                    pending.markup = Some(Markup {
                        kind,
                        reference,
                        text: String::new(),
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn document(&mut self, element: &BytesStart<'_>) -> Result<Document> {
        match element.name().as_ref() {
            b"assembly" => {
                let Some(fingerprint) =
                    self.fingerprint_attribute(element, "fingerprint", DiagnosticCategory::Assembly)?
                else {
                    return Ok(Document::Assembly(None));
                };
                let Some(name) = self.required(element, "name", DiagnosticCategory::Assembly)? else {
                    return Ok(Document::Assembly(None));
                };

                if self.catalog.assembly(&fingerprint).is_some() {
                    self.diagnostics.warning(
                        DiagnosticCategory::Assembly,
                        format!("assembly {} ({}) indexed twice, ignoring", name, fingerprint),
                    );
                    return Ok(Document::Assembly(None));
                }

                self.catalog.insert_assembly(IntermediateAssembly {
                    fingerprint,
                    name,
                    public_key_token: attribute(element, "publicKeyToken")?.unwrap_or_default(),
                    version: attribute(element, "version")?.unwrap_or_default(),
                    root_apis: Vec::new(),
                    frameworks: Vec::new(),
                    packages: Vec::new(),
                    annotations: IntermediateAnnotations::default(),
                });
                Ok(Document::Assembly(Some(fingerprint)))
            }
            b"framework" => {
                let Some(name) = self.required(element, "name", DiagnosticCategory::Framework)?
                else {
                    return Ok(Document::Unknown);
                };
                self.catalog.framework_mut(&name);
                Ok(Document::Framework(name))
            }
            b"package" => {
                let Some(fingerprint) =
                    self.fingerprint_attribute(element, "fingerprint", DiagnosticCategory::Package)?
                else {
                    return Ok(Document::Package(None));
                };
                let Some(name) = self.required(element, "id", DiagnosticCategory::Package)? else {
                    return Ok(Document::Package(None));
                };

                if self.catalog.package(&fingerprint).is_some() {
                    self.diagnostics.warning(
                        DiagnosticCategory::Package,
                        format!("package {} ({}) indexed twice, ignoring", name, fingerprint),
                    );
                    return Ok(Document::Package(None));
                }

                self.catalog.insert_package(IntermediatePackage {
                    fingerprint,
                    name,
                    version: attribute(element, "version")?.unwrap_or_default(),
                    assemblies: Vec::new(),
                });
                Ok(Document::Package(Some(fingerprint)))
            }
            _ => {
                self.report(
                    DiagnosticCategory::Assembly,
                    format!("unknown index document <{}>", element_name(element)),
                )?;
                Ok(Document::Unknown)
            }
        }
    }

    fn assembly_child(&mut self, assembly: Guid, element: &BytesStart<'_>) -> Result<()> {
        match element.name().as_ref() {
            b"api" => self.api(element),
            b"obsolete" => {
                let obsoletion = IntermediateObsoletion {
                    message: attribute(element, "message")?,
                    is_error: attribute(element, "isError")?
                        .is_some_and(|value| value.eq_ignore_ascii_case("true")),
                    diagnostic_id: attribute(element, "diagnosticId")?,
                    url_format: attribute(element, "urlFormat")?,
                };
                self.annotate(assembly, element, |annotations| {
                    annotations.obsoletion = Some(obsoletion);
                })
            }
            name @ (b"supportedPlatform" | b"unsupportedPlatform") => {
                let is_supported = name == b"supportedPlatform";
                let Some(platform) =
                    self.required(element, "name", DiagnosticCategory::Annotation)?
                else {
                    return Ok(());
                };
                self.catalog.insert_platform(&platform);
                self.annotate(assembly, element, |annotations| {
                    annotations
                        .platform_support
                        .push(IntermediatePlatformSupport {
                            platform,
                            is_supported,
                        });
                })
            }
            b"preview" => {
                let preview = IntermediatePreviewRequirement {
                    message: attribute(element, "message")?,
                    url: attribute(element, "url")?,
                };
                self.annotate(assembly, element, |annotations| {
                    annotations.preview_requirement = Some(preview);
                })
            }
            b"experimental" => {
                let experimental = IntermediateExperimental {
                    diagnostic_id: attribute(element, "diagnosticId")?,
                    url_format: attribute(element, "urlFormat")?,
                };
                self.annotate(assembly, element, |annotations| {
                    annotations.experimental = Some(experimental);
                })
            }
            b"extension" => {
                let category = DiagnosticCategory::Extension;
                let (Some(fingerprint), Some(extended_type), Some(extension_method)) = (
                    self.fingerprint_attribute(element, "fingerprint", category)?,
                    self.fingerprint_attribute(element, "type", category)?,
                    self.fingerprint_attribute(element, "method", category)?,
                ) else {
                    return Ok(());
                };
                self.pending_extensions.push(IntermediateExtension {
                    fingerprint,
                    extended_type,
                    extension_method,
                });
                Ok(())
            }
            _ => {
                self.diagnostics.warning(
                    DiagnosticCategory::Assembly,
                    format!("unknown assembly element <{}>", element_name(element)),
                );
                Ok(())
            }
        }
    }

    fn api(&mut self, element: &BytesStart<'_>) -> Result<()> {
        let category = DiagnosticCategory::Api;
        let Some(fingerprint) = self.fingerprint_attribute(element, "fingerprint", category)?
        else {
            return Ok(());
        };
        if self.catalog.contains_api(&fingerprint) {
            return Ok(());
        }

        let Some(kind_text) = self.required(element, "kind", category)? else {
            return Ok(());
        };
        let Ok(kind) = ApiKind::from_str(&kind_text) else {
            return self.report(
                category,
                format!("API {} has unknown kind '{}'", fingerprint, kind_text),
            );
        };
        let Some(name) = self.required(element, "name", category)? else {
            return Ok(());
        };

        let parent = match attribute(element, "parent")? {
            Some(text) => {
                let Some(parent) = self.parse_fingerprint(&text, category)? else {
                    return Ok(());
                };
                if !self.catalog.contains_api(&parent) {
                    return self.report(
                        category,
                        format!(
                            "API {} ({}) has unknown parent {}, dropped",
                            name, fingerprint, parent
                        ),
                    );
                }
                Some(parent)
            }
            None => None,
        };

        self.catalog.insert_api(IntermediateApi {
            fingerprint,
            kind,
            parent,
            name,
            children: Vec::new(),
            declarations: Vec::new(),
            usages: Vec::new(),
        });
        Ok(())
    }

    fn finish_syntax(&mut self, document: &Option<Document>, mut pending: PendingSyntax) -> Result<()> {
        let (Some(Document::Assembly(Some(assembly))), Some(api)) = (document, pending.api) else {
            return Ok(());
        };
        let assembly = *assembly;
        pending.close_markup();

        let category = DiagnosticCategory::Declaration;
        let root = self.catalog.root_of(&api);
        let Some(definition) = self.catalog.api_mut(&api) else {
            return self.report(
                category,
                format!("declaration in {} for unknown API {}", assembly, api),
            );
        };
        if definition.declaration(&assembly).is_some() {
            let message = format!(
                "API {} ({}) declared twice in assembly {}, ignoring",
                definition.name, api, assembly
            );
            return self.report(category, message);
        }

        definition.declarations.push(IntermediateDeclaration {
            assembly,
            syntax: pending.tokens,
            annotations: IntermediateAnnotations::default(),
        });

        if let Some(assembly) = self.catalog.assembly_mut(&assembly) {
            if !assembly.root_apis.contains(&root) {
                assembly.root_apis.push(root);
            }
        }
        Ok(())
    }

    /// Apply an annotation to the declaration named by the `id` attribute, or to `assembly`
    /// itself when there is none.
    fn annotate<F>(&mut self, assembly: Guid, element: &BytesStart<'_>, apply: F) -> Result<()>
    where
        F: FnOnce(&mut IntermediateAnnotations),
    {
        let category = DiagnosticCategory::Annotation;
        let api = match attribute(element, "id")? {
            Some(text) => match self.parse_fingerprint(&text, category)? {
                Some(api) => Some(api),
                None => return Ok(()),
            },
            None => None,
        };

        let annotations = match api {
            Some(api) => self
                .catalog
                .api_mut(&api)
                .and_then(|definition| {
                    definition
                        .declarations
                        .iter_mut()
                        .find(|declaration| declaration.assembly == assembly)
                })
                .map(|declaration| &mut declaration.annotations),
            None => self
                .catalog
                .assembly_mut(&assembly)
                .map(|assembly| &mut assembly.annotations),
        };

        match annotations {
            Some(annotations) => {
                apply(annotations);
                Ok(())
            }
            None => self.report(
                category,
                format!(
                    "<{}> for API {} without a declaration in assembly {}, dropped",
                    element_name(element),
                    api.map(|api| api.to_string()).unwrap_or_default(),
                    assembly
                ),
            ),
        }
    }

    fn framework_child(&mut self, framework: &str, element: &BytesStart<'_>) -> Result<()> {
        let category = DiagnosticCategory::Framework;
        if element.name().as_ref() != b"assembly" {
            self.diagnostics.warning(
                category,
                format!("unknown framework element <{}>", element_name(element)),
            );
            return Ok(());
        }

        let Some(fingerprint) = self.fingerprint_attribute(element, "fingerprint", category)? else {
            return Ok(());
        };
        let pack = attribute(element, "packName")?;
        let profiles = attribute(element, "profiles")?
            .map(|profiles| {
                profiles
                    .split(';')
                    .filter(|profile| !profile.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let Some(assembly) = self.catalog.assembly_mut(&fingerprint) else {
            return self.report(
                category,
                format!("framework {} references unknown assembly {}", framework, fingerprint),
            );
        };
        if !assembly.frameworks.iter().any(|name| name == framework) {
            assembly.frameworks.push(framework.to_string());
        }

        let entry = self.catalog.framework_mut(framework);
        if !entry.assemblies.iter().any(|a| a.assembly == fingerprint) {
            entry.assemblies.push(IntermediateFrameworkAssembly {
                assembly: fingerprint,
                pack,
                profiles,
            });
        }
        Ok(())
    }

    fn package_child(&mut self, package: Guid, element: &BytesStart<'_>) -> Result<()> {
        let category = DiagnosticCategory::Package;
        if element.name().as_ref() != b"assembly" {
            self.diagnostics.warning(
                category,
                format!("unknown package element <{}>", element_name(element)),
            );
            return Ok(());
        }

        let Some(fingerprint) = self.fingerprint_attribute(element, "fingerprint", category)? else {
            return Ok(());
        };
        let Some(framework) = self.required(element, "framework", category)? else {
            return Ok(());
        };

        let Some(assembly) = self.catalog.assembly_mut(&fingerprint) else {
            return self.report(
                category,
                format!("package {} references unknown assembly {}", package, fingerprint),
            );
        };
        if !assembly.packages.contains(&package) {
            assembly.packages.push(package);
        }

        self.catalog.framework_mut(&framework);
        if let Some(entry) = self.catalog.package_mut(&package) {
            let pair = (framework, fingerprint);
            if !entry.assemblies.contains(&pair) {
                entry.assemblies.push(pair);
            }
        }
        Ok(())
    }

    /// Link staged extension methods to their APIs, dropping those naming unknown APIs.
    ///
    /// # Errors
    /// Returns [`Error::Catalog`] in strict mode if an extension names an unknown API.
    pub fn resolve_extensions(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending_extensions);
        let mut resolved = 0_usize;
        for extension in pending {
            if self.catalog.contains_extension(&extension.fingerprint) {
                continue;
            }

            for api in [extension.extended_type, extension.extension_method] {
                if !self.catalog.contains_api(&api) {
                    self.report(
                        DiagnosticCategory::Extension,
                        format!(
                            "extension {} references unknown API {}, dropped",
                            extension.fingerprint, api
                        ),
                    )?;
                }
            }
            if self.catalog.contains_api(&extension.extended_type)
                && self.catalog.contains_api(&extension.extension_method)
            {
                self.catalog.insert_extension(extension);
                resolved += 1;
            }
        }

        tracing::debug!("resolved {} extension methods", resolved);
        Ok(())
    }

    /// Register a source of usage data collected on `date`.
    ///
    /// # Errors
    /// Returns [`Error::Catalog`] in strict mode if the source is already defined.
    pub fn define_usage_source(&mut self, name: &str, date: chrono::NaiveDate) -> Result<()> {
        if self.catalog.usage_source(name).is_some() {
            return self.report(
                DiagnosticCategory::Usage,
                format!("usage source {} defined twice, ignoring", name),
            );
        }

        self.catalog.insert_usage_source(IntermediateUsageSource {
            name: name.to_string(),
            date,
        });
        Ok(())
    }

    /// Record that a `percentage` (between 0 and 1) of the files in `source` use `api`.
    ///
    /// Usage of APIs that aren't in the catalog is skipped. A second value for the same source
    /// replaces the first.
    ///
    /// # Errors
    /// Returns [`Error::Catalog`] in strict mode if `source` is unknown or `percentage` is out
    /// of range.
    pub fn add_usage(&mut self, source: &str, api: Guid, percentage: f32) -> Result<()> {
        let category = DiagnosticCategory::Usage;
        if self.catalog.usage_source(source).is_none() {
            return self.report(category, format!("unknown usage source {}", source));
        }
        if !(0.0..=1.0).contains(&percentage) {
            return self.report(
                category,
                format!("usage {} of API {} is out of range", percentage, api),
            );
        }

        let Some(definition) = self.catalog.api_mut(&api) else {
            self.diagnostics
                .info(category, format!("usage for unknown API {} skipped", api));
            return Ok(());
        };
        match definition.usages.iter_mut().find(|(name, _)| name == source) {
            Some(entry) => entry.1 = percentage,
            None => definition.usages.push((source.to_string(), percentage)),
        }
        Ok(())
    }

    /// Record every usage fraction of `aggregator` under `source`.
    ///
    /// # Errors
    /// See [`CatalogBuilder::add_usage`].
    pub fn add_usages(&mut self, source: &str, aggregator: &UsageAggregator) -> Result<()> {
        let mut fractions: Vec<_> = aggregator.fractions().into_iter().collect();
        fractions.sort_by_key(|(fingerprint, _)| fingerprint.to_bytes());

        for (fingerprint, usage) in fractions {
            self.add_usage(source, fingerprint, usage)?;
        }
        tracing::debug!(
            "added usage of {} files from {}",
            aggregator.file_count(),
            source
        );
        Ok(())
    }

    /// Resolve extensions and return the finished graph.
    ///
    /// # Errors
    /// See [`CatalogBuilder::resolve_extensions`].
    pub fn build(mut self) -> Result<IntermediateCatalog> {
        self.resolve_extensions()?;
        Ok(self.catalog)
    }

    fn report(&self, category: DiagnosticCategory, message: String) -> Result<()> {
        if self.config.strict {
            return Err(Error::Catalog(message));
        }
        self.diagnostics.error(category, message);
        Ok(())
    }

    fn required(
        &self,
        element: &BytesStart<'_>,
        name: &str,
        category: DiagnosticCategory,
    ) -> Result<Option<String>> {
        let value = attribute(element, name)?;
        if value.is_none() {
            self.report(
                category,
                format!("<{}> without '{}'", element_name(element), name),
            )?;
        }
        Ok(value)
    }

    fn fingerprint_attribute(
        &self,
        element: &BytesStart<'_>,
        name: &str,
        category: DiagnosticCategory,
    ) -> Result<Option<Guid>> {
        match self.required(element, name, category)? {
            Some(text) => self.parse_fingerprint(&text, category),
            None => Ok(None),
        }
    }

    fn parse_fingerprint(&self, text: &str, category: DiagnosticCategory) -> Result<Option<Guid>> {
        match Guid::try_parse(text) {
            Ok(fingerprint) => Ok(Some(fingerprint)),
            Err(_) => {
                self.report(category, format!("'{}' is not a fingerprint", text))?;
                Ok(None)
            }
        }
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match element.try_get_attribute(name)? {
        Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn element_name<'a>(element: &'a BytesStart<'_>) -> Cow<'a, str> {
    String::from_utf8_lossy(element.name().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::CrawlerResults;

    const ASSEMBLY: &str = "aaaaaaaa-0000-0000-0000-000000000001";
    const NAMESPACE: &str = "00000000-0000-0000-0000-00000000000a";
    const TYPE: &str = "00000000-0000-0000-0000-00000000000b";
    const METHOD: &str = "00000000-0000-0000-0000-00000000000c";

    fn guid(text: &str) -> Guid {
        Guid::try_parse(text).unwrap()
    }

    fn assembly_document() -> String {
        format!(
            r#"<assembly fingerprint="{ASSEMBLY}" name="System.Runtime" publicKeyToken="b03f5f7f11d50a3a" version="9.0.0.0">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <api fingerprint="{TYPE}" kind="Class" parent="{NAMESPACE}" name="T" />
  <api fingerprint="{METHOD}" kind="Method" parent="{TYPE}" name="Run()" />
  <syntax id="{TYPE}"><k>public</k> <k>class</k> <r id="{TYPE}">T</r> <p>:</p> <r id="ffffffff-0000-0000-0000-000000000000">Base</r></syntax>
  <syntax id="{METHOD}"><k>public</k> <k>void</k> Run<p>(</p><p>)</p></syntax>
  <obsolete message="Use V2" isError="true" diagnosticId="SYSLIB0001" />
  <obsolete id="{METHOD}" message="Don't" isError="false" />
  <supportedPlatform id="{TYPE}" name="windows" />
  <unsupportedPlatform id="{TYPE}" name="browser" />
  <preview message="Preview" url="https://aka.ms/preview" />
  <experimental id="{METHOD}" diagnosticId="EXP001" urlFormat="https://aka.ms/{{0}}" />
  <extension fingerprint="00000000-0000-0000-0000-0000000000e1" type="{TYPE}" method="{METHOD}" />
</assembly>"#
        )
    }

    fn builder() -> CatalogBuilder {
        let mut builder = CatalogBuilder::new();
        builder.index_str(&assembly_document()).unwrap();
        builder
    }

    #[test]
    fn assembly_document_is_indexed() {
        let builder = builder();
        assert!(builder.diagnostics().is_empty(), "{}", builder.diagnostics().summary());

        let catalog = builder.build().unwrap();
        let assembly = catalog.assembly(&guid(ASSEMBLY)).unwrap();
        assert_eq!(assembly.name, "System.Runtime");
        assert_eq!(assembly.public_key_token, "b03f5f7f11d50a3a");
        assert_eq!(assembly.version, "9.0.0.0");
        assert_eq!(assembly.root_apis, vec![guid(NAMESPACE)]);

        assert_eq!(catalog.roots(), &[guid(NAMESPACE)]);
        let namespace = catalog.api(&guid(NAMESPACE)).unwrap();
        assert_eq!(namespace.kind, ApiKind::Namespace);
        assert_eq!(namespace.children, vec![guid(TYPE)]);
        assert!(namespace.declarations.is_empty());

        let class = catalog.api(&guid(TYPE)).unwrap();
        let declaration = class.declaration(&guid(ASSEMBLY)).unwrap();
        assert_eq!(declaration.text(), "public class T : Base");
        assert_eq!(declaration.syntax[0].kind, SyntaxTokenKind::Keyword);
        assert_eq!(declaration.syntax[1].kind, SyntaxTokenKind::Text);
        assert_eq!(declaration.syntax[4].reference, Some(guid(TYPE)));
        assert_eq!(
            declaration.syntax.last().unwrap().reference,
            Some(guid("ffffffff-0000-0000-0000-000000000000"))
        );

        let method = catalog.api(&guid(METHOD)).unwrap();
        assert_eq!(
            method.declaration(&guid(ASSEMBLY)).unwrap().text(),
            "public void Run()"
        );

        assert_eq!(catalog.extensions().len(), 1);
        assert_eq!(catalog.extensions()[0].extended_type, guid(TYPE));
    }

    #[test]
    fn annotations_attach_to_assembly_or_declaration() {
        let catalog = builder().build().unwrap();
        let assembly = catalog.assembly(&guid(ASSEMBLY)).unwrap();

        let obsoletion = assembly.annotations.obsoletion.as_ref().unwrap();
        assert_eq!(obsoletion.message.as_deref(), Some("Use V2"));
        assert!(obsoletion.is_error);
        assert_eq!(obsoletion.diagnostic_id.as_deref(), Some("SYSLIB0001"));
        assert_eq!(obsoletion.url_format, None);
        assert_eq!(
            assembly.annotations.preview_requirement.as_ref().unwrap().url.as_deref(),
            Some("https://aka.ms/preview")
        );
        assert!(assembly.annotations.platform_support.is_empty());

        let class = catalog.api(&guid(TYPE)).unwrap();
        let annotations = &class.declaration(&guid(ASSEMBLY)).unwrap().annotations;
        assert_eq!(annotations.platform_support.len(), 2);
        assert!(annotations.platform_support[0].is_supported);
        assert_eq!(annotations.platform_support[1].platform, "browser");
        assert!(annotations.obsoletion.is_none());

        let method = catalog.api(&guid(METHOD)).unwrap();
        let annotations = &method.declaration(&guid(ASSEMBLY)).unwrap().annotations;
        assert!(!annotations.obsoletion.as_ref().unwrap().is_error);
        assert_eq!(
            annotations.experimental.as_ref().unwrap().url_format.as_deref(),
            Some("https://aka.ms/{0}")
        );

        let platforms: Vec<_> = catalog.platforms().collect();
        assert_eq!(platforms, ["browser", "windows"]);
    }

    #[test]
    fn first_definition_wins() {
        let mut builder = builder();
        builder
            .index_str(&format!(
                r#"<assembly fingerprint="aaaaaaaa-0000-0000-0000-000000000002" name="Other">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <api fingerprint="{TYPE}" kind="Struct" parent="{NAMESPACE}" name="Renamed" />
  <syntax id="{TYPE}"><k>struct</k> Renamed</syntax>
</assembly>"#
            ))
            .unwrap();
        assert!(builder.diagnostics().is_empty());

        let catalog = builder.build().unwrap();
        let class = catalog.api(&guid(TYPE)).unwrap();
        assert_eq!(class.name, "T");
        assert_eq!(class.kind, ApiKind::Class);
        assert_eq!(class.declarations.len(), 2);
        assert_eq!(catalog.api(&guid(NAMESPACE)).unwrap().children.len(), 1);
        assert_eq!(catalog.api_count(), 3);
    }

    #[test]
    fn unknown_parent_drops_api() {
        let mut builder = CatalogBuilder::new();
        builder
            .index_str(&format!(
                r#"<assembly fingerprint="{ASSEMBLY}" name="A">
  <api fingerprint="{TYPE}" kind="Class" parent="{NAMESPACE}" name="T" />
  <api fingerprint="{METHOD}" kind="Method" parent="{TYPE}" name="Run()" />
  <syntax id="{TYPE}">class T</syntax>
</assembly>"#
            ))
            .unwrap();

        // The type is dropped, which orphans its member and its declaration too.
        assert_eq!(builder.diagnostics().error_count(), 3);
        let catalog = builder.build().unwrap();
        assert_eq!(catalog.api_count(), 0);
        assert!(catalog.roots().is_empty());
        assert!(catalog.assembly(&guid(ASSEMBLY)).unwrap().root_apis.is_empty());
    }

    #[test]
    fn duplicate_declaration_is_discarded() {
        let mut builder = CatalogBuilder::new();
        builder
            .index_str(&format!(
                r#"<assembly fingerprint="{ASSEMBLY}" name="A">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <syntax id="{NAMESPACE}">namespace N</syntax>
  <syntax id="{NAMESPACE}">namespace M</syntax>
</assembly>"#
            ))
            .unwrap();

        assert_eq!(
            builder
                .diagnostics()
                .by_category(DiagnosticCategory::Declaration)
                .count(),
            1
        );
        let catalog = builder.build().unwrap();
        let namespace = catalog.api(&guid(NAMESPACE)).unwrap();
        assert_eq!(namespace.declarations.len(), 1);
        assert_eq!(namespace.declarations[0].text(), "namespace N");
    }

    #[test]
    fn annotation_without_declaration_is_dropped() {
        let mut builder = CatalogBuilder::new();
        builder
            .index_str(&format!(
                r#"<assembly fingerprint="{ASSEMBLY}" name="A">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <obsolete id="{NAMESPACE}" message="gone" />
</assembly>"#
            ))
            .unwrap();

        assert_eq!(
            builder
                .diagnostics()
                .by_category(DiagnosticCategory::Annotation)
                .count(),
            1
        );
    }

    #[test]
    fn frameworks_and_packages() {
        let mut builder = builder();
        builder
            .index_str(&format!(
                r#"<framework name="net9.0">
  <assembly fingerprint="{ASSEMBLY}" packName="Microsoft.NETCore.App.Ref" profiles="client;full" />
  <assembly fingerprint="aaaaaaaa-0000-0000-0000-00000000ffff" />
</framework>"#
            ))
            .unwrap();
        builder
            .index_str(&format!(
                r#"<package fingerprint="bbbbbbbb-0000-0000-0000-000000000001" id="Contoso.Runtime" version="1.2.3">
  <assembly fingerprint="{ASSEMBLY}" framework="netstandard2.0" />
</package>"#
            ))
            .unwrap();

        assert_eq!(builder.diagnostics().error_count(), 1);
        let catalog = builder.build().unwrap();

        let framework = catalog.framework("net9.0").unwrap();
        assert_eq!(framework.assemblies.len(), 1);
        assert_eq!(
            framework.assemblies[0].pack.as_deref(),
            Some("Microsoft.NETCore.App.Ref")
        );
        assert_eq!(framework.assemblies[0].profiles, ["client", "full"]);

        let package = catalog
            .package(&guid("bbbbbbbb-0000-0000-0000-000000000001"))
            .unwrap();
        assert_eq!(package.name, "Contoso.Runtime");
        assert_eq!(package.version, "1.2.3");
        assert_eq!(
            package.assemblies,
            vec![("netstandard2.0".to_string(), guid(ASSEMBLY))]
        );
        assert!(catalog.framework("netstandard2.0").is_some());

        let assembly = catalog.assembly(&guid(ASSEMBLY)).unwrap();
        assert_eq!(assembly.frameworks, ["net9.0"]);
        assert_eq!(
            assembly.packages,
            vec![guid("bbbbbbbb-0000-0000-0000-000000000001")]
        );
    }

    #[test]
    fn unresolved_extensions_are_dropped() {
        let mut builder = CatalogBuilder::new();
        builder
            .index_str(&format!(
                r#"<assembly fingerprint="{ASSEMBLY}" name="A">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <extension fingerprint="00000000-0000-0000-0000-0000000000e1" type="{NAMESPACE}" method="{METHOD}" />
</assembly>"#
            ))
            .unwrap();
        builder.resolve_extensions().unwrap();

        assert!(builder.catalog().extensions().is_empty());
        assert_eq!(
            builder
                .diagnostics()
                .by_category(DiagnosticCategory::Extension)
                .count(),
            1
        );
    }

    #[test]
    fn extensions_are_resolved_once() {
        let mut builder = CatalogBuilder::new();
        for (assembly, name) in [(ASSEMBLY, "A"), ("aaaaaaaa-0000-0000-0000-000000000009", "B")] {
            builder
                .index_str(&format!(
                    r#"<assembly fingerprint="{assembly}" name="{name}">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <api fingerprint="{TYPE}" kind="Class" parent="{NAMESPACE}" name="T" />
  <api fingerprint="{METHOD}" kind="Method" parent="{TYPE}" name="M(N.T)" />
  <extension fingerprint="00000000-0000-0000-0000-0000000000e1" type="{TYPE}" method="{METHOD}" />
  <extension fingerprint="00000000-0000-0000-0000-0000000000e1" type="{TYPE}" method="{METHOD}" />
</assembly>"#
                ))
                .unwrap();
        }
        builder.resolve_extensions().unwrap();
        builder.resolve_extensions().unwrap();

        let extensions = builder.catalog().extensions();
        assert_eq!(extensions.len(), 1);
        assert_eq!(extensions[0].extended_type, guid(TYPE));
        assert_eq!(extensions[0].extension_method, guid(METHOD));
        assert!(builder.diagnostics().is_empty());
    }

    #[test]
    fn strict_mode_fails() {
        let mut builder = CatalogBuilder::with_config(BuilderConfig::strict());
        let result = builder.index_str(&format!(
            r#"<assembly fingerprint="{ASSEMBLY}" name="A">
  <api fingerprint="{TYPE}" kind="Class" parent="{NAMESPACE}" name="T" />
</assembly>"#
        ));
        assert!(matches!(result, Err(Error::Catalog(_))));

        let mut builder = CatalogBuilder::with_config(BuilderConfig::strict());
        let result = builder.index_str(&format!(
            r#"<assembly fingerprint="{ASSEMBLY}" name="A">
  <api fingerprint="{TYPE}" kind="Type" name="T" />
</assembly>"#
        ));
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn malformed_xml_propagates() {
        let mut builder = CatalogBuilder::new();
        let result = builder.index_str(&format!(
            r#"<assembly fingerprint="{ASSEMBLY}" name="A"><api></assembly>"#
        ));
        assert!(matches!(result, Err(Error::Xml(_))));
    }

    #[test]
    fn usage_is_recorded_per_source() {
        let mut builder = builder();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        builder.define_usage_source("nuget.org", date).unwrap();

        builder.add_usage("nuget.org", guid(TYPE), 0.25).unwrap();
        builder.add_usage("nuget.org", guid(TYPE), 0.5).unwrap();
        builder
            .add_usage("nuget.org", guid("99999999-0000-0000-0000-000000000000"), 0.5)
            .unwrap();
        builder.add_usage("unknown", guid(TYPE), 0.5).unwrap();
        builder.add_usage("nuget.org", guid(TYPE), 1.5).unwrap();

        assert_eq!(builder.diagnostics().error_count(), 2);
        assert_eq!(
            builder
                .diagnostics()
                .by_category(DiagnosticCategory::Usage)
                .count(),
            3
        );

        let catalog = builder.build().unwrap();
        assert_eq!(catalog.usage_source("nuget.org").unwrap().date, date);
        assert_eq!(
            catalog.api(&guid(TYPE)).unwrap().usages,
            vec![("nuget.org".to_string(), 0.5)]
        );
    }

    #[test]
    fn usage_from_aggregator() {
        let mut builder = CatalogBuilder::new();
        builder
            .index_str(
                r#"<assembly fingerprint="aaaaaaaa-0000-0000-0000-000000000001" name="System.Runtime">
  <api fingerprint="00000000-0000-0000-0000-00000000000a" kind="Namespace" name="System" />
</assembly>"#,
            )
            .unwrap();

        // Usage of APIs cataloged under their documentation id fingerprint.
        let object = crate::usage::fingerprint_of("T:System.Object");
        builder
            .index_str(&format!(
                r#"<assembly fingerprint="aaaaaaaa-0000-0000-0000-000000000002" name="System.Private.CoreLib">
  <api fingerprint="00000000-0000-0000-0000-00000000000a" kind="Namespace" name="System" />
  <api fingerprint="{object}" kind="Class" parent="00000000-0000-0000-0000-00000000000a" name="Object" />
</assembly>"#
            ))
            .unwrap();

        let aggregator = UsageAggregator::new();
        let mut first = CrawlerResults::new();
        first.record("T:System.Object".to_string());
        first.record("T:System.Console".to_string());
        aggregator.add(&first);
        aggregator.add(&CrawlerResults::new());

        builder
            .define_usage_source(
                "crawl",
                chrono::NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            )
            .unwrap();
        builder.add_usages("crawl", &aggregator).unwrap();

        let catalog = builder.build().unwrap();
        assert_eq!(
            catalog.api(&object).unwrap().usages,
            vec![("crawl".to_string(), 0.5)]
        );
    }
}
