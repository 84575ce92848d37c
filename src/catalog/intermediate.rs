//! The in-memory graph a [`crate::catalog::CatalogBuilder`] fills and a
//! [`crate::catalog::CatalogWriter`] serializes.
//!
//! Entities reference each other by fingerprint (APIs, assemblies, packages) or by name
//! (frameworks, platforms, usage sources). Handles only exist in the written catalog; the
//! `ordered_*` functions define the order in which the writer assigns them.

use std::collections::{BTreeSet, HashMap};

use uguid::Guid;

use crate::catalog::format::{ApiKind, SyntaxTokenKind};

/// One piece of declaration syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateSyntaxToken {
    /// What the text is
    pub kind: SyntaxTokenKind,
    /// The text itself
    pub text: String,
    /// The API a [`SyntaxTokenKind::Reference`] points at
    pub reference: Option<Guid>,
}

impl IntermediateSyntaxToken {
    /// Create a token without a reference.
    pub fn new(kind: SyntaxTokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            reference: None,
        }
    }

    /// Create a reference to `api`.
    pub fn reference(api: Guid, text: impl Into<String>) -> Self {
        Self {
            kind: SyntaxTokenKind::Reference,
            text: text.into(),
            reference: Some(api),
        }
    }
}

/// Obsoletion of an API or assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntermediateObsoletion {
    /// Text shown at use sites
    pub message: Option<String>,
    /// Whether use is a compile error
    pub is_error: bool,
    /// Diagnostic id reported at use sites
    pub diagnostic_id: Option<String>,
    /// Documentation link, `{0}` is the diagnostic id
    pub url_format: Option<String>,
}

/// Whether an API or assembly works on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntermediatePlatformSupport {
    /// Platform name, such as `windows`
    pub platform: String,
    /// `false` for an unsupported platform
    pub is_supported: bool,
}

/// Requirement to opt into preview features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntermediatePreviewRequirement {
    /// Text shown at use sites
    pub message: Option<String>,
    /// Documentation link
    pub url: Option<String>,
}

/// Marker for experimental APIs or assemblies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntermediateExperimental {
    /// Diagnostic id reported at use sites
    pub diagnostic_id: Option<String>,
    /// Documentation link, `{0}` is the diagnostic id
    pub url_format: Option<String>,
}

/// Annotations of one assembly, or of one API's declaration in one assembly.
///
/// Platform support accumulates; the other annotations overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntermediateAnnotations {
    /// Obsoletion
    pub obsoletion: Option<IntermediateObsoletion>,
    /// Supported and unsupported platforms
    pub platform_support: Vec<IntermediatePlatformSupport>,
    /// Preview requirement
    pub preview_requirement: Option<IntermediatePreviewRequirement>,
    /// Experimental marker
    pub experimental: Option<IntermediateExperimental>,
}

impl IntermediateAnnotations {
    /// Returns `true` if nothing is annotated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.obsoletion.is_none()
            && self.platform_support.is_empty()
            && self.preview_requirement.is_none()
            && self.experimental.is_none()
    }
}

/// The syntax of an API in one assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateDeclaration {
    /// Fingerprint of the declaring assembly
    pub assembly: Guid,
    /// Declaration syntax
    pub syntax: Vec<IntermediateSyntaxToken>,
    /// Annotations of this declaration
    pub annotations: IntermediateAnnotations,
}

impl IntermediateDeclaration {
    /// The declaration as plain text.
    #[must_use]
    pub fn text(&self) -> String {
        self.syntax.iter().map(|token| token.text.as_str()).collect()
    }
}

/// A namespace, type or member.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateApi {
    /// Identity
    pub fingerprint: Guid,
    /// What the API is
    pub kind: ApiKind,
    /// Fingerprint of the containing API
    pub parent: Option<Guid>,
    /// Name, including the parameter list of members
    pub name: String,
    /// Child fingerprints, in order of definition
    pub children: Vec<Guid>,
    /// One declaration per declaring assembly
    pub declarations: Vec<IntermediateDeclaration>,
    /// Usage source name and the share of its files referencing this API
    pub usages: Vec<(String, f32)>,
}

impl IntermediateApi {
    /// The declaration in `assembly`, if any.
    #[must_use]
    pub fn declaration(&self, assembly: &Guid) -> Option<&IntermediateDeclaration> {
        self.declarations.iter().find(|d| d.assembly == *assembly)
    }
}

/// An indexed assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateAssembly {
    /// Identity
    pub fingerprint: Guid,
    /// Simple name
    pub name: String,
    /// Hex encoded public key token, empty for unsigned assemblies
    pub public_key_token: String,
    /// Assembly version
    pub version: String,
    /// Top level ancestors of the APIs declared by this assembly
    pub root_apis: Vec<Guid>,
    /// Names of the frameworks shipping this assembly
    pub frameworks: Vec<String>,
    /// Fingerprints of the packages shipping this assembly
    pub packages: Vec<Guid>,
    /// Assembly level annotations
    pub annotations: IntermediateAnnotations,
}

/// An assembly as part of a framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateFrameworkAssembly {
    /// Fingerprint of the assembly
    pub assembly: Guid,
    /// Targeting pack the assembly comes from
    pub pack: Option<String>,
    /// Profiles the assembly is part of
    pub profiles: Vec<String>,
}

/// A framework such as `net9.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateFramework {
    /// Target framework moniker
    pub name: String,
    /// Assemblies, in order of mention
    pub assemblies: Vec<IntermediateFrameworkAssembly>,
}

/// A package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediatePackage {
    /// Identity
    pub fingerprint: Guid,
    /// Package id
    pub name: String,
    /// Package version
    pub version: String,
    /// Framework name and assembly fingerprint pairs
    pub assemblies: Vec<(String, Guid)>,
}

/// A source of usage data, such as a crawl of a package feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateUsageSource {
    /// Unique name
    pub name: String,
    /// When the usage data was collected
    pub date: chrono::NaiveDate,
}

/// An extension method and the type it extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntermediateExtension {
    /// Identity
    pub fingerprint: Guid,
    /// Fingerprint of the extended type
    pub extended_type: Guid,
    /// Fingerprint of the method
    pub extension_method: Guid,
}

/// The intermediate graph.
///
/// Collections keep insertion order next to a lookup index. Mutation happens through
/// [`crate::catalog::CatalogBuilder`], which enforces the integrity rules; this type only
/// stores.
#[derive(Debug, Default)]
pub struct IntermediateCatalog {
    platforms: BTreeSet<String>,
    frameworks: Vec<IntermediateFramework>,
    framework_index: HashMap<String, usize>,
    packages: Vec<IntermediatePackage>,
    package_index: HashMap<Guid, usize>,
    assemblies: Vec<IntermediateAssembly>,
    assembly_index: HashMap<Guid, usize>,
    usage_sources: Vec<IntermediateUsageSource>,
    usage_source_index: HashMap<String, usize>,
    apis: Vec<IntermediateApi>,
    api_index: HashMap<Guid, usize>,
    roots: Vec<Guid>,
    extensions: Vec<IntermediateExtension>,
    extension_index: HashMap<Guid, usize>,
}

impl IntermediateCatalog {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The API with `fingerprint`.
    #[must_use]
    pub fn api(&self, fingerprint: &Guid) -> Option<&IntermediateApi> {
        self.api_index.get(fingerprint).map(|&i| &self.apis[i])
    }

    /// All APIs, in order of definition.
    pub fn apis(&self) -> impl Iterator<Item = &IntermediateApi> {
        self.apis.iter()
    }

    /// Number of APIs.
    #[must_use]
    pub fn api_count(&self) -> usize {
        self.apis.len()
    }

    /// Fingerprints of the APIs without a parent, in order of definition.
    #[must_use]
    pub fn roots(&self) -> &[Guid] {
        &self.roots
    }

    /// The assembly with `fingerprint`.
    #[must_use]
    pub fn assembly(&self, fingerprint: &Guid) -> Option<&IntermediateAssembly> {
        self.assembly_index
            .get(fingerprint)
            .map(|&i| &self.assemblies[i])
    }

    /// All assemblies, in order of indexing.
    pub fn assemblies(&self) -> impl Iterator<Item = &IntermediateAssembly> {
        self.assemblies.iter()
    }

    /// The framework called `name`.
    #[must_use]
    pub fn framework(&self, name: &str) -> Option<&IntermediateFramework> {
        self.framework_index.get(name).map(|&i| &self.frameworks[i])
    }

    /// All frameworks, in order of first mention.
    pub fn frameworks(&self) -> impl Iterator<Item = &IntermediateFramework> {
        self.frameworks.iter()
    }

    /// The package with `fingerprint`.
    #[must_use]
    pub fn package(&self, fingerprint: &Guid) -> Option<&IntermediatePackage> {
        self.package_index.get(fingerprint).map(|&i| &self.packages[i])
    }

    /// All packages, in order of indexing.
    pub fn packages(&self) -> impl Iterator<Item = &IntermediatePackage> {
        self.packages.iter()
    }

    /// The usage source called `name`.
    #[must_use]
    pub fn usage_source(&self, name: &str) -> Option<&IntermediateUsageSource> {
        self.usage_source_index
            .get(name)
            .map(|&i| &self.usage_sources[i])
    }

    /// All usage sources, in order of definition.
    pub fn usage_sources(&self) -> impl Iterator<Item = &IntermediateUsageSource> {
        self.usage_sources.iter()
    }

    /// Every platform named by a platform support annotation, sorted.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms.iter().map(String::as_str)
    }

    /// Resolved extension methods.
    #[must_use]
    pub fn extensions(&self) -> &[IntermediateExtension] {
        &self.extensions
    }

    // Row order of each table. Handle assignment and row writing both iterate these.

    pub(crate) fn ordered_platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms()
    }

    pub(crate) fn ordered_frameworks(&self) -> impl Iterator<Item = &IntermediateFramework> {
        self.frameworks.iter()
    }

    pub(crate) fn ordered_packages(&self) -> impl Iterator<Item = &IntermediatePackage> {
        self.packages.iter()
    }

    pub(crate) fn ordered_assemblies(&self) -> impl Iterator<Item = &IntermediateAssembly> {
        self.assemblies.iter()
    }

    pub(crate) fn ordered_usage_sources(&self) -> impl Iterator<Item = &IntermediateUsageSource> {
        self.usage_sources.iter()
    }

    /// APIs in preorder: every parent directly before its subtree, roots in order.
    pub(crate) fn ordered_apis(&self) -> Vec<&IntermediateApi> {
        let mut ordered = Vec::with_capacity(self.apis.len());
        let mut stack: Vec<&Guid> = self.roots.iter().rev().collect();
        while let Some(fingerprint) = stack.pop() {
            if let Some(api) = self.api(fingerprint) {
                ordered.push(api);
                stack.extend(api.children.iter().rev());
            }
        }
        ordered
    }

    pub(crate) fn ordered_extensions(&self) -> impl Iterator<Item = &IntermediateExtension> {
        self.extensions.iter()
    }

    pub(crate) fn contains_api(&self, fingerprint: &Guid) -> bool {
        self.api_index.contains_key(fingerprint)
    }

    pub(crate) fn api_mut(&mut self, fingerprint: &Guid) -> Option<&mut IntermediateApi> {
        self.api_index
            .get(fingerprint)
            .map(|&i| &mut self.apis[i])
    }

    /// Add `api` and link it into its parent. The caller checks the parent exists.
    pub(crate) fn insert_api(&mut self, api: IntermediateApi) {
        match api.parent {
            Some(parent) => {
                if let Some(parent) = self.api_mut(&parent) {
                    parent.children.push(api.fingerprint);
                }
            }
            None => self.roots.push(api.fingerprint),
        }
        self.api_index.insert(api.fingerprint, self.apis.len());
        self.apis.push(api);
    }

    pub(crate) fn assembly_mut(&mut self, fingerprint: &Guid) -> Option<&mut IntermediateAssembly> {
        self.assembly_index
            .get(fingerprint)
            .map(|&i| &mut self.assemblies[i])
    }

    pub(crate) fn insert_assembly(&mut self, assembly: IntermediateAssembly) {
        self.assembly_index
            .insert(assembly.fingerprint, self.assemblies.len());
        self.assemblies.push(assembly);
    }

    /// The framework called `name`, created empty on first use.
    pub(crate) fn framework_mut(&mut self, name: &str) -> &mut IntermediateFramework {
        let index = match self.framework_index.get(name) {
            Some(&index) => index,
            None => {
                let index = self.frameworks.len();
                self.frameworks.push(IntermediateFramework {
                    name: name.to_string(),
                    assemblies: Vec::new(),
                });
                self.framework_index.insert(name.to_string(), index);
                index
            }
        };
        &mut self.frameworks[index]
    }

    pub(crate) fn package_mut(&mut self, fingerprint: &Guid) -> Option<&mut IntermediatePackage> {
        self.package_index
            .get(fingerprint)
            .map(|&i| &mut self.packages[i])
    }

    pub(crate) fn insert_package(&mut self, package: IntermediatePackage) {
        self.package_index
            .insert(package.fingerprint, self.packages.len());
        self.packages.push(package);
    }

    pub(crate) fn insert_usage_source(&mut self, source: IntermediateUsageSource) {
        self.usage_source_index
            .insert(source.name.clone(), self.usage_sources.len());
        self.usage_sources.push(source);
    }

    pub(crate) fn insert_platform(&mut self, platform: &str) {
        if !self.platforms.contains(platform) {
            self.platforms.insert(platform.to_string());
        }
    }

    pub(crate) fn contains_extension(&self, fingerprint: &Guid) -> bool {
        self.extension_index.contains_key(fingerprint)
    }

    pub(crate) fn insert_extension(&mut self, extension: IntermediateExtension) {
        self.extension_index
            .insert(extension.fingerprint, self.extensions.len());
        self.extensions.push(extension);
    }

    /// Top level ancestor of `fingerprint`.
    pub(crate) fn root_of(&self, fingerprint: &Guid) -> Guid {
        let mut current = *fingerprint;
        // Parents are always defined before their children, so this walk terminates.
        while let Some(parent) = self.api(&current).and_then(|api| api.parent) {
            current = parent;
        }
        current
    }
}
