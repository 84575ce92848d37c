use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    metadata::{
        customattributes::CustomAttributeArgument,
        docid,
        model::{
            AttributeConstructor, CustomAttribute, EventDefinition, FieldDefinition,
            GenericContext, GenericParameter, MemberReference, MemberReferenceParent,
            MetadataFile, MetadataModule, MetadataType, MethodDefinition, MethodReference,
            MethodSpecification, NamedType, PropertyDefinition, TypeDefinition,
        },
        signatures::MethodSignature,
        tables::TableId,
        token::Token,
        typename::AssemblyQualifiedTypeName,
    },
    usage::UsageAggregator,
    Error,
};

/// Deepest chain of nested types walked.
const MAX_NESTING: usize = 64;

/// Documentation ids referenced by one component, with their number of occurrences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlerResults {
    counts: HashMap<String, u64>,
}

impl CrawlerResults {
    /// Create empty results.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Occurrences of `id`, 0 if it was never referenced.
    #[must_use]
    pub fn count(&self, id: &str) -> u64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Returns `true` if `id` was referenced at least once.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.counts.contains_key(id)
    }

    /// Number of distinct ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if nothing was referenced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Distinct ids with their counts, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(id, count)| (id.as_str(), *count))
    }

    /// Add the counts of `other` to these.
    pub fn merge(&mut self, other: &CrawlerResults) {
        for (id, count) in other.iter() {
            *self.counts.entry(id.to_string()).or_insert(0) += count;
        }
    }

    pub(crate) fn record(&mut self, id: String) {
        *self.counts.entry(id).or_insert(0) += 1;
    }
}

/// Walks a component and counts its references to types and members defined elsewhere.
///
/// Every namespace, type, member and custom attribute of every loaded module is visited.
/// Entities the component defines itself are never counted, only references are. A reference
/// that can't be turned into a documentation id is skipped.
///
/// # Examples
///
/// ```rust,no_run
/// use apiscope::{metadata::model::MetadataFile, usage::Crawler};
/// use std::path::Path;
///
/// let file = MetadataFile::open(Path::new("App.dll"))?;
/// let results = Crawler::crawl(&file);
/// println!("Console.WriteLine(string): {}", results.count("M:System.Console.WriteLine(System.String)"));
/// # Ok::<(), apiscope::Error>(())
/// ```
pub struct Crawler<'a> {
    module: &'a MetadataModule<'a>,
    defined: &'a HashSet<String>,
    results: &'a mut CrawlerResults,
}

impl Crawler<'_> {
    /// Count the references made by every loaded module of `file`.
    #[must_use]
    pub fn crawl(file: &MetadataFile) -> CrawlerResults {
        let mut defined = HashSet::new();
        for module in file.modules() {
            for definition in module.types() {
                if let Some(id) = docid::type_id(&NamedType::Definition(definition)) {
                    defined.insert(id);
                }
            }
        }

        let mut results = CrawlerResults::new();
        for module in file.modules() {
            let mut crawler = Crawler {
                module,
                defined: &defined,
                results: &mut results,
            };
            crawler.crawl_module();
        }

        tracing::debug!(
            "Crawled {}: {} distinct references",
            file.name(),
            results.len()
        );
        results
    }
}

impl<'a> Crawler<'a> {
    fn crawl_module(&mut self) {
        for attribute in self.module.assembly_custom_attributes() {
            self.custom_attribute(attribute);
        }
        for attribute in self.module.module_custom_attributes() {
            self.custom_attribute(attribute);
        }

        for namespace in self.module.namespace_root().descendants() {
            for definition in namespace.types() {
                self.type_definition(definition, 0);
            }
        }
    }

    fn type_definition(&mut self, definition: TypeDefinition<'a>, depth: usize) {
        if depth >= MAX_NESTING {
            return;
        }

        if let Ok(Some(base)) = definition.base_type() {
            self.type_expression(&base);
        }
        if let Ok(interfaces) = definition.interfaces() {
            for interface in &interfaces {
                self.type_expression(interface);
            }
        }
        for attribute in definition.interface_custom_attributes() {
            self.custom_attribute(attribute);
        }
        for parameter in definition.generic_parameters() {
            self.generic_parameter(parameter);
        }
        for attribute in definition.custom_attributes() {
            self.custom_attribute(attribute);
        }

        for field in definition.fields().unwrap_or_default() {
            self.field(field);
        }
        for method in definition.methods().unwrap_or_default() {
            self.method(method);
        }
        for property in definition.properties().unwrap_or_default() {
            self.property(property);
        }
        for event in definition.events().unwrap_or_default() {
            self.event(event);
        }
        for nested in definition.nested_types() {
            self.type_definition(nested, depth + 1);
        }
    }

    fn generic_parameter(&mut self, parameter: GenericParameter<'a>) {
        if let Ok(constraints) = parameter.constraints() {
            for constraint in &constraints {
                self.type_expression(constraint);
            }
        }
        for attribute in parameter.custom_attributes() {
            self.custom_attribute(attribute);
        }
    }

    fn method(&mut self, method: MethodDefinition<'a>) {
        if let Ok(signature) = method.signature() {
            self.signature(&signature);
        }
        for parameter in method.generic_parameters() {
            self.generic_parameter(parameter);
        }
        for attribute in method.custom_attributes() {
            self.custom_attribute(attribute);
        }
        for attribute in method.return_custom_attributes().unwrap_or_default() {
            self.custom_attribute(attribute);
        }
        for parameter in method.parameters().unwrap_or_default() {
            for attribute in parameter.custom_attributes() {
                self.custom_attribute(attribute);
            }
        }

        match method.operands() {
            Ok(operands) => {
                for operand in operands {
                    self.operand(operand.token);
                }
            }
            Err(error) => {
                tracing::trace!("Skipping the body of {}: {}", method.token(), error);
            }
        }
    }

    fn field(&mut self, field: FieldDefinition<'a>) {
        if let Ok(field_type) = field.field_type() {
            self.type_expression(&field_type);
        }
        for attribute in field.custom_attributes() {
            self.custom_attribute(attribute);
        }
    }

    fn property(&mut self, property: PropertyDefinition<'a>) {
        if let Ok(signature) = property.signature() {
            self.signature(&signature);
        }
        for attribute in property.custom_attributes() {
            self.custom_attribute(attribute);
        }
    }

    fn event(&mut self, event: EventDefinition<'a>) {
        if let Ok(Some(event_type)) = event.event_type() {
            self.type_expression(&event_type);
        }
        for attribute in event.custom_attributes() {
            self.custom_attribute(attribute);
        }
    }

    fn signature(&mut self, signature: &MethodSignature<MetadataType<'a>>) {
        self.type_expression(&signature.return_type);
        for parameter in &signature.parameter_types {
            self.type_expression(parameter);
        }
    }

    fn operand(&mut self, token: Token) {
        let in_range =
            |table: TableId| token.row() >= 1 && token.row() <= self.module.tables().row_count(table);

        match token.table_id() {
            Some(TableId::TypeRef | TableId::TypeSpec) => {
                if let Ok(referenced) = self
                    .module
                    .type_from_token(token, &GenericContext::empty())
                {
                    self.type_expression(&referenced);
                }
            }
            Some(TableId::MemberRef) if in_range(TableId::MemberRef) => {
                self.member_reference(MemberReference::new(self.module, token.row()));
            }
            Some(TableId::MethodSpec) if in_range(TableId::MethodSpec) => {
                self.method_specification(MethodSpecification::new(self.module, token.row()));
            }
            _ => {}
        }
    }

    fn member_reference(&mut self, reference: MemberReference<'a>) {
        let Ok(parent) = reference.parent() else {
            return;
        };

        let external = match &parent {
            MemberReferenceParent::Type(named) => {
                self.type_expression(&MetadataType::class(*named));
                !named.is_definition()
            }
            MemberReferenceParent::TypeSpecification(parent_type) => {
                self.type_expression(parent_type);
                parent_type
                    .element_named_type()
                    .is_some_and(|named| !named.is_definition())
            }
            MemberReferenceParent::ModuleReference(_) | MemberReferenceParent::Method(_) => false,
        };

        if external {
            if let Some(id) = docid::member_reference_id(&reference) {
                self.results.record(id);
            }
        }
    }

    fn method_specification(&mut self, specification: MethodSpecification<'a>) {
        if let Ok(MethodReference::Reference(reference)) = specification.method() {
            self.member_reference(reference);
        }
        if let Ok(arguments) = specification.instantiation() {
            for argument in &arguments {
                self.type_expression(argument);
            }
        }
    }

    fn type_expression(&mut self, metadata_type: &MetadataType<'a>) {
        match metadata_type {
            MetadataType::Primitive(code) => {
                if self.module.special_type(*code).is_none() {
                    self.results.record(format!("T:System.{}", code));
                }
            }
            MetadataType::Named { named, .. } => self.named_type(named),
            MetadataType::Instance(instance) => {
                self.named_type(&instance.generic());
                for argument in instance.arguments() {
                    self.type_expression(argument);
                }
            }
            MetadataType::Array { element, .. }
            | MetadataType::ByRef(element)
            | MetadataType::Pointer(element)
            | MetadataType::Pinned(element) => self.type_expression(element),
            MetadataType::FunctionPointer(signature) => self.signature(signature),
            MetadataType::Modified {
                modifier,
                unmodified,
                ..
            } => {
                self.type_expression(modifier);
                self.type_expression(unmodified);
            }
            MetadataType::GenericParameter { .. } => {}
        }
    }

    fn named_type(&mut self, named: &NamedType<'a>) {
        if named.is_definition() {
            return;
        }
        if let Some(id) = docid::type_id(named) {
            self.results.record(id);
        }
    }

    fn custom_attribute(&mut self, attribute: CustomAttribute<'a>) {
        match attribute.constructor() {
            Ok(AttributeConstructor::Reference(reference)) => self.member_reference(reference),
            Ok(AttributeConstructor::Method(_)) => {}
            Err(_) => return,
        }

        let Some(value) = attribute.value() else {
            return;
        };

        let arguments = value
            .fixed_args
            .iter()
            .chain(value.named_args.iter().map(|named| &named.value));
        for argument in arguments {
            self.attribute_argument(argument);
        }
    }

    fn attribute_argument(&mut self, argument: &CustomAttributeArgument) {
        for name in argument.type_values() {
            self.serialized_type_name(name);
        }
    }

    fn serialized_type_name(&mut self, name: &AssemblyQualifiedTypeName) {
        if let Some(id) = name.documentation_id() {
            if !self.defined.contains(&id) {
                self.results.record(id);
            }
        }
        if let Some(arguments) = &name.type_arguments {
            for argument in arguments {
                self.serialized_type_name(argument);
            }
        }
    }
}

/// Outcome of crawling many components.
#[derive(Debug, Default)]
pub struct CrawlSummary {
    /// Total occurrences per documentation id, over all crawled files
    pub occurrences: DashMap<String, u64>,
    /// Per file presence of each id, for usage fractions
    pub aggregator: UsageAggregator,
    /// Files that couldn't be opened, with the reason
    pub failures: Vec<(PathBuf, Error)>,
}

impl CrawlSummary {
    /// Number of files crawled successfully.
    #[must_use]
    pub fn crawled(&self) -> usize {
        self.aggregator.file_count()
    }
}

/// Crawl `paths` in parallel.
///
/// Each file is opened together with its companion modules. Files that can't be read are
/// listed in [`CrawlSummary::failures`] and don't stop the others.
pub fn crawl_files<P: AsRef<Path> + Sync>(paths: &[P]) -> CrawlSummary {
    let occurrences: DashMap<String, u64> = DashMap::new();
    let aggregator = UsageAggregator::new();

    let failures: Vec<(PathBuf, Error)> = paths
        .par_iter()
        .filter_map(|path| {
            let path = path.as_ref();
            let file = match MetadataFile::open_with_modules(path) {
                Ok(file) => file,
                Err(error) => {
                    tracing::debug!("Failed to open {}: {}", path.display(), error);
                    return Some((path.to_path_buf(), error));
                }
            };

            let results = Crawler::crawl(&file);
            for (id, count) in results.iter() {
                *occurrences.entry(id.to_string()).or_insert(0) += count;
            }
            aggregator.add(&results);
            None
        })
        .collect();

    tracing::debug!(
        "Crawled {} files, {} failed",
        aggregator.file_count(),
        failures.len()
    );
    CrawlSummary {
        occurrences,
        aggregator,
        failures,
    }
}
