use std::collections::HashMap;

use crate::metadata::model::{MetadataModule, TypeDefinition};

struct NamespaceNode {
    full_name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    types: Vec<u32>,
}

/// The namespaces of a module as a tree, node 0 being the global namespace.
pub(crate) struct NamespaceTree {
    nodes: Vec<NamespaceNode>,
}

impl NamespaceTree {
    pub(crate) fn build(module: &MetadataModule<'_>) -> NamespaceTree {
        let mut nodes = vec![NamespaceNode {
            full_name: String::new(),
            parent: None,
            children: Vec::new(),
            types: Vec::new(),
        }];
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for rid in 1..=module.tables().row_count(crate::metadata::tables::TableId::TypeDef) {
            if module.enclosing_type(rid).is_some() {
                continue;
            }

            let Ok(namespace) = module
                .type_def_row(rid)
                .and_then(|row| module.string(row.type_namespace))
            else {
                tracing::debug!("Skipping unreadable type definition {}", rid);
                continue;
            };

            let mut current = 0;
            if !namespace.is_empty() {
                let mut end = 0;
                for segment in namespace.split('.') {
                    end += segment.len();
                    let full_name = &namespace[..end];
                    end += 1;

                    current = match by_name.get(full_name) {
                        Some(index) => *index,
                        None => {
                            let index = nodes.len();
                            nodes.push(NamespaceNode {
                                full_name: full_name.to_string(),
                                parent: Some(current),
                                children: Vec::new(),
                                types: Vec::new(),
                            });
                            nodes[current].children.push(index);
                            by_name.insert(full_name.to_string(), index);
                            index
                        }
                    };
                }
            }

            nodes[current].types.push(rid);
        }

        NamespaceTree { nodes }
    }
}

/// A namespace of a module.
///
/// Intermediate namespaces exist even without types of their own, so `System.Collections`
/// appears between `System` and `System.Collections.Generic`.
#[derive(Clone, Copy)]
pub struct Namespace<'a> {
    module: &'a MetadataModule<'a>,
    index: usize,
}

impl<'a> Namespace<'a> {
    pub(crate) fn new(module: &'a MetadataModule<'a>, index: usize) -> Namespace<'a> {
        Namespace { module, index }
    }

    fn node(&self) -> &'a NamespaceNode {
        &self.module.namespace_tree().nodes[self.index]
    }

    /// The module this namespace belongs to.
    #[must_use]
    pub fn module(&self) -> &'a MetadataModule<'a> {
        self.module
    }

    /// The dotted name, empty for the global namespace.
    #[must_use]
    pub fn full_name(&self) -> &'a str {
        &self.node().full_name
    }

    /// The last segment of the name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        let full_name = self.full_name();
        match full_name.rfind('.') {
            Some(dot) => &full_name[dot + 1..],
            None => full_name,
        }
    }

    /// Returns `true` for the global namespace.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.index == 0
    }

    /// The enclosing namespace.
    #[must_use]
    pub fn parent(&self) -> Option<Namespace<'a>> {
        self.node()
            .parent
            .map(|index| Namespace::new(self.module, index))
    }

    /// Directly contained namespaces.
    #[must_use]
    pub fn namespaces(&self) -> Vec<Namespace<'a>> {
        self.node()
            .children
            .iter()
            .map(|index| Namespace::new(self.module, *index))
            .collect()
    }

    /// Top level types declared in this namespace.
    #[must_use]
    pub fn types(&self) -> Vec<TypeDefinition<'a>> {
        self.node()
            .types
            .iter()
            .map(|rid| TypeDefinition::new(self.module, *rid))
            .collect()
    }

    /// This namespace and all namespaces below it, parents first.
    #[must_use]
    pub fn descendants(&self) -> Vec<Namespace<'a>> {
        let mut result = Vec::new();
        let mut stack = vec![*self];
        while let Some(namespace) = stack.pop() {
            result.push(namespace);
            let mut children = namespace.namespaces();
            children.reverse();
            stack.extend(children);
        }
        result
    }
}

impl PartialEq for Namespace<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.module, other.module) && self.index == other.index
    }
}

impl Eq for Namespace<'_> {}

impl std::fmt::Debug for Namespace<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Namespace({:?})", self.full_name())
    }
}
