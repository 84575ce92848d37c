//! Serialized type names as they appear in custom attribute blobs.
//!
//! Arguments of type `System.Type`, and the enum type of boxed enum values, are stored as
//! assembly-qualified type names (ECMA-335 II.23.3):
//!
//! ```text
//! Namespace.Outer`1+Inner[[System.Int32, mscorlib]]*[,], MyAssembly, Version=1.0.0.0
//! ```
//!
//! [`AssemblyQualifiedTypeName::decode`] splits such a string into its top level type, nested
//! type segments, generic arguments, pointer and array suffixes and assembly qualifier. The
//! decoder is permissive: delimiters in places where they can't be interpreted are kept as
//! literal name text, so any input produces a name.
//!
//! # Examples
//!
//! ```rust
//! use apiscope::metadata::typename::AssemblyQualifiedTypeName;
//!
//! let name = AssemblyQualifiedTypeName::decode("System.Collections.Generic.List`1[[System.Int32, mscorlib]], mscorlib")?;
//! assert_eq!(name.top_level_type, "System.Collections.Generic.List`1");
//! assert_eq!(name.type_arguments.as_ref().map(Vec::len), Some(1));
//! assert_eq!(name.assembly_name.as_deref(), Some("mscorlib"));
//! # Ok::<(), apiscope::Error>(())
//! ```

use std::fmt;

use crate::Result;

/// Generic argument lists nested deeper than this are kept as literal name text.
const MAX_NESTING_DEPTH: usize = 64;

/// A parsed assembly-qualified type name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssemblyQualifiedTypeName {
    /// Namespace qualified name of the outermost type, including its arity suffix
    pub top_level_type: String,
    /// Names of the nested types, outermost first
    pub nested_types: Vec<String>,
    /// Generic arguments, `None` if the name carries no argument list
    pub type_arguments: Option<Vec<AssemblyQualifiedTypeName>>,
    /// Number of `*` suffixes
    pub pointer_count: u32,
    /// Array suffixes in order; `0` is a single dimensional `[]` array
    pub array_ranks: Vec<u32>,
    /// Assembly qualifier, without the separating comma and surrounding spaces
    pub assembly_name: Option<String>,
}

/// Where the name being scanned sits, which decides how `,` and `]` are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    TopLevel,
    Argument,
    QualifiedArgument,
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.text[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// Consume `[]`, `[*]` or `[,...]` if one starts here.
    fn array_rank(&mut self) -> Option<u32> {
        match self.peek_at(1)? {
            b']' => {
                self.pos += 2;
                Some(0)
            }
            b'*' if self.peek_at(2) == Some(b']') => {
                self.pos += 3;
                Some(1)
            }
            b',' => {
                let mut offset = 1;
                while self.peek_at(offset) == Some(b',') {
                    offset += 1;
                }
                if self.peek_at(offset) != Some(b']') {
                    return None;
                }
                self.pos += offset + 1;
                u32::try_from(offset).ok()
            }
            _ => None,
        }
    }

    fn assembly_name(&mut self, context: Context) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b']' && context == Context::QualifiedArgument {
                break;
            }
            self.pos += 1;
        }
        self.text[start..self.pos].trim().to_string()
    }
}

fn is_generic_segment(segment: &str) -> bool {
    match segment.rfind('`') {
        Some(tick) => {
            let arity = &segment[tick + 1..];
            !arity.is_empty() && arity.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

impl AssemblyQualifiedTypeName {
    /// Parse a serialized type name.
    ///
    /// # Errors
    /// Only returns an error if the scanner reaches a state it can't account for; any input
    /// text, however malformed, otherwise yields a name.
    pub fn decode(text: &str) -> Result<AssemblyQualifiedTypeName> {
        let mut scanner = Scanner { text, pos: 0 };
        let mut name = Self::decode_type(&mut scanner, Context::TopLevel, 0)?;

        // Leftover input can only be a stray delimiter, keep it as part of the name
        if scanner.pos < text.len() {
            name.last_segment_mut().push_str(&text[scanner.pos..]);
        }

        Ok(name)
    }

    fn decode_type(
        scanner: &mut Scanner<'_>,
        context: Context,
        depth: usize,
    ) -> Result<AssemblyQualifiedTypeName> {
        let mut name = AssemblyQualifiedTypeName::default();
        let mut segments: Vec<String> = Vec::new();
        let mut segment = String::new();

        while let Some(c) = scanner.peek() {
            let has_suffix = name.type_arguments.is_some()
                || name.pointer_count > 0
                || !name.array_ranks.is_empty();

            match c {
                b'\\' => {
                    scanner.pos += 1;
                    segment.push(scanner.bump().unwrap_or('\\'));
                }
                b'+' => {
                    scanner.pos += 1;
                    if has_suffix {
                        segment.push('+');
                    } else {
                        segments.push(std::mem::take(&mut segment));
                    }
                }
                b'*' => {
                    scanner.pos += 1;
                    name.pointer_count += 1;
                }
                b'[' => {
                    // Arguments of a nested type follow the last segment, the arity may sit
                    // on any containing type
                    let starts_arguments = !has_suffix
                        && depth < MAX_NESTING_DEPTH
                        && (is_generic_segment(&segment)
                            || segments.iter().any(|s| is_generic_segment(s)))
                        && !matches!(scanner.peek_at(1), Some(b']' | b',' | b'*') | None);

                    if starts_arguments {
                        name.type_arguments = Some(Self::decode_arguments(scanner, depth + 1)?);
                    } else if let Some(rank) = scanner.array_rank() {
                        name.array_ranks.push(rank);
                    } else {
                        scanner.pos += 1;
                        segment.push('[');
                    }
                }
                b']' => {
                    if context == Context::TopLevel {
                        scanner.pos += 1;
                        segment.push(']');
                    } else {
                        break;
                    }
                }
                b',' => {
                    if context == Context::Argument {
                        break;
                    }
                    scanner.pos += 1;
                    name.assembly_name = Some(scanner.assembly_name(context));
                    break;
                }
                _ => {
                    if let Some(c) = scanner.bump() {
                        segment.push(c);
                    }
                }
            }
        }

        segments.push(segment);
        let mut segments = segments.into_iter();
        name.top_level_type = segments.next().unwrap_or_default();
        name.nested_types = segments.collect();
        Ok(name)
    }

    fn decode_arguments(
        scanner: &mut Scanner<'_>,
        depth: usize,
    ) -> Result<Vec<AssemblyQualifiedTypeName>> {
        // Opening bracket of the list
        scanner.pos += 1;

        let mut arguments = Vec::new();
        loop {
            scanner.skip_spaces();
            if scanner.peek() == Some(b'[') {
                scanner.pos += 1;
                let argument = Self::decode_type(scanner, Context::QualifiedArgument, depth)?;
                match scanner.peek() {
                    Some(b']') => scanner.pos += 1,
                    None => {}
                    Some(other) => {
                        return Err(crate::Error::Error(format!(
                            "Type name scanner stopped at '{}' inside a qualified argument",
                            other as char
                        )))
                    }
                }
                arguments.push(argument);
            } else {
                arguments.push(Self::decode_type(scanner, Context::Argument, depth)?);
            }

            scanner.skip_spaces();
            match scanner.peek() {
                Some(b',') => scanner.pos += 1,
                Some(b']') => {
                    scanner.pos += 1;
                    break;
                }
                _ => break,
            }
        }

        Ok(arguments)
    }

    fn last_segment_mut(&mut self) -> &mut String {
        match self.nested_types.last_mut() {
            Some(segment) => segment,
            None => &mut self.top_level_type,
        }
    }

    /// The namespace of the top level type, empty for the global namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self.top_level_type.rfind('.') {
            Some(dot) => &self.top_level_type[..dot],
            None => "",
        }
    }

    /// The simple name of the innermost type, including its arity suffix.
    #[must_use]
    pub fn name(&self) -> &str {
        match self.nested_types.last() {
            Some(nested) => nested,
            None => match self.top_level_type.rfind('.') {
                Some(dot) => &self.top_level_type[dot + 1..],
                None => &self.top_level_type,
            },
        }
    }

    /// Returns `true` for names with pointer or array suffixes, or generic arguments.
    #[must_use]
    pub fn is_constructed(&self) -> bool {
        self.type_arguments.is_some() || self.pointer_count > 0 || !self.array_ranks.is_empty()
    }

    /// The `T:` documentation id of the named type, ignoring arguments and suffixes.
    ///
    /// Returns `None` for an empty name.
    #[must_use]
    pub fn documentation_id(&self) -> Option<String> {
        if self.top_level_type.is_empty() {
            return None;
        }

        let mut id = format!("T:{}", self.top_level_type);
        for nested in &self.nested_types {
            id.push('.');
            id.push_str(nested);
        }
        Some(id)
    }
}

fn write_segment(f: &mut fmt::Formatter<'_>, segment: &str) -> fmt::Result {
    for c in segment.chars() {
        if matches!(c, '+' | ',' | '[' | ']' | '*' | '\\') {
            write!(f, "\\")?;
        }
        write!(f, "{}", c)?;
    }
    Ok(())
}

impl fmt::Display for AssemblyQualifiedTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_segment(f, &self.top_level_type)?;
        for nested in &self.nested_types {
            write!(f, "+")?;
            write_segment(f, nested)?;
        }

        if let Some(arguments) = &self.type_arguments {
            write!(f, "[")?;
            for (index, argument) in arguments.iter().enumerate() {
                if index > 0 {
                    write!(f, ",")?;
                }
                write!(f, "[{}]", argument)?;
            }
            write!(f, "]")?;
        }

        for _ in 0..self.pointer_count {
            write!(f, "*")?;
        }

        for rank in &self.array_ranks {
            match rank {
                0 => write!(f, "[]")?,
                1 => write!(f, "[*]")?,
                n => write!(f, "[{}]", ",".repeat(*n as usize - 1))?,
            }
        }

        if let Some(assembly) = &self.assembly_name {
            write!(f, ", {}", assembly)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_nesting_is_kept_as_text() {
        let text = "A`1[".repeat(100_000);
        let mut name = &AssemblyQualifiedTypeName::decode(&text).unwrap();

        let mut depth = 0;
        while let Some(arguments) = &name.type_arguments {
            assert_eq!(arguments.len(), 1);
            name = &arguments[0];
            depth += 1;
        }
        assert_eq!(depth, MAX_NESTING_DEPTH);
        assert!(name.top_level_type.starts_with("A`1[A`1["));
    }

    #[test]
    fn simple() {
        let name = AssemblyQualifiedTypeName::decode("System.String").unwrap();
        assert_eq!(name.top_level_type, "System.String");
        assert_eq!(name.namespace(), "System");
        assert_eq!(name.name(), "String");
        assert!(name.nested_types.is_empty());
        assert!(name.assembly_name.is_none());
        assert!(!name.is_constructed());
        assert_eq!(name.documentation_id().unwrap(), "T:System.String");
    }

    #[test]
    fn nested_and_qualified() {
        let name = AssemblyQualifiedTypeName::decode(
            "N.Outer+Middle+Inner, Lib, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null",
        )
        .unwrap();

        assert_eq!(name.top_level_type, "N.Outer");
        assert_eq!(name.nested_types, vec!["Middle", "Inner"]);
        assert_eq!(name.name(), "Inner");
        assert_eq!(
            name.assembly_name.as_deref(),
            Some("Lib, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null")
        );
        assert_eq!(name.documentation_id().unwrap(), "T:N.Outer.Middle.Inner");
    }

    #[test]
    fn generic_arguments() {
        let text = "System.Collections.Generic.Dictionary`2[[System.String, mscorlib],[System.Collections.Generic.List`1[[System.Int32, mscorlib]], mscorlib]], mscorlib";
        let name = AssemblyQualifiedTypeName::decode(text).unwrap();

        assert_eq!(name.top_level_type, "System.Collections.Generic.Dictionary`2");
        let arguments = name.type_arguments.as_ref().unwrap();
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].top_level_type, "System.String");
        assert_eq!(arguments[0].assembly_name.as_deref(), Some("mscorlib"));

        let inner = &arguments[1];
        assert_eq!(inner.top_level_type, "System.Collections.Generic.List`1");
        assert_eq!(
            inner.type_arguments.as_ref().unwrap()[0].top_level_type,
            "System.Int32"
        );
        assert_eq!(name.assembly_name.as_deref(), Some("mscorlib"));

        assert_eq!(name.to_string(), text);
    }

    #[test]
    fn unqualified_arguments() {
        let name = AssemblyQualifiedTypeName::decode("G`2[A, B]").unwrap();
        let arguments = name.type_arguments.unwrap();
        assert_eq!(arguments[0].top_level_type, "A");
        assert_eq!(arguments[1].top_level_type, "B");
        assert!(arguments[1].assembly_name.is_none());
    }

    #[test]
    fn array_shapes() {
        let sz = AssemblyQualifiedTypeName::decode("System.Int32[]").unwrap();
        assert_eq!(sz.array_ranks, vec![0]);

        let two = AssemblyQualifiedTypeName::decode("System.Int32[,]").unwrap();
        assert_eq!(two.array_ranks, vec![2]);

        let one = AssemblyQualifiedTypeName::decode("System.Int32[*]").unwrap();
        assert_eq!(one.array_ranks, vec![1]);

        let jagged = AssemblyQualifiedTypeName::decode("System.Int32*[][,,]").unwrap();
        assert_eq!(jagged.pointer_count, 1);
        assert_eq!(jagged.array_ranks, vec![0, 3]);
        assert_eq!(jagged.top_level_type, "System.Int32");

        let generic_array = AssemblyQualifiedTypeName::decode("List`1[[T]][]").unwrap();
        assert_eq!(generic_array.array_ranks, vec![0]);
        assert_eq!(generic_array.type_arguments.unwrap().len(), 1);
    }

    #[test]
    fn round_trip() {
        for text in [
            "N.Type`1[[Arg, Assembly]], Assembly",
            "N.Outer`1+Inner[[N.Arg+Nested, Other, Version=2.0.0.0]]",
            "Ptr**[*][,]",
            "Odd\\+Name\\,With\\[Delimiters\\]",
        ] {
            let name = AssemblyQualifiedTypeName::decode(text).unwrap();
            assert_eq!(name.to_string(), text);
            assert_eq!(AssemblyQualifiedTypeName::decode(&name.to_string()).unwrap(), name);
        }
    }

    #[test]
    fn escapes() {
        let name = AssemblyQualifiedTypeName::decode("Odd\\+Name\\,x").unwrap();
        assert_eq!(name.top_level_type, "Odd+Name,x");
        assert!(name.nested_types.is_empty());
        assert!(name.assembly_name.is_none());
    }

    #[test]
    fn malformed_is_literal() {
        let name = AssemblyQualifiedTypeName::decode("Foo]Bar").unwrap();
        assert_eq!(name.top_level_type, "Foo]Bar");

        let name = AssemblyQualifiedTypeName::decode("Foo[x").unwrap();
        assert_eq!(name.top_level_type, "Foo[x");
        assert!(name.array_ranks.is_empty());

        let name = AssemblyQualifiedTypeName::decode("G`1[[A").unwrap();
        assert_eq!(name.type_arguments.unwrap()[0].top_level_type, "A");

        let name = AssemblyQualifiedTypeName::decode("").unwrap();
        assert!(name.documentation_id().is_none());

        assert!(AssemblyQualifiedTypeName::decode("[[[]]]]],,,+**\\").is_ok());
    }
}
