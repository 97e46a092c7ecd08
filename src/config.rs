use std::fmt::Display;
use std::str::FromStr;

use crate::error::LoadError;
use crate::evaluator::EvalContext;
use crate::registry::TypeRegistry;
use crate::template;
use crate::value::FromValue;

/// A named block of ordered key/value pairs and child blocks, the unit
/// everything in the contract database is defined and persisted in.
///
/// Duplicate keys are legal; `get_value` returns the first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNode {
    name: String,
    values: Vec<(String, String)>,
    children: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        ConfigNode {
            name: name.into(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.push((key.into(), value.into()));
    }

    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn add_child(&mut self, child: ConfigNode) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    /// All direct children with the given block name, in file order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn first_child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Parse a flat text document into its top-level nodes.
    ///
    /// The format is block-structured:
    ///
    /// ```text
    /// CONTRACT_TYPE
    /// {
    ///     name = Example
    ///     PARAMETER
    ///     {
    ///         type = ReachDestination  // trailing comments stripped
    ///     }
    /// }
    /// ```
    ///
    /// The opening brace may share the header's line. Values run to end
    /// of line and are trimmed.
    pub fn parse_document(text: &str) -> Result<Vec<ConfigNode>, LoadError> {
        let mut roots = Vec::new();
        let mut stack: Vec<ConfigNode> = Vec::new();
        let mut pending_name: Option<String> = None;

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if line == "{" {
                let name = pending_name.take().ok_or_else(|| LoadError::Config {
                    line: line_no,
                    message: "'{' without a preceding block name".to_string(),
                })?;
                stack.push(ConfigNode::new(name));
            } else if line == "}" {
                if pending_name.is_some() {
                    return Err(LoadError::Config {
                        line: line_no,
                        message: "block name without a body".to_string(),
                    });
                }
                let node = stack.pop().ok_or_else(|| LoadError::Config {
                    line: line_no,
                    message: "unmatched '}'".to_string(),
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.add_child(node),
                    None => roots.push(node),
                }
            } else if let Some((key, value)) = line.split_once('=') {
                let parent = stack.last_mut().ok_or_else(|| LoadError::Config {
                    line: line_no,
                    message: "value outside of any block".to_string(),
                })?;
                parent.add_value(key.trim(), value.trim());
            } else if let Some(name) = line.strip_suffix('{') {
                // Header and brace on one line.
                if pending_name.is_some() {
                    return Err(LoadError::Config {
                        line: line_no,
                        message: "block name without a body".to_string(),
                    });
                }
                stack.push(ConfigNode::new(name.trim()));
            } else {
                if let Some(previous) = pending_name.replace(line.to_string()) {
                    return Err(LoadError::Config {
                        line: line_no,
                        message: format!("block '{}' has no body", previous),
                    });
                }
            }
        }

        if let Some(name) = pending_name {
            return Err(LoadError::Config {
                line: text.lines().count(),
                message: format!("block '{}' has no body", name),
            });
        }
        if let Some(unclosed) = stack.first() {
            return Err(LoadError::Config {
                line: text.lines().count(),
                message: format!("unclosed block '{}'", unclosed.name),
            });
        }

        Ok(roots)
    }

    /// Serialize back to the block format parsed by [`parse_document`].
    ///
    /// [`parse_document`]: ConfigNode::parse_document
    pub fn to_document(&self) -> String {
        let mut out = String::new();
        self.write_indented(&mut out, 0);
        out
    }

    fn write_indented(&self, out: &mut String, depth: usize) {
        let pad = "\t".repeat(depth);
        out.push_str(&format!("{}{}\n{}{{\n", pad, self.name, pad));
        for (key, value) in &self.values {
            out.push_str(&format!("{}\t{} = {}\n", pad, key, value));
        }
        for child in &self.children {
            child.write_indented(out, depth + 1);
        }
        out.push_str(&format!("{}}}\n", pad));
    }

    // ----- typed field access -------------------------------------------

    /// A value that must be present.
    pub fn require_value(&self, key: &str) -> Result<&str, LoadError> {
        self.get_value(key).ok_or_else(|| LoadError::MissingField {
            field: key.to_string(),
            node: self.name.clone(),
        })
    }

    /// Parse a required plain (non-expression) field.
    pub fn parse_plain<T>(&self, key: &str) -> Result<T, LoadError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.require_value(key)?;
        raw.parse().map_err(|e: T::Err| LoadError::InvalidValue {
            field: key.to_string(),
            value: raw.to_string(),
            message: e.to_string(),
        })
    }

    /// Parse an optional plain field, falling back to a default.
    pub fn parse_plain_or<T>(&self, key: &str, default: T) -> Result<T, LoadError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get_value(key) {
            Some(_) => self.parse_plain(key),
            None => Ok(default),
        }
    }

    /// Evaluate a required field as a typed expression. This is where
    /// config-time validation happens: a malformed or mistyped expression
    /// fails the whole node at load rather than at first use.
    pub fn expression_field<T: FromValue>(
        &self,
        key: &str,
        registry: &TypeRegistry,
        ctx: &EvalContext,
    ) -> Result<T, LoadError> {
        let raw = self.require_value(key)?;
        crate::evaluate::<T>(raw, registry, ctx).map_err(|e| LoadError::InvalidValue {
            field: key.to_string(),
            value: raw.to_string(),
            message: e.to_string(),
        })
    }

    /// Evaluate an optional expression field.
    pub fn expression_field_or<T: FromValue>(
        &self,
        key: &str,
        default: T,
        registry: &TypeRegistry,
        ctx: &EvalContext,
    ) -> Result<T, LoadError> {
        match self.get_value(key) {
            Some(_) => self.expression_field(key, registry, ctx),
            None => Ok(default),
        }
    }

    /// Render an optional display-text template field.
    pub fn template_field(
        &self,
        key: &str,
        registry: &TypeRegistry,
        ctx: &EvalContext,
    ) -> Result<Option<String>, LoadError> {
        match self.get_value(key) {
            Some(raw) => template::render(raw, registry, ctx)
                .map(Some)
                .map_err(|e| LoadError::InvalidValue {
                    field: key.to_string(),
                    value: raw.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(index) => &line[..index],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_blocks() {
        let text = "\
CONTRACT_TYPE
{
    name = Test // a comment
    PARAMETER
    {
        type = ReachDestination
    }
    PARAMETER
    {
        type = HasCrew
    }
}
";
        let nodes = ConfigNode::parse_document(text).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name(), "CONTRACT_TYPE");
        assert_eq!(nodes[0].get_value("name"), Some("Test"));
        assert_eq!(nodes[0].children_named("PARAMETER").count(), 2);
    }

    #[test]
    fn test_unbalanced_brace() {
        let result = ConfigNode::parse_document("NODE\n{\nkey = value\n");
        assert!(matches!(result, Err(LoadError::Config { .. })));
    }

    #[test]
    fn test_document_round_trip() {
        let mut node = ConfigNode::new("PARAM");
        node.add_value("title", "Crew: At least 1");
        node.add_value("state", "Complete");

        let reparsed = ConfigNode::parse_document(&node.to_document()).unwrap();
        assert_eq!(reparsed, vec![node]);
    }
}
