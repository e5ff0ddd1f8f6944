//! Fragment documents
//!
//! A fragment source is a multi-document YAML file. Each document becomes one
//! [`Fragment`]: either a bare cloud-config mapping merged unconditionally, or
//! a conditional tree under a single `if` key:
//!
//! ```yaml
//! packages: [curl]
//! ---
//! if:
//!   conditions:
//!     os: ubuntu
//!     arch: [amd64, arm64]
//!   then:
//!     cloudConfig:
//!       packages: [ubuntu-advantage-tools]
//!     include:
//!       recipes: [ubuntu-extras]
//!   else:
//!     andIf:
//!       conditions: { os: debian }
//!       then:
//!         cloudConfig: { packages: [debian-goodies] }
//! ```
//!
//! The parsed tree is immutable. Every node carries a shared [`SourceRef`]
//! naming the recipe, file and document it came from, used in error messages.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{Error, Result};

/// Where a fragment node was defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub recipe: String,
    pub file: String,
    /// Zero-based index of the document within the file
    pub document: usize,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.recipe, self.file, self.document)
    }
}

/// Ids a result adds to the active sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Includes {
    pub recipes: Vec<String>,
    pub launchers: Vec<String>,
    pub init_scripts: Vec<String>,
}

/// The `then` or `else` branch of a conditional node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Mapping to deep-merge into the accumulated configuration
    pub cloud_config: Option<Value>,
    pub include: Includes,
    /// Evaluated after the branch itself, before `and`
    pub and_if: Option<Box<ConditionalNode>>,
    /// Evaluated in order after `and_if`
    pub and: Vec<ConditionalNode>,
}

/// An `if` node
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalNode {
    /// Condition name -> accepted values; any value satisfies its condition,
    /// every condition must be satisfied
    pub conditions: IndexMap<String, Vec<String>>,
    pub then: Outcome,
    pub otherwise: Outcome,
    pub source: Arc<SourceRef>,
}

/// One parsed document of a fragment source
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Plain { config: Value, source: Arc<SourceRef> },
    Conditional(ConditionalNode),
}

impl Fragment {
    pub fn source(&self) -> &SourceRef {
        match self {
            Fragment::Plain { source, .. } => source,
            Fragment::Conditional(node) => &node.source,
        }
    }

    /// Build a fragment from one parsed YAML document
    pub fn from_value(value: Value, source: Arc<SourceRef>) -> Result<Self> {
        let mapping = match value {
            Value::Null => return Err(parse_error(&source, "empty document")),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(parse_error(
                    &source,
                    format!(
                        "expected a mapping, found {}",
                        crate::merge::yaml_type_name(&other)
                    ),
                ))
            }
        };
        if mapping.is_empty() {
            return Err(parse_error(&source, "empty document"));
        }

        if mapping.len() == 1 {
            if let Some(node) = mapping.get("if") {
                let raw: RawNode = serde_yaml::from_value(node.clone())
                    .map_err(|err| parse_error(&source, err.to_string()))?;
                return raw.build(&source).map(Fragment::Conditional);
            }
        }

        Ok(Fragment::Plain {
            config: Value::Mapping(mapping),
            source,
        })
    }
}

/// Parse every document of a fragment source file
///
/// A source with no documents, or any document that is empty, is an error.
pub fn parse_fragments(recipe: &str, file: &str, text: &str) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let source = Arc::new(SourceRef {
            recipe: recipe.to_string(),
            file: file.to_string(),
            document: index,
        });
        let value =
            Value::deserialize(document).map_err(|err| parse_error(&source, err.to_string()))?;
        fragments.push(Fragment::from_value(value, source)?);
    }

    if fragments.is_empty() {
        let source = SourceRef {
            recipe: recipe.to_string(),
            file: file.to_string(),
            document: 0,
        };
        return Err(parse_error(&source, "source contains no documents"));
    }
    Ok(fragments)
}

fn parse_error(source: &SourceRef, message: impl Into<String>) -> Error {
    Error::FragmentParse {
        source_ref: source.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode {
    #[serde(default)]
    conditions: IndexMap<String, Value>,
    #[serde(default, rename = "then")]
    then_branch: Option<RawOutcome>,
    #[serde(default, rename = "else")]
    else_branch: Option<RawOutcome>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
struct RawOutcome {
    cloud_config: Option<Value>,
    include: Option<Includes>,
    and: Vec<RawIf>,
    and_if: Option<Box<RawNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIf {
    #[serde(rename = "if")]
    node: RawNode,
}

impl RawNode {
    fn build(self, source: &Arc<SourceRef>) -> Result<ConditionalNode> {
        let mut conditions = IndexMap::new();
        for (name, value) in self.conditions {
            conditions.insert(name.clone(), condition_values(source, &name, value)?);
        }
        Ok(ConditionalNode {
            conditions,
            then: self.then_branch.unwrap_or_default().build(source)?,
            otherwise: self.else_branch.unwrap_or_default().build(source)?,
            source: Arc::clone(source),
        })
    }
}

impl RawOutcome {
    fn build(self, source: &Arc<SourceRef>) -> Result<Outcome> {
        let cloud_config = match self.cloud_config {
            None | Some(Value::Null) => None,
            Some(value @ Value::Mapping(_)) => Some(value),
            Some(other) => {
                return Err(parse_error(
                    source,
                    format!(
                        "cloudConfig must be a mapping, found {}",
                        crate::merge::yaml_type_name(&other)
                    ),
                ))
            }
        };
        let and_if = match self.and_if {
            Some(node) => Some(Box::new((*node).build(source)?)),
            None => None,
        };
        let and = self
            .and
            .into_iter()
            .map(|entry| entry.node.build(source))
            .collect::<Result<Vec<_>>>()?;

        Ok(Outcome {
            cloud_config,
            include: self.include.unwrap_or_default(),
            and_if,
            and,
        })
    }
}

fn condition_values(source: &SourceRef, name: &str, value: Value) -> Result<Vec<String>> {
    match value {
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| scalar_string(source, name, item))
            .collect(),
        other => Ok(vec![scalar_string(source, name, other)?]),
    }
}

fn scalar_string(source: &SourceRef, name: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(parse_error(
            source,
            format!(
                "condition '{}' must be a scalar or a list of scalars, found {}",
                name,
                crate::merge::yaml_type_name(&other)
            ),
        )),
    }
}
