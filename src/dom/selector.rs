//! CSS selector parsing and matching
//!
//! Supports type, universal, `#id`, `.class` and attribute selectors
//! (`[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`), compound
//! selectors, descendant and child combinators, and selector lists.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::errors::SelectorError;
use crate::host::NodeId;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "dom/selector.pest"]
struct SelectorParser;

/* ===================== Selector Model ===================== */

/// Read access to an element tree, as much as matching needs
pub trait ElementTree {
    /// Lowercase tag name of an element
    fn tag_name(&self, node: NodeId) -> Option<String>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    /// Parent element (not the document)
    fn parent_element(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    alternatives: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq)]
struct ComplexSelector {
    /// Compounds left to right
    parts: Vec<Compound>,
    /// `combinators[i]` joins `parts[i]` and `parts[i + 1]`
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttributeSelector {
    name: String,
    test: Option<(AttributeOp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeOp {
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
}

/* ===================== Parsing ===================== */

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut pairs = SelectorParser::parse(Rule::selector_list, source)
            .map_err(|e| SelectorError::new(source, e.variant.message().to_string()))?;

        let list = pairs
            .next()
            .ok_or_else(|| SelectorError::new(source, "empty selector"))?;

        let alternatives = list
            .into_inner()
            .filter(|pair| pair.as_rule() == Rule::complex)
            .map(build_complex)
            .collect();

        Ok(Self { alternatives })
    }

    /// Does `node` match any alternative of this selector?
    pub fn matches(&self, node: NodeId, tree: &impl ElementTree) -> bool {
        self.alternatives
            .iter()
            .any(|complex| complex.matches_from(complex.parts.len() - 1, node, tree))
    }
}

fn build_complex(pair: Pair<Rule>) -> ComplexSelector {
    let mut parts = Vec::new();
    let mut combinators = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::compound => parts.push(build_compound(inner)),
            Rule::combinator => {
                let kind = match inner.into_inner().next().map(|p| p.as_rule()) {
                    Some(Rule::child) => Combinator::Child,
                    _ => Combinator::Descendant,
                };
                combinators.push(kind);
            }
            _ => {}
        }
    }

    ComplexSelector { parts, combinators }
}

fn build_compound(pair: Pair<Rule>) -> Compound {
    let mut compound = Compound::default();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::tag => compound.tag = Some(inner.as_str().to_ascii_lowercase()),
            Rule::universal => compound.tag = None,
            Rule::id => compound.ids.push(inner.as_str()[1..].to_string()),
            Rule::class => compound.classes.push(inner.as_str()[1..].to_string()),
            Rule::attribute => compound.attributes.push(build_attribute(inner)),
            _ => {}
        }
    }

    compound
}

fn build_attribute(pair: Pair<Rule>) -> AttributeSelector {
    let mut name = String::new();
    let mut op = None;
    let mut value = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::attr_name => name = inner.as_str().to_string(),
            Rule::attr_op => {
                op = Some(match inner.as_str() {
                    "~=" => AttributeOp::Includes,
                    "^=" => AttributeOp::Prefix,
                    "$=" => AttributeOp::Suffix,
                    "*=" => AttributeOp::Substring,
                    _ => AttributeOp::Equals,
                })
            }
            Rule::quoted => {
                value = Some(
                    inner
                        .into_inner()
                        .next()
                        .map(|p| p.as_str().to_string())
                        .unwrap_or_default(),
                )
            }
            Rule::bare => value = Some(inner.as_str().to_string()),
            _ => {}
        }
    }

    AttributeSelector {
        name,
        test: op.zip(value),
    }
}

/* ===================== Matching ===================== */

impl ComplexSelector {
    fn matches_from(&self, idx: usize, node: NodeId, tree: &impl ElementTree) -> bool {
        if !self.parts[idx].matches(node, tree) {
            return false;
        }
        if idx == 0 {
            return true;
        }

        match self.combinators[idx - 1] {
            Combinator::Child => tree
                .parent_element(node)
                .is_some_and(|parent| self.matches_from(idx - 1, parent, tree)),
            Combinator::Descendant => {
                let mut current = tree.parent_element(node);
                while let Some(ancestor) = current {
                    if self.matches_from(idx - 1, ancestor, tree) {
                        return true;
                    }
                    current = tree.parent_element(ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn matches(&self, node: NodeId, tree: &impl ElementTree) -> bool {
        if let Some(tag) = &self.tag {
            if tree.tag_name(node).as_deref() != Some(tag.as_str()) {
                return false;
            }
        }

        if !self.ids.is_empty() {
            let id = tree.attribute(node, "id");
            if !self.ids.iter().all(|want| id.as_deref() == Some(want.as_str())) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let class_attr = tree.attribute(node, "class").unwrap_or_default();
            let classes: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }

        self.attributes.iter().all(|attr| attr.matches(node, tree))
    }
}

impl AttributeSelector {
    fn matches(&self, node: NodeId, tree: &impl ElementTree) -> bool {
        let Some(actual) = tree.attribute(node, &self.name) else {
            return false;
        };

        match &self.test {
            None => true,
            Some((AttributeOp::Equals, want)) => actual == *want,
            Some((AttributeOp::Includes, want)) => actual.split_whitespace().any(|w| w == want),
            Some((AttributeOp::Prefix, want)) => !want.is_empty() && actual.starts_with(want.as_str()),
            Some((AttributeOp::Suffix, want)) => !want.is_empty() && actual.ends_with(want.as_str()),
            Some((AttributeOp::Substring, want)) => !want.is_empty() && actual.contains(want.as_str()),
        }
    }
}
