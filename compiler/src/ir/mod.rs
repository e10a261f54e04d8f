//! The canonical intermediate representation: an immutable [Tool] built
//! once per descriptor and consumed read-only by the code generator and the
//! dry-run evaluator.

pub mod build;
mod split;

use crate::constraints::{ChoiceValue, ConstraintSet, GroupRule};
use crate::descriptor::InputId;

pub use build::{CyclicTemplateError, ReferenceError};

/// A concrete argument or default value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Stringifies a scalar value the way it appears on a command line.
    /// Lists are handled by the caller, which owns the join policy.
    pub fn to_token(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_token)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// List element shape and the optional join string for single-token
/// rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct ListType {
    pub elem: Box<ParamType>,
    /// When present, all elements join into one token with this separator.
    /// When absent, each element becomes its own token.
    pub join: Option<String>,
}

/// Closed, tag-discriminated parameter type.
#[derive(Clone, Debug, PartialEq, strum_macros::EnumDiscriminants)]
#[strum_discriminants(name(ParamKind), derive(Hash))]
pub enum ParamType {
    Str,
    Int,
    Float,
    File,
    Flag,
    /// An enumerated parameter; the value set is non-empty, deduplicated,
    /// and order-preserving.
    Enum(Vec<ChoiceValue>),
    List(ListType),
}

impl ParamType {
    /// Whether `value` is of this type. Lists check element types
    /// recursively.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::Str, Value::Str(_)) => true,
            (ParamType::Int, Value::Int(_)) => true,
            (ParamType::Float, Value::Float(_) | Value::Int(_)) => true,
            (ParamType::File, Value::Str(_)) => true,
            (ParamType::Flag, Value::Bool(_)) => true,
            (ParamType::Enum(choices), value) => match (choices.first(), value) {
                (Some(ChoiceValue::Str(_)), Value::Str(_)) => true,
                (Some(ChoiceValue::Int(_)), Value::Int(_)) => true,
                (Some(ChoiceValue::Float(_)), Value::Float(_) | Value::Int(_)) => true,
                _ => false,
            },
            (ParamType::List(list), Value::List(items)) => {
                items.iter().all(|item| list.elem.matches(item))
            }
            _ => false,
        }
    }
}

/// How many values a parameter takes at call time.
#[derive(Clone, Debug, PartialEq)]
pub enum Cardinality {
    Required,
    /// Optional with a declared default substituted when absent.
    OptionalDefault(Value),
    /// Optional with no default; absent means the parameter is unset.
    Optional,
}

/// Join policy between a flag token and the parameter value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FlagJoin {
    /// Flag and value are separate command-line tokens.
    Separate,
    /// Flag and value join into one token with this separator.
    Joined(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandLineFlag {
    pub token: String,
    pub join: FlagJoin,
}

/// One resolved parameter of a [Tool].
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub id: InputId,
    /// Collision-free target-language identifier.
    pub symbol: String,
    pub ty: ParamType,
    pub cardinality: Cardinality,
    pub constraints: ConstraintSet,
    pub flag: Option<CommandLineFlag>,
    pub docs: Option<String>,
}

impl Parameter {
    pub fn is_required(&self) -> bool {
        matches!(self.cardinality, Cardinality::Required)
    }

    /// True for enum parameters and lists of enums.
    pub fn is_enum(&self) -> bool {
        match &self.ty {
            ParamType::Enum(_) => true,
            ParamType::List(list) => matches!(list.elem.as_ref(), ParamType::Enum(_)),
            _ => false,
        }
    }
}

/// One segment of a command token: literal text or a parameter reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    Literal(String),
    Ref(InputId),
}

/// One shell word of the command line. Most tokens hold a single segment;
/// mixed tokens interleave literals and references within one word.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub segments: Vec<Segment>,
}

/// The ordered command-line construction template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandTemplate {
    pub tokens: Vec<Token>,
}

/// One piece of an output path template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TemplateToken {
    Literal(String),
    Ref {
        id: InputId,
        /// Suffixes stripped from the referenced value before substitution.
        strip_suffixes: Vec<String>,
    },
}

/// A declared output path, resolved from other parameters at call time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputSpec {
    pub id: InputId,
    pub symbol: String,
    pub template: Vec<TemplateToken>,
    pub optional: bool,
    pub docs: Option<String>,
}

/// Static tool metadata carried into generated code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Metadata {
    pub name: String,
    pub version: Option<String>,
    /// Hex digest over the canonical (key-sorted) descriptor document.
    pub content_hash: String,
    pub container_image: Option<String>,
    pub environment: Vec<(String, String)>,
}

/// The validated, immutable compilation unit.
///
/// `params` is in declaration order; `outputs` is in dependency
/// topological order, so each output's template only references parameters
/// and outputs that precede it.
#[derive(Clone, Debug, PartialEq)]
pub struct Tool {
    pub metadata: Metadata,
    /// Entry point symbol, e.g. the generated function name.
    pub symbol: String,
    /// Outputs record type symbol, e.g. the generated class name.
    pub outputs_symbol: String,
    pub docs: Option<String>,
    pub params: Vec<Parameter>,
    pub groups: Vec<GroupRule>,
    pub template: CommandTemplate,
    pub outputs: Vec<OutputSpec>,
}

impl Tool {
    pub fn param(&self, id: &InputId) -> Option<&Parameter> {
        self.params.iter().find(|p| &p.id == id)
    }

    pub fn output(&self, id: &InputId) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| &o.id == id)
    }

    /// Total number of runtime checks the generated wrapper must emit: one
    /// per canonical constraint, one per enum membership set, one per group
    /// mode.
    pub fn constraint_check_count(&self) -> usize {
        let param_checks: usize = self
            .params
            .iter()
            .map(|p| p.constraints.check_count() + p.is_enum() as usize)
            .sum();
        let group_checks: usize = self.groups.iter().map(GroupRule::check_count).sum();
        param_checks + group_checks
    }
}
