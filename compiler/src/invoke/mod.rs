//! Canonical runtime semantics of a compiled [Tool].
//!
//! This is the reference implementation of what generated wrapper code
//! does at call time: validate arguments against the canonical
//! constraints, assemble the command line from the template, resolve
//! output paths, and delegate once to the injected [Runner]. The code
//! generator emits a direct translation of these semantics; tests verify
//! the observable properties here.

#[cfg(test)]
mod tests;

use std::path::Path;

use crate::constraints::{ChoiceValue, GroupRule, ListBounds, NumericRange};
use crate::descriptor::InputId;
use crate::ir::{
    Cardinality, FlagJoin, ListType, Metadata, OutputSpec, ParamKind, ParamType, Parameter,
    Segment, TemplateToken, Token, Tool, Value,
};

/// The specific rule a [ValidationError] reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleKind {
    Required,
    UnknownParameter,
    TypeMismatch,
    Minimum,
    Maximum,
    Choice,
    ListMin,
    ListMax,
    FileExists,
    MutuallyExclusive,
    AllRequired,
    OneRequired,
}

/// A caller-supplied argument violated a constraint. Raised before any
/// command line is assembled; invalid input never reaches the [Runner].
#[derive(Debug, thiserror::Error)]
#[error("{subject}: {detail}")]
pub struct ValidationError {
    /// The offending parameter or group id.
    pub subject: String,
    pub rule: RuleKind,
    pub detail: String,
}

/// Arguments for one invocation, keyed by parameter id.
#[derive(Debug, Default)]
pub struct ArgSet {
    values: hashbrown::HashMap<InputId, Value>,
}

impl ArgSet {
    pub fn set(&mut self, id: InputId, value: Value) {
        self.values.insert(id, value);
    }

    pub fn get(&self, id: &InputId) -> Option<&Value> {
        self.values.get(id)
    }

    fn ids(&self) -> impl Iterator<Item = &InputId> {
        self.values.keys()
    }
}

impl From<hashbrown::HashMap<InputId, Value>> for ArgSet {
    fn from(values: hashbrown::HashMap<InputId, Value>) -> Self {
        Self { values }
    }
}

/// An output path resolved from its template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedOutput {
    pub id: InputId,
    pub path: String,
}

/// Captured result of a runner execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunOutcome {
    pub exit_code: i32,
}

/// The injected execution capability that a compiled tool delegates to.
/// Implementations may launch local processes, containers, or nothing at
/// all; the compiler core never executes anything itself.
#[cfg_attr(test, mockall::automock)]
pub trait Runner {
    fn run(
        &mut self,
        cargs: &[String],
        outputs: &[ResolvedOutput],
        metadata: &Metadata,
    ) -> anyhow::Result<RunOutcome>;
}

/// Everything a dry run produces, plus the runner's outcome.
#[derive(Debug)]
pub struct RunResult {
    pub cargs: Vec<String>,
    pub outputs: Vec<ResolvedOutput>,
    pub outcome: RunOutcome,
}

/// Validates, assembles, resolves outputs, then calls `runner` exactly
/// once. The runner is not called if any validation check fails.
pub fn run(tool: &Tool, args: &ArgSet, runner: &mut dyn Runner) -> anyhow::Result<RunResult> {
    validate(tool, args)?;
    let cargs = assemble(tool, args);
    let outputs = resolve_outputs(tool, args);
    log::debug!("Invoking {:?} with {} token(s).", tool.metadata.name, cargs.len());
    let outcome = runner.run(&cargs, &outputs, &tool.metadata)?;
    Ok(RunResult {
        cargs,
        outputs,
        outcome,
    })
}

/// The effective value of a parameter: the explicit argument, or the
/// declared default, or nothing.
fn effective<'a>(param: &'a Parameter, args: &'a ArgSet) -> Option<&'a Value> {
    args.get(&param.id).or(match &param.cardinality {
        Cardinality::OptionalDefault(default) => Some(default),
        Cardinality::Required | Cardinality::Optional => None,
    })
}

/// Whether a group member counts as set: flags count when true, valued
/// parameters count when they have an effective value.
fn is_set(param: &Parameter, args: &ArgSet) -> bool {
    match (&param.ty, effective(param, args)) {
        (ParamType::Flag, Some(Value::Bool(b))) => *b,
        (_, Some(_)) => true,
        (_, None) => false,
    }
}

/// Runs every canonical constraint check, in declaration order: unknown
/// ids, required presence, types, ranges, choices, list cardinality, file
/// existence, then group rules.
pub fn validate(tool: &Tool, args: &ArgSet) -> Result<(), ValidationError> {
    let mut unknown: Vec<&InputId> = args
        .ids()
        .filter(|id| tool.param(id).is_none())
        .collect();
    unknown.sort();
    if let Some(id) = unknown.first() {
        return Err(ValidationError {
            subject: id.to_string(),
            rule: RuleKind::UnknownParameter,
            detail: "not a parameter of this tool".to_string(),
        });
    }

    for param in &tool.params {
        validate_param(param, args)?;
    }
    for group in &tool.groups {
        validate_group(tool, group, args)?;
    }
    Ok(())
}

fn validate_param(param: &Parameter, args: &ArgSet) -> Result<(), ValidationError> {
    let err = |rule: RuleKind, detail: String| ValidationError {
        subject: param.id.to_string(),
        rule,
        detail,
    };

    let Some(value) = effective(param, args) else {
        if param.is_required() {
            return Err(err(RuleKind::Required, "a value is required".to_string()));
        }
        return Ok(());
    };

    if !param.ty.matches(value) {
        return Err(err(
            RuleKind::TypeMismatch,
            format!(
                "value {value:?} is not a {:?} value",
                ParamKind::from(&param.ty)
            ),
        ));
    }

    let scalars: Vec<&Value> = match value {
        Value::List(items) => items.iter().collect(),
        other => vec![other],
    };

    if let Some(range) = &param.constraints.range {
        check_range(param, range, &scalars)?;
    }
    if let Some(choices) = enum_choices(&param.ty) {
        for scalar in &scalars {
            if !choices.iter().any(|choice| choice_matches(choice, scalar)) {
                return Err(err(
                    RuleKind::Choice,
                    format!("value {} is not one of the allowed choices", scalar.to_token()),
                ));
            }
        }
    }
    if let (Some(bounds), Value::List(items)) = (&param.constraints.list, value) {
        check_list_bounds(param, bounds, items.len())?;
    }
    if param.constraints.file_must_exist {
        for scalar in &scalars {
            let path = scalar.to_token();
            if !Path::new(&path).exists() {
                return Err(err(
                    RuleKind::FileExists,
                    format!("file {path:?} does not exist"),
                ));
            }
        }
    }
    Ok(())
}

fn check_range(
    param: &Parameter,
    range: &NumericRange,
    scalars: &[&Value],
) -> Result<(), ValidationError> {
    let (min, max) = match range {
        NumericRange::Int { min, max } => (min.map(|b| b as f64), max.map(|b| b as f64)),
        NumericRange::Float { min, max } => (*min, *max),
    };
    for scalar in scalars {
        let v = match scalar {
            Value::Int(i) => *i as f64,
            Value::Float(x) => *x,
            _ => continue,
        };
        if let Some(min) = min
            && v < min
        {
            return Err(ValidationError {
                subject: param.id.to_string(),
                rule: RuleKind::Minimum,
                detail: format!("must be at least {min} but was {v}"),
            });
        }
        if let Some(max) = max
            && v > max
        {
            return Err(ValidationError {
                subject: param.id.to_string(),
                rule: RuleKind::Maximum,
                detail: format!("must be at most {max} but was {v}"),
            });
        }
    }
    Ok(())
}

fn check_list_bounds(
    param: &Parameter,
    bounds: &ListBounds,
    len: usize,
) -> Result<(), ValidationError> {
    if let Some(min) = bounds.min
        && (len as u64) < min
    {
        return Err(ValidationError {
            subject: param.id.to_string(),
            rule: RuleKind::ListMin,
            detail: format!("must have at least {min} item(s) but had {len}"),
        });
    }
    if let Some(max) = bounds.max
        && (len as u64) > max
    {
        return Err(ValidationError {
            subject: param.id.to_string(),
            rule: RuleKind::ListMax,
            detail: format!("must have at most {max} item(s) but had {len}"),
        });
    }
    Ok(())
}

fn enum_choices(ty: &ParamType) -> Option<&[ChoiceValue]> {
    match ty {
        ParamType::Enum(choices) => Some(choices),
        ParamType::List(ListType { elem, .. }) => enum_choices(elem),
        _ => None,
    }
}

fn choice_matches(choice: &ChoiceValue, value: &Value) -> bool {
    match (choice, value) {
        (ChoiceValue::Str(c), Value::Str(v)) => c == v,
        (ChoiceValue::Int(c), Value::Int(v)) => c == v,
        (ChoiceValue::Float(c), Value::Float(v)) => c == v,
        (ChoiceValue::Float(c), Value::Int(v)) => *c == *v as f64,
        _ => false,
    }
}

fn validate_group(tool: &Tool, group: &GroupRule, args: &ArgSet) -> Result<(), ValidationError> {
    let set_count = group
        .members
        .iter()
        .filter_map(|member| tool.param(member))
        .filter(|param| is_set(param, args))
        .count();
    let err = |rule: RuleKind, detail: String| ValidationError {
        subject: group.id.to_string(),
        rule,
        detail,
    };

    if group.mutually_exclusive && set_count > 1 {
        return Err(err(
            RuleKind::MutuallyExclusive,
            format!("at most one member may be set, but {set_count} were"),
        ));
    }
    if group.all_required && set_count < group.members.len() {
        return Err(err(
            RuleKind::AllRequired,
            format!(
                "all {} member(s) must be set, but only {set_count} were",
                group.members.len()
            ),
        ));
    }
    if group.one_required && set_count == 0 {
        return Err(err(
            RuleKind::OneRequired,
            "at least one member must be set".to_string(),
        ));
    }
    Ok(())
}

/// Builds the final token list by walking the command template in order.
/// Assumes `args` has passed [validate].
pub fn assemble(tool: &Tool, args: &ArgSet) -> Vec<String> {
    let mut cargs: Vec<String> = Vec::new();
    for token in &tool.template.tokens {
        emit_token(tool, token, args, &mut cargs);
    }
    cargs
}

fn emit_token(tool: &Tool, token: &Token, args: &ArgSet, cargs: &mut Vec<String>) {
    if let [Segment::Ref(id)] = token.segments.as_slice() {
        if let Some(param) = tool.param(id) {
            emit_param(param, args, cargs);
        }
        return;
    }

    // Mixed literal/reference token: renders to a single token, dropped
    // entirely when any referenced valued parameter is unset.
    let mut rendered = String::new();
    for segment in &token.segments {
        match segment {
            Segment::Literal(text) => rendered.push_str(text),
            Segment::Ref(id) => {
                let Some(param) = tool.param(id) else { return };
                match (&param.ty, effective(param, args)) {
                    (ParamType::Flag, Some(Value::Bool(true))) => {
                        if let Some(flag) = &param.flag {
                            rendered.push_str(&flag.token);
                        }
                    }
                    (ParamType::Flag, _) => {}
                    (_, Some(value)) => rendered.push_str(&stringify(param, value)),
                    (_, None) => return,
                }
            }
        }
    }
    cargs.push(rendered);
}

fn emit_param(param: &Parameter, args: &ArgSet, cargs: &mut Vec<String>) {
    let Some(value) = effective(param, args) else {
        return;
    };

    if let ParamType::Flag = param.ty {
        if let (Value::Bool(true), Some(flag)) = (value, &param.flag) {
            cargs.push(flag.token.clone());
        }
        return;
    }

    let value_tokens: Vec<String> = match (&param.ty, value) {
        (ParamType::List(ListType { join: None, .. }), Value::List(items)) => {
            items.iter().map(Value::to_token).collect()
        }
        (ParamType::List(ListType { join: Some(join), .. }), Value::List(items)) => {
            vec![
                items
                    .iter()
                    .map(Value::to_token)
                    .collect::<Vec<_>>()
                    .join(join),
            ]
        }
        (_, value) => vec![value.to_token()],
    };

    match &param.flag {
        Some(flag) => match &flag.join {
            FlagJoin::Separate => {
                cargs.push(flag.token.clone());
                cargs.extend(value_tokens);
            }
            FlagJoin::Joined(separator) => {
                cargs.push(format!("{}{}{}", flag.token, separator, value_tokens.join(" ")));
            }
        },
        None => cargs.extend(value_tokens),
    }
}

/// Stringifies a value for substitution inside a mixed token or an output
/// template: lists join by their declared separator, defaulting to a
/// single space.
fn stringify(param: &Parameter, value: &Value) -> String {
    match (&param.ty, value) {
        (ParamType::List(ListType { join, .. }), Value::List(items)) => items
            .iter()
            .map(Value::to_token)
            .collect::<Vec<_>>()
            .join(join.as_deref().unwrap_or(" ")),
        _ => value.to_token(),
    }
}

/// Resolves every output template, in the [Tool]'s topological order, so
/// output-to-output references read previously resolved paths.
pub fn resolve_outputs(tool: &Tool, args: &ArgSet) -> Vec<ResolvedOutput> {
    let mut resolved: Vec<ResolvedOutput> = Vec::with_capacity(tool.outputs.len());
    for output in &tool.outputs {
        let path = resolve_output(tool, output, args, &resolved);
        resolved.push(ResolvedOutput {
            id: output.id.clone(),
            path,
        });
    }
    resolved
}

fn resolve_output(
    tool: &Tool,
    output: &OutputSpec,
    args: &ArgSet,
    resolved: &[ResolvedOutput],
) -> String {
    let mut path = String::new();
    for token in &output.template {
        match token {
            TemplateToken::Literal(text) => path.push_str(text),
            TemplateToken::Ref { id, strip_suffixes } => {
                let substituted = match tool.param(id) {
                    Some(param) => match effective(param, args) {
                        Some(value) => stringify(param, value),
                        // Absent optional inputs substitute as empty.
                        None => String::new(),
                    },
                    None => resolved
                        .iter()
                        .find(|prior| &prior.id == id)
                        .map(|prior| prior.path.clone())
                        .unwrap_or_default(),
                };
                path.push_str(&strip_first_suffix(&substituted, strip_suffixes));
            }
        }
    }
    path
}

/// Removes the first matching suffix, if any.
fn strip_first_suffix(value: &str, suffixes: &[String]) -> String {
    for suffix in suffixes {
        if let Some(stripped) = value.strip_suffix(suffix.as_str()) {
            return stripped.to_string();
        }
    }
    value.to_string()
}
