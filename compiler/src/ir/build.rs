//! Assembles the descriptor model, resolved identifiers, and canonical
//! constraints into a single [Tool]. All failures reject the whole tool;
//! no partial [Tool] is ever produced.

use std::hash::Hasher;

use hashbrown::{HashMap, HashSet};

use crate::CompileError;
use crate::constraints::{self};
use crate::descriptor::{Descriptor, Input, InputId, InputTypeTag};
use crate::ident::{self, SymbolScope};
use crate::ir::{
    Cardinality, CommandLineFlag, CommandTemplate, FlagJoin, ListType, Metadata, OutputSpec,
    ParamType, Parameter, Segment, TemplateToken, Token, Tool, Value, split,
};

/// A value-key or member id that does not resolve to any declared
/// parameter.
#[derive(Debug, thiserror::Error)]
#[error("{context}: reference to undeclared {reference:?}")]
pub struct ReferenceError {
    /// The dangling value-key or id, as written.
    pub reference: String,
    /// Where the reference appeared, e.g. `command-line` or `groups[1]`.
    pub context: String,
}

/// Output path templates reference each other cyclically.
#[derive(Debug, thiserror::Error)]
#[error("output path templates form a cycle: {}", cycle_string(.cycle))]
pub struct CyclicTemplateError {
    /// The ids on the cycle, in reference order, ending where it started.
    pub cycle: Vec<InputId>,
}

fn cycle_string(cycle: &[InputId]) -> String {
    cycle
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Names claimed by the generated wrapper's own locals; parameter symbols
/// must dodge these on top of the language keywords.
const RUNTIME_SYMBOLS: &[&str] = &["runner", "cargs", "ret", "execution"];

/// Builds the [Tool] for one validated descriptor. Pure function of its
/// inputs; the symbol scopes it creates never outlive this call.
pub fn build_tool(desc: &Descriptor, reserved_words: &[&str]) -> Result<Tool, CompileError> {
    desc.validate()?;

    let metadata = build_metadata(desc);

    let mut module_scope = SymbolScope::with_reserved(reserved_words.iter().copied());
    let symbol = module_scope.add_or_dodge(&ident::symbol_from(&desc.name))?;
    let outputs_symbol =
        module_scope.add_or_dodge(&format!("{}Outputs", ident::pascal_case(&desc.name)))?;

    let params = build_params(desc, reserved_words)?;
    let groups = build_groups(desc)?;
    let template = build_template(desc)?;
    let outputs = build_outputs(desc, reserved_words)?;
    let outputs = order_outputs(outputs)?;

    Ok(Tool {
        metadata,
        symbol,
        outputs_symbol,
        docs: desc.description.clone(),
        params,
        groups,
        template,
        outputs,
    })
}

fn build_metadata(desc: &Descriptor) -> Metadata {
    Metadata {
        name: desc.name.clone(),
        version: desc.tool_version.clone(),
        content_hash: content_hash(desc),
        container_image: desc
            .container_image
            .as_ref()
            .and_then(|container| container.image.clone()),
        environment: desc
            .environment_variables
            .iter()
            .map(|env| (env.name.clone(), env.value.clone()))
            .collect(),
    }
}

/// Hex SHA-256 over the canonical (recursively key-sorted) JSON encoding
/// of the descriptor. Stable across field order in the source document.
fn content_hash(desc: &Descriptor) -> String {
    let value = serde_json::to_value(desc).expect("descriptor serialization cannot fail");
    let canonical = canonical_json(&value);
    let mut hash = sha::sha256::Sha256::default();
    hash.write(canonical.as_bytes());
    std::io::Write::flush(&mut hash).expect("flushing an in-memory hasher cannot fail");
    let digest = sha::utils::DigestExt::to_bytes(&mut hash);
    hex::encode(digest)
}

fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String(key.clone()),
                        canonical_json(&map[key])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        other => other.to_string(),
    }
}

fn build_params(desc: &Descriptor, reserved_words: &[&str]) -> Result<Vec<Parameter>, CompileError> {
    let mut scope = SymbolScope::with_reserved(
        reserved_words
            .iter()
            .chain(RUNTIME_SYMBOLS)
            .copied(),
    );

    let mut params = Vec::with_capacity(desc.inputs.len());
    for input in &desc.inputs {
        let symbol = scope.add_or_dodge(&ident::symbol_from(input.id.as_ref()))?;
        params.push(build_param(input, symbol)?);
    }
    Ok(params)
}

fn build_param(input: &Input, symbol: String) -> Result<Parameter, CompileError> {
    let resolved = constraints::resolve_input(input)?;

    let elem_ty = match (input.type_tag, &resolved.choices) {
        (InputTypeTag::Flag, _) => ParamType::Flag,
        (InputTypeTag::File, _) => ParamType::File,
        (_, Some(choices)) => ParamType::Enum(choices.clone()),
        (InputTypeTag::String, None) => ParamType::Str,
        (InputTypeTag::Number, None) if input.integer => ParamType::Int,
        (InputTypeTag::Number, None) => ParamType::Float,
    };
    let ty = if input.list {
        ParamType::List(ListType {
            elem: Box::new(elem_ty),
            join: input.list_separator.clone(),
        })
    } else {
        elem_ty
    };

    let cardinality = build_cardinality(input, &ty, &resolved.set)?;

    let flag = input.command_line_flag.as_ref().map(|token| CommandLineFlag {
        token: token.clone(),
        join: match &input.command_line_flag_separator {
            Some(separator) => FlagJoin::Joined(separator.clone()),
            None => FlagJoin::Separate,
        },
    });

    Ok(Parameter {
        id: input.id.clone(),
        symbol,
        ty,
        cardinality,
        constraints: resolved.set,
        flag,
        docs: input.description.clone(),
    })
}

fn build_cardinality(
    input: &Input,
    ty: &ParamType,
    set: &constraints::ConstraintSet,
) -> Result<Cardinality, CompileError> {
    // Flags are always optional with a boolean default.
    if input.type_tag == InputTypeTag::Flag {
        let default = matches!(&input.default_value, Some(serde_json::Value::Bool(true)));
        return Ok(Cardinality::OptionalDefault(Value::Bool(default)));
    }

    match (&input.default_value, input.optional) {
        (Some(raw), _) => {
            let value = default_value(input, ty, raw)?;
            check_default(input, set, &value)?;
            Ok(Cardinality::OptionalDefault(value))
        }
        (None, true) => Ok(Cardinality::Optional),
        (None, false) => Ok(Cardinality::Required),
    }
}

fn default_value(
    input: &Input,
    ty: &ParamType,
    raw: &serde_json::Value,
) -> Result<Value, CompileError> {
    let value = json_to_value(raw).ok_or_else(|| invalid_default(input, raw, "unsupported value"))?;
    if !ty.matches(&value) {
        return Err(invalid_default(input, raw, "wrong type for the parameter"));
    }
    Ok(value)
}

fn json_to_value(raw: &serde_json::Value) -> Option<Value> {
    match raw {
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int(i))
            } else {
                n.as_f64().map(Value::Float)
            }
        }
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        serde_json::Value::Array(items) => items
            .iter()
            .map(json_to_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        serde_json::Value::Null | serde_json::Value::Object(_) => None,
    }
}

/// Defaults must satisfy the parameter's own constraints.
fn check_default(
    input: &Input,
    set: &constraints::ConstraintSet,
    value: &Value,
) -> Result<(), CompileError> {
    use crate::constraints::NumericRange;

    let numeric = match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    };
    if let (Some(v), Some(range)) = (numeric, &set.range) {
        let (min, max) = match range {
            NumericRange::Int { min, max } => (min.map(|b| b as f64), max.map(|b| b as f64)),
            NumericRange::Float { min, max } => (*min, *max),
        };
        if let Some(min) = min
            && v < min
        {
            return Err(invalid_default(input, &serde_json::json!(v), "below minimum"));
        }
        if let Some(max) = max
            && v > max
        {
            return Err(invalid_default(input, &serde_json::json!(v), "above maximum"));
        }
    }
    if let (Value::List(items), Some(bounds)) = (value, &set.list) {
        let len = items.len() as u64;
        if bounds.min.is_some_and(|min| len < min) || bounds.max.is_some_and(|max| len > max) {
            return Err(invalid_default(
                input,
                &serde_json::json!(items.len()),
                "list length out of bounds",
            ));
        }
    }
    Ok(())
}

fn invalid_default(input: &Input, raw: &serde_json::Value, rule: &str) -> CompileError {
    constraints::ConstraintError::InvalidDefault {
        id: input.id.clone(),
        value: raw.clone(),
        rule: rule.to_string(),
    }
    .into()
}

fn build_groups(desc: &Descriptor) -> Result<Vec<crate::constraints::GroupRule>, CompileError> {
    let declared: HashSet<&InputId> = desc.inputs.iter().map(|input| &input.id).collect();

    let mut groups = Vec::with_capacity(desc.groups.len());
    for (index, group) in desc.groups.iter().enumerate() {
        for member in &group.members {
            if !declared.contains(member) {
                return Err(ReferenceError {
                    reference: member.to_string(),
                    context: format!("groups[{index}]"),
                }
                .into());
            }
        }
        groups.push(constraints::resolve_group(group)?);
    }
    Ok(groups)
}

/// Ordered (value-key, id) pairs for destructuring template strings.
/// Declaration order determines which key wins when keys overlap, matching
/// the original lookup semantics.
fn value_key_lookup(desc: &Descriptor, include_outputs: bool) -> Vec<(String, InputId)> {
    let inputs = desc
        .inputs
        .iter()
        .filter_map(|input| Some((input.value_key.clone()?, input.id.clone())));
    let outputs = desc
        .output_files
        .iter()
        .filter(|_| include_outputs)
        .filter_map(|output| Some((output.value_key.clone()?, output.id.clone())));
    inputs.chain(outputs).collect()
}

/// Splits a template string into literal runs and parameter references.
///
/// Scans the lookup in declaration order and splits on the first key found
/// anywhere in the text, recursing into the remainder. Deterministic for a
/// given descriptor.
fn destruct_template(template: &str, lookup: &[(String, InputId)]) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    let mut stack: Vec<Segment> = vec![Segment::Literal(template.to_string())];
    while let Some(segment) = stack.pop() {
        let text = match segment {
            Segment::Ref(_) => {
                out.push(segment);
                continue;
            }
            Segment::Literal(text) => text,
        };
        let found = lookup
            .iter()
            .find_map(|(key, id)| text.find(key.as_str()).map(|pos| (pos, key.len(), id)));
        match found {
            Some((pos, key_len, id)) => {
                // Push in reverse so the left part is processed first.
                let right = &text[pos + key_len..];
                if !right.is_empty() {
                    stack.push(Segment::Literal(right.to_string()));
                }
                stack.push(Segment::Ref(id.clone()));
                let left = &text[..pos];
                if !left.is_empty() {
                    stack.push(Segment::Literal(left.to_string()));
                }
            }
            None => out.push(Segment::Literal(text)),
        }
    }
    out
}

/// Anything left in a literal that still looks like a value-key is a
/// dangling reference.
fn find_dangling_key(segments: &[Segment]) -> Option<String> {
    let key_like = lazy_regex::regex!(r#"\[[0-9A-Z_]+\]"#);
    segments.iter().find_map(|segment| match segment {
        Segment::Literal(text) => key_like.find(text).map(|m| m.as_str().to_string()),
        Segment::Ref(_) => None,
    })
}

fn build_template(desc: &Descriptor) -> Result<CommandTemplate, CompileError> {
    let lookup = value_key_lookup(desc, false);

    let mut tokens = Vec::new();
    for word in split::shell_split(&desc.command_line)? {
        let segments = destruct_template(&word, &lookup);
        if let Some(dangling) = find_dangling_key(&segments) {
            return Err(ReferenceError {
                reference: dangling,
                context: "command-line".to_string(),
            }
            .into());
        }
        tokens.push(Token { segments });
    }
    Ok(CommandTemplate { tokens })
}

fn build_outputs(desc: &Descriptor, reserved_words: &[&str]) -> Result<Vec<OutputSpec>, CompileError> {
    // Output templates may reference inputs and other outputs.
    let lookup = value_key_lookup(desc, true);

    let mut scope = SymbolScope::with_reserved(reserved_words.iter().copied());
    let mut outputs = Vec::with_capacity(desc.output_files.len());
    for (index, output) in desc.output_files.iter().enumerate() {
        let symbol = scope.add_or_dodge(&ident::symbol_from(output.id.as_ref()))?;

        let segments = destruct_template(&output.path_template, &lookup);
        if let Some(dangling) = find_dangling_key(&segments) {
            return Err(ReferenceError {
                reference: dangling,
                context: format!("output-files[{index}].path-template"),
            }
            .into());
        }
        let template = segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Literal(text) => TemplateToken::Literal(text),
                Segment::Ref(id) => TemplateToken::Ref {
                    id,
                    strip_suffixes: output.stripped_extensions.clone(),
                },
            })
            .collect();

        outputs.push(OutputSpec {
            id: output.id.clone(),
            symbol,
            template,
            optional: output.optional,
            docs: output.description.clone(),
        });
    }
    Ok(outputs)
}

/// Orders outputs so every output precedes the outputs that reference it.
///
/// Kahn's algorithm over output-to-output edges, always taking the ready
/// node with the smallest declaration index, so the order is deterministic.
/// Leftover nodes mean a cycle, reported in reference order.
fn order_outputs(outputs: Vec<OutputSpec>) -> Result<Vec<OutputSpec>, CompileError> {
    let index_of: HashMap<&InputId, usize> = outputs
        .iter()
        .enumerate()
        .map(|(index, output)| (&output.id, index))
        .collect();

    // Dependencies of each output on other outputs, by declaration index.
    let deps: Vec<Vec<usize>> = outputs
        .iter()
        .map(|output| {
            output
                .template
                .iter()
                .filter_map(|token| match token {
                    TemplateToken::Ref { id, .. } => index_of.get(id).copied(),
                    TemplateToken::Literal(_) => None,
                })
                .collect()
        })
        .collect();

    let mut remaining: Vec<usize> = (0..outputs.len()).collect();
    let mut placed: HashSet<usize> = HashSet::new();
    let mut order: Vec<usize> = Vec::with_capacity(outputs.len());

    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .position(|&candidate| deps[candidate].iter().all(|dep| placed.contains(dep)));
        match ready {
            Some(position) => {
                let index = remaining.remove(position);
                placed.insert(index);
                order.push(index);
            }
            None => {
                return Err(find_cycle(&outputs, &deps, &remaining).into());
            }
        }
    }

    drop(index_of);
    let mut ordered: Vec<Option<OutputSpec>> = outputs.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .map(|index| ordered[index].take().expect("each index placed once"))
        .collect())
}

fn find_cycle(
    outputs: &[OutputSpec],
    deps: &[Vec<usize>],
    remaining: &[usize],
) -> CyclicTemplateError {
    let stuck: HashSet<usize> = remaining.iter().copied().collect();

    // Walk unresolved dependencies from any stuck node until one repeats.
    let mut seen: Vec<usize> = Vec::new();
    let mut current = remaining[0];
    loop {
        if let Some(start) = seen.iter().position(|&n| n == current) {
            let mut cycle: Vec<InputId> = seen[start..]
                .iter()
                .map(|&n| outputs[n].id.clone())
                .collect();
            cycle.push(outputs[current].id.clone());
            return CyclicTemplateError { cycle };
        }
        seen.push(current);
        current = deps[current]
            .iter()
            .copied()
            .find(|dep| stuck.contains(dep))
            .expect("stuck node must have a stuck dependency");
    }
}
