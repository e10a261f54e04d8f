//! Python backend: renders a [Tool] as a self-contained module.
//!
//! The generated module depends only on the standard library. It declares
//! the execution contract as a local `typing.Protocol` so callers inject
//! whatever runner they want, and it mirrors [crate::invoke] exactly:
//! every canonical constraint check raises `ValueError` before the runner
//! is called once.

use crate::constraints::{ChoiceValue, GroupRule, NumericRange};
use crate::ir::{
    Cardinality, FlagJoin, ListType, OutputSpec, ParamType, Parameter, Segment, TemplateToken,
    Token, Tool, Value,
};

use super::source::{SourceBuffer, quote};

/// Symbols generated wrappers may not shadow: Python keywords, builtins
/// the emitted code calls, and module-level names the backend declares.
const RESERVED: &[&str] = &[
    // Keywords.
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
    // Builtins the emitted code uses.
    "ValueError", "any", "bool", "dict", "float", "int", "len", "list", "str", "sum",
    // Module-level names the backend declares or imports.
    "METADATA", "Runner", "_strip_suffixes", "os", "typing",
];

pub fn reserved_words() -> &'static [&'static str] {
    RESERVED
}

/// Renders the complete wrapper module. Pure function of the [Tool]:
/// equal tools produce byte-identical source.
pub fn generate(tool: &Tool) -> String {
    let mut buf = SourceBuffer::new();

    emit_module_docstring(&mut buf, tool);
    buf.blank();
    if needs_os(tool) {
        buf.line("import os");
    }
    buf.line("import typing");
    buf.blank();
    emit_metadata(&mut buf, tool);
    buf.blank();
    buf.blank();
    emit_outputs_class(&mut buf, tool);
    buf.blank();
    buf.blank();
    emit_runner_protocol(&mut buf, tool);
    if needs_strip_helper(tool) {
        buf.blank();
        buf.blank();
        emit_strip_helper(&mut buf);
    }
    buf.blank();
    buf.blank();
    emit_entry_function(&mut buf, tool);

    buf.finish()
}

fn needs_os(tool: &Tool) -> bool {
    tool.params.iter().any(|p| p.constraints.file_must_exist)
}

fn needs_strip_helper(tool: &Tool) -> bool {
    tool.outputs.iter().any(|output| {
        output.template.iter().any(|token| {
            matches!(token, TemplateToken::Ref { strip_suffixes, .. } if !strip_suffixes.is_empty())
        })
    })
}

fn emit_module_docstring(buf: &mut SourceBuffer, tool: &Tool) {
    let docs = tool
        .docs
        .clone()
        .unwrap_or_else(|| format!("Wrapper for `{}`.", tool.metadata.name));
    buf.line(format!("\"\"\"{}\"\"\"", sanitize_docs(&docs)));
}

/// Docstrings are delimited with triple double quotes, so the text itself
/// must not contain them or end in a backslash.
fn sanitize_docs(docs: &str) -> String {
    docs.replace('"', "'").replace('\\', "/")
}

fn opt_str(value: Option<&str>) -> String {
    match value {
        Some(v) => quote(v),
        None => "None".to_string(),
    }
}

fn emit_metadata(buf: &mut SourceBuffer, tool: &Tool) {
    let m = &tool.metadata;
    buf.line("METADATA = {");
    buf.indented(|buf| {
        buf.line(format!("\"name\": {},", quote(&m.name)));
        buf.line(format!("\"version\": {},", opt_str(m.version.as_deref())));
        buf.line(format!("\"content_hash\": {},", quote(&m.content_hash)));
        buf.line(format!(
            "\"container_image\": {},",
            opt_str(m.container_image.as_deref())
        ));
        if m.environment.is_empty() {
            buf.line("\"environment\": {},");
        } else {
            buf.line("\"environment\": {");
            buf.indented(|buf| {
                for (key, value) in &m.environment {
                    buf.line(format!("{}: {},", quote(key), quote(value)));
                }
            });
            buf.line("},");
        }
    });
    buf.line("}");
}

fn emit_outputs_class(buf: &mut SourceBuffer, tool: &Tool) {
    buf.line(format!("class {}(typing.NamedTuple):", tool.outputs_symbol));
    buf.indented(|buf| {
        buf.line(format!(
            "\"\"\"Output paths of `{}`.\"\"\"",
            tool.metadata.name
        ));
        if !tool.outputs.is_empty() {
            buf.blank();
        }
        for output in &tool.outputs {
            buf.line(format!("{}: str", output.symbol));
            if let Some(docs) = &output.docs {
                buf.line(format!("\"\"\"{}\"\"\"", sanitize_docs(docs)));
            }
        }
    });
}

fn emit_runner_protocol(buf: &mut SourceBuffer, tool: &Tool) {
    buf.line("class Runner(typing.Protocol):");
    buf.indented(|buf| {
        buf.line("\"\"\"Execution capability injected into the wrapper.\"\"\"");
        buf.blank();
        buf.line(format!(
            "def run(self, cargs: list[str], outputs: {}, metadata: dict) -> None: ...",
            tool.outputs_symbol
        ));
    });
}

fn emit_strip_helper(buf: &mut SourceBuffer) {
    buf.line("def _strip_suffixes(value: str, suffixes: typing.Sequence[str]) -> str:");
    buf.indented(|buf| {
        buf.line("for suffix in suffixes:");
        buf.indented(|buf| {
            buf.line("if value.endswith(suffix):");
            buf.indented(|buf| {
                buf.line("return value[: -len(suffix)]");
            });
        });
        buf.line("return value");
    });
}

fn emit_entry_function(buf: &mut SourceBuffer, tool: &Tool) {
    buf.line(format!("def {}(", tool.symbol));
    buf.indented(|buf| {
        // Python requires defaulted parameters after required ones.
        for param in tool.params.iter().filter(|p| p.is_required()) {
            buf.line(format!("{}: {},", param.symbol, py_type(&param.ty)));
        }
        for param in tool.params.iter().filter(|p| !p.is_required()) {
            buf.line(format!(
                "{}: {},",
                param.symbol,
                py_signature_default(param)
            ));
        }
        buf.line("*,");
        buf.line("runner: Runner,");
    });
    buf.line(format!(") -> {}:", tool.outputs_symbol));
    buf.indented(|buf| {
        emit_function_docstring(buf, tool);
        for param in &tool.params {
            emit_param_checks(buf, param);
        }
        for group in &tool.groups {
            emit_group_checks(buf, tool, group);
        }
        buf.line("cargs = []");
        for token in &tool.template.tokens {
            emit_token(buf, tool, token);
        }
        for output in &tool.outputs {
            buf.line(format!(
                "_o_{} = {}",
                output.symbol,
                output_expr(tool, output)
            ));
        }
        buf.line(format!("ret = {}(", tool.outputs_symbol));
        buf.indented(|buf| {
            for output in &tool.outputs {
                buf.line(format!("{}=_o_{},", output.symbol, output.symbol));
            }
        });
        buf.line(")");
        buf.line("runner.run(cargs, ret, METADATA)");
        buf.line("return ret");
    });
}

fn emit_function_docstring(buf: &mut SourceBuffer, tool: &Tool) {
    let summary = tool
        .docs
        .clone()
        .unwrap_or_else(|| format!("Runs `{}`.", tool.metadata.name));
    buf.line(format!("\"\"\"{}", sanitize_docs(&summary)));
    buf.blank();
    buf.line("Args:");
    buf.indented(|buf| {
        for param in &tool.params {
            if let Some(docs) = &param.docs {
                buf.line(format!("{}: {}", param.symbol, sanitize_docs(docs)));
            }
        }
        buf.line("runner: Execution backend the assembled command is handed to.");
    });
    buf.blank();
    buf.line("Returns:");
    buf.indented(|buf| {
        buf.line(format!(
            "{} with every output path resolved.",
            tool.outputs_symbol
        ));
    });
    buf.line("\"\"\"");
}

/// Python annotation for a parameter type.
fn py_type(ty: &ParamType) -> String {
    match ty {
        ParamType::Str | ParamType::File => "str".to_string(),
        ParamType::Int => "int".to_string(),
        ParamType::Float => "float".to_string(),
        ParamType::Flag => "bool".to_string(),
        ParamType::Enum(choices) => format!(
            "typing.Literal[{}]",
            choices
                .iter()
                .map(py_choice)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ParamType::List(ListType { elem, .. }) => format!("list[{}]", py_type(elem)),
    }
}

fn py_choice(choice: &ChoiceValue) -> String {
    match choice {
        ChoiceValue::Str(s) => quote(s),
        ChoiceValue::Int(i) => i.to_string(),
        ChoiceValue::Float(x) => py_float(*x),
    }
}

/// Python float literal. `Display` drops the decimal point for whole
/// floats, which Python would read back as an int.
fn py_float(x: f64) -> String {
    format!("{x:?}")
}

fn py_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => py_float(*x),
        Value::Str(s) => quote(s),
        Value::List(items) => format!(
            "[{}]",
            items.iter().map(py_value).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn py_signature_default(param: &Parameter) -> String {
    let ty = py_type(&param.ty);
    match &param.cardinality {
        Cardinality::Required => ty,
        Cardinality::OptionalDefault(value) => format!("{ty} = {}", py_value(value)),
        Cardinality::Optional => format!("{ty} | None = None"),
    }
}

/// The guard expression under which the parameter has a usable value, or
/// `None` when it always does.
fn set_guard(param: &Parameter) -> Option<String> {
    match (&param.ty, &param.cardinality) {
        (ParamType::Flag, _) => Some(param.symbol.clone()),
        (_, Cardinality::Optional) => Some(format!("{} is not None", param.symbol)),
        (_, Cardinality::Required | Cardinality::OptionalDefault(_)) => None,
    }
}

/// Emits `if <guard> and <condition>:` / `raise ValueError(<message>)`,
/// or the unguarded form when the value is always present.
fn emit_check(buf: &mut SourceBuffer, param: &Parameter, condition: &str, message: &str) {
    match set_guard(param) {
        Some(guard) => buf.line(format!("if {guard} and {condition}:")),
        None => buf.line(format!("if {condition}:")),
    }
    buf.indented(|buf| {
        buf.line(format!("raise ValueError({message})"));
    });
}

fn is_list(param: &Parameter) -> bool {
    matches!(param.ty, ParamType::List(_))
}

fn emit_param_checks(buf: &mut SourceBuffer, param: &Parameter) {
    let id = param.id.as_ref();
    let symbol = &param.symbol;

    if let Some(range) = &param.constraints.range {
        let (min, max) = match range {
            NumericRange::Int { min, max } => {
                (min.map(|b| b.to_string()), max.map(|b| b.to_string()))
            }
            NumericRange::Float { min, max } => (min.map(py_float), max.map(py_float)),
        };
        if let Some(min) = min {
            if is_list(param) {
                emit_check(
                    buf,
                    param,
                    &format!("any(x < {min} for x in {symbol})"),
                    &quote(&format!("'{id}' items must be at least {min}")),
                );
            } else {
                emit_check(
                    buf,
                    param,
                    &format!("{symbol} < {min}"),
                    &format!(
                        "f\"'{id}' must be at least {min} but was {{{symbol}}}\""
                    ),
                );
            }
        }
        if let Some(max) = max {
            if is_list(param) {
                emit_check(
                    buf,
                    param,
                    &format!("any(x > {max} for x in {symbol})"),
                    &quote(&format!("'{id}' items must be at most {max}")),
                );
            } else {
                emit_check(
                    buf,
                    param,
                    &format!("{symbol} > {max}"),
                    &format!("f\"'{id}' must be at most {max} but was {{{symbol}}}\""),
                );
            }
        }
    }

    if param.is_enum() {
        let condition = if is_list(param) {
            format!("any(x not in typing.get_args({}) for x in {symbol})", literal_of(param))
        } else {
            format!("{symbol} not in typing.get_args({})", literal_of(param))
        };
        emit_check(
            buf,
            param,
            &condition,
            &quote(&format!("'{id}' must be one of the allowed choices")),
        );
    }

    if let Some(bounds) = &param.constraints.list {
        if let Some(min) = bounds.min {
            emit_check(
                buf,
                param,
                &format!("len({symbol}) < {min}"),
                &format!(
                    "f\"'{id}' must have at least {min} item(s) but had {{len({symbol})}}\""
                ),
            );
        }
        if let Some(max) = bounds.max {
            emit_check(
                buf,
                param,
                &format!("len({symbol}) > {max}"),
                &format!(
                    "f\"'{id}' must have at most {max} item(s) but had {{len({symbol})}}\""
                ),
            );
        }
    }

    if param.constraints.file_must_exist {
        let condition = if is_list(param) {
            format!("any(not os.path.exists(x) for x in {symbol})")
        } else {
            format!("not os.path.exists({symbol})")
        };
        emit_check(
            buf,
            param,
            &condition,
            &quote(&format!("'{id}' must name an existing file")),
        );
    }
}

/// A `typing.Literal[...]` expression for an enum parameter, used with
/// `typing.get_args` for membership checks.
fn literal_of(param: &Parameter) -> String {
    match &param.ty {
        ParamType::Enum(_) => py_type(&param.ty),
        ParamType::List(ListType { elem, .. }) => py_type(elem),
        _ => unreachable!("only called for enum parameters"),
    }
}

fn emit_group_checks(buf: &mut SourceBuffer, tool: &Tool, group: &GroupRule) {
    let members: Vec<String> = group
        .members
        .iter()
        .filter_map(|id| tool.param(id))
        .map(|param| match (&param.ty, &param.cardinality) {
            (ParamType::Flag, _) => param.symbol.clone(),
            (_, Cardinality::Optional) => format!("{} is not None", param.symbol),
            (_, _) => "True".to_string(),
        })
        .collect();
    let set_count = format!("sum([{}])", members.join(", "));
    let id = group.id.as_ref();

    let mut check = |condition: String, message: String| {
        buf.line(format!("if {condition}:"));
        buf.indented(|buf| {
            buf.line(format!("raise ValueError({})", quote(&message)));
        });
    };
    if group.mutually_exclusive {
        check(
            format!("{set_count} > 1"),
            format!("'{id}': at most one member may be set"),
        );
    }
    if group.all_required {
        check(
            format!("{set_count} < {}", group.members.len()),
            format!("'{id}': all members must be set"),
        );
    }
    if group.one_required {
        check(
            format!("{set_count} < 1"),
            format!("'{id}': at least one member must be set"),
        );
    }
}

/// Scalar value expression, stringified when the Python value is not
/// already a `str`.
fn scalar_expr(ty: &ParamType, symbol: &str) -> String {
    match ty {
        ParamType::Str | ParamType::File => symbol.to_string(),
        ParamType::Enum(choices) => match choices.first() {
            Some(ChoiceValue::Str(_)) | None => symbol.to_string(),
            Some(_) => format!("str({symbol})"),
        },
        _ => format!("str({symbol})"),
    }
}

/// Expression rendering a parameter's value as one string, joining list
/// items by their declared separator (space by default).
fn joined_expr(param: &Parameter) -> String {
    match &param.ty {
        ParamType::List(ListType { elem, join }) => {
            let sep = quote(join.as_deref().unwrap_or(" "));
            match scalar_expr(elem, "x") {
                expr if expr == "x" => format!("{sep}.join({})", param.symbol),
                expr => format!("{sep}.join({expr} for x in {})", param.symbol),
            }
        }
        ty => scalar_expr(ty, &param.symbol),
    }
}

fn emit_token(buf: &mut SourceBuffer, tool: &Tool, token: &Token) {
    if let [Segment::Literal(text)] = token.segments.as_slice() {
        buf.line(format!("cargs.append({})", quote(text)));
        return;
    }
    if let [Segment::Ref(id)] = token.segments.as_slice() {
        if let Some(param) = tool.param(id) {
            emit_param_token(buf, param);
        }
        return;
    }
    emit_mixed_token(buf, tool, token);
}

fn emit_param_token(buf: &mut SourceBuffer, param: &Parameter) {
    let body = |buf: &mut SourceBuffer| {
        if let ParamType::Flag = param.ty {
            let flag = param.flag.as_ref().map(|f| f.token.as_str()).unwrap_or("");
            buf.line(format!("cargs.append({})", quote(flag)));
            return;
        }
        let value_tokens = value_tokens(param);
        match &param.flag {
            None => match value_tokens {
                ValueTokens::Many(list) => buf.line(format!("cargs.extend({list})")),
                ValueTokens::One(expr) => buf.line(format!("cargs.append({expr})")),
            },
            Some(flag) => match &flag.join {
                FlagJoin::Separate => match value_tokens {
                    ValueTokens::Many(list) => {
                        buf.line(format!("cargs.append({})", quote(&flag.token)));
                        buf.line(format!("cargs.extend({list})"));
                    }
                    ValueTokens::One(expr) => {
                        buf.line(format!("cargs.extend([{}, {expr}])", quote(&flag.token)));
                    }
                },
                FlagJoin::Joined(sep) => {
                    let expr = match value_tokens {
                        ValueTokens::One(expr) => expr,
                        ValueTokens::Many(_) => joined_by_space(param),
                    };
                    buf.line(format!(
                        "cargs.append({} + {expr})",
                        quote(&format!("{}{sep}", flag.token))
                    ));
                }
            },
        }
    };

    match set_guard(param) {
        Some(guard) => {
            buf.line(format!("if {guard}:"));
            buf.indented(body);
        }
        None => body(buf),
    }
}

enum ValueTokens {
    /// One expression producing one token.
    One(String),
    /// A list expression contributing one token per item.
    Many(String),
}

fn value_tokens(param: &Parameter) -> ValueTokens {
    match &param.ty {
        ParamType::List(ListType { elem, join: None }) => ValueTokens::Many(format!(
            "[{} for x in {}]",
            scalar_expr(elem, "x"),
            param.symbol
        )),
        _ => ValueTokens::One(joined_expr(param)),
    }
}

fn joined_by_space(param: &Parameter) -> String {
    match &param.ty {
        ParamType::List(ListType { elem, .. }) => {
            let expr = scalar_expr(elem, "x");
            if expr == "x" {
                format!("\" \".join({})", param.symbol)
            } else {
                format!("\" \".join({expr} for x in {})", param.symbol)
            }
        }
        ty => scalar_expr(ty, &param.symbol),
    }
}

/// A mixed literal/reference token renders to one string; it is emitted
/// only when every referenced valued parameter is set.
fn emit_mixed_token(buf: &mut SourceBuffer, tool: &Tool, token: &Token) {
    let mut guards: Vec<String> = Vec::new();
    let mut parts: Vec<String> = Vec::new();
    for segment in &token.segments {
        match segment {
            Segment::Literal(text) => parts.push(quote(text)),
            Segment::Ref(id) => {
                let Some(param) = tool.param(id) else { continue };
                if let ParamType::Flag = param.ty {
                    let flag = param.flag.as_ref().map(|f| f.token.as_str()).unwrap_or("");
                    parts.push(format!(
                        "({} if {} else \"\")",
                        quote(flag),
                        param.symbol
                    ));
                } else {
                    if let Some(guard) = set_guard(param) {
                        guards.push(guard);
                    }
                    parts.push(joined_expr(param));
                }
            }
        }
    }
    let append = format!("cargs.append({})", parts.join(" + "));
    if guards.is_empty() {
        buf.line(append);
    } else {
        buf.line(format!("if {}:", guards.join(" and ")));
        buf.indented(|buf| buf.line(append));
    }
}

/// Expression for one resolved output path, in terms of parameter symbols
/// and previously resolved `_o_*` temporaries.
fn output_expr(tool: &Tool, output: &OutputSpec) -> String {
    let parts: Vec<String> = output
        .template
        .iter()
        .map(|token| match token {
            TemplateToken::Literal(text) => quote(text),
            TemplateToken::Ref { id, strip_suffixes } => {
                let base = match tool.param(id) {
                    Some(param) => match set_guard(param) {
                        Some(_) if !matches!(param.ty, ParamType::Flag) => format!(
                            "({} if {} is not None else \"\")",
                            joined_expr(param),
                            param.symbol
                        ),
                        _ => joined_expr(param),
                    },
                    None => match tool.output(id) {
                        Some(prior) => format!("_o_{}", prior.symbol),
                        None => quote(""),
                    },
                };
                if strip_suffixes.is_empty() {
                    base
                } else {
                    let suffixes: Vec<String> =
                        strip_suffixes.iter().map(|s| quote(s)).collect();
                    format!("_strip_suffixes({base}, [{}])", suffixes.join(", "))
                }
            }
        })
        .collect();
    parts.join(" + ")
}
