use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use compiler::descriptor::InputId;
use compiler::invoke::{self, ArgSet};
use compiler::ir::{ListType, ParamType, Tool, Value};

use crate::load;

/// Validates arguments against one descriptor and prints the command
/// line and resolved output paths, without executing anything.
#[derive(Args, Debug)]
pub struct Command {
    /// Descriptor file.
    input: PathBuf,

    /// Argument assignment, repeatable. List values separate items with
    /// commas; flags take true or false.
    #[arg(long = "arg", value_name = "ID=VALUE")]
    args: Vec<String>,

    #[command(flatten)]
    format: load::FormatArgs,
}

pub fn run(cmd: &Command) -> Result<()> {
    let desc = cmd.format.load(&cmd.input)?;
    let tool = compiler::build_tool(&desc)
        .with_context(|| format!("compiling descriptor {:?}", desc.name))?;

    let args = parse_args(&tool, &cmd.args)?;
    invoke::validate(&tool, &args)?;

    for token in invoke::assemble(&tool, &args) {
        println!("{token}");
    }
    for output in invoke::resolve_outputs(&tool, &args) {
        println!("{}={}", output.id, output.path);
    }
    Ok(())
}

fn parse_args(tool: &Tool, assignments: &[String]) -> Result<ArgSet> {
    let mut args = ArgSet::default();
    for assignment in assignments {
        let (id, text) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("malformed --arg {assignment:?}, expected ID=VALUE"))?;
        let id = InputId::try_from(id).with_context(|| format!("in --arg {assignment:?}"))?;
        // Unknown ids parse as plain strings so validation reports them.
        let value = match tool.param(&id) {
            Some(param) => parse_value(&param.ty, text)
                .with_context(|| format!("in --arg {assignment:?}"))?,
            None => Value::Str(text.to_string()),
        };
        args.set(id, value);
    }
    Ok(args)
}

fn parse_value(ty: &ParamType, text: &str) -> Result<Value> {
    match ty {
        ParamType::Str | ParamType::File => Ok(Value::Str(text.to_string())),
        ParamType::Flag => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => bail!("expected true or false, got {other:?}"),
        },
        ParamType::Int => Ok(Value::Int(
            text.parse().with_context(|| format!("parsing {text:?} as an integer"))?,
        )),
        ParamType::Float => Ok(Value::Float(
            text.parse().with_context(|| format!("parsing {text:?} as a number"))?,
        )),
        // Typed per the choice set; validation checks membership.
        ParamType::Enum(choices) => match choices.first() {
            Some(compiler::constraints::ChoiceValue::Int(_)) => parse_value(&ParamType::Int, text),
            Some(compiler::constraints::ChoiceValue::Float(_)) => {
                parse_value(&ParamType::Float, text)
            }
            _ => Ok(Value::Str(text.to_string())),
        },
        ParamType::List(ListType { elem, .. }) => text
            .split(',')
            .map(|item| parse_value(elem, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use testutils::{WrapError, anyhow_downcasts_to};

    use super::*;

    fn bet_tool() -> Tool {
        compiler::build_tool(&compiler::testutil::sample_descriptor())
            .expect("expected buildable tool")
    }

    #[gtest]
    fn test_parses_typed_assignments() -> googletest::Result<()> {
        let tool = bet_tool();
        let args = parse_args(
            &tool,
            &[
                "infile=scan.nii".to_string(),
                "fraction=0.5".to_string(),
                "verbose=true".to_string(),
                "kernels=1,2".to_string(),
            ],
        )
        .wrap_error()?;

        expect_that!(
            args.get(&InputId::test_id("fraction")),
            some(eq(&Value::Float(0.5)))
        );
        expect_that!(
            args.get(&InputId::test_id("kernels")),
            some(eq(&Value::List(vec![Value::Int(1), Value::Int(2)])))
        );
        Ok(())
    }

    #[gtest]
    fn test_rejects_malformed_assignment() {
        let tool = bet_tool();
        expect_that!(
            parse_args(&tool, &["no-equals-sign".to_string()]),
            err(anything())
        );
        expect_that!(
            parse_args(&tool, &["verbose=yes".to_string()]),
            err(anything())
        );
    }

    #[gtest]
    fn test_invalid_arguments_surface_validation_error() {
        let tool = bet_tool();
        let args = parse_args(
            &tool,
            &["infile=scan.nii".to_string(), "fraction=2.5".to_string()],
        )
        .expect("expected parseable assignments");

        let err = invoke::validate(&tool, &args)
            .map_err(anyhow::Error::from)
            .expect_err("expected validation failure");
        expect_that!(
            &err,
            anyhow_downcasts_to::<invoke::ValidationError, _>(matches_pattern!(
                invoke::ValidationError {
                    rule: eq(&invoke::RuleKind::Maximum),
                    ..
                }
            ))
        );
    }
}
