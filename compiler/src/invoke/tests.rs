use googletest::prelude::*;
use map_macro::hashbrown::hash_map;

use super::*;
use crate::build_tool;
use crate::testutil::*;

fn input_id(s: &str) -> InputId {
    InputId::test_id(s)
}

fn sample_tool() -> Tool {
    build_tool(&sample_descriptor()).expect("expected buildable tool")
}

/// An [ArgSet] with `infile` set, which satisfies every required
/// parameter of the sample tool.
fn base_args() -> ArgSet {
    let mut args = ArgSet::default();
    args.set(input_id("infile"), Value::Str("scan.nii".to_string()));
    args
}

#[gtest]
fn test_flag_set_emits_token_unset_omits_it() {
    let tool = build_tool(&flag_descriptor()).expect("expected buildable tool");

    let mut args = ArgSet::default();
    args.set(input_id("verbose"), Value::Bool(true));
    expect_that!(validate(&tool, &args), ok(()));
    expect_that!(assemble(&tool, &args), elements_are![eq("run"), eq("--verbose")]);

    let args = ArgSet::default();
    expect_that!(validate(&tool, &args), ok(()));
    expect_that!(assemble(&tool, &args), elements_are![eq("run")]);
}

#[gtest]
fn test_separate_flag_precedes_value() {
    let tool = sample_tool();
    let mut args = base_args();
    args.set(input_id("fraction"), Value::Float(0.5));

    expect_that!(validate(&tool, &args), ok(()));
    expect_that!(
        assemble(&tool, &args),
        elements_are![eq("bet"), eq("scan.nii"), eq("-f"), eq("0.5")]
    );
}

#[gtest]
fn test_joined_flag_fuses_into_one_token() {
    let tool = build_tool(&descriptor_from_json(
        r#"{
            "name": "conv",
            "command-line": "conv [LEVEL]",
            "inputs": [
                {
                    "id": "level",
                    "type": "Number",
                    "integer": true,
                    "optional": true,
                    "command-line-flag": "--level",
                    "command-line-flag-separator": "=",
                    "value-key": "[LEVEL]"
                }
            ]
        }"#,
    ))
    .expect("expected buildable tool");

    let mut args = ArgSet::default();
    args.set(input_id("level"), Value::Int(3));
    expect_that!(
        assemble(&tool, &args),
        elements_are![eq("conv"), eq("--level=3")]
    );
}

#[gtest]
fn test_value_above_maximum_rejected_naming_parameter() {
    let tool = sample_tool();
    let mut args = base_args();
    args.set(input_id("fraction"), Value::Float(1.5));

    let err = validate(&tool, &args).expect_err("expected range violation");
    expect_that!(err.subject, eq("fraction"));
    expect_that!(err.rule, eq(RuleKind::Maximum));
}

#[gtest]
fn test_value_below_minimum_rejected() {
    let tool = sample_tool();
    let mut args = base_args();
    args.set(input_id("fraction"), Value::Float(-0.5));

    let err = validate(&tool, &args).expect_err("expected range violation");
    expect_that!(err.rule, eq(RuleKind::Minimum));
}

#[gtest]
fn test_missing_required_parameter_rejected() {
    let tool = sample_tool();
    let args = ArgSet::default();

    let err = validate(&tool, &args).expect_err("expected required violation");
    expect_that!(err.subject, eq("infile"));
    expect_that!(err.rule, eq(RuleKind::Required));
}

#[gtest]
fn test_unknown_parameter_rejected() {
    let tool = sample_tool();
    let mut args = base_args();
    args.set(input_id("bogus"), Value::Int(1));

    let err = validate(&tool, &args).expect_err("expected unknown-parameter violation");
    expect_that!(err.subject, eq("bogus"));
    expect_that!(err.rule, eq(RuleKind::UnknownParameter));
}

#[gtest]
fn test_mistyped_value_rejected() {
    let tool = sample_tool();
    let mut args = base_args();
    args.set(input_id("fraction"), Value::Str("half".to_string()));

    let err = validate(&tool, &args).expect_err("expected type violation");
    expect_that!(err.subject, eq("fraction"));
    expect_that!(err.rule, eq(RuleKind::TypeMismatch));
}

#[gtest]
fn test_list_bounds_enforced_and_order_preserved() {
    let tool = sample_tool();

    let mut args = base_args();
    args.set(input_id("kernels"), Value::List(vec![]));
    let err = validate(&tool, &args).expect_err("expected list-min violation");
    expect_that!(err.subject, eq("kernels"));
    expect_that!(err.rule, eq(RuleKind::ListMin));

    let mut args = base_args();
    args.set(
        input_id("kernels"),
        Value::List(vec![
            Value::Int(2),
            Value::Int(1),
            Value::Int(3),
            Value::Int(4),
        ]),
    );
    let err = validate(&tool, &args).expect_err("expected list-max violation");
    expect_that!(err.rule, eq(RuleKind::ListMax));

    let mut args = base_args();
    args.set(input_id("kernels"), Value::List(vec![Value::Int(2), Value::Int(1)]));
    expect_that!(validate(&tool, &args), ok(()));
    expect_that!(
        assemble(&tool, &args),
        elements_are![eq("bet"), eq("scan.nii"), eq("2"), eq("1")]
    );
}

#[gtest]
fn test_both_exclusive_members_rejected_naming_group() {
    let tool = sample_tool();
    let mut args = base_args();
    args.set(input_id("robust"), Value::Bool(true));
    args.set(input_id("slices"), Value::Bool(true));

    let err = validate(&tool, &args).expect_err("expected exclusivity violation");
    expect_that!(err.subject, eq("variant"));
    expect_that!(err.rule, eq(RuleKind::MutuallyExclusive));

    let mut args = base_args();
    args.set(input_id("robust"), Value::Bool(true));
    expect_that!(validate(&tool, &args), ok(()));
}

#[gtest]
fn test_choice_outside_declared_set_rejected() {
    let tool = build_tool(&descriptor_from_json(
        r#"{
            "name": "pick",
            "command-line": "pick [MODE]",
            "inputs": [
                {
                    "id": "mode",
                    "type": "String",
                    "value-choices": ["fast", "slow"],
                    "value-key": "[MODE]"
                }
            ]
        }"#,
    ))
    .expect("expected buildable tool");

    let mut args = ArgSet::default();
    args.set(input_id("mode"), Value::Str("medium".to_string()));
    let err = validate(&tool, &args).expect_err("expected choice violation");
    expect_that!(err.subject, eq("mode"));
    expect_that!(err.rule, eq(RuleKind::Choice));

    let mut args = ArgSet::default();
    args.set(input_id("mode"), Value::Str("fast".to_string()));
    expect_that!(validate(&tool, &args), ok(()));
}

#[gtest]
fn test_missing_file_rejected_when_existence_demanded() {
    let tool = build_tool(&descriptor_from_json(
        r#"{
            "name": "stat",
            "command-line": "stat [TARGET]",
            "inputs": [
                {
                    "id": "target",
                    "type": "File",
                    "file-must-exist": true,
                    "value-key": "[TARGET]"
                }
            ]
        }"#,
    ))
    .expect("expected buildable tool");

    let mut args = ArgSet::default();
    args.set(
        input_id("target"),
        Value::Str("/no/such/file/anywhere".to_string()),
    );
    let err = validate(&tool, &args).expect_err("expected existence violation");
    expect_that!(err.rule, eq(RuleKind::FileExists));

    let file = tempfile::NamedTempFile::new().expect("expected temp file");
    let mut args = ArgSet::default();
    args.set(
        input_id("target"),
        Value::Str(file.path().to_string_lossy().into_owned()),
    );
    expect_that!(validate(&tool, &args), ok(()));
}

#[gtest]
fn test_output_template_strips_extension_before_substitution() {
    let tool = sample_tool();

    let outputs = resolve_outputs(&tool, &base_args());
    expect_that!(
        outputs,
        elements_are![eq(&ResolvedOutput {
            id: input_id("outfile"),
            path: "scan_brain.nii.gz".to_string(),
        })]
    );

    let mut args = ArgSet::default();
    args.set(input_id("infile"), Value::Str("scan.nii.gz".to_string()));
    expect_that!(
        resolve_outputs(&tool, &args)[0].path,
        eq("scan_brain.nii.gz")
    );
}

#[gtest]
fn test_output_reference_to_absent_optional_substitutes_empty() {
    let tool = build_tool(&descriptor_from_json(
        r#"{
            "name": "tag",
            "command-line": "tag [SUFFIX]",
            "inputs": [
                {
                    "id": "suffix",
                    "type": "String",
                    "optional": true,
                    "value-key": "[SUFFIX]"
                }
            ],
            "output-files": [
                {"id": "log", "path-template": "out[SUFFIX].log"}
            ]
        }"#,
    ))
    .expect("expected buildable tool");

    expect_that!(
        resolve_outputs(&tool, &ArgSet::default())[0].path,
        eq("out.log")
    );
}

#[gtest]
fn test_chained_outputs_resolve_in_dependency_order() {
    let tool = build_tool(&descriptor_from_json(
        r#"{
            "name": "qc",
            "command-line": "qc [SUBJECT]",
            "inputs": [
                {"id": "subject", "type": "String", "value-key": "[SUBJECT]"}
            ],
            "output-files": [
                {"id": "report", "path-template": "[LOGDIR]/report.html", "value-key": "[REPORT]"},
                {"id": "logdir", "path-template": "[SUBJECT]_logs", "value-key": "[LOGDIR]"}
            ]
        }"#,
    ))
    .expect("expected buildable tool");

    let mut args = ArgSet::default();
    args.set(input_id("subject"), Value::Str("s01".to_string()));
    expect_that!(
        resolve_outputs(&tool, &args),
        elements_are![
            eq(&ResolvedOutput {
                id: input_id("logdir"),
                path: "s01_logs".to_string(),
            }),
            eq(&ResolvedOutput {
                id: input_id("report"),
                path: "s01_logs/report.html".to_string(),
            }),
        ]
    );
}

#[gtest]
fn test_mixed_token_dropped_when_any_reference_unset() {
    let tool = build_tool(&descriptor_from_json(
        r#"{
            "name": "pair",
            "command-line": "pair --pair=[A],[B]",
            "inputs": [
                {"id": "a", "type": "String", "optional": true, "value-key": "[A]"},
                {"id": "b", "type": "String", "optional": true, "value-key": "[B]"}
            ]
        }"#,
    ))
    .expect("expected buildable tool");

    let args = ArgSet::from(hash_map! {
        input_id("a") => Value::Str("x".to_string()),
        input_id("b") => Value::Str("y".to_string()),
    });
    expect_that!(
        assemble(&tool, &args),
        elements_are![eq("pair"), eq("--pair=x,y")]
    );

    let args = ArgSet::from(hash_map! {
        input_id("a") => Value::Str("x".to_string()),
    });
    expect_that!(assemble(&tool, &args), elements_are![eq("pair")]);
}

#[gtest]
#[test_log::test]
fn test_run_calls_runner_once_with_assembled_command() {
    let tool = sample_tool();
    let mut args = base_args();
    args.set(input_id("verbose"), Value::Bool(true));

    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .times(1)
        .withf(|cargs, outputs, metadata| {
            cargs == ["bet", "scan.nii", "--verbose"]
                && outputs.len() == 1
                && metadata.name == "bet"
        })
        .returning(|_, _, _| Ok(RunOutcome { exit_code: 0 }));

    let result = run(&tool, &args, &mut runner).expect("expected successful run");
    expect_that!(result.outcome.exit_code, eq(0));
    expect_that!(result.outputs[0].path, eq("scan_brain.nii.gz"));
}

#[gtest]
fn test_run_skips_runner_on_invalid_arguments() {
    let tool = sample_tool();
    let mut runner = MockRunner::new();
    runner.expect_run().times(0);

    let result = run(&tool, &ArgSet::default(), &mut runner);
    expect_that!(result, err(anything()));
}
