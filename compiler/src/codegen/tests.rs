use googletest::prelude::*;
use testutils::contains_in_order;

use crate::compile;
use crate::testutil::*;

fn source_for(json: &str) -> String {
    compile(&descriptor_from_json(json))
        .expect("expected compilable descriptor")
        .source
}

#[gtest]
#[test_log::test]
fn test_equal_descriptors_generate_identical_source() {
    let first = compile(&sample_descriptor()).expect("expected compilable descriptor");
    let second = compile(&sample_descriptor()).expect("expected compilable descriptor");
    expect_that!(first.source, eq(&second.source));
}

#[gtest]
fn test_emits_one_raise_per_canonical_check() {
    let compiled = compile(&sample_descriptor()).expect("expected compilable descriptor");
    expect_that!(
        compiled.source.matches("raise ValueError").count(),
        eq(compiled.tool.constraint_check_count())
    );
}

#[gtest]
fn test_sample_module_layout() {
    let compiled = compile(&sample_descriptor()).expect("expected compilable descriptor");
    expect_that!(
        compiled.source,
        contains_in_order([
            "\"\"\"Brain extraction tool.\"\"\"",
            "import typing",
            "METADATA = {",
            "\"name\": \"bet\",",
            "\"version\": \"6.0.4\",",
            "\"container_image\": \"example/fsl:6.0.4\",",
            "class BetOutputs(typing.NamedTuple):",
            "outfile: str",
            "class Runner(typing.Protocol):",
            "def run(self, cargs: list[str], outputs: BetOutputs, metadata: dict) -> None: ...",
            "def _strip_suffixes(value: str, suffixes: typing.Sequence[str]) -> str:",
            "def bet(",
            "infile: str,",
            "fraction: float | None = None,",
            "verbose: bool = False,",
            "kernels: list[int] | None = None,",
            "*,",
            "runner: Runner,",
            ") -> BetOutputs:",
            "cargs = []",
            "cargs.append(\"bet\")",
            "cargs.append(infile)",
            "if fraction is not None:",
            "cargs.extend([\"-f\", str(fraction)])",
            "if verbose:",
            "cargs.append(\"--verbose\")",
            "if kernels is not None:",
            "cargs.extend([str(x) for x in kernels])",
            "_o_outfile = _strip_suffixes(infile, [\".nii.gz\", \".nii\"]) + \"_brain.nii.gz\"",
            "ret = BetOutputs(",
            "outfile=_o_outfile,",
            "runner.run(cargs, ret, METADATA)",
            "return ret",
        ])
    );
}

#[gtest]
fn test_range_checks_guard_optional_parameters() {
    let compiled = compile(&sample_descriptor()).expect("expected compilable descriptor");
    expect_that!(
        compiled.source,
        contains_in_order([
            "if fraction is not None and fraction < 0.0:",
            "raise ValueError(f\"'fraction' must be at least 0.0 but was {fraction}\")",
            "if fraction is not None and fraction > 1.0:",
            "raise ValueError(f\"'fraction' must be at most 1.0 but was {fraction}\")",
            "if kernels is not None and len(kernels) < 1:",
            "if kernels is not None and len(kernels) > 3:",
        ])
    );
}

#[gtest]
fn test_group_check_counts_set_members() {
    let compiled = compile(&sample_descriptor()).expect("expected compilable descriptor");
    expect_that!(
        compiled.source,
        contains_in_order([
            "if sum([robust, slices]) > 1:",
            "raise ValueError(\"'variant': at most one member may be set\")",
        ])
    );
}

#[gtest]
fn test_enum_annotation_and_membership_check() {
    let source = source_for(
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
    );
    expect_that!(
        source,
        contains_in_order([
            "mode: typing.Literal[\"fast\", \"slow\"],",
            "if mode not in typing.get_args(typing.Literal[\"fast\", \"slow\"]):",
            "raise ValueError(\"'mode' must be one of the allowed choices\")",
            "cargs.append(mode)",
        ])
    );
}

#[gtest]
fn test_joined_flag_concatenates_value() {
    let source = source_for(
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
    );
    expect_that!(
        source,
        contains_in_order([
            "if level is not None:",
            "cargs.append(\"--level=\" + str(level))",
        ])
    );
}

#[gtest]
fn test_file_existence_check_imports_os() {
    let source = source_for(
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
    );
    expect_that!(
        source,
        contains_in_order([
            "import os",
            "import typing",
            "if not os.path.exists(target):",
            "raise ValueError(\"'target' must name an existing file\")",
        ])
    );
}

#[gtest]
fn test_mixed_token_guarded_by_every_reference() {
    let source = source_for(
        r#"{
            "name": "pair",
            "command-line": "pair --pair=[A],[B]",
            "inputs": [
                {"id": "a", "type": "String", "optional": true, "value-key": "[A]"},
                {"id": "b", "type": "String", "optional": true, "value-key": "[B]"}
            ]
        }"#,
    );
    expect_that!(
        source,
        contains_in_order([
            "if a is not None and b is not None:",
            "cargs.append(\"--pair=\" + a + \",\" + b)",
        ])
    );
}

#[gtest]
fn test_chained_outputs_resolve_through_temporaries() {
    let source = source_for(
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
    );
    expect_that!(
        source,
        contains_in_order([
            "_o_logdir = subject + \"_logs\"",
            "_o_report = _o_logdir + \"/report.html\"",
        ])
    );
}

#[gtest]
fn test_reserved_symbol_dodged_in_signature() {
    let source = source_for(
        r#"{
            "name": "calc",
            "command-line": "calc [LAMBDA]",
            "inputs": [
                {"id": "lambda", "type": "Number", "value-key": "[LAMBDA]"}
            ]
        }"#,
    );
    expect_that!(
        source,
        contains_in_order(["lambda_: float,", "cargs.append(str(lambda_))"])
    );
}
