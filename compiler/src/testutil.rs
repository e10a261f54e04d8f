//! Fixture descriptors used by tests across this crate.

use crate::descriptor::Descriptor;

/// A small but representative descriptor: a required file input, a
/// range-constrained optional number, a flag, a bounded list, a
/// mutually-exclusive group, and an output template over the file input.
pub fn sample_descriptor() -> Descriptor {
    descriptor_from_json(
        r#"{
            "name": "bet",
            "tool-version": "6.0.4",
            "description": "Brain extraction tool.",
            "command-line": "bet [INFILE] [FRACTION] [VERBOSE] [KERNELS] [ROBUST] [SLICES]",
            "container-image": {"type": "docker", "image": "example/fsl:6.0.4"},
            "inputs": [
                {
                    "id": "infile",
                    "type": "File",
                    "description": "Input image.",
                    "value-key": "[INFILE]"
                },
                {
                    "id": "fraction",
                    "type": "Number",
                    "optional": true,
                    "minimum": 0,
                    "maximum": 1,
                    "command-line-flag": "-f",
                    "value-key": "[FRACTION]"
                },
                {
                    "id": "verbose",
                    "type": "Flag",
                    "command-line-flag": "--verbose",
                    "value-key": "[VERBOSE]"
                },
                {
                    "id": "kernels",
                    "type": "Number",
                    "integer": true,
                    "optional": true,
                    "list": true,
                    "min-list-entries": 1,
                    "max-list-entries": 3,
                    "value-key": "[KERNELS]"
                },
                {
                    "id": "robust",
                    "type": "Flag",
                    "command-line-flag": "-R",
                    "value-key": "[ROBUST]"
                },
                {
                    "id": "slices",
                    "type": "Flag",
                    "command-line-flag": "-S",
                    "value-key": "[SLICES]"
                }
            ],
            "groups": [
                {
                    "id": "variant",
                    "members": ["robust", "slices"],
                    "mutually-exclusive": true
                }
            ],
            "output-files": [
                {
                    "id": "outfile",
                    "path-template": "[INFILE]_brain.nii.gz",
                    "path-template-stripped-extensions": [".nii.gz", ".nii"]
                }
            ]
        }"#,
    )
}

/// A minimal descriptor for flag round-trip tests: command template
/// `["run", ref(verbose)]`.
pub fn flag_descriptor() -> Descriptor {
    descriptor_from_json(
        r#"{
            "name": "runner",
            "command-line": "run [VERBOSE]",
            "inputs": [
                {
                    "id": "verbose",
                    "type": "Flag",
                    "command-line-flag": "--verbose",
                    "value-key": "[VERBOSE]"
                }
            ]
        }"#,
    )
}

pub fn descriptor_from_json(json: &str) -> Descriptor {
    let desc: Descriptor = serde_json::from_str(json).expect("expected parseable descriptor");
    desc.validate().expect("expected valid descriptor");
    desc
}
