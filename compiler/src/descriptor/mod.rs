//! Typed model of the raw descriptor document.
//!
//! This is a superset of the Boutiques schema. Deserialization accepts the
//! Boutiques kebab-case field spellings; unknown top-level fields are
//! ignored for forward compatibility, while unknown input `type` tags are
//! rejected by the closed [InputTypeTag] enum.
//!
//! Validation here is purely local shape checking ([Descriptor::validate]).
//! Cross-parameter resolution happens in [crate::ir::build].

mod core_type;

use serde::{Deserialize, Serialize};

pub use core_type::{InputId, ValueError};

/// Shape problem in a descriptor, reported with the path of the offending
/// field.
#[derive(Debug, thiserror::Error)]
#[error("{path}: {problem}")]
pub struct SchemaError {
    /// Path of the offending field, e.g. `inputs[3].minimum`.
    pub path: String,
    pub problem: SchemaProblem,
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum SchemaProblem {
    #[error("required field is missing or empty")]
    MissingField,
    #[error("duplicate id {id} (first declared at {first}, again at {second})")]
    DuplicateId {
        id: InputId,
        first: String,
        second: String,
    },
    #[error("value-choices must not be empty")]
    EmptyChoices,
    #[error("a Flag input must declare command-line-flag")]
    FlagWithoutToken,
    #[error("Flag inputs cannot be lists or carry value-choices")]
    FlagWithValueShape,
    #[error("list fields are only valid when \"list\" is true")]
    ListFieldsOnNonList,
    #[error("numeric bounds are only valid on Number inputs")]
    BoundsOnNonNumber,
    #[error("value-choices are not valid on File or Flag inputs")]
    ChoicesOnFileOrFlag,
    #[error("unterminated quote in command-line")]
    UnterminatedQuote,
}

/// One described input parameter.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Input {
    pub id: InputId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_tag: InputTypeTag,
    /// Only meaningful for [InputTypeTag::Number]: selects the integer
    /// subtype.
    #[serde(default)]
    pub integer: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "default-value")]
    pub default_value: Option<serde_json::Value>,
    /// Placeholder under which this input appears in `command-line` and in
    /// output path templates.
    #[serde(default, rename = "value-key")]
    pub value_key: Option<String>,
    #[serde(default, rename = "command-line-flag")]
    pub command_line_flag: Option<String>,
    /// When present, the flag and the value are joined into a single token
    /// by this separator instead of being emitted as two tokens.
    #[serde(default, rename = "command-line-flag-separator")]
    pub command_line_flag_separator: Option<String>,
    #[serde(default)]
    pub list: bool,
    #[serde(default, rename = "list-separator")]
    pub list_separator: Option<String>,
    #[serde(default, rename = "min-list-entries")]
    pub min_list_entries: Option<i64>,
    #[serde(default, rename = "max-list-entries")]
    pub max_list_entries: Option<i64>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default, rename = "value-choices")]
    pub value_choices: Option<Vec<serde_json::Value>>,
    /// Superset extension: generated code checks the file exists before
    /// invoking the tool.
    #[serde(default, rename = "file-must-exist")]
    pub file_must_exist: bool,
}

/// Closed set of input type tags. Anything else fails deserialization.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum InputTypeTag {
    String,
    Number,
    File,
    Flag,
}

/// A named constraint scope over a set of input ids.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Group {
    pub id: InputId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub members: Vec<InputId>,
    #[serde(default, rename = "mutually-exclusive")]
    pub mutually_exclusive: bool,
    #[serde(default, rename = "all-required", alias = "all-or-none")]
    pub all_required: bool,
    #[serde(default, rename = "one-is-required")]
    pub one_is_required: bool,
}

/// A declared output file with a path template over value-keys.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OutputFile {
    pub id: InputId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "path-template")]
    pub path_template: String,
    #[serde(default, rename = "path-template-stripped-extensions")]
    pub stripped_extensions: Vec<String>,
    /// Superset extension: a placeholder under which other outputs may
    /// reference this output's resolved path.
    #[serde(default, rename = "value-key")]
    pub value_key: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ContainerImage {
    #[serde(default, rename = "type")]
    pub type_tag: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

/// The raw descriptor document.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Descriptor {
    pub name: String,
    #[serde(default, rename = "tool-version")]
    pub tool_version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "command-line")]
    pub command_line: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default, rename = "output-files")]
    pub output_files: Vec<OutputFile>,
    #[serde(default, rename = "container-image")]
    pub container_image: Option<ContainerImage>,
    #[serde(default, rename = "environment-variables")]
    pub environment_variables: Vec<EnvironmentVariable>,
}

impl Descriptor {
    /// Checks local shape validity. Cross-field resolution (references,
    /// constraint contradictions) is deferred to later stages.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(err_at("name", SchemaProblem::MissingField));
        }
        if self.command_line.trim().is_empty() {
            return Err(err_at("command-line", SchemaProblem::MissingField));
        }

        self.check_unique_ids()?;

        for (index, input) in self.inputs.iter().enumerate() {
            input.validate(index)?;
        }
        for (index, group) in self.groups.iter().enumerate() {
            if group.members.is_empty() {
                return Err(err_at(
                    &format!("groups[{index}].members"),
                    SchemaProblem::MissingField,
                ));
            }
        }
        for (index, output) in self.output_files.iter().enumerate() {
            if output.path_template.is_empty() {
                return Err(err_at(
                    &format!("output-files[{index}].path-template"),
                    SchemaProblem::MissingField,
                ));
            }
        }
        Ok(())
    }

    /// Input and output ids share one namespace; group ids have their own.
    fn check_unique_ids(&self) -> Result<(), SchemaError> {
        let mut seen: hashbrown::HashMap<&InputId, String> = hashbrown::HashMap::new();
        let input_locations = self
            .inputs
            .iter()
            .enumerate()
            .map(|(index, input)| (&input.id, format!("inputs[{index}]")));
        let output_locations = self
            .output_files
            .iter()
            .enumerate()
            .map(|(index, output)| (&output.id, format!("output-files[{index}]")));
        for (id, location) in input_locations.chain(output_locations) {
            if let Some(first) = seen.insert(id, location.clone()) {
                return Err(SchemaError {
                    path: format!("{location}.id"),
                    problem: SchemaProblem::DuplicateId {
                        id: id.clone(),
                        first,
                        second: location,
                    },
                });
            }
        }

        let mut group_seen: hashbrown::HashMap<&InputId, String> = hashbrown::HashMap::new();
        for (index, group) in self.groups.iter().enumerate() {
            let location = format!("groups[{index}]");
            if let Some(first) = group_seen.insert(&group.id, location.clone()) {
                return Err(SchemaError {
                    path: format!("{location}.id"),
                    problem: SchemaProblem::DuplicateId {
                        id: group.id.clone(),
                        first,
                        second: location,
                    },
                });
            }
        }
        Ok(())
    }
}

impl Input {
    fn validate(&self, index: usize) -> Result<(), SchemaError> {
        let path = |field: &str| format!("inputs[{index}].{field}");

        if let Some(choices) = &self.value_choices
            && choices.is_empty()
        {
            return Err(err_at(&path("value-choices"), SchemaProblem::EmptyChoices));
        }

        match self.type_tag {
            InputTypeTag::Flag => {
                if self.command_line_flag.is_none() {
                    return Err(err_at(
                        &path("command-line-flag"),
                        SchemaProblem::FlagWithoutToken,
                    ));
                }
                if self.list || self.value_choices.is_some() {
                    return Err(err_at(&path("type"), SchemaProblem::FlagWithValueShape));
                }
            }
            InputTypeTag::File => {
                if self.value_choices.is_some() {
                    return Err(err_at(
                        &path("value-choices"),
                        SchemaProblem::ChoicesOnFileOrFlag,
                    ));
                }
            }
            InputTypeTag::String | InputTypeTag::Number => {}
        }

        if self.type_tag != InputTypeTag::Number
            && (self.minimum.is_some() || self.maximum.is_some())
        {
            return Err(err_at(&path("minimum"), SchemaProblem::BoundsOnNonNumber));
        }

        if !self.list
            && (self.min_list_entries.is_some()
                || self.max_list_entries.is_some()
                || self.list_separator.is_some())
        {
            return Err(err_at(&path("list"), SchemaProblem::ListFieldsOnNonList));
        }

        Ok(())
    }
}

fn err_at(path: &str, problem: SchemaProblem) -> SchemaError {
    SchemaError {
        path: path.to_string(),
        problem,
    }
}
