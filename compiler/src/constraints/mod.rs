//! Normalizes per-parameter and per-group constraints into a canonical,
//! checkable form and detects contradictions.
//!
//! The canonical form is used unchanged by the IR builder (default-value
//! checking), the dry-run evaluator, and the code generator, so every
//! constraint in a validated descriptor corresponds to exactly one emitted
//! runtime check.

#[cfg(test)]
mod tests;

use serde_json::Value as JsonValue;

use crate::descriptor::{Input, InputId, InputTypeTag};

#[derive(Debug, thiserror::Error)]
pub enum ConstraintError {
    #[error("input {id}: minimum {min} is greater than maximum {max}")]
    RangeInverted { id: InputId, min: f64, max: f64 },
    #[error("input {id}: bound {value} is not an integer")]
    NonIntegralBound { id: InputId, value: f64 },
    #[error("input {id}: min-list-entries {min} is greater than max-list-entries {max}")]
    ListBoundsInverted { id: InputId, min: i64, max: i64 },
    #[error("input {id}: negative list bound {value}")]
    NegativeListBound { id: InputId, value: i64 },
    #[error("input {id}: choice {value} does not have the input's type")]
    ChoiceTypeMismatch { id: InputId, value: JsonValue },
    #[error("input {id}: default value {value} is invalid: {rule}")]
    InvalidDefault {
        id: InputId,
        value: JsonValue,
        rule: String,
    },
    #[error("group {id}: mutually-exclusive and all-required are contradictory for {members} members")]
    ContradictoryGroup { id: InputId, members: usize },
}

/// A single enum choice value, typed to the owning parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ChoiceValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl std::fmt::Display for ChoiceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChoiceValue::Str(s) => write!(f, "{s:?}"),
            ChoiceValue::Int(i) => write!(f, "{i}"),
            ChoiceValue::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Numeric range normalized to the parameter's numeric subtype.
#[derive(Clone, Debug, PartialEq)]
pub enum NumericRange {
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
}

/// Item count bounds for a list parameter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListBounds {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

/// Canonical constraint set attached to one parameter. Enum choice sets
/// live on the parameter type itself ([crate::ir::ParamType::Enum]); this
/// carries everything else.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstraintSet {
    pub range: Option<NumericRange>,
    pub list: Option<ListBounds>,
    pub file_must_exist: bool,
}

impl ConstraintSet {
    /// Number of runtime checks this set demands. Each range bound counts
    /// individually so a violation can name the violated bound.
    pub fn check_count(&self) -> usize {
        let range_checks = match &self.range {
            None => 0,
            Some(NumericRange::Int { min, max }) => {
                min.is_some() as usize + max.is_some() as usize
            }
            Some(NumericRange::Float { min, max }) => {
                min.is_some() as usize + max.is_some() as usize
            }
        };
        let list_checks = match &self.list {
            None => 0,
            Some(bounds) => bounds.min.is_some() as usize + bounds.max.is_some() as usize,
        };
        range_checks + list_checks + self.file_must_exist as usize
    }
}

/// Canonical structural rule for one group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupRule {
    pub id: InputId,
    pub members: Vec<InputId>,
    pub mutually_exclusive: bool,
    pub all_required: bool,
    pub one_required: bool,
}

impl GroupRule {
    pub fn check_count(&self) -> usize {
        self.mutually_exclusive as usize + self.all_required as usize + self.one_required as usize
    }
}

/// Resolved constraints of one input: the general set plus the typed,
/// deduplicated choice list when the input is an enum.
#[derive(Debug)]
pub struct ResolvedInput {
    pub set: ConstraintSet,
    pub choices: Option<Vec<ChoiceValue>>,
}

/// Normalizes one input's constraints, rejecting contradictions.
pub fn resolve_input(input: &Input) -> Result<ResolvedInput, ConstraintError> {
    let range = resolve_range(input)?;
    let list = resolve_list_bounds(input)?;
    let choices = resolve_choices(input)?;

    Ok(ResolvedInput {
        set: ConstraintSet {
            range,
            list,
            file_must_exist: input.file_must_exist,
        },
        choices,
    })
}

/// Normalizes one group's modes, rejecting contradictory combinations.
///
/// `mutually-exclusive` with `all-required` is only satisfiable when the
/// group has exactly one member. `mutually-exclusive` with
/// `one-is-required` is exactly-one semantics and is allowed.
pub fn resolve_group(group: &crate::descriptor::Group) -> Result<GroupRule, ConstraintError> {
    if group.mutually_exclusive && group.all_required && group.members.len() != 1 {
        return Err(ConstraintError::ContradictoryGroup {
            id: group.id.clone(),
            members: group.members.len(),
        });
    }
    Ok(GroupRule {
        id: group.id.clone(),
        members: group.members.clone(),
        mutually_exclusive: group.mutually_exclusive,
        all_required: group.all_required,
        one_required: group.one_is_required,
    })
}

fn resolve_range(input: &Input) -> Result<Option<NumericRange>, ConstraintError> {
    if input.minimum.is_none() && input.maximum.is_none() {
        return Ok(None);
    }
    if let (Some(min), Some(max)) = (input.minimum, input.maximum)
        && min > max
    {
        return Err(ConstraintError::RangeInverted {
            id: input.id.clone(),
            min,
            max,
        });
    }

    if input.integer {
        let to_int = |value: f64| -> Result<i64, ConstraintError> {
            if value.fract() == 0.0 {
                Ok(value as i64)
            } else {
                Err(ConstraintError::NonIntegralBound {
                    id: input.id.clone(),
                    value,
                })
            }
        };
        Ok(Some(NumericRange::Int {
            min: input.minimum.map(to_int).transpose()?,
            max: input.maximum.map(to_int).transpose()?,
        }))
    } else {
        Ok(Some(NumericRange::Float {
            min: input.minimum,
            max: input.maximum,
        }))
    }
}

fn resolve_list_bounds(input: &Input) -> Result<Option<ListBounds>, ConstraintError> {
    if !input.list {
        return Ok(None);
    }
    for bound in [input.min_list_entries, input.max_list_entries].into_iter().flatten() {
        if bound < 0 {
            return Err(ConstraintError::NegativeListBound {
                id: input.id.clone(),
                value: bound,
            });
        }
    }
    if let (Some(min), Some(max)) = (input.min_list_entries, input.max_list_entries)
        && min > max
    {
        return Err(ConstraintError::ListBoundsInverted {
            id: input.id.clone(),
            min,
            max,
        });
    }
    Ok(Some(ListBounds {
        min: input.min_list_entries.map(|v| v as u64),
        max: input.max_list_entries.map(|v| v as u64),
    }))
}

/// Types and deduplicates `value-choices`, preserving first-seen order.
fn resolve_choices(input: &Input) -> Result<Option<Vec<ChoiceValue>>, ConstraintError> {
    let Some(raw_choices) = &input.value_choices else {
        return Ok(None);
    };

    let mut choices: Vec<ChoiceValue> = Vec::with_capacity(raw_choices.len());
    for raw in raw_choices {
        let mismatch = || ConstraintError::ChoiceTypeMismatch {
            id: input.id.clone(),
            value: raw.clone(),
        };
        let choice = match input.type_tag {
            InputTypeTag::String => ChoiceValue::Str(raw.as_str().ok_or_else(mismatch)?.to_string()),
            InputTypeTag::Number if input.integer => {
                ChoiceValue::Int(raw.as_i64().ok_or_else(mismatch)?)
            }
            InputTypeTag::Number => ChoiceValue::Float(raw.as_f64().ok_or_else(mismatch)?),
            InputTypeTag::File | InputTypeTag::Flag => return Err(mismatch()),
        };
        if !choices.contains(&choice) {
            choices.push(choice);
        }
    }
    Ok(Some(choices))
}
