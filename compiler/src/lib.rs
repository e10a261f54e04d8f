//! Compiles declarative tool descriptors (a superset of the Boutiques
//! schema) into typed command-line wrapper source.
//!
//! The pipeline is purely functional per descriptor: raw descriptor →
//! [descriptor::Descriptor] → [ir::Tool] → generated source. No state
//! outlives a single [compile] call.

pub mod codegen;
pub mod constraints;
pub mod descriptor;
pub mod ident;
pub mod invoke;
pub mod ir;
#[cfg(any(test, feature = "testing"))]
pub mod testutil;

/// Any error that terminates compilation of one descriptor. No partial
/// artifact is produced when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Schema(#[from] descriptor::SchemaError),
    #[error(transparent)]
    Constraint(#[from] constraints::ConstraintError),
    #[error(transparent)]
    Reference(#[from] ir::ReferenceError),
    #[error(transparent)]
    CyclicTemplate(#[from] ir::CyclicTemplateError),
    #[error(transparent)]
    Identifier(#[from] ident::IdentifierResolutionError),
}

/// Result of compiling a single descriptor.
#[derive(Debug)]
pub struct CompiledTool {
    /// The validated, immutable intermediate representation.
    pub tool: ir::Tool,
    /// Generated wrapper source text.
    pub source: String,
}

/// Builds the [ir::Tool] for a descriptor without generating source.
///
/// Identifiers are resolved against the Python backend's reserved words,
/// which is the only backend currently provided.
pub fn build_tool(desc: &descriptor::Descriptor) -> Result<ir::Tool, CompileError> {
    ir::build::build_tool(desc, codegen::python::reserved_words())
}

/// Compiles a descriptor to wrapper source.
pub fn compile(desc: &descriptor::Descriptor) -> Result<CompiledTool, CompileError> {
    let tool = build_tool(desc)?;
    log::debug!(
        "Built tool {:?} with {} parameter(s), {} group(s), {} output(s).",
        tool.metadata.name,
        tool.params.len(),
        tool.groups.len(),
        tool.outputs.len(),
    );
    let source = codegen::python::generate(&tool);
    Ok(CompiledTool { tool, source })
}
