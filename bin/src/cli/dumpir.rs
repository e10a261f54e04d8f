use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::load;

/// Prints the intermediate representation of one descriptor, for
/// inspecting what the code generator would be handed.
#[derive(Args, Debug)]
pub struct Command {
    /// Descriptor file.
    input: PathBuf,

    #[command(flatten)]
    format: load::FormatArgs,
}

pub fn run(cmd: &Command) -> Result<()> {
    let desc = cmd.format.load(&cmd.input)?;
    let tool = compiler::build_tool(&desc)
        .with_context(|| format!("compiling descriptor {:?}", desc.name))?;
    println!("{tool:#?}");
    Ok(())
}
