use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use atomic_write_file::AtomicWriteFile;
use clap::Args;

use crate::load;

/// Compiles descriptor files into wrapper modules.
///
/// Each descriptor compiles independently; a failing descriptor is logged
/// and the rest of the batch continues.
#[derive(Args, Debug)]
pub struct Command {
    /// Descriptor files, or directories to scan for them.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory to write the generated modules into.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    #[command(flatten)]
    format: load::FormatArgs,
}

pub fn run(cmd: &Command) -> Result<()> {
    let paths = collect_descriptor_paths(&cmd.inputs, cmd.format.format)?;
    if paths.is_empty() {
        bail!("no descriptor files found under the given inputs");
    }

    std::fs::create_dir_all(&cmd.out_dir)
        .with_context(|| format!("creating output directory {:?}", cmd.out_dir))?;

    let mut failures = 0usize;
    for path in &paths {
        match compile_one(path, cmd) {
            Ok(module_path) => {
                log::info!("Compiled {path:?} to {module_path:?}.");
            }
            Err(err) => {
                log::error!("Failed to compile {path:?}: {err:#}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} descriptor(s) failed to compile", paths.len());
    }
    Ok(())
}

/// Expands directory inputs into the descriptor files beneath them, in
/// sorted order for stable batch output.
fn collect_descriptor_paths(inputs: &[PathBuf], format: load::Format) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            paths.push(input.clone());
            continue;
        }
        for entry in walkdir::WalkDir::new(input)
            .follow_links(false)
            .same_file_system(true)
        {
            let entry = entry.with_context(|| format!("scanning {input:?}"))?;
            if entry.file_type().is_file() && matches_format(entry.path(), format) {
                paths.push(entry.path().to_owned());
            }
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn matches_format(path: &Path, format: load::Format) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| format.extensions().contains(&ext))
}

fn compile_one(path: &Path, cmd: &Command) -> Result<PathBuf> {
    let desc = cmd.format.load(path)?;
    let compiled = compiler::compile(&desc)
        .with_context(|| format!("compiling descriptor {:?}", desc.name))?;

    let module_path = cmd.out_dir.join(format!("{}.py", compiled.tool.symbol));
    let mut file = AtomicWriteFile::open(&module_path)
        .with_context(|| format!("opening module file {module_path:?}"))?;
    file.write_all(compiled.source.as_bytes())?;
    file.commit()
        .with_context(|| format!("committing module file {module_path:?}"))?;
    Ok(module_path)
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use testutils::WrapError;

    use super::*;

    const BET_JSON: &str = r#"{
        "name": "bet",
        "command-line": "bet [INFILE]",
        "inputs": [
            {"id": "infile", "type": "File", "value-key": "[INFILE]"}
        ]
    }"#;

    fn command(inputs: Vec<PathBuf>, out_dir: PathBuf) -> Command {
        Command {
            inputs,
            out_dir,
            format: load::FormatArgs {
                format: load::Format::Json,
            },
        }
    }

    #[gtest]
    fn test_compiles_directory_of_descriptors() -> googletest::Result<()> {
        let dir = tempfile::tempdir()?;
        let in_dir = dir.path().join("descriptors");
        std::fs::create_dir_all(&in_dir)?;
        std::fs::write(in_dir.join("bet.json"), BET_JSON)?;
        std::fs::write(in_dir.join("notes.txt"), "not a descriptor")?;
        let out_dir = dir.path().join("out");

        run(&command(vec![in_dir], out_dir.clone())).wrap_error()?;

        let module = std::fs::read_to_string(out_dir.join("bet.py"))?;
        expect_that!(module, contains_substring("def bet("));
        Ok(())
    }

    #[gtest]
    fn test_batch_continues_past_bad_descriptor_but_fails_overall() -> googletest::Result<()> {
        let dir = tempfile::tempdir()?;
        let in_dir = dir.path().join("descriptors");
        std::fs::create_dir_all(&in_dir)?;
        std::fs::write(in_dir.join("bad.json"), "{not json")?;
        std::fs::write(in_dir.join("bet.json"), BET_JSON)?;
        let out_dir = dir.path().join("out");

        let result = run(&command(vec![in_dir], out_dir.clone()));
        expect_that!(result, err(anything()));
        // The good descriptor still compiled.
        expect_that!(out_dir.join("bet.py").exists(), eq(true));
        Ok(())
    }

    #[gtest]
    fn test_no_descriptors_found_is_an_error() -> googletest::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = run(&command(
            vec![dir.path().to_owned()],
            dir.path().join("out"),
        ));
        expect_that!(result, err(anything()));
        Ok(())
    }
}
