//! Loading descriptor documents from disk.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use compiler::descriptor::Descriptor;

/// Descriptor document encoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// File extensions scanned for when expanding a directory input.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Json => &["json"],
            Format::Yaml => &["yaml", "yml"],
        }
    }
}

/// Options selecting how descriptor documents are decoded.
#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Descriptor document format.
    #[arg(long, value_enum, default_value_t = Format::Json)]
    pub format: Format,
}

impl FormatArgs {
    /// Reads and decodes one descriptor document.
    pub fn load(&self, path: &Path) -> Result<Descriptor> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading descriptor {path:?}"))?;
        let desc = match self.format {
            Format::Json => serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON descriptor {path:?}"))?,
            Format::Yaml => serde_yaml_ng::from_str(&text)
                .with_context(|| format!("parsing YAML descriptor {path:?}"))?,
        };
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use testutils::WrapError;

    use super::*;

    const MINIMAL_JSON: &str = r#"{"name": "true", "command-line": "true"}"#;
    const MINIMAL_YAML: &str = "name: \"true\"\ncommand-line: \"true\"\n";

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), contents).expect("writing temp file");
        file
    }

    #[gtest]
    fn test_loads_json_descriptor() -> googletest::Result<()> {
        let file = write_temp(MINIMAL_JSON);
        let args = FormatArgs {
            format: Format::Json,
        };
        let desc = args.load(file.path()).wrap_error()?;
        expect_that!(desc.name, eq("true"));
        Ok(())
    }

    #[gtest]
    fn test_loads_yaml_descriptor() -> googletest::Result<()> {
        let file = write_temp(MINIMAL_YAML);
        let args = FormatArgs {
            format: Format::Yaml,
        };
        let desc = args.load(file.path()).wrap_error()?;
        expect_that!(desc.name, eq("true"));
        Ok(())
    }

    #[gtest]
    fn test_rejects_malformed_document() {
        let file = write_temp("{not json");
        let args = FormatArgs {
            format: Format::Json,
        };
        expect_that!(args.load(file.path()), err(anything()));
    }
}
