use std::path::PathBuf;

use anyhow::Context;
use reqcheck::{
    domain::parameter::{ParameterDef, ParameterValue},
    storage::load_parameter_schema,
};
use tracing::instrument;

use crate::cli::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Params {
    /// The parameter file to validate (.yaml, .yml or .json)
    input: PathBuf,

    /// Write the validated parameter data to this file as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Params {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let (data, schema) = load_parameter_schema(&self.input)
            .with_context(|| format!("invalid parameter file {}", self.input.display()))?;

        println!(
            "{}",
            format!(
                "✓ {}: {} parameters in '{}' (schema {})",
                self.input.display(),
                schema.parameters().len(),
                schema.namespace(),
                schema.schema_version()
            )
            .valid()
        );
        for parameter in schema.parameters() {
            println!("  {}", describe(parameter));
        }

        if let Some(output) = &self.output {
            let json = serde_json::to_string_pretty(&data)?;
            std::fs::write(output, json)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("{}", format!("Wrote {}", output.display()).note());
        }

        Ok(())
    }
}

fn describe(parameter: &ParameterDef) -> String {
    let unit = parameter
        .unit()
        .map(|unit| format!(" [{unit}]"))
        .unwrap_or_default();
    match parameter.value() {
        ParameterValue::Table { columns, rows } => format!(
            "{} ({}, {} columns x {} rows){unit}",
            parameter.name(),
            parameter.kind(),
            columns.len(),
            rows.len()
        ),
        ParameterValue::Scalar(_) => {
            format!("{} ({}){unit}", parameter.name(), parameter.kind())
        }
    }
}
