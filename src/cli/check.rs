use std::path::{Path, PathBuf};

use anyhow::Context;
use reqcheck::{Config, domain::Validator};
use tracing::instrument;

use crate::cli::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Check {
    /// Requirement documents to validate
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Only print failures
    #[arg(short, long)]
    quiet: bool,
}

impl Check {
    /// Validates each file in turn, reporting every failure.
    ///
    /// Exits with status 1 if any document is invalid. Documents are checked
    /// against the configuration found at the requirements root.
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let validator = Validator::new(Config::load_or_default(root));
        let mut failed = 0_usize;

        for path in &self.files {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;

            match validator.validate_document(&text) {
                Ok(_) => {
                    if !self.quiet {
                        println!("{}", format!("✓ {}", path.display()).valid());
                    }
                }
                Err(error) => {
                    failed += 1;
                    eprintln!("{}", format!("✗ {}: {error}", path.display()).invalid());
                }
            }
        }

        if failed > 0 {
            if !self.quiet {
                eprintln!(
                    "\n{}",
                    format!("{failed} of {} documents invalid", self.files.len()).advisory()
                );
            }
            std::process::exit(1);
        }

        Ok(())
    }
}
