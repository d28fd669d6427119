use std::path::PathBuf;

use clap::ValueEnum;
use reqcheck::Corpus;
use tracing::instrument;

use crate::cli::terminal::Colorize;

#[derive(Debug, clap::Parser, Default)]
pub struct Validate {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (exit code only)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    Summary,
}

impl Validate {
    /// Validates the corpus under `root` and reports the results.
    ///
    /// Exits with status 2 if the corpus is invalid.
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let corpus = Corpus::load(root)?;

        if !self.quiet {
            match self.output {
                OutputFormat::Table => Self::output_table(&corpus),
                OutputFormat::Json => Self::output_json(&corpus)?,
                OutputFormat::Summary => Self::output_summary(&corpus),
            }
        }

        if !corpus.is_valid() {
            std::process::exit(2);
        }

        Ok(())
    }

    fn output_table(corpus: &Corpus) {
        println!("Validating {}...\n", corpus.root().display());

        // Documents
        if corpus.failures().is_empty() {
            println!(
                "{}",
                format!(
                    "✓ Documents:  {} requirements, all valid",
                    corpus.documents().len()
                )
                .valid()
            );
        } else {
            println!(
                "{}",
                format!(
                    "✗ Documents:  {} of {} invalid",
                    corpus.failures().len(),
                    corpus.documents().len() + corpus.failures().len()
                )
                .invalid()
            );
            for failure in corpus.failures() {
                println!("  • {failure}");
            }
        }
        if !corpus.skipped().is_empty() {
            println!(
                "{}",
                format!(
                    "  Skipped {} files without a frontmatter header",
                    corpus.skipped().len()
                )
                .note()
            );
        }

        // Ids
        if corpus.duplicates().is_empty() {
            println!("{}", "✓ Ids:        All requirement ids unique".valid());
        } else {
            println!(
                "{}",
                format!("✗ Ids:        {} duplicated", corpus.duplicates().len()).invalid()
            );
            for id in corpus.duplicates() {
                println!("  • {id}");
            }
        }

        // References
        let advisories =
            corpus.stale().len() + corpus.dangling().len() + corpus.broken_links().len();
        if advisories == 0 {
            println!(
                "{}",
                "✓ References: All requirement references current".valid()
            );
        } else {
            let line = format!("✗ References: {advisories} stale, missing or broken");
            if corpus.config().fail_on_stale {
                println!("{}", line.invalid());
            } else {
                println!("{}", line.advisory());
            }
            for stale in corpus.stale() {
                println!("  • {stale}");
            }
            for dangling in corpus.dangling() {
                println!("  • {dangling}");
            }
            for link in corpus.broken_links() {
                println!("  • {link}");
            }
        }

        if corpus.is_valid() {
            println!("\n{}", "Corpus is valid".valid());
        } else {
            println!(
                "\n{}",
                format!("Summary: {} issues found", Self::count_issues(corpus)).invalid()
            );
        }
    }

    fn output_json(corpus: &Corpus) -> anyhow::Result<()> {
        use serde_json::json;

        let failures: Vec<_> = corpus
            .failures()
            .iter()
            .map(|failure| {
                json!({
                    "path": failure.path,
                    "error": failure.error.to_string(),
                })
            })
            .collect();

        let stale: Vec<_> = corpus
            .stale()
            .iter()
            .map(|stale| {
                json!({
                    "requirement": stale.requirement.to_string(),
                    "parent": stale.parent.to_string(),
                    "tracked_version": stale.tracked.get(),
                    "current_version": stale.current.get(),
                })
            })
            .collect();

        let dangling: Vec<_> = corpus
            .dangling()
            .iter()
            .map(|dangling| {
                json!({
                    "requirement": dangling.requirement.to_string(),
                    "parent": dangling.parent.to_string(),
                })
            })
            .collect();

        let broken_links: Vec<_> = corpus
            .broken_links()
            .iter()
            .map(|link| {
                json!({
                    "requirement": link.requirement.to_string(),
                    "target": link.target,
                    "line": link.line,
                    "found": link.found.as_ref().map(ToString::to_string),
                })
            })
            .collect();

        let duplicates: Vec<String> = corpus.duplicates().iter().map(ToString::to_string).collect();

        let output = json!({
            "status": if corpus.is_valid() { "valid" } else { "invalid" },
            "documents": corpus.documents().len(),
            "skipped": corpus.skipped(),
            "issues": {
                "failures": failures,
                "duplicates": duplicates,
                "stale": stale,
                "dangling": dangling,
                "broken_links": broken_links,
            },
            "summary": {
                "total_issues": Self::count_issues(corpus),
            }
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_summary(corpus: &Corpus) {
        println!(
            "documents={} failures={} duplicates={} stale={} dangling={} broken_links={}",
            corpus.documents().len(),
            corpus.failures().len(),
            corpus.duplicates().len(),
            corpus.stale().len(),
            corpus.dangling().len(),
            corpus.broken_links().len()
        );
    }

    fn count_issues(corpus: &Corpus) -> usize {
        corpus.failures().len()
            + corpus.duplicates().len()
            + corpus.stale().len()
            + corpus.dangling().len()
            + corpus.broken_links().len()
    }
}
