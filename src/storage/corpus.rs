//! A filesystem backed corpus of requirement documents.
//!
//! Loading is two-pass. Every `*.md` file under the root is validated on its
//! own, in parallel. The headers that pass are then collected into a
//! [`CorpusContext`], which the staleness and dangling-reference checks read.
//! Body links to other requirements are resolved against the loaded paths.

use std::{
    collections::{HashMap, HashSet},
    ffi::OsStr,
    fmt, io,
    path::{Component, Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::instrument;
use walkdir::WalkDir;

use crate::domain::{
    Config, CorpusContext, DanglingReference, RequirementHeader, StaleReference, ValidationError,
    error::StructuralError,
    identifier::RequirementId,
    requirement::{ValidatedDocument, Validator},
    version::{collect_versions, detect_dangling_references, detect_stale_references},
};
use crate::storage::markdown::{LinkKind, parse_references};

/// A document that failed to load or validate.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("failed to read file: {0}")]
    Io(#[from] io::Error),
    /// The file's contents are invalid.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A document path paired with why it failed.
#[derive(Debug)]
pub struct DocumentFailure {
    /// The document's path.
    pub path: PathBuf,
    /// The first problem found.
    pub error: DocumentError,
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// A document that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    /// The document's path.
    pub path: PathBuf,
    /// The validated document.
    pub document: ValidatedDocument,
}

/// A body link to a requirement document that does not resolve.
///
/// Targets are resolved relative to the linking document, then relative to
/// the corpus root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    /// The linking requirement.
    pub requirement: RequirementId,
    /// The link target, as written.
    pub target: String,
    /// The body line the link is on (1-based).
    pub line: usize,
    /// The id of the document the target resolved to, if it resolved to one
    /// whose id differs from the link text.
    pub found: Option<RequirementId>,
}

impl fmt::Display for BrokenLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} links to {} (body line {})",
            self.requirement, self.target, self.line
        )?;
        match &self.found {
            Some(found) => write!(f, ", but that document's id is {found}"),
            None => f.write_str(", which is not a document in the corpus"),
        }
    }
}

/// The corpus root could not be scanned.
#[derive(Debug, thiserror::Error)]
pub enum CorpusLoadError {
    /// The root does not exist or is not a directory.
    #[error("requirements root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// The result of validating every document under a root directory.
#[derive(Debug)]
pub struct Corpus {
    root: PathBuf,
    config: Config,
    documents: Vec<LoadedDocument>,
    failures: Vec<DocumentFailure>,
    skipped: Vec<PathBuf>,
    context: CorpusContext,
    stale: Vec<StaleReference>,
    dangling: Vec<DanglingReference>,
    broken_links: Vec<BrokenLink>,
}

impl Corpus {
    /// Loads and validates every markdown file under `root`, using the
    /// `config.toml` found there (or the defaults).
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory. Invalid documents do
    /// not fail the load; they are collected in [`Corpus::failures`].
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, CorpusLoadError> {
        let root = root.into();
        let config = Config::load_or_default(&root);
        Self::load_with_config(root, config)
    }

    /// Loads and validates every markdown file under `root` with an explicit
    /// configuration.
    ///
    /// If `allow_unrecognised` is `true`, markdown files without a
    /// frontmatter header are skipped. Otherwise they are reported as
    /// failures along with every other invalid document.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory.
    #[instrument(level = "debug", skip_all, fields(root = %root.display()))]
    pub fn load_with_config(root: PathBuf, config: Config) -> Result<Self, CorpusLoadError> {
        if !root.is_dir() {
            return Err(CorpusLoadError::NotADirectory(root));
        }

        let validator = Validator::new(config.clone());
        let md_paths = collect_markdown_paths(&root);

        // Pass 1: per-document validation.
        let (documents, failures): (Vec<_>, Vec<_>) = md_paths
            .par_iter()
            .map(|path| try_load_document(path, &validator))
            .partition(Result::is_ok);

        let documents: Vec<_> = documents.into_iter().filter_map(Result::ok).collect();
        let (skipped, failures): (Vec<_>, Vec<_>) = failures
            .into_iter()
            .filter_map(Result::err)
            .partition(|failure| config.allow_unrecognised && is_unrecognised(&failure.error));
        let skipped: Vec<_> = skipped.into_iter().map(|failure| failure.path).collect();
        for path in &skipped {
            tracing::debug!("skipping unrecognised file {}", path.display());
        }

        // Pass 2: corpus-wide checks against the frozen context.
        let headers = || documents.iter().map(|loaded| &loaded.document.header);
        let context = collect_versions(headers());
        let stale = detect_stale_references(headers(), &context);
        let dangling = detect_dangling_references(headers(), &context);
        let unchecked: Vec<&Path> = failures
            .iter()
            .map(|failure| failure.path.as_path())
            .chain(skipped.iter().map(PathBuf::as_path))
            .collect();
        let broken_links = detect_broken_links(&root, &documents, &unchecked);

        tracing::info!(
            "validated {} documents ({} failed, {} skipped, {} stale references, {} broken links)",
            documents.len(),
            failures.len(),
            skipped.len(),
            stale.len(),
            broken_links.len()
        );

        Ok(Self {
            root,
            config,
            documents,
            failures,
            skipped,
            context,
            stale,
            dangling,
            broken_links,
        })
    }

    /// The root directory that was scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration used for validation.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Documents that passed validation, in path order.
    #[must_use]
    pub fn documents(&self) -> &[LoadedDocument] {
        &self.documents
    }

    /// Validated headers ordered by requirement id.
    #[must_use]
    pub fn headers_by_id(&self) -> Vec<(&RequirementId, &RequirementHeader)> {
        let mut headers: Vec<_> = self
            .documents
            .iter()
            .map(|loaded| (loaded.document.header.id(), &loaded.document.header))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(b.0));
        headers
    }

    /// Documents that failed to load or validate, in path order.
    #[must_use]
    pub fn failures(&self) -> &[DocumentFailure] {
        &self.failures
    }

    /// Markdown files skipped because they have no frontmatter header.
    #[must_use]
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// The corpus-wide version context.
    #[must_use]
    pub const fn context(&self) -> &CorpusContext {
        &self.context
    }

    /// Requirement ids declared by more than one document.
    #[must_use]
    pub fn duplicates(&self) -> &[RequirementId] {
        self.context.duplicates()
    }

    /// References tracking an out-of-date version of their parent.
    #[must_use]
    pub fn stale(&self) -> &[StaleReference] {
        &self.stale
    }

    /// References to requirement ids that are not in the corpus.
    #[must_use]
    pub fn dangling(&self) -> &[DanglingReference] {
        &self.dangling
    }

    /// Body links to requirement documents that are missing or carry a
    /// different id.
    #[must_use]
    pub fn broken_links(&self) -> &[BrokenLink] {
        &self.broken_links
    }

    /// Whether the corpus passes validation.
    ///
    /// Failures and duplicate ids always fail. Stale references, dangling
    /// references and broken links fail only if `fail_on_stale` is set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let advisories_ok = !self.config.fail_on_stale
            || (self.stale.is_empty() && self.dangling.is_empty() && self.broken_links.is_empty());
        self.failures.is_empty() && self.duplicates().is_empty() && advisories_ok
    }
}

const fn is_unrecognised(error: &DocumentError) -> bool {
    matches!(
        error,
        DocumentError::Invalid(ValidationError::Structural(StructuralError::MissingHeader))
    )
}

fn detect_broken_links(
    root: &Path,
    documents: &[LoadedDocument],
    unchecked: &[&Path],
) -> Vec<BrokenLink> {
    let ids: HashMap<PathBuf, &RequirementId> = documents
        .iter()
        .map(|loaded| (normalize(&loaded.path), loaded.document.header.id()))
        .collect();
    let unchecked: HashSet<PathBuf> = unchecked.iter().map(|path| normalize(path)).collect();

    documents
        .iter()
        .flat_map(|loaded| {
            let dir = loaded.path.parent().unwrap_or(root);
            let body = parse_references(&loaded.document.body);
            body.of_kind(LinkKind::Requirement)
                .filter(|link| !link.target.contains("://"))
                .filter_map(|link| {
                    let candidates = [
                        normalize(&dir.join(&link.target)),
                        normalize(&root.join(&link.target)),
                    ];
                    // Unreadable or invalid targets are already reported as failures.
                    if candidates.iter().any(|path| unchecked.contains(path)) {
                        return None;
                    }
                    let found = candidates.iter().find_map(|path| ids.get(path).copied());
                    if found.is_some_and(|id| id.as_str() == link.text) {
                        return None;
                    }
                    Some(BrokenLink {
                        requirement: loaded.document.header.id().clone(),
                        target: link.target.clone(),
                        line: link.line,
                        found: found.cloned(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Lexically resolves `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if normalized.file_name().is_some() => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn collect_markdown_paths(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            // Skip hidden directories such as `.git`
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension() == Some(OsStr::new("md")))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn try_load_document(path: &Path, validator: &Validator) -> Result<LoadedDocument, DocumentFailure> {
    let load = || -> Result<ValidatedDocument, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        Ok(validator.validate_document(&text)?)
    };
    match load() {
        Ok(document) => Ok(LoadedDocument {
            path: path.to_path_buf(),
            document,
        }),
        Err(error) => {
            tracing::debug!("failed to load {}: {error}", path.display());
            Err(DocumentFailure {
                path: path.to_path_buf(),
                error,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn requirement(id: &str, version: u64, parents: &[(&str, u64)]) -> String {
        let mut header = format!(
            "---\nid: {id}\ntitle: {id} title\ntype: functional\nstatus: draft\nversion: {version}\n"
        );
        let mut body = format!("{id} describes some behaviour.\n");
        if !parents.is_empty() {
            header.push_str("references:\n  requirements:\n");
            for (parent, tracked) in parents {
                header.push_str(&format!("    - id: {parent}\n      version: {tracked}\n"));
                body.push_str(&format!("Derived from [{parent}]({parent}.md).\n"));
            }
        }
        format!("{header}---\n{body}")
    }

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn valid_corpus() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "SYS-001.md", &requirement("SYS-001", 2, &[]));
        write(
            tmp.path(),
            "usr/USR-001.md",
            &requirement("USR-001", 1, &[("SYS-001", 2)]),
        );
        write(tmp.path(), "notes.txt", "not markdown");

        let corpus = Corpus::load(tmp.path()).unwrap();
        assert_eq!(corpus.documents().len(), 2);
        assert!(corpus.failures().is_empty());
        assert!(corpus.stale().is_empty());
        assert!(corpus.dangling().is_empty());
        assert!(corpus.is_valid());

        let ids: Vec<_> = corpus
            .headers_by_id()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, ["SYS-001", "USR-001"]);
    }

    #[test]
    fn stale_references_are_advisory_by_default() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "SYS-001.md", &requirement("SYS-001", 3, &[]));
        write(
            tmp.path(),
            "USR-001.md",
            &requirement("USR-001", 1, &[("SYS-001", 2)]),
        );

        let corpus = Corpus::load(tmp.path()).unwrap();
        assert_eq!(corpus.stale().len(), 1);
        assert_eq!(
            corpus.stale()[0].to_string(),
            "USR-001 tracks SYS-001 v2, but current version is v3"
        );
        assert!(corpus.is_valid());

        let mut config = Config::default();
        config.fail_on_stale = true;
        let corpus = Corpus::load_with_config(tmp.path().to_path_buf(), config).unwrap();
        assert!(!corpus.is_valid());
    }

    #[test]
    fn dangling_references_are_reported() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "USR-001.md",
            &requirement("USR-001", 1, &[("SYS-404", 1)]),
        );

        let corpus = Corpus::load(tmp.path()).unwrap();
        assert_eq!(corpus.dangling().len(), 1);
        assert_eq!(corpus.dangling()[0].parent.as_str(), "SYS-404");
        assert_eq!(corpus.broken_links().len(), 1);
        assert_eq!(corpus.broken_links()[0].target, "SYS-404.md");
        assert!(corpus.is_valid());

        let mut config = Config::default();
        config.fail_on_stale = true;
        let corpus = Corpus::load_with_config(tmp.path().to_path_buf(), config).unwrap();
        assert!(!corpus.is_valid());
    }

    #[test]
    fn body_links_resolve_to_documents_with_matching_ids() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "sys/SYS-001.md", &requirement("SYS-001", 1, &[]));
        write(tmp.path(), "sys/SYS-002.md", &requirement("SYS-003", 1, &[]));
        write(tmp.path(), "sys/SYS-009.md", "---\nid: SYS-009\n---\nNo title.");
        write(
            tmp.path(),
            "usr/USR-001.md",
            "---\nid: USR-001\ntitle: T\ntype: functional\nstatus: draft\nreferences:\n  requirements:\n    - SYS-001\n    - SYS-002\n    - SYS-004\n---\n\
Refines [SYS-001](../sys/SYS-001.md) and [SYS-001](sys/SYS-001.md).
Also [SYS-002](../sys/SYS-002.md).
And [SYS-004](../nowhere/SYS-004.md).
",
        );
        write(
            tmp.path(),
            "usr/USR-002.md",
            "---\nid: USR-002\ntitle: T\ntype: functional\nstatus: draft\nreferences:\n  requirements:\n    - SYS-001\n    - SYS-009\n---\n\
Refines [SYS-001](../nowhere/SYS-001.md) and [SYS-009](../sys/SYS-009.md).
",
        );

        let corpus = Corpus::load(tmp.path()).unwrap();
        assert_eq!(corpus.failures().len(), 1);
        let broken: Vec<_> = corpus
            .broken_links()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            broken,
            [
                "USR-001 links to ../sys/SYS-002.md (body line 2), but that document's id is SYS-003",
                "USR-001 links to ../nowhere/SYS-004.md (body line 3), which is not a document in the corpus",
                "USR-002 links to ../nowhere/SYS-001.md (body line 1), which is not a document in the corpus",
            ]
        );
        assert_eq!(
            corpus.broken_links()[0].found.as_ref().map(RequirementId::as_str),
            Some("SYS-003")
        );
    }

    #[test]
    fn normalize_resolves_dot_components() {
        assert_eq!(
            normalize(Path::new("./root/usr/../sys/./SYS-001.md")),
            PathBuf::from("root/sys/SYS-001.md")
        );
        assert_eq!(normalize(Path::new("../a.md")), PathBuf::from("../a.md"));
        assert_eq!(normalize(Path::new("a/../../b.md")), PathBuf::from("../b.md"));
    }

    #[test]
    fn invalid_documents_are_collected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "SYS-001.md", &requirement("SYS-001", 1, &[]));
        write(
            tmp.path(),
            "broken.md",
            "---\nid: BROKEN\ntitle: T\ntype: unknown\nstatus: draft\n---\nLong enough body.",
        );
        write(tmp.path(), "README.md", "# Just a readme\n");

        let corpus = Corpus::load(tmp.path()).unwrap();
        assert_eq!(corpus.documents().len(), 1);
        assert_eq!(corpus.failures().len(), 2);
        assert!(corpus.skipped().is_empty());
        assert!(!corpus.is_valid());
        assert!(
            corpus.failures()[1]
                .to_string()
                .contains("has invalid type: 'unknown'")
        );
    }

    #[test]
    fn unrecognised_files_can_be_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "SYS-001.md", &requirement("SYS-001", 1, &[]));
        write(tmp.path(), "README.md", "# Just a readme\n");
        write(
            tmp.path(),
            "config.toml",
            "_version = \"1\"\nallow_unrecognised = true\n",
        );

        let corpus = Corpus::load(tmp.path()).unwrap();
        assert!(corpus.failures().is_empty());
        assert_eq!(corpus.skipped().len(), 1);
        assert!(corpus.is_valid());
    }

    #[test]
    fn duplicate_ids_fail_the_corpus() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a/SYS-001.md", &requirement("SYS-001", 1, &[]));
        write(tmp.path(), "b/SYS-001.md", &requirement("SYS-001", 1, &[]));

        let corpus = Corpus::load(tmp.path()).unwrap();
        assert_eq!(corpus.duplicates().len(), 1);
        assert!(!corpus.is_valid());
    }

    #[test]
    fn hidden_directories_are_ignored() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".git/README.md", "no header");
        write(tmp.path(), "SYS-001.md", &requirement("SYS-001", 1, &[]));

        let corpus = Corpus::load(tmp.path()).unwrap();
        assert!(corpus.failures().is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing");
        assert!(matches!(
            Corpus::load(&missing),
            Err(CorpusLoadError::NotADirectory(_))
        ));
    }
}
