pub mod corpus;
/// Frontmatter header parsing and rendering.
pub mod frontmatter;
/// Markdown link extraction.
pub mod markdown;
/// Parameter file loading.
pub mod schema_file;

pub use corpus::{BrokenLink, Corpus, CorpusLoadError, DocumentError, DocumentFailure, LoadedDocument};
pub use schema_file::{LoadError, load_parameter_file, load_parameter_schema};
