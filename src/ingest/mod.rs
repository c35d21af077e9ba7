mod email;
mod form;
mod invoice;
mod loader;

pub use email::EmailParser;
pub use form::FormParser;
pub use invoice::InvoiceParser;
pub use loader::{LoadOutcome, RecordLoader};
pub(crate) use loader::discover_files;

use crate::error::ParseError;
use crate::model::{Source, UnifiedRecord};

/// Converts one raw source file into a best-effort record.
///
/// Missing fields come back as `None`; only structurally unusable input is an
/// error, which the loader turns into an alert.
pub trait SourceParser {
    fn source(&self) -> Source;

    /// Subdirectory of the data root holding this source's files.
    fn directory(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    fn parse(&self, source_name: &str, raw: &[u8]) -> Result<UnifiedRecord, ParseError>;
}
