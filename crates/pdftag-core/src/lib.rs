//! Accessibility fixes for tagged PDFs
//!
//! Load a document, patch its logical structure, optionally stage password
//! encryption, and write it back out:
//! - `Document::mark_paths_as_artifacts`: untagged vector paths become `/Artifact` content
//! - `Document::ensure_bbox`: every Figure gets a Layout bounding box
//! - `Document::show_structure`: an indented dump of the structure tree
//!
//! Built on lopdf.

pub mod artifacts;
pub mod content;
pub mod document;
pub mod encryption;
pub mod error;
pub mod geometry;
pub mod objects;
mod security;
pub mod structure;

#[cfg(test)]
mod test_support;

pub use document::Document;
pub use encryption::{EncryptionRevision, EncryptionSettings, PrintPermission};
pub use error::{PdfTagError, Result};
pub use structure::{StructElement, StructNode, StructTree};

/// Revision 4: AES-128, or RC4-128 without `use_aes`
pub const ENCRYPTION_REVISION_AES_128: EncryptionRevision = EncryptionRevision::Aes128;
/// Revision 5: AES-256
pub const ENCRYPTION_REVISION_AES_256: EncryptionRevision = EncryptionRevision::Aes256;
/// Revision 6: AES-256 as standardised in PDF 2.0
pub const ENCRYPTION_REVISION_AES_256U: EncryptionRevision = EncryptionRevision::Aes256Pdf2;

pub const PRINT_FULL: PrintPermission = PrintPermission::Full;
pub const PRINT_LOW: PrintPermission = PrintPermission::Low;
pub const PRINT_NONE: PrintPermission = PrintPermission::None;
