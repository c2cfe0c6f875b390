//! Encryption settings staged on a document and applied at save time

use std::collections::BTreeMap;
use std::sync::Arc;

use lopdf::encryption::crypt_filters::{
    Aes128CryptFilter, Aes256CryptFilter, CryptFilter, Rc4CryptFilter,
};
use lopdf::{dictionary, EncryptionState, EncryptionVersion, Object, Permissions};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PdfTagError, Result};

/// Name of the single crypt filter every revision installs
const STANDARD_FILTER: &[u8] = b"StdCF";

/// Security handler revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EncryptionRevision {
    /// AES-128 (or RC4-128), PDF 1.6
    #[default]
    Aes128 = 4,
    /// AES-256, Adobe extension level 3 to PDF 1.7
    Aes256 = 5,
    /// AES-256, PDF 2.0
    Aes256Pdf2 = 6,
}

impl EncryptionRevision {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Lowest header version a reader needs for this revision
    fn minimum_version(self) -> (u32, u32) {
        match self {
            EncryptionRevision::Aes128 => (1, 6),
            EncryptionRevision::Aes256 => (1, 7),
            EncryptionRevision::Aes256Pdf2 => (2, 0),
        }
    }
}

impl TryFrom<u8> for EncryptionRevision {
    type Error = PdfTagError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            4 => Ok(EncryptionRevision::Aes128),
            5 => Ok(EncryptionRevision::Aes256),
            6 => Ok(EncryptionRevision::Aes256Pdf2),
            other => Err(PdfTagError::InvalidEncryptionSettings(format!(
                "Unsupported encryption revision {}, expected 4, 5 or 6",
                other
            ))),
        }
    }
}

impl TryFrom<i64> for EncryptionRevision {
    type Error = PdfTagError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value)
            .map_err(|_| {
                PdfTagError::InvalidEncryptionSettings(format!(
                    "Unsupported encryption revision {}, expected 4, 5 or 6",
                    value
                ))
            })
            .and_then(EncryptionRevision::try_from)
    }
}

impl From<EncryptionRevision> for u8 {
    fn from(revision: EncryptionRevision) -> u8 {
        revision.number()
    }
}

/// How much printing the user password allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintPermission {
    #[default]
    Full,
    /// Degraded printing only
    Low,
    None,
}

/// Password encryption to apply when the document is next serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionSettings {
    pub user_password: String,
    pub owner_password: String,
    pub revision: EncryptionRevision,
    pub print: PrintPermission,
    pub modify: bool,
    pub extract: bool,
    pub accessibility: bool,
    pub assemble: bool,
    pub annotate_and_form: bool,
    pub form_filling: bool,
    pub encrypt_metadata: bool,
    /// AES when true, RC4 otherwise (revision 4 only)
    pub use_aes: bool,
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        Self {
            user_password: String::new(),
            owner_password: String::new(),
            revision: EncryptionRevision::default(),
            print: PrintPermission::default(),
            modify: true,
            extract: true,
            accessibility: true,
            assemble: true,
            annotate_and_form: true,
            form_filling: true,
            encrypt_metadata: true,
            use_aes: true,
        }
    }
}

impl EncryptionSettings {
    /// Settings with every permission granted
    pub fn new(user_password: impl Into<String>, owner_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: owner_password.into(),
            ..Self::default()
        }
    }

    pub fn with_revision(mut self, revision: EncryptionRevision) -> Self {
        self.revision = revision;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.use_aes && self.revision != EncryptionRevision::Aes128 {
            return Err(PdfTagError::InvalidEncryptionSettings(format!(
                "RC4 is only available with revision 4, not {}",
                self.revision.number()
            )));
        }
        for (label, password) in [("user", &self.user_password), ("owner", &self.owner_password)] {
            self.check_password(label, password)?;
        }
        Ok(())
    }

    fn check_password(&self, label: &str, password: &str) -> Result<()> {
        match self.revision {
            EncryptionRevision::Aes128 => {
                if password.chars().any(|c| c as u32 > 0xFF) {
                    return Err(PdfTagError::InvalidEncryptionSettings(format!(
                        "{} password must be Latin-1 for revision 4",
                        label
                    )));
                }
                if password.chars().count() > 32 {
                    return Err(PdfTagError::InvalidEncryptionSettings(format!(
                        "{} password is longer than 32 bytes",
                        label
                    )));
                }
            }
            EncryptionRevision::Aes256 | EncryptionRevision::Aes256Pdf2 => {
                if password.len() > 127 {
                    return Err(PdfTagError::InvalidEncryptionSettings(format!(
                        "{} password is longer than 127 bytes",
                        label
                    )));
                }
            }
        }
        Ok(())
    }

    /// Access permissions granted to the user password
    pub fn permissions(&self) -> Permissions {
        let mut permissions = Permissions::empty();
        match self.print {
            PrintPermission::Full => {
                permissions |= Permissions::PRINTABLE | Permissions::PRINTABLE_IN_HIGH_QUALITY
            }
            PrintPermission::Low => permissions |= Permissions::PRINTABLE,
            PrintPermission::None => {}
        }
        let flags = [
            (self.modify, Permissions::MODIFIABLE),
            (self.extract, Permissions::COPYABLE),
            (self.annotate_and_form, Permissions::ANNOTABLE),
            (self.form_filling, Permissions::FILLABLE),
            (self.accessibility, Permissions::COPYABLE_FOR_ACCESSIBILITY),
            (self.assemble, Permissions::ASSEMBLABLE),
        ];
        for (granted, flag) in flags {
            if granted {
                permissions |= flag;
            }
        }
        permissions
    }

    /// Encrypt `doc` in place. Callers pass a copy; the trailer must already carry an `/ID`.
    pub(crate) fn apply(&self, doc: &mut lopdf::Document) -> Result<()> {
        self.validate()?;
        raise_version(doc, self.revision.minimum_version());

        let permissions = self.permissions();
        let state = match self.revision {
            EncryptionRevision::Aes128 => {
                let filter: Arc<dyn CryptFilter> = if self.use_aes {
                    Arc::new(Aes128CryptFilter)
                } else {
                    Arc::new(Rc4CryptFilter)
                };
                EncryptionState::try_from(EncryptionVersion::V4 {
                    document: doc,
                    encrypt_metadata: self.encrypt_metadata,
                    crypt_filters: standard_filter(filter),
                    stream_filter: STANDARD_FILTER.to_vec(),
                    string_filter: STANDARD_FILTER.to_vec(),
                    owner_password: &self.owner_password,
                    user_password: &self.user_password,
                    permissions,
                })
            }
            // Deprecated in lopdf, but still the only way to write revision 5
            #[allow(deprecated)]
            EncryptionRevision::Aes256 => {
                mark_extension_level(doc);
                let key = file_key();
                EncryptionState::try_from(EncryptionVersion::R5 {
                    encrypt_metadata: self.encrypt_metadata,
                    crypt_filters: standard_filter(Arc::new(Aes256CryptFilter)),
                    file_encryption_key: &key,
                    stream_filter: STANDARD_FILTER.to_vec(),
                    string_filter: STANDARD_FILTER.to_vec(),
                    owner_password: &self.owner_password,
                    user_password: &self.user_password,
                    permissions,
                })
            }
            EncryptionRevision::Aes256Pdf2 => {
                let key = file_key();
                EncryptionState::try_from(EncryptionVersion::V5 {
                    encrypt_metadata: self.encrypt_metadata,
                    crypt_filters: standard_filter(Arc::new(Aes256CryptFilter)),
                    file_encryption_key: &key,
                    stream_filter: STANDARD_FILTER.to_vec(),
                    string_filter: STANDARD_FILTER.to_vec(),
                    owner_password: &self.owner_password,
                    user_password: &self.user_password,
                    permissions,
                })
            }
        }
        .map_err(|e| PdfTagError::InvalidEncryptionSettings(e.to_string()))?;

        doc.encrypt(&state)
            .map_err(|e| PdfTagError::Serialization(format!("Encryption failed: {}", e)))?;
        debug!(revision = self.revision.number(), aes = self.use_aes, "encrypted document copy");
        Ok(())
    }
}

fn standard_filter(filter: Arc<dyn CryptFilter>) -> BTreeMap<Vec<u8>, Arc<dyn CryptFilter>> {
    BTreeMap::from([(STANDARD_FILTER.to_vec(), filter)])
}

fn file_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn raise_version(doc: &mut lopdf::Document, minimum: (u32, u32)) {
    let current = parse_version(&doc.version).unwrap_or((1, 4));
    if current < minimum {
        doc.version = format!("{}.{}", minimum.0, minimum.1);
    }
}

/// Revision 5 is an Adobe extension to PDF 1.7, declared in the catalog
fn mark_extension_level(doc: &mut lopdf::Document) {
    let Ok(Object::Reference(root)) = doc.trailer.get(b"Root").cloned() else {
        return;
    };
    if let Ok(catalog) = doc.get_dictionary_mut(root) {
        if !catalog.has(b"Extensions") {
            catalog.set(
                "Extensions",
                dictionary! {
                    "ADBE" => dictionary! {
                        "BaseVersion" => Object::Name(b"1.7".to_vec()),
                        "ExtensionLevel" => 3,
                    },
                },
            );
        }
    }
}
