//! Owned handle over a loaded PDF

use std::fs;
use std::io::Write;
use std::path::Path;

use lopdf::{Object, StringFormat};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::encryption::EncryptionSettings;
use crate::error::{PdfTagError, Result};
use crate::structure::{self, StructTree};
use crate::{artifacts, objects, security};

/// A PDF loaded into memory, ready for structural fixes and re-serialization
#[derive(Debug, Clone)]
pub struct Document {
    pdf: lopdf::Document,
    /// First 16 bytes of the SHA-256 of the source, used when the source has no `/ID`
    id_seed: [u8; 16],
    encryption: Option<EncryptionSettings>,
}

impl Document {
    /// Load from a file. `None` tries the empty password.
    pub fn open(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| PdfTagError::io(path, e))?;
        let doc = Self::from_memory(&bytes, password)?;
        info!(path = %path.display(), pages = doc.page_count(), "opened PDF");
        Ok(doc)
    }

    pub fn from_memory(bytes: &[u8], password: Option<&str>) -> Result<Self> {
        let pdf = load_decrypted(bytes, password.unwrap_or(""))?;

        if objects::catalog(&pdf).is_none() {
            return Err(PdfTagError::MalformedPdf(
                "Document has no /Root catalog".to_string(),
            ));
        }

        let digest = Sha256::digest(bytes);
        let mut id_seed = [0u8; 16];
        id_seed.copy_from_slice(&digest[..16]);

        debug!(
            bytes = bytes.len(),
            version = %pdf.version,
            encrypted = pdf.encryption_state.is_some(),
            "loaded PDF"
        );
        Ok(Self {
            pdf,
            id_seed,
            encryption: None,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pdf.get_pages().len()
    }

    pub fn has_struct_tree(&self) -> bool {
        objects::struct_tree_root(&self.pdf).is_some()
    }

    /// Wrap unmarked painted paths in `/Artifact` sequences. Returns how many were wrapped.
    pub fn mark_paths_as_artifacts(&mut self) -> Result<usize> {
        let wrapped = artifacts::mark_paths_as_artifacts(&mut self.pdf)?;
        info!(wrapped, "marked paths as artifacts");
        Ok(wrapped)
    }

    /// Give every Figure a Layout bounding box. Returns how many were added.
    pub fn ensure_bbox(&mut self) -> Result<usize> {
        let inserted = structure::ensure_layout_bboxes(&mut self.pdf)?;
        info!(inserted, "ensured figure bounding boxes");
        Ok(inserted)
    }

    pub fn structure(&self) -> Result<StructTree> {
        StructTree::load(&self.pdf)
    }

    pub fn show_structure(&self) -> Result<String> {
        Ok(structure::render(&self.structure()?))
    }

    /// Stage encryption for the next `write` or `to_memory`
    pub fn encrypt(&mut self, settings: EncryptionSettings) -> Result<()> {
        settings.validate()?;
        debug!(revision = settings.revision.number(), "staged encryption");
        self.encryption = Some(settings);
        Ok(())
    }

    pub fn clear_encryption(&mut self) {
        self.encryption = None;
    }

    pub fn staged_encryption(&self) -> Option<&EncryptionSettings> {
        self.encryption.as_ref()
    }

    pub fn to_memory(&self) -> Result<Vec<u8>> {
        let mut out = self.pdf.clone();
        out.encryption_state = None;
        if let Some(Object::Reference(id)) = out.trailer.remove(b"Encrypt") {
            out.objects.remove(&id);
        }
        ensure_trailer_id(&mut out, &self.id_seed);

        if let Some(settings) = &self.encryption {
            settings.apply(&mut out)?;
        }

        let mut buffer = Vec::new();
        out.save_to(&mut buffer)
            .map_err(|e| PdfTagError::Serialization(e.to_string()))?;
        Ok(buffer)
    }

    /// Serialize into `path` through a temporary file in the same directory
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_memory()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| PdfTagError::io(dir, e))?;
        staged
            .write_all(&bytes)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| PdfTagError::io(path, e))?;
        staged
            .persist(path)
            .map_err(|e| PdfTagError::io(path, e.error))?;

        info!(path = %path.display(), bytes = bytes.len(), "wrote PDF");
        Ok(())
    }
}

fn load(bytes: &[u8], password: &str) -> Result<lopdf::Document> {
    lopdf::Document::load_mem_with_password(bytes, password).map_err(|e| match e {
        lopdf::Error::InvalidPassword => PdfTagError::InvalidPassword,
        other => PdfTagError::MalformedPdf(other.to_string()),
    })
}

/// Load and decrypt with the key the user password yields, whichever password was given
fn load_decrypted(bytes: &[u8], password: &str) -> Result<lopdf::Document> {
    let pdf = load(bytes, password)?;
    if pdf.encryption_state.is_none() || password.is_empty() {
        return Ok(pdf);
    }

    // Without a password lopdf keeps the file encrypted unless the user password is empty
    let Ok(raw) = lopdf::Document::load_mem(bytes) else {
        return Ok(pdf);
    };
    if raw.encryption_state.is_some() {
        debug!("user password is empty, decrypting without the given password");
        return Ok(raw);
    }
    match security::user_password_for(&raw, password) {
        Some(user) => {
            debug!("owner password accepted, decrypting with the recovered user password");
            load(bytes, &user)
        }
        None => Ok(pdf),
    }
}

/// Give the trailer an `/ID` pair when it lacks a usable one
fn ensure_trailer_id(pdf: &mut lopdf::Document, seed: &[u8; 16]) {
    let usable = matches!(
        pdf.trailer.get(b"ID"),
        Ok(Object::Array(ids)) if ids.len() == 2 && ids.iter().all(|id| matches!(id, Object::String(..)))
    );
    if !usable {
        let id = Object::String(seed.to_vec(), StringFormat::Hexadecimal);
        pdf.trailer.set("ID", Object::Array(vec![id.clone(), id]));
    }
}
