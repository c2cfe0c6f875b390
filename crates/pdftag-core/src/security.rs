//! Standard security handler, revisions 2 to 4
//!
//! lopdf derives the file key from whichever password it accepts. For these
//! revisions the key always comes from the user password; an owner password
//! only unlocks it, by decrypting the padded user password stored in `/O`.

use lopdf::{Dictionary, Document, Object};

use crate::objects;

const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Entries of a revision 2-4 `/Encrypt` dictionary needed to check passwords
#[derive(Debug, Clone)]
pub(crate) struct StandardHandler {
    revision: i64,
    key_length: usize,
    owner: Vec<u8>,
    user: Vec<u8>,
    permissions: u32,
    document_id: Vec<u8>,
    encrypt_metadata: bool,
}

impl StandardHandler {
    /// Read from a document that is still encrypted. `None` for other handlers and revisions.
    pub(crate) fn from_document(doc: &Document) -> Option<Self> {
        let encrypt = objects::resolve(doc, doc.trailer.get(b"Encrypt").ok()?)
            .and_then(objects::as_dict)?;
        if !objects::name_is(doc, encrypt, b"Filter", b"Standard") {
            return None;
        }
        let revision = int_entry(doc, encrypt, b"R")?;
        if !(2..=4).contains(&revision) {
            return None;
        }
        let key_length = match (revision, int_entry(doc, encrypt, b"V").unwrap_or(0)) {
            (2, _) => 5,
            (_, version) if version >= 4 => 16,
            _ => (int_entry(doc, encrypt, b"Length").unwrap_or(40) / 8).clamp(5, 16) as usize,
        };
        let document_id = match doc.trailer.get(b"ID") {
            Ok(Object::Array(ids)) => match ids.first() {
                Some(Object::String(id, _)) => id.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        Some(Self {
            revision,
            key_length,
            owner: string_entry(doc, encrypt, b"O")?,
            user: string_entry(doc, encrypt, b"U")?,
            permissions: int_entry(doc, encrypt, b"P")? as u32,
            document_id,
            encrypt_metadata: !matches!(
                objects::get(doc, encrypt, b"EncryptMetadata"),
                Some(Object::Boolean(false))
            ),
        })
    }

    /// File key for a candidate user password (Algorithm 2)
    fn file_key(&self, password: &[u8]) -> Vec<u8> {
        let mut input = pad(password).to_vec();
        input.extend_from_slice(&self.owner);
        input.extend_from_slice(&self.permissions.to_le_bytes());
        input.extend_from_slice(&self.document_id);
        if self.revision >= 4 && !self.encrypt_metadata {
            input.extend_from_slice(&[0xFF; 4]);
        }

        let mut digest = md5::compute(&input).0;
        if self.revision >= 3 {
            for _ in 0..50 {
                digest = md5::compute(&digest[..self.key_length]).0;
            }
        }
        digest[..self.key_length].to_vec()
    }

    /// Check a password against `/U` (Algorithms 4 to 6)
    pub(crate) fn is_user_password(&self, password: &[u8]) -> bool {
        let key = self.file_key(password);
        if self.revision == 2 {
            return rc4(&key, &PASSWORD_PADDING) == self.user;
        }

        let mut input = PASSWORD_PADDING.to_vec();
        input.extend_from_slice(&self.document_id);
        let mut hash = rc4(&key, &md5::compute(&input).0);
        for i in 1..=19u8 {
            hash = rc4(&xor_key(&key, i), &hash);
        }
        self.user.len() >= 16 && hash[..] == self.user[..16]
    }

    /// The user password unlocked by an owner password (Algorithm 7)
    pub(crate) fn recover_user_password(&self, owner_password: &[u8]) -> Option<Vec<u8>> {
        let mut digest = md5::compute(pad(owner_password)).0;
        if self.revision >= 3 {
            for _ in 0..50 {
                digest = md5::compute(digest).0;
            }
        }
        let key = &digest[..self.key_length];

        let padded = if self.revision == 2 {
            rc4(key, &self.owner)
        } else {
            (0..=19u8)
                .rev()
                .fold(self.owner.clone(), |data, i| rc4(&xor_key(key, i), &data))
        };
        let user = strip_padding(&padded);
        self.is_user_password(&user).then_some(user)
    }
}

/// The password lopdf must decrypt with when `password` only passes the owner check.
///
/// `raw` is the same file loaded without a password, so its `/Encrypt` entry is intact.
pub(crate) fn user_password_for(raw: &Document, password: &str) -> Option<String> {
    let handler = StandardHandler::from_document(raw)?;
    let password = password_bytes(password);
    if handler.is_user_password(&password) {
        return None;
    }
    handler
        .recover_user_password(&password)
        .map(|user| user.iter().map(|&b| b as char).collect())
}

/// Revision 2-4 passwords are single-byte; Latin-1 text maps onto them directly
pub(crate) fn password_bytes(password: &str) -> Vec<u8> {
    if password.chars().all(|c| (c as u32) < 0x100) {
        password.chars().map(|c| c as u8).collect()
    } else {
        password.as_bytes().to_vec()
    }
}

fn int_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    objects::get(doc, dict, key).and_then(objects::as_int)
}

fn string_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Vec<u8>> {
    match objects::get(doc, dict, key)? {
        Object::String(bytes, _) => Some(bytes.clone()),
        _ => None,
    }
}

fn pad(password: &[u8]) -> [u8; 32] {
    let mut padded = PASSWORD_PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

/// Inverse of [`pad`]: drop the padding tail
fn strip_padding(padded: &[u8]) -> Vec<u8> {
    let end = (0..=padded.len())
        .find(|&k| PASSWORD_PADDING.starts_with(&padded[k..]))
        .unwrap_or(padded.len());
    padded[..end].to_vec()
}

fn xor_key(key: &[u8], value: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ value).collect()
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: Vec<u8> = (0..=255).collect();
    let mut j = 0usize;
    for i in 0..256 {
        j = (j + s[i] as usize + key[i % key.len()] as usize) & 0xFF;
        s.swap(i, j);
    }

    let mut out = Vec::with_capacity(data.len());
    let (mut i, mut j) = (0usize, 0usize);
    for &byte in data {
        i = (i + 1) & 0xFF;
        j = (j + s[i] as usize) & 0xFF;
        s.swap(i, j);
        out.push(byte ^ s[(s[i] as usize + s[j] as usize) & 0xFF]);
    }
    out
}
