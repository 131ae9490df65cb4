//! File and directory headers
//!
//! A header is an ordered list of name–value fields. Order is part of the
//! canonical byte encoding (`Name: Value\n` per field), so the same fields
//! in a different order hash and sign differently. Typed accessors cover the
//! well-known names; arbitrary extra fields round-trip untouched.

use std::fmt;

use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::crypto::merkle::{hash_bytes, verify_merkle_proof, Hash, HASH_SIZE};
use crate::error::Error;
use crate::path::is_valid_path;

/// Protocol tag carried by every root header.
pub const DEFAULT_PROTOCOL: &str = "IndiFS/0.1";
const PROTOCOL_PREFIX: &str = "IndiFS/";

/// Default leaf size for file partitioning, 1 MiB.
pub const DEFAULT_FILE_PART_SIZE: u64 = 1 << 20;

// Well-known field names.
pub const PATH: &str = "Path";
pub const VER: &str = "Ver";
pub const PROTOCOL: &str = "Protocol";
pub const CREATED: &str = "Created";
pub const UPDATED: &str = "Updated";
pub const PART_SIZE: &str = "Part-Size";
pub const SIZE: &str = "Size";
pub const MERKLE: &str = "Merkle";
pub const VOLUME: &str = "Volume";
pub const DELETED: &str = "Deleted";
pub const PUBLIC_KEY: &str = "Public-Key";
pub const SIGNATURE: &str = "Signature";

const MAX_NAME_LENGTH: usize = 64;
const MAX_VALUE_LENGTH: usize = 10 * 1024;

/// One ordered name–value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: Vec<u8>,
}

/// Ordered header record for the root or one file/directory node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    fields: Vec<Field>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header for a file or directory at `path`.
    pub fn with_path(path: &str) -> Self {
        let mut h = Self::new();
        h.set_str(PATH, path);
        h
    }

    /// Initial root header of a fresh filesystem: protocol and author key,
    /// version zero, no timestamps.
    pub fn new_root(public_key: &PublicKey) -> Self {
        let mut h = Self::new();
        h.set_str(PROTOCOL, DEFAULT_PROTOCOL);
        h.set_str(VER, "0");
        h.set_str(PUBLIC_KEY, &public_key.encode());
        h
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_slice())
    }

    pub fn get_str(&self, name: &str) -> &str {
        self.get(name)
            .and_then(|v| std::str::from_utf8(v).ok())
            .unwrap_or("")
    }

    /// Decimal integer value; absent or malformed reads as zero.
    pub fn get_u64(&self, name: &str) -> u64 {
        self.get_str(name).parse().unwrap_or(0)
    }

    pub fn get_time(&self, name: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.get_str(name))
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Set a field, replacing in place to preserve canonical order; an
    /// unknown name is appended. An empty value removes the field.
    pub fn set_bytes(&mut self, name: &str, value: &[u8]) {
        if value.is_empty() {
            self.remove(name);
            return;
        }
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(f) => f.value = value.to_vec(),
            None => self.fields.push(Field {
                name: name.to_string(),
                value: value.to_vec(),
            }),
        }
    }

    pub fn set_str(&mut self, name: &str, value: &str) {
        self.set_bytes(name, value.as_bytes());
    }

    pub fn set_u64(&mut self, name: &str, value: u64) {
        self.set_str(name, &value.to_string());
    }

    pub fn set_time(&mut self, name: &str, value: DateTime<Utc>) {
        self.set_str(name, &value.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| f.name != name);
    }

    //--- typed accessors for the well-known fields

    /// Logical path; the root header has none and reads as empty.
    pub fn path(&self) -> &str {
        self.get_str(PATH)
    }

    pub fn ver(&self) -> u64 {
        self.get_u64(VER)
    }

    pub fn protocol(&self) -> &str {
        self.get_str(PROTOCOL)
    }

    pub fn file_size(&self) -> u64 {
        self.get_u64(SIZE)
    }

    pub fn part_size(&self) -> u64 {
        self.get_u64(PART_SIZE)
    }

    pub fn volume(&self) -> u64 {
        self.get_u64(VOLUME)
    }

    pub fn merkle(&self) -> Option<&[u8]> {
        self.get(MERKLE)
    }

    pub fn deleted(&self) -> bool {
        self.get_u64(DELETED) == 1
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.get_time(CREATED)
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.get_time(UPDATED)
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        PublicKey::decode(self.get_str(PUBLIC_KEY))
    }

    pub fn is_root(&self) -> bool {
        self.path().is_empty()
    }

    pub fn is_dir(&self) -> bool {
        crate::path::is_dir_path(self.path())
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    //--- canonical encoding, hashing, signing

    /// Canonical byte encoding: `Name: Value\n` for every field in order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.encode_fields(true)
    }

    /// Canonical bytes with the signature field excluded; the message that
    /// is actually signed.
    fn signing_bytes(&self) -> Vec<u8> {
        self.encode_fields(false)
    }

    fn encode_fields(&self, include_signature: bool) -> Vec<u8> {
        let mut out = Vec::new();
        for f in &self.fields {
            if !include_signature && f.name == SIGNATURE {
                continue;
            }
            out.extend_from_slice(f.name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(&f.value);
            out.push(b'\n');
        }
        out
    }

    /// Canonical hash of the header, signature field included when present.
    /// This is the node hash of the header tree.
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.canonical_bytes())
    }

    /// Set the author key and append the signature as the final field.
    pub fn sign(&mut self, prv: &PrivateKey) {
        self.remove(SIGNATURE);
        self.set_str(PUBLIC_KEY, &prv.public_key().encode());
        let sig = prv.sign(&self.signing_bytes());
        self.fields.push(Field {
            name: SIGNATURE.to_string(),
            value: sig.to_vec(),
        });
    }

    /// True iff the signature is the last field and verifies under the
    /// header's own public key.
    pub fn verify(&self) -> bool {
        let Some(last) = self.fields.last() else {
            return false;
        };
        if last.name != SIGNATURE {
            return false;
        }
        let Some(pub_key) = self.public_key() else {
            return false;
        };
        pub_key.verify(&self.signing_bytes(), &last.value)
    }

    /// Verify a merkle proof for this header against a signed root merkle.
    pub fn verify_merkle_proof(&self, root: &[u8], proof: &[u8]) -> bool {
        verify_merkle_proof(&self.hash(), root, proof)
    }

    /// Structural validation; returns the first violation found.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.fields.len());
        for (i, f) in self.fields.iter().enumerate() {
            if !is_valid_field_name(&f.name) {
                return Err(Error::InvalidHeader(format!("bad field name {:?}", f.name)));
            }
            if f.value.is_empty() || f.value.len() > MAX_VALUE_LENGTH {
                return Err(Error::InvalidHeader(format!(
                    "bad value length for {:?}",
                    f.name
                )));
            }
            if seen.contains(&f.name.as_str()) {
                return Err(Error::InvalidHeader(format!(
                    "duplicate field {:?}",
                    f.name
                )));
            }
            seen.push(&f.name);
            if f.name == SIGNATURE && i != self.fields.len() - 1 {
                return Err(Error::InvalidHeader("Signature is not the last field".into()));
            }
        }

        if self.has(PATH) && !self.path().is_empty() && !is_valid_path(self.path()) {
            return Err(Error::InvalidPath(self.path().to_string()));
        }
        for name in [VER, SIZE, PART_SIZE, VOLUME, DELETED] {
            if self.has(name) && self.get_str(name).parse::<u64>().is_err() {
                return Err(Error::InvalidHeader(format!(
                    "field {:?} is not a decimal integer",
                    name
                )));
            }
        }
        for name in [CREATED, UPDATED] {
            if self.has(name) && self.get_time(name).is_none() {
                return Err(Error::InvalidHeader(format!(
                    "field {:?} is not an RFC-3339 time",
                    name
                )));
            }
        }
        if let Some(merkle) = self.merkle() {
            if merkle.len() != HASH_SIZE {
                return Err(Error::InvalidHeader("bad Merkle length".into()));
            }
        }
        if self.deleted() && (self.file_size() != 0 || self.has(MERKLE)) {
            return Err(Error::InvalidHeader(
                "deleted header carries Size or Merkle".into(),
            ));
        }
        if !self.is_root() && self.is_file() && !self.deleted() {
            // empty files carry no Merkle; non-empty files must declare one
            if (self.file_size() == 0) == self.has(MERKLE) {
                return Err(Error::InvalidHeader(
                    "file Size and Merkle disagree".into(),
                ));
            }
        }
        Ok(())
    }
}

fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Header A supersedes header B: higher version wins; equal versions
/// tie-break on the canonical hash, larger hash winning.
pub fn version_is_greater(a: &Header, b: &Header) -> bool {
    if a.ver() != b.ver() {
        return a.ver() > b.ver();
    }
    a.hash() > b.hash()
}

/// Stable path order over headers; the root header sorts first.
pub fn sort_headers(headers: &mut [Header]) {
    headers.sort_by(|a, b| crate::path::path_cmp(a.path(), b.path()));
}

/// Pack a protocol tag `IndiFS/<major>.<minor>` into a comparable integer.
/// Unrecognized tags compare greater than every real version.
pub fn protocol_ver64(protocol: &str) -> u64 {
    match protocol.strip_prefix(PROTOCOL_PREFIX) {
        Some(rest) => {
            let mut parts = rest.split('.');
            let major: u64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let minor: u64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            (major << 56) | (minor << 32)
        }
        None => u64::MAX,
    }
}

pub fn protocol_ver_major(protocol: &str) -> u8 {
    (protocol_ver64(protocol) >> 56) as u8
}

//--- JSON encoding
//
// Headers persist and travel as ordered JSON objects. Values that are plain
// printable ASCII stay readable strings; everything else is `b64,`-prefixed
// base64 without padding.

fn encode_value(value: &[u8]) -> String {
    let printable = value.iter().all(|&b| (0x20..=0x7e).contains(&b));
    if printable && !value.starts_with(b"b64,") {
        String::from_utf8_lossy(value).into_owned()
    } else {
        format!("b64,{}", BASE64_NO_PAD.encode(value))
    }
}

fn decode_value(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    match s.strip_prefix("b64,") {
        Some(b64) => BASE64_NO_PAD.decode(b64),
        None => Ok(s.as_bytes().to_vec()),
    }
}

impl Serialize for Header {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for f in &self.fields {
            map.serialize_entry(&f.name, &encode_value(&f.value))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Header {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderVisitor;

        impl<'de> Visitor<'de> for HeaderVisitor {
            type Value = Header;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an ordered map of header fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Header, A::Error> {
                let mut fields = Vec::new();
                while let Some((name, value)) = map.next_entry::<String, String>()? {
                    let value = decode_value(&value).map_err(serde::de::Error::custom)?;
                    fields.push(Field { name, value });
                }
                Ok(Header { fields })
            }
        }

        deserializer.deserialize_map(HeaderVisitor)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{}"),
        }
    }
}
