//! # Package Metadata
//!
//! [`PackageMetadata`] is the record stored at
//! `IntuneWinPackage/Metadata/Detection.xml`. In memory, key material is
//! held as raw bytes in secure buffers; on disk every byte field is base64
//! text inside an `ApplicationInfo` XML document:
//!
//! ```text
//! <ApplicationInfo ToolVersion="1.4.0.0">
//!   <Name/> <Description/> <UnencryptedContentSize/> <FileName/> <SetupFile/>
//!   <EncryptionInfo>
//!     <ProfileIdentifier/> <EncryptionKey/> <InitializationVector/>
//!     <Mac/> <MacKey/> <FileDigest/> <FileDigestAlgorithm/>
//!   </EncryptionInfo>
//! </ApplicationInfo>
//! ```
//!
//! Parsing accepts a UTF-8 BOM, an XML declaration, namespace attributes and
//! elements this crate does not model. The plain-text fields keep leading
//! and trailing whitespace exactly as stored.

use crate::aliases::{Aes256Key32, Digest32, Iv16, Mac32, MacKey32};
use crate::codec::{CodecKeys, EncodeSummary};
use crate::consts::{
    DIGEST_ALGORITHM, DIGEST_LEN, ENCRYPTION_KEY_LEN, IV_LEN, MAC_KEY_LEN, MAC_LEN,
    PROFILE_IDENTIFIER, TOOL_VERSION,
};
use crate::crypto::rng::KeyMaterial;
use crate::error::IntuneWinError;
use crate::utils::to_fixed;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fmt;
use secure_gate::RevealSecret;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// `ApplicationInfo` children read verbatim, in [`verbatim_fields`] order.
const VERBATIM_FIELDS: [&str; 4] = ["Name", "Description", "FileName", "SetupFile"];

/// Plain, caller-chosen fields of a new package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub name: String,
    pub description: String,
    /// Archive-relative name of the encrypted content entry.
    pub content_file_name: String,
    /// Executable inside the decrypted payload. Opaque to this crate.
    pub setup_file: String,
}

/// The metadata record of one package.
#[derive(Debug)]
pub struct PackageMetadata {
    pub tool_version: String,
    pub name: String,
    pub description: String,
    pub content_file_name: String,
    pub setup_file: String,
    /// Plaintext length of the last embedded payload.
    pub unencrypted_content_size: i64,
    pub encryption_info: EncryptionInfo,
}

/// Key material and integrity values of the content entry.
pub struct EncryptionInfo {
    pub encryption_key: Option<Aes256Key32>,
    pub mac_key: Option<MacKey32>,
    pub initialization_vector: Option<Iv16>,
    /// HMAC-SHA256 of the content entry; stored, never checked on decode.
    pub mac: Option<Mac32>,
    /// SHA-256 of the plaintext.
    pub content_digest: Option<Digest32>,
    pub digest_algorithm: String,
    pub profile_identifier: String,
}

impl fmt::Debug for EncryptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |present: bool| if present { "[REDACTED]" } else { "None" };
        f.debug_struct("EncryptionInfo")
            .field("encryption_key", &redacted(self.encryption_key.is_some()))
            .field("mac_key", &redacted(self.mac_key.is_some()))
            .field(
                "initialization_vector",
                &redacted(self.initialization_vector.is_some()),
            )
            .field("mac", &self.mac.map(|m| BASE64.encode(m)))
            .field("content_digest", &self.content_digest.map(|d| BASE64.encode(d)))
            .field("digest_algorithm", &self.digest_algorithm)
            .field("profile_identifier", &self.profile_identifier)
            .finish()
    }
}

impl EncryptionInfo {
    /// Fresh record for newly generated keys; no content yet.
    pub fn new(keys: KeyMaterial) -> Self {
        Self {
            encryption_key: Some(keys.encryption_key),
            mac_key: Some(keys.mac_key),
            initialization_vector: Some(keys.initialization_vector),
            mac: None,
            content_digest: None,
            digest_algorithm: DIGEST_ALGORITHM.to_string(),
            profile_identifier: PROFILE_IDENTIFIER.to_string(),
        }
    }

    /// Borrow the key material for a codec pass.
    ///
    /// Fails with [`IntuneWinError::InvalidKeyMaterial`] if any of the three
    /// secrets is missing from the record.
    pub fn codec_keys(&self) -> Result<CodecKeys<'_>, IntuneWinError> {
        let missing = |what: &str| IntuneWinError::InvalidKeyMaterial(format!("{what} is missing"));
        Ok(CodecKeys {
            encryption_key: self
                .encryption_key
                .as_ref()
                .ok_or_else(|| missing("encryption key"))?
                .expose_secret(),
            iv: self
                .initialization_vector
                .as_ref()
                .ok_or_else(|| missing("initialization vector"))?
                .expose_secret(),
            mac_key: self
                .mac_key
                .as_ref()
                .ok_or_else(|| missing("MAC key"))?
                .expose_secret(),
        })
    }
}

impl PackageMetadata {
    pub fn new(info: ContentInfo, keys: KeyMaterial) -> Self {
        Self {
            tool_version: TOOL_VERSION.to_string(),
            name: info.name,
            description: info.description,
            content_file_name: info.content_file_name,
            setup_file: info.setup_file,
            unencrypted_content_size: 0,
            encryption_info: EncryptionInfo::new(keys),
        }
    }

    /// Record the result of an embed: size, digest and MAC move together.
    pub fn apply(&mut self, summary: &EncodeSummary) {
        self.unencrypted_content_size = summary.plaintext_len as i64;
        self.encryption_info.content_digest = Some(summary.content_digest);
        self.encryption_info.mac = Some(summary.mac);
    }

    /// The integrity fields [`apply`](Self::apply) overwrites, for rollback.
    pub(crate) fn integrity(&self) -> Integrity {
        Integrity {
            size: self.unencrypted_content_size,
            digest: self.encryption_info.content_digest,
            mac: self.encryption_info.mac,
        }
    }

    pub(crate) fn restore(&mut self, saved: Integrity) {
        self.unencrypted_content_size = saved.size;
        self.encryption_info.content_digest = saved.digest;
        self.encryption_info.mac = saved.mac;
    }

    /// Serialize to the `Detection.xml` document.
    pub fn to_xml(&self) -> Result<String, IntuneWinError> {
        let info = &self.encryption_info;
        let doc = ApplicationInfoXml {
            tool_version: Some(self.tool_version.clone()),
            name: Some(self.name.clone()),
            description: Some(self.description.clone()),
            unencrypted_content_size: self.unencrypted_content_size,
            file_name: Some(self.content_file_name.clone()),
            setup_file: Some(self.setup_file.clone()),
            encryption_info: EncryptionInfoXml {
                profile_identifier: Some(info.profile_identifier.clone()),
                encryption_key: info
                    .encryption_key
                    .as_ref()
                    .map(|k| BASE64.encode(k.expose_secret())),
                initialization_vector: info
                    .initialization_vector
                    .as_ref()
                    .map(|iv| BASE64.encode(iv.expose_secret())),
                mac: info.mac.map(|m| BASE64.encode(m)),
                mac_key: info.mac_key.as_ref().map(|k| BASE64.encode(k.expose_secret())),
                file_digest: info.content_digest.map(|d| BASE64.encode(d)),
                file_digest_algorithm: Some(info.digest_algorithm.clone()),
            },
        };
        let body = quick_xml::se::to_string(&doc)
            .map_err(|e| IntuneWinError::Metadata(format!("serializing metadata: {e}")))?;
        Ok(format!("{XML_DECLARATION}{body}"))
    }

    /// Parse a `Detection.xml` document.
    ///
    /// # Errors
    ///
    /// - [`IntuneWinError::Metadata`] - not valid XML / base64, or no
    ///   `EncryptionInfo` element
    /// - [`IntuneWinError::InvalidKeyMaterial`] - a byte field decodes to
    ///   the wrong length
    pub fn from_xml(text: &str) -> Result<Self, IntuneWinError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let doc: ApplicationInfoXml = quick_xml::de::from_str(text)
            .map_err(|e| IntuneWinError::Metadata(format!("parsing metadata: {e}")))?;
        let [name, description, file_name, setup_file] = verbatim_fields(text)?;
        let enc = doc.encryption_info;

        let encryption_info = EncryptionInfo {
            encryption_key: decode_field::<ENCRYPTION_KEY_LEN>(enc.encryption_key, "EncryptionKey")?
                .map(Aes256Key32::new),
            mac_key: decode_field::<MAC_KEY_LEN>(enc.mac_key, "MacKey")?.map(MacKey32::new),
            initialization_vector: decode_field::<IV_LEN>(
                enc.initialization_vector,
                "InitializationVector",
            )?
            .map(Iv16::new),
            mac: decode_field::<MAC_LEN>(enc.mac, "Mac")?,
            content_digest: decode_field::<DIGEST_LEN>(enc.file_digest, "FileDigest")?,
            digest_algorithm: enc
                .file_digest_algorithm
                .unwrap_or_else(|| DIGEST_ALGORITHM.to_string()),
            profile_identifier: enc
                .profile_identifier
                .unwrap_or_else(|| PROFILE_IDENTIFIER.to_string()),
        };

        Ok(Self {
            tool_version: doc.tool_version.unwrap_or_else(|| TOOL_VERSION.to_string()),
            name: name.or(doc.name).unwrap_or_default(),
            description: description.or(doc.description).unwrap_or_default(),
            content_file_name: file_name.or(doc.file_name).unwrap_or_default(),
            setup_file: setup_file.or(doc.setup_file).unwrap_or_default(),
            unencrypted_content_size: doc.unencrypted_content_size,
            encryption_info,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Integrity {
    size: i64,
    digest: Option<Digest32>,
    mac: Option<Mac32>,
}

/// Base64 text → fixed array. Absent or blank fields are `None`.
fn decode_field<const N: usize>(
    value: Option<String>,
    element: &str,
) -> Result<Option<[u8; N]>, IntuneWinError> {
    let Some(text) = value.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let bytes = BASE64
        .decode(text)
        .map_err(|e| IntuneWinError::Metadata(format!("{element} is not valid base64: {e}")))?;
    to_fixed::<N>(&bytes, element).map(Some)
}

/// Untrimmed text of the [`VERBATIM_FIELDS`]. The serde pass strips edge
/// whitespace from text nodes, so these are read with a plain reader.
fn verbatim_fields(text: &str) -> Result<[Option<String>; 4], IntuneWinError> {
    let parse_err =
        |e: &dyn fmt::Display| IntuneWinError::Metadata(format!("parsing metadata: {e}"));
    let mut reader = Reader::from_str(text);
    let mut values: [Option<String>; 4] = Default::default();
    let mut depth = 0usize;
    let mut current = None;

    loop {
        match reader.read_event().map_err(|e| parse_err(&e))? {
            Event::Start(start) => {
                depth += 1;
                current = if depth == 2 {
                    verbatim_index(start.local_name().as_ref())
                } else {
                    None
                };
                if let Some(i) = current {
                    values[i].get_or_insert_with(String::new);
                }
            }
            Event::Empty(empty) if depth == 1 => {
                if let Some(i) = verbatim_index(empty.local_name().as_ref()) {
                    values[i].get_or_insert_with(String::new);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                current = None;
            }
            Event::Text(t) => {
                if let Some(i) = current {
                    let unescaped = t.unescape().map_err(|e| parse_err(&e))?;
                    values[i].get_or_insert_with(String::new).push_str(&unescaped);
                }
            }
            Event::CData(cdata) => {
                if let Some(i) = current {
                    let raw = std::str::from_utf8(&cdata).map_err(|e| parse_err(&e))?;
                    values[i].get_or_insert_with(String::new).push_str(raw);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(values)
}

fn verbatim_index(local_name: &[u8]) -> Option<usize> {
    VERBATIM_FIELDS
        .iter()
        .position(|field| field.as_bytes() == local_name)
}

// ─────────────────────────────────────────────────────────────────────────────
// On-disk shape
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "ApplicationInfo")]
struct ApplicationInfoXml {
    #[serde(rename = "@ToolVersion", default, skip_serializing_if = "Option::is_none")]
    tool_version: Option<String>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "UnencryptedContentSize", default)]
    unencrypted_content_size: i64,
    #[serde(rename = "FileName", default)]
    file_name: Option<String>,
    #[serde(rename = "SetupFile", default)]
    setup_file: Option<String>,
    #[serde(rename = "EncryptionInfo")]
    encryption_info: EncryptionInfoXml,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncryptionInfoXml {
    #[serde(rename = "ProfileIdentifier", default, skip_serializing_if = "Option::is_none")]
    profile_identifier: Option<String>,
    #[serde(rename = "EncryptionKey", default, skip_serializing_if = "Option::is_none")]
    encryption_key: Option<String>,
    #[serde(rename = "InitializationVector", default, skip_serializing_if = "Option::is_none")]
    initialization_vector: Option<String>,
    #[serde(rename = "Mac", default, skip_serializing_if = "Option::is_none")]
    mac: Option<String>,
    #[serde(rename = "MacKey", default, skip_serializing_if = "Option::is_none")]
    mac_key: Option<String>,
    #[serde(rename = "FileDigest", default, skip_serializing_if = "Option::is_none")]
    file_digest: Option<String>,
    #[serde(rename = "FileDigestAlgorithm", default, skip_serializing_if = "Option::is_none")]
    file_digest_algorithm: Option<String>,
}
