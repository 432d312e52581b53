//! # Content Entry Header
//!
//! The encrypted content entry starts with a fixed 48-byte header:
//!
//! | Offset | Length | Content                                   |
//! |--------|--------|-------------------------------------------|
//! | 0      | 32     | HMAC-SHA256 over bytes `[32, EOF)`        |
//! | 32     | 16     | CBC initialization vector, in cleartext   |
//! | 48     | ...    | AES-256-CBC ciphertext (PKCS#7 padded)    |
//!
//! Decoding never needs these values (the key and IV come from the metadata
//! record), but they are handy for inspection and for opt-in MAC checks.

use crate::aliases::Mac32;
use crate::consts::{HEADER_LEN, IV_LEN, MAC_LEN};
use crate::error::IntuneWinError;
use std::io::{ErrorKind, Read};

/// The stored MAC and IV of a content entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHeader {
    pub mac: Mac32,
    pub iv: [u8; IV_LEN],
}

impl ContentHeader {
    /// Serialized form, as it appears at offset 0 of the entry.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..MAC_LEN].copy_from_slice(&self.mac);
        out[MAC_LEN..].copy_from_slice(&self.iv);
        out
    }
}

/// Read the 48-byte header from the start of a content entry.
///
/// Leaves `reader` positioned at the first ciphertext byte.
///
/// # Errors
///
/// - [`IntuneWinError::CorruptCiphertext`] - fewer than 48 bytes available
/// - [`IntuneWinError::Io`] - any other read failure
///
/// # Example
///
/// ```
/// use intunewin_rs::read_content_header;
/// use std::io::Cursor;
///
/// let mut entry = vec![0xAAu8; 32];
/// entry.extend_from_slice(&[0x01u8; 16]);
/// let header = read_content_header(Cursor::new(entry))?;
/// assert_eq!(header.mac, [0xAA; 32]);
/// assert_eq!(header.iv, [0x01; 16]);
/// # Ok::<(), intunewin_rs::IntuneWinError>(())
/// ```
pub fn read_content_header<R: Read>(mut reader: R) -> Result<ContentHeader, IntuneWinError> {
    let mut buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => IntuneWinError::CorruptCiphertext(format!(
            "content entry is shorter than its {HEADER_LEN}-byte header"
        )),
        _ => IntuneWinError::Io(e),
    })?;

    let mut header = ContentHeader {
        mac: [0u8; MAC_LEN],
        iv: [0u8; IV_LEN],
    };
    header.mac.copy_from_slice(&buf[..MAC_LEN]);
    header.iv.copy_from_slice(&buf[MAC_LEN..]);
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trips_through_bytes() {
        let header = ContentHeader {
            mac: [0x42; 32],
            iv: core::array::from_fn(|i| i as u8),
        };
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(b"ciphertext follows");
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_content_header(&mut cursor).unwrap(), header);
        assert_eq!(cursor.position(), HEADER_LEN as u64);
    }

    #[test]
    fn short_entry_is_corrupt() {
        let err = read_content_header(Cursor::new(vec![0u8; 47])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "corrupt ciphertext: content entry is shorter than its 48-byte header"
        );
    }
}
