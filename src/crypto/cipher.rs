//! src/crypto/cipher.rs
//! AES-256-CBC as write-side transforms.
//!
//! [`CbcEncryptor`] and [`CbcDecryptor`] wrap any `Write`: bytes written in
//! go out the other side encrypted or decrypted. Input may arrive in pieces
//! of any size; partial blocks are buffered. `finish()` must be called to
//! emit the PKCS#7 padded final block (encrypt) or to strip and validate the
//! padding of the last block (decrypt).

use crate::aliases::{Aes256Key32, Block16};
use crate::consts::{AES_BLOCK_LEN, ENCRYPTION_KEY_LEN, IV_LEN};
use crate::error::IntuneWinError;
use crate::utils::{ct_eq, to_fixed, xor_blocks};
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256Dec, Aes256Enc, Block as AesBlock};
use std::io::{self, Write};
use secure_gate::{RevealSecret, RevealSecretMut};

/// Which way a [`CipherStream`] transforms its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherDirection {
    Encrypt,
    Decrypt,
}

/// Builds a CBC transform over `inner` for the given direction.
///
/// Fails with [`IntuneWinError::InvalidKeyMaterial`] unless `key` is 32
/// bytes and `iv` is 16 bytes.
pub fn cipher_stream<W: Write>(
    inner: W,
    key: &[u8],
    iv: &[u8],
    direction: CipherDirection,
) -> Result<CipherStream<W>, IntuneWinError> {
    Ok(match direction {
        CipherDirection::Encrypt => CipherStream::Encrypt(CbcEncryptor::new(inner, key, iv)?),
        CipherDirection::Decrypt => CipherStream::Decrypt(CbcDecryptor::new(inner, key, iv)?),
    })
}

/// Either CBC direction behind one `Write` impl.
pub enum CipherStream<W: Write> {
    Encrypt(CbcEncryptor<W>),
    Decrypt(CbcDecryptor<W>),
}

impl<W: Write> CipherStream<W> {
    /// Flushes the final block and hands back the wrapped writer.
    pub fn finish(self) -> Result<W, IntuneWinError> {
        match self {
            Self::Encrypt(enc) => enc.finish(),
            Self::Decrypt(dec) => dec.finish(),
        }
    }

    /// Bytes accepted through `write` so far.
    pub fn bytes_in(&self) -> u64 {
        match self {
            Self::Encrypt(enc) => enc.bytes_in,
            Self::Decrypt(dec) => dec.bytes_in,
        }
    }

    /// Bytes emitted to the wrapped writer so far.
    pub fn bytes_out(&self) -> u64 {
        match self {
            Self::Encrypt(enc) => enc.bytes_out,
            Self::Decrypt(dec) => dec.bytes_out,
        }
    }
}

impl<W: Write> Write for CipherStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Encrypt(enc) => enc.write(buf),
            Self::Decrypt(dec) => dec.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Encrypt(enc) => enc.flush(),
            Self::Decrypt(dec) => dec.flush(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encrypt
// ─────────────────────────────────────────────────────────────────────────────

/// AES-256-CBC encryptor with PKCS#7 padding.
pub struct CbcEncryptor<W: Write> {
    inner: W,
    cipher: Aes256Enc,
    // previous ciphertext block, seeded with the IV
    prev: [u8; AES_BLOCK_LEN],
    pending: Block16,
    pending_len: usize,
    scratch: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
}

impl<W: Write> CbcEncryptor<W> {
    pub fn new(inner: W, key: &[u8], iv: &[u8]) -> Result<Self, IntuneWinError> {
        let key = Aes256Key32::new(to_fixed::<ENCRYPTION_KEY_LEN>(key, "encryption key")?);
        let iv = to_fixed::<IV_LEN>(iv, "initialization vector")?;
        Ok(Self {
            inner,
            cipher: Aes256Enc::new(key.expose_secret().into()),
            prev: iv,
            pending: Block16::new([0u8; AES_BLOCK_LEN]),
            pending_len: 0,
            scratch: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
        })
    }

    /// Pads the buffered tail (a full padding block if the input was
    /// block-aligned, including empty input), writes it, flushes.
    pub fn finish(mut self) -> Result<W, IntuneWinError> {
        let pad = (AES_BLOCK_LEN - self.pending_len) as u8;
        self.pending.expose_secret_mut()[self.pending_len..].fill(pad);

        self.scratch.clear();
        encrypt_block(
            &self.cipher,
            &mut self.prev,
            self.pending.expose_secret(),
            &mut self.scratch,
        );
        self.inner.write_all(&self.scratch)?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }
}

impl<W: Write> Write for CbcEncryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        let cipher = &self.cipher;
        let prev = &mut self.prev;
        let scratch = &mut self.scratch;
        for_each_block(
            self.pending.expose_secret_mut(),
            &mut self.pending_len,
            buf,
            |block| encrypt_block(cipher, prev, block, scratch),
        );
        self.inner.write_all(&self.scratch)?;
        self.bytes_in += buf.len() as u64;
        self.bytes_out += self.scratch.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[inline(always)]
fn encrypt_block(
    cipher: &Aes256Enc,
    prev: &mut [u8; AES_BLOCK_LEN],
    plaintext: &[u8],
    out: &mut Vec<u8>,
) {
    let mut xored = Block16::new([0u8; AES_BLOCK_LEN]);
    xor_blocks(plaintext, prev, xored.expose_secret_mut());

    let mut aes_block = AesBlock::from(*xored.expose_secret());
    cipher.encrypt_block(&mut aes_block);

    prev.copy_from_slice(aes_block.as_slice());
    out.extend_from_slice(aes_block.as_slice());
}

// ─────────────────────────────────────────────────────────────────────────────
// Decrypt
// ─────────────────────────────────────────────────────────────────────────────

/// AES-256-CBC decryptor that strips PKCS#7 padding on `finish`.
///
/// The most recent plaintext block is held back until more ciphertext
/// arrives, since only the last block carries padding.
pub struct CbcDecryptor<W: Write> {
    inner: W,
    cipher: Aes256Dec,
    prev: [u8; AES_BLOCK_LEN],
    pending: [u8; AES_BLOCK_LEN],
    pending_len: usize,
    held: Option<Block16>,
    scratch: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
}

impl<W: Write> CbcDecryptor<W> {
    pub fn new(inner: W, key: &[u8], iv: &[u8]) -> Result<Self, IntuneWinError> {
        let key = Aes256Key32::new(to_fixed::<ENCRYPTION_KEY_LEN>(key, "encryption key")?);
        let iv = to_fixed::<IV_LEN>(iv, "initialization vector")?;
        Ok(Self {
            inner,
            cipher: Aes256Dec::new(key.expose_secret().into()),
            prev: iv,
            pending: [0u8; AES_BLOCK_LEN],
            pending_len: 0,
            held: None,
            scratch: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
        })
    }

    /// Validates and strips the padding of the held block, writes the
    /// remainder, flushes.
    pub fn finish(mut self) -> Result<W, IntuneWinError> {
        if self.pending_len != 0 {
            return Err(IntuneWinError::CorruptCiphertext(format!(
                "ciphertext length is not a multiple of {AES_BLOCK_LEN} bytes"
            )));
        }
        let Some(last) = self.held.take() else {
            return Err(IntuneWinError::CorruptCiphertext(
                "missing final block".into(),
            ));
        };

        let block = last.expose_secret();
        let padding = block[AES_BLOCK_LEN - 1];
        if padding == 0 || padding as usize > AES_BLOCK_LEN {
            return Err(IntuneWinError::CorruptCiphertext(
                "invalid PKCS#7 padding".into(),
            ));
        }
        let keep = AES_BLOCK_LEN - padding as usize;
        if !ct_eq(&block[keep..], &[padding; AES_BLOCK_LEN][keep..]) {
            return Err(IntuneWinError::CorruptCiphertext(
                "corrupt PKCS#7 padding".into(),
            ));
        }

        self.inner.write_all(&block[..keep])?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }
}

impl<W: Write> Write for CbcDecryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        let cipher = &self.cipher;
        let prev = &mut self.prev;
        let held = &mut self.held;
        let scratch = &mut self.scratch;
        for_each_block(&mut self.pending, &mut self.pending_len, buf, |block| {
            decrypt_block(cipher, prev, held, block, scratch)
        });
        self.inner.write_all(&self.scratch)?;
        self.bytes_in += buf.len() as u64;
        self.bytes_out += self.scratch.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[inline(always)]
fn decrypt_block(
    cipher: &Aes256Dec,
    prev: &mut [u8; AES_BLOCK_LEN],
    held: &mut Option<Block16>,
    ciphertext: &[u8],
    out: &mut Vec<u8>,
) {
    if let Some(ready) = held.as_ref() {
        out.extend_from_slice(ready.expose_secret());
    }

    let mut aes_block = AesBlock::clone_from_slice(ciphertext);
    cipher.decrypt_block(&mut aes_block);

    let mut plaintext = Block16::new([0u8; AES_BLOCK_LEN]);
    xor_blocks(aes_block.as_slice(), prev, plaintext.expose_secret_mut());
    prev.copy_from_slice(ciphertext);
    *held = Some(plaintext);
}

/// Splits `input` into whole AES blocks, topping up and draining the
/// partial block carried over from the previous call.
fn for_each_block<F>(
    pending: &mut [u8; AES_BLOCK_LEN],
    pending_len: &mut usize,
    mut input: &[u8],
    mut f: F,
) where
    F: FnMut(&[u8]),
{
    if *pending_len > 0 {
        let take = (AES_BLOCK_LEN - *pending_len).min(input.len());
        pending[*pending_len..*pending_len + take].copy_from_slice(&input[..take]);
        *pending_len += take;
        input = &input[take..];
        if *pending_len < AES_BLOCK_LEN {
            return;
        }
        f(&pending[..]);
        *pending_len = 0;
    }

    let mut blocks = input.chunks_exact(AES_BLOCK_LEN);
    for block in &mut blocks {
        f(block);
    }
    let rest = blocks.remainder();
    pending[..rest.len()].copy_from_slice(rest);
    *pending_len = rest.len();
}
