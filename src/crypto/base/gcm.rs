//! AES-256-GCM over a stream, for payloads we don't want to hold in memory.
//!
//! This is the same construction `aes-gcm` uses (CTR mode starting at
//! `J0 + 1`, GHASH over the ciphertext, tag masked with `E(K, J0)`), just fed
//! incrementally. Only the 96-bit IV case and empty AAD are supported, which
//! is all the resource format needs.

use crate::{
    crypto::{
        base::{tail::TailBuffer, SymmetricKey},
        A256GCM_IV_SIZE, A256GCM_TAG_SIZE,
    },
    error::{Error, Result},
};
use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher},
    Aes256,
};
use ghash::{universal_hash::UniversalHash, GHash};
use std::io::{self, Write};
use subtle::ConstantTimeEq;

type Aes256Ctr32 = ctr::Ctr32BE<Aes256>;

const BLOCK: usize = 16;

/// Incremental GCM state. Encrypt or decrypt (never both) any number of
/// chunks, then `finish` or `verify`.
pub(crate) struct GcmStream {
    ctr: Aes256Ctr32,
    ghash: GHash,
    pending: [u8; BLOCK],
    pending_len: usize,
    tag_mask: [u8; BLOCK],
    len: u64,
}

impl GcmStream {
    pub fn new(key: &SymmetricKey, iv: &[u8; A256GCM_IV_SIZE]) -> Self {
        let cipher = <Aes256 as KeyInit>::new(GenericArray::from_slice(key.expose_secret()));

        let mut h = GenericArray::default();
        cipher.encrypt_block(&mut h);
        let ghash = <GHash as KeyInit>::new(&h);

        let mut j0 = [0u8; BLOCK];
        j0[..A256GCM_IV_SIZE].copy_from_slice(iv);
        j0[BLOCK - 1] = 1;
        let mut mask = GenericArray::clone_from_slice(&j0);
        cipher.encrypt_block(&mut mask);

        let mut counter = j0;
        counter[BLOCK - 1] = 2;
        let ctr = <Aes256Ctr32 as KeyIvInit>::new(
            GenericArray::from_slice(key.expose_secret()),
            GenericArray::from_slice(&counter),
        );

        Self {
            ctr,
            ghash,
            pending: [0u8; BLOCK],
            pending_len: 0,
            tag_mask: mask.into(),
            len: 0,
        }
    }

    /// Encrypt a chunk in place.
    pub fn encrypt(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ctr.try_apply_keystream(buf).map_err(|_| Error::CryptoSealFailed)?;
        self.absorb(buf);
        Ok(())
    }

    /// Decrypt a chunk in place. The plaintext is NOT authenticated until
    /// `verify` succeeds.
    pub fn decrypt(&mut self, buf: &mut [u8]) -> Result<()> {
        self.absorb(buf);
        self.ctr.try_apply_keystream(buf).map_err(|_| Error::CryptoOpenFailed)
    }

    /// Feed ciphertext into GHASH, carrying partial blocks across calls.
    fn absorb(&mut self, mut data: &[u8]) {
        self.len += data.len() as u64;
        if self.pending_len > 0 {
            let take = (BLOCK - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];
            if self.pending_len < BLOCK {
                return;
            }
            self.ghash.update(&[GenericArray::clone_from_slice(&self.pending)]);
            self.pending_len = 0;
        }
        let mut chunks = data.chunks_exact(BLOCK);
        for chunk in &mut chunks {
            self.ghash.update(&[GenericArray::clone_from_slice(chunk)]);
        }
        let rest = chunks.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    /// Finalize and return the tag.
    pub fn finish(mut self) -> [u8; A256GCM_TAG_SIZE] {
        if self.pending_len > 0 {
            self.ghash.update_padded(&self.pending[..self.pending_len]);
        }
        // lengths block: 64-bit AAD bit length (always zero here), then the
        // 64-bit ciphertext bit length
        let mut lengths = [0u8; BLOCK];
        lengths[8..].copy_from_slice(&(self.len * 8).to_be_bytes());
        self.ghash.update(&[GenericArray::clone_from_slice(&lengths)]);
        let sum = self.ghash.finalize();
        let mut tag = [0u8; A256GCM_TAG_SIZE];
        for (i, b) in tag.iter_mut().enumerate() {
            *b = sum[i] ^ self.tag_mask[i];
        }
        tag
    }

    /// Finalize and compare against an expected tag in constant time.
    pub fn verify(self, expected: &[u8]) -> Result<()> {
        let tag = self.finish();
        if bool::from(tag.as_slice().ct_eq(expected)) {
            Ok(())
        } else {
            Err(Error::CryptoOpenFailed)
        }
    }
}

fn to_io(err: Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

/// Encrypts everything written to it and passes the ciphertext on to the
/// inner writer, followed by the tag on `finish`. Exactly what an AEAD
/// library's output stream looks like.
pub(crate) struct GcmEncryptWriter<W: Write> {
    gcm: GcmStream,
    inner: W,
    scratch: Vec<u8>,
}

impl<W: Write> GcmEncryptWriter<W> {
    pub fn new(key: &SymmetricKey, iv: &[u8; A256GCM_IV_SIZE], inner: W) -> Self {
        Self {
            gcm: GcmStream::new(key, iv),
            inner,
            scratch: Vec::new(),
        }
    }

    /// Write the tag and hand back the inner writer.
    pub fn finish(self) -> Result<W> {
        let Self { gcm, mut inner, .. } = self;
        inner.write_all(&gcm.finish())?;
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for GcmEncryptWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(data);
        self.gcm.encrypt(&mut self.scratch).map_err(to_io)?;
        self.inner.write_all(&self.scratch)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// The decrypting half of the pipeline: gets ciphertext (with the tag already
/// split off) and writes plaintext.
struct DecryptSink<W: Write> {
    gcm: GcmStream,
    inner: W,
    scratch: Vec<u8>,
}

impl<W: Write> Write for DecryptSink<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(data);
        self.gcm.decrypt(&mut self.scratch).map_err(to_io)?;
        self.inner.write_all(&self.scratch)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Takes `ciphertext || tag` as one stream and writes plaintext to the inner
/// writer. The last 16 bytes are held back in a [`TailBuffer`] since we can't
/// know they're the tag until the stream ends.
///
/// Plaintext reaches the inner writer *before* the tag is checked. If
/// `finish` fails, throw away everything that was written.
pub(crate) struct GcmDecryptWriter<W: Write> {
    tail: TailBuffer<DecryptSink<W>>,
}

impl<W: Write> GcmDecryptWriter<W> {
    pub fn new(key: &SymmetricKey, iv: &[u8; A256GCM_IV_SIZE], inner: W) -> Self {
        let sink = DecryptSink {
            gcm: GcmStream::new(key, iv),
            inner,
            scratch: Vec::new(),
        };
        Self {
            tail: TailBuffer::new(sink, A256GCM_TAG_SIZE),
        }
    }

    /// Check the tag and hand back the inner writer.
    pub fn finish(self) -> Result<W> {
        let (sink, tag) = self.tail.into_parts();
        if tag.len() != A256GCM_TAG_SIZE {
            Err(Error::CryptoOpenFailed)?;
        }
        let DecryptSink { gcm, mut inner, .. } = sink;
        gcm.verify(&tag)?;
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for GcmDecryptWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.tail.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tail.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ser::Binary;
    use rand::RngCore;

    fn chunked_encrypt(key: &SymmetricKey, iv: &[u8; 12], data: &[u8], chunk: usize) -> Vec<u8> {
        let mut writer = GcmEncryptWriter::new(key, iv, Vec::new());
        for piece in data.chunks(chunk.max(1)) {
            writer.write_all(piece).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn matches_one_shot_gcm() {
        let mut rng = crate::util::test::rng();
        let key = SymmetricKey::generate(&mut rng);
        let iv = [0x42u8; 12];
        for len in [0usize, 1, 15, 16, 17, 31, 32, 33, 100, 1000] {
            let mut data = vec![0u8; len];
            rng.fill_bytes(&mut data);
            let sealed = key.seal_with_iv(Binary::new(iv), &data).unwrap();
            let mut expected = sealed.ciphertext().clone();
            expected.extend_from_slice(sealed.tag().as_ref());
            for chunk in [1, 5, 16, 17, 64, 4096] {
                assert_eq!(chunked_encrypt(&key, &iv, &data, chunk), expected, "len {} chunk {}", len, chunk);
            }
        }
    }

    #[test]
    fn decrypt_roundtrip_and_tamper() {
        let mut rng = crate::util::test::rng();
        let key = SymmetricKey::generate(&mut rng);
        let iv = [7u8; 12];
        let data = b"the tag rides at the very end of the stream, where nobody expects it".to_vec();
        let sealed = chunked_encrypt(&key, &iv, &data, 9);

        let mut dec = GcmDecryptWriter::new(&key, &iv, Vec::new());
        for piece in sealed.chunks(5) {
            dec.write_all(piece).unwrap();
        }
        assert_eq!(dec.finish().unwrap(), data);

        for idx in [0, data.len() - 1, data.len(), sealed.len() - 1] {
            let mut bad = sealed.clone();
            bad[idx] ^= 0x10;
            let mut dec = GcmDecryptWriter::new(&key, &iv, Vec::new());
            dec.write_all(&bad).unwrap();
            assert_eq!(dec.finish().err(), Some(Error::CryptoOpenFailed), "idx {}", idx);
        }
    }

    #[test]
    fn decrypt_short_stream_fails() {
        let key = SymmetricKey::new([1; 32]);
        let mut dec = GcmDecryptWriter::new(&key, &[0; 12], Vec::new());
        dec.write_all(&[0u8; 15]).unwrap();
        assert_eq!(dec.finish().err(), Some(Error::CryptoOpenFailed));
    }
}
