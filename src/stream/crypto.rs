//! Traditional PKWARE ("ZipCrypto") stream cipher.
//!
//! This is the weak legacy cipher from APPNOTE section 6.1. A wrong password
//! can only be detected through a single verification byte in the 12-byte
//! encryption header, so roughly one wrong password in 256 slips through and
//! yields garbage. It offers no real confidentiality against an attacker.

use rand::RngCore;
use std::io::{self, Read, Write};

/// Size of the encryption header preceding the encrypted data.
pub const ENCRYPTION_HEADER_SIZE: usize = 12;

const fn gen_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let poly = 0xEDB88320;

    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ poly;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }

    table
}

static CRC_TABLE: [u32; 256] = gen_crc_table();

#[inline]
fn crc32_byte(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// Cipher state derived from a password.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZipCryptoKeys {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl ZipCryptoKeys {
    pub fn derive(password: &[u8]) -> Self {
        let mut keys = Self {
            key0: 0x12345678,
            key1: 0x23456789,
            key2: 0x34567890,
        };
        for &byte in password {
            keys.update(byte);
        }
        keys
    }

    fn update(&mut self, plain: u8) {
        self.key0 = crc32_byte(self.key0, plain);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(134775813)
            .wrapping_add(1);
        self.key2 = crc32_byte(self.key2, (self.key1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let temp = (self.key2 | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    pub fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.stream_byte();
        self.update(plain);
        cipher
    }

    pub fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.stream_byte();
        self.update(plain);
        plain
    }
}

/// Decrypting reader.
pub struct ZipCryptoReader<R> {
    inner: R,
    keys: ZipCryptoKeys,
}

impl<R: Read> ZipCryptoReader<R> {
    /// Reads and decrypts the encryption header.
    ///
    /// Returns `Ok(None)` when the last header byte does not match
    /// `verification_byte`, which is the only wrong-password signal the format
    /// offers.
    pub fn prepare(mut inner: R, password: &[u8], verification_byte: u8) -> io::Result<Option<Self>> {
        let mut keys = ZipCryptoKeys::derive(password);
        let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
        inner.read_exact(&mut header)?;
        for byte in header.iter_mut() {
            *byte = keys.decrypt_byte(*byte);
        }
        if header[ENCRYPTION_HEADER_SIZE - 1] != verification_byte {
            return Ok(None);
        }
        Ok(Some(Self { inner, keys }))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ZipCryptoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for byte in buf[..n].iter_mut() {
            *byte = self.keys.decrypt_byte(*byte);
        }
        Ok(n)
    }
}

/// Encrypting writer. The encryption header is written on construction.
pub struct ZipCryptoWriter<W> {
    inner: W,
    keys: ZipCryptoKeys,
    buffer: Vec<u8>,
}

impl<W: Write> ZipCryptoWriter<W> {
    pub fn new(mut inner: W, password: &[u8], verification_byte: u8) -> io::Result<Self> {
        let mut keys = ZipCryptoKeys::derive(password);
        let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
        rand::thread_rng().fill_bytes(&mut header[..ENCRYPTION_HEADER_SIZE - 1]);
        header[ENCRYPTION_HEADER_SIZE - 1] = verification_byte;
        for byte in header.iter_mut() {
            *byte = keys.encrypt_byte(*byte);
        }
        inner.write_all(&header)?;
        Ok(Self {
            inner,
            keys,
            buffer: Vec::new(),
        })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ZipCryptoWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.clear();
        self.buffer
            .extend(buf.iter().map(|&byte| self.keys.encrypt_byte(byte)));
        self.inner.write_all(&self.buffer)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
