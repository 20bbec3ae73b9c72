//! Composable stream layers used to move entry data in and out of an archive.
//!
//! Reading an entry chains `SubStream -> ZipCryptoReader -> DecoderStream`;
//! saving a new entry chains `CrcReader -> EncoderStream -> ZipCryptoWriter`.
//! Each layer is optional apart from the outermost one, so compression method,
//! encryption and data-descriptor mode stay independent of each other.
//!
//! A null sink is [`std::io::sink`]; it is used to drain a [`CrcReader`] when
//! only the checksum is wanted.

mod codec;
mod counting;
mod crc;
mod crypto;
mod substream;

pub use codec::{DecoderStream, EncoderStream};
pub use counting::{Counter, CountingReader, CountingWriter};
pub use crc::CrcReader;
pub use crypto::{ENCRYPTION_HEADER_SIZE, ZipCryptoKeys, ZipCryptoReader, ZipCryptoWriter};
pub use substream::SubStream;
