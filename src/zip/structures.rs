use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Run `body` at the reader's current position. If it reports "not this
/// record" (`Ok(None)`) or runs out of data, the reader is moved back to
/// where it started and `Ok(None)` is returned.
fn read_record<R, T, F>(reader: &mut R, body: F) -> io::Result<Option<T>>
where
    R: Read + Seek,
    F: FnOnce(&mut R) -> io::Result<Option<T>>,
{
    let start = reader.stream_position()?;
    match body(reader) {
        Ok(Some(record)) => Ok(Some(record)),
        Ok(None) => {
            reader.seek(SeekFrom::Start(start))?;
            Ok(None)
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            reader.seek(SeekFrom::Start(start))?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Names and comments stay raw; their encoding is only known to the writer.
fn read_bytes<R: Read>(reader: &mut R, len: u16) -> io::Result<Vec<u8>> {
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn length_u16(len: usize, what: &str) -> io::Result<u16> {
    u16::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} is too long ({len} bytes)"),
        )
    })
}

pub(crate) fn length_u32(len: u64, what: &str) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} of {len} bytes needs ZIP64, which is not supported"),
        )
    })
}

/// Generic extra field: `{tag: u16, size: u16, data[size]}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraField {
    pub tag: u16,
    pub data: Vec<u8>,
}

impl ExtraField {
    pub const HEADER_SIZE: usize = 4;

    pub fn new(tag: u16, data: Vec<u8>) -> Self {
        Self { tag, data }
    }

    /// Serialized size including the 4-byte tag/size prefix
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.data.len()
    }

    /// Read one sub-record, provided it fits entirely before `end`.
    fn read<R: Read + Seek>(reader: &mut R, end: u64) -> io::Result<Option<Self>> {
        let pos = reader.stream_position()?;
        if end.saturating_sub(pos) < Self::HEADER_SIZE as u64 {
            return Ok(None);
        }
        let tag = reader.read_u16::<LittleEndian>()?;
        let size = reader.read_u16::<LittleEndian>()?;
        if end.saturating_sub(pos + Self::HEADER_SIZE as u64) < size as u64 {
            return Ok(None);
        }
        let mut data = vec![0u8; size as usize];
        reader.read_exact(&mut data)?;
        Ok(Some(Self { tag, data }))
    }

    /// Read the sub-records of an extra-field blob of `len` bytes.
    ///
    /// Some archives do not lay the blob out as tag/size/data tuples; the
    /// reader always ends up at the declared end of the blob so the following
    /// fields stay aligned.
    pub fn read_all<R: Read + Seek>(reader: &mut R, len: u16) -> io::Result<Vec<Self>> {
        let mut fields = Vec::new();
        if len == 0 {
            return Ok(fields);
        }
        let end = reader.stream_position()? + len as u64;
        while let Some(field) = Self::read(reader, end)? {
            fields.push(field);
        }
        reader.seek(SeekFrom::Start(end))?;
        Ok(fields)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(self.tag)?;
        writer.write_u16::<LittleEndian>(length_u16(self.data.len(), "extra field data")?)?;
        writer.write_all(&self.data)
    }

    pub fn write_all<W: Write>(fields: &[Self], writer: &mut W) -> io::Result<()> {
        for field in fields {
            field.write(writer)?;
        }
        Ok(())
    }

    fn total_len(fields: &[Self]) -> io::Result<u16> {
        length_u16(fields.iter().map(Self::size).sum(), "extra field")
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x06054b50;
    pub const SIZE: usize = 22;

    pub fn read<R: Read + Seek>(reader: &mut R) -> io::Result<Option<Self>> {
        read_record(reader, |r| {
            if r.read_u32::<LittleEndian>()? != Self::SIGNATURE {
                return Ok(None);
            }
            let disk_number = r.read_u16::<LittleEndian>()?;
            let disk_with_cd = r.read_u16::<LittleEndian>()?;
            let disk_entries = r.read_u16::<LittleEndian>()?;
            let total_entries = r.read_u16::<LittleEndian>()?;
            let cd_size = r.read_u32::<LittleEndian>()?;
            let cd_offset = r.read_u32::<LittleEndian>()?;
            let comment_len = r.read_u16::<LittleEndian>()?;
            let comment = read_bytes(r, comment_len)?;
            Ok(Some(Self {
                disk_number,
                disk_with_cd,
                disk_entries,
                total_entries,
                cd_size,
                cd_offset,
                comment,
            }))
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let comment_len = length_u16(self.comment.len(), "archive comment")?;
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.disk_number)?;
        writer.write_u16::<LittleEndian>(self.disk_with_cd)?;
        writer.write_u16::<LittleEndian>(self.disk_entries)?;
        writer.write_u16::<LittleEndian>(self.total_entries)?;
        writer.write_u32::<LittleEndian>(self.cd_size)?;
        writer.write_u32::<LittleEndian>(self.cd_offset)?;
        writer.write_u16::<LittleEndian>(comment_len)?;
        writer.write_all(&self.comment)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number_start: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub local_header_offset: i32,
    pub file_name: Vec<u8>,
    pub extra_fields: Vec<ExtraField>,
    pub comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = 0x02014b50;
    pub const MIN_SIZE: usize = 46;

    /// Read one header. `Ok(None)` marks the end of the central directory.
    pub fn read<R: Read + Seek>(reader: &mut R) -> io::Result<Option<Self>> {
        read_record(reader, |r| {
            if r.read_u32::<LittleEndian>()? != Self::SIGNATURE {
                return Ok(None);
            }
            let version_made_by = r.read_u16::<LittleEndian>()?;
            let version_needed = r.read_u16::<LittleEndian>()?;
            let flags = r.read_u16::<LittleEndian>()?;
            let compression_method = r.read_u16::<LittleEndian>()?;
            let last_mod_time = r.read_u16::<LittleEndian>()?;
            let last_mod_date = r.read_u16::<LittleEndian>()?;
            let crc32 = r.read_u32::<LittleEndian>()?;
            let compressed_size = r.read_u32::<LittleEndian>()?;
            let uncompressed_size = r.read_u32::<LittleEndian>()?;
            let file_name_length = r.read_u16::<LittleEndian>()?;
            let extra_field_length = r.read_u16::<LittleEndian>()?;
            let file_comment_length = r.read_u16::<LittleEndian>()?;
            let disk_number_start = r.read_u16::<LittleEndian>()?;
            let internal_attributes = r.read_u16::<LittleEndian>()?;
            let external_attributes = r.read_u32::<LittleEndian>()?;
            let local_header_offset = r.read_i32::<LittleEndian>()?;

            let file_name = read_bytes(r, file_name_length)?;
            let extra_fields = ExtraField::read_all(r, extra_field_length)?;
            let comment = read_bytes(r, file_comment_length)?;

            Ok(Some(Self {
                version_made_by,
                version_needed,
                flags,
                compression_method,
                last_mod_time,
                last_mod_date,
                crc32,
                compressed_size,
                uncompressed_size,
                disk_number_start,
                internal_attributes,
                external_attributes,
                local_header_offset,
                file_name,
                extra_fields,
                comment,
            }))
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let file_name_length = length_u16(self.file_name.len(), "file name")?;
        let extra_field_length = ExtraField::total_len(&self.extra_fields)?;
        let file_comment_length = length_u16(self.comment.len(), "file comment")?;

        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_made_by)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method)?;
        writer.write_u16::<LittleEndian>(self.last_mod_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(file_name_length)?;
        writer.write_u16::<LittleEndian>(extra_field_length)?;
        writer.write_u16::<LittleEndian>(file_comment_length)?;
        writer.write_u16::<LittleEndian>(self.disk_number_start)?;
        writer.write_u16::<LittleEndian>(self.internal_attributes)?;
        writer.write_u32::<LittleEndian>(self.external_attributes)?;
        writer.write_i32::<LittleEndian>(self.local_header_offset)?;

        writer.write_all(&self.file_name)?;
        ExtraField::write_all(&self.extra_fields, writer)?;
        writer.write_all(&self.comment)
    }

    /// Take CRC-32 and sizes from a local header that was just written.
    pub fn sync_with_local(&mut self, local: &LocalFileHeader) {
        self.crc32 = local.crc32;
        self.compressed_size = local.compressed_size;
        self.uncompressed_size = local.uncompressed_size;
    }
}

/// Local File Header (LFH) - 30 bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: Vec<u8>,
    pub extra_fields: Vec<ExtraField>,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = 0x04034b50;
    pub const SIZE: usize = 30;

    pub fn read<R: Read + Seek>(reader: &mut R) -> io::Result<Option<Self>> {
        read_record(reader, |r| {
            if r.read_u32::<LittleEndian>()? != Self::SIGNATURE {
                return Ok(None);
            }
            let version_needed = r.read_u16::<LittleEndian>()?;
            let flags = r.read_u16::<LittleEndian>()?;
            let compression_method = r.read_u16::<LittleEndian>()?;
            let last_mod_time = r.read_u16::<LittleEndian>()?;
            let last_mod_date = r.read_u16::<LittleEndian>()?;
            let crc32 = r.read_u32::<LittleEndian>()?;
            let compressed_size = r.read_u32::<LittleEndian>()?;
            let uncompressed_size = r.read_u32::<LittleEndian>()?;
            let file_name_length = r.read_u16::<LittleEndian>()?;
            let extra_field_length = r.read_u16::<LittleEndian>()?;

            let file_name = read_bytes(r, file_name_length)?;
            let extra_fields = ExtraField::read_all(r, extra_field_length)?;

            Ok(Some(Self {
                version_needed,
                flags,
                compression_method,
                last_mod_time,
                last_mod_date,
                crc32,
                compressed_size,
                uncompressed_size,
                file_name,
                extra_fields,
            }))
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let file_name_length = length_u16(self.file_name.len(), "file name")?;
        let extra_field_length = ExtraField::total_len(&self.extra_fields)?;

        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method)?;
        writer.write_u16::<LittleEndian>(self.last_mod_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(file_name_length)?;
        writer.write_u16::<LittleEndian>(extra_field_length)?;

        writer.write_all(&self.file_name)?;
        ExtraField::write_all(&self.extra_fields, writer)
    }

    /// Serialized size of this header, i.e. the distance from its signature
    /// to the first byte of compressed data.
    pub fn serialized_size(&self) -> usize {
        Self::SIZE + self.file_name.len() + self.extra_fields.iter().map(ExtraField::size).sum::<usize>()
    }

    /// Copy every shared field from the central directory header.
    pub fn sync_with_central(&mut self, central: &CentralDirectoryHeader) {
        self.version_needed = central.version_needed;
        self.flags = central.flags;
        self.compression_method = central.compression_method;
        self.last_mod_time = central.last_mod_time;
        self.last_mod_date = central.last_mod_date;
        self.crc32 = central.crc32;
        self.compressed_size = central.compressed_size;
        self.uncompressed_size = central.uncompressed_size;
        self.file_name = central.file_name.clone();
    }

    pub fn data_descriptor(&self) -> DataDescriptor {
        DataDescriptor {
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
        }
    }
}

/// Trailer written after compressed data when the sizes and CRC-32 were not
/// known before compression (general purpose bit 3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub const SIGNATURE: u32 = 0x08074b50;

    /// Read a descriptor; its leading signature is optional.
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let first = reader.read_u32::<LittleEndian>()?;
        let crc32 = if first == Self::SIGNATURE {
            reader.read_u32::<LittleEndian>()?
        } else {
            first
        };
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        Ok(Self {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }

    /// Write the descriptor, always with its signature.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_central() -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            version_made_by: 63,
            version_needed: 20,
            flags: 0x0008,
            compression_method: 8,
            last_mod_time: 0x6a21,
            last_mod_date: 0x5821,
            crc32: 0xdeadbeef,
            compressed_size: 12,
            uncompressed_size: 40,
            external_attributes: 32,
            local_header_offset: 1234,
            file_name: b"dir/file.txt".to_vec(),
            extra_fields: vec![
                ExtraField::new(0x5455, vec![1, 2, 3, 4, 5]),
                ExtraField::new(0xcafe, vec![]),
            ],
            comment: b"note".to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_central_header_layout() {
        let header = sample_central();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();

        assert_eq!(buf.len(), CentralDirectoryHeader::MIN_SIZE + 12 + 9 + 4 + 4);
        assert_eq!(&buf[0..4], b"PK\x01\x02");
        // name, extra and comment lengths are recomputed from the contents
        assert_eq!(u16::from_le_bytes([buf[28], buf[29]]), 12);
        assert_eq!(u16::from_le_bytes([buf[30], buf[31]]), 13);
        assert_eq!(u16::from_le_bytes([buf[32], buf[33]]), 4);
        assert_eq!(i32::from_le_bytes(buf[42..46].try_into().unwrap()), 1234);

        let parsed = CentralDirectoryHeader::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, Some(header));
    }

    #[test]
    fn test_signature_mismatch_rewinds() {
        let mut buf = vec![0xAAu8; 3];
        LocalFileHeader::default().write(&mut buf).unwrap();
        let mut cursor = Cursor::new(&buf);
        cursor.set_position(1);

        assert!(CentralDirectoryHeader::read(&mut cursor).unwrap().is_none());
        assert_eq!(cursor.position(), 1);
        assert!(LocalFileHeader::read(&mut cursor).unwrap().is_none());
        assert_eq!(cursor.position(), 1);

        cursor.set_position(3);
        assert!(LocalFileHeader::read(&mut cursor).unwrap().is_some());
    }

    #[test]
    fn test_short_read_rewinds() {
        let mut buf = Vec::new();
        sample_central().write(&mut buf).unwrap();
        buf.truncate(50);
        let mut cursor = Cursor::new(&buf);
        assert!(CentralDirectoryHeader::read(&mut cursor).unwrap().is_none());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_malformed_extra_field_skips_to_declared_end() {
        let mut buf = Vec::new();
        LocalFileHeader {
            file_name: b"a".to_vec(),
            ..Default::default()
        }
        .write(&mut buf)
        .unwrap();
        // Declare 3 bytes of extra data that do not form a tag/size tuple
        buf[28] = 3;
        buf.extend_from_slice(&[0x01, 0x02, 0x03]);
        buf.extend_from_slice(b"DATA");

        let mut cursor = Cursor::new(&buf);
        let header = LocalFileHeader::read(&mut cursor).unwrap().unwrap();
        assert!(header.extra_fields.is_empty());
        assert_eq!(cursor.position(), 34);
    }

    #[test]
    fn test_eocd_with_comment() {
        let eocd = EndOfCentralDirectory {
            disk_entries: 2,
            total_entries: 2,
            cd_size: 100,
            cd_offset: 200,
            comment: b"hello zip".to_vec(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        eocd.write(&mut buf).unwrap();
        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE + 9);
        assert_eq!(&buf[..4], b"PK\x05\x06");
        let parsed = EndOfCentralDirectory::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, Some(eocd));
    }

    #[test]
    fn test_data_descriptor_signature_is_optional() {
        let descriptor = DataDescriptor {
            crc32: 0x11223344,
            compressed_size: 7,
            uncompressed_size: 9,
        };
        let mut with_signature = Vec::new();
        descriptor.write(&mut with_signature).unwrap();
        assert_eq!(with_signature.len(), 16);
        assert_eq!(DataDescriptor::read(&mut &with_signature[..]).unwrap(), descriptor);

        let without_signature = &with_signature[4..];
        assert_eq!(DataDescriptor::read(&mut &without_signature[..]).unwrap(), descriptor);
    }

    #[test]
    fn test_local_syncs_from_central() {
        let central = sample_central();
        let mut local = LocalFileHeader::default();
        local.sync_with_central(&central);
        assert_eq!(local.file_name, central.file_name);
        assert_eq!(local.crc32, central.crc32);
        assert_eq!(local.flags, central.flags);
        assert_eq!(local.serialized_size(), LocalFileHeader::SIZE + 12);
    }
}
