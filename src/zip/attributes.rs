use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

// General purpose bit flags
pub const FLAG_ENCRYPTED: u16 = 0x0001; // bit 0: traditional PKWARE encryption
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008; // bit 3: crc and sizes follow the data
pub const FLAG_UNICODE_NAME: u16 = 0x0800; // bit 11: name and comment are UTF-8

pub const VERSION_MADE_BY: u16 = 63;
pub const VERSION_NEEDED_DEFAULT: u16 = 10;
pub const VERSION_NEEDED_DIRECTORY: u16 = 20;

/// MS-DOS external file attributes.
///
/// Bits outside the named constants (for example Unix mode bits in the upper
/// half) pass through untouched.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Attributes(u32);

impl Attributes {
    pub const NONE: Self = Self(0);
    pub const READ_ONLY: Self = Self(1);
    pub const HIDDEN: Self = Self(2);
    pub const SYSTEM: Self = Self(4);
    pub const DIRECTORY: Self = Self(16);
    pub const ARCHIVE: Self = Self(32);
    pub const DEVICE: Self = Self(64);
    pub const NORMAL: Self = Self(128);
    pub const TEMPORARY: Self = Self(256);
    pub const SPARSE_FILE: Self = Self(512);
    pub const REPARSE_POINT: Self = Self(1024);
    pub const COMPRESSED: Self = Self(2048);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for Attributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Attributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Attributes {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Attributes {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Attributes, &str); 11] = [
            (Attributes::READ_ONLY, "ReadOnly"),
            (Attributes::HIDDEN, "Hidden"),
            (Attributes::SYSTEM, "System"),
            (Attributes::DIRECTORY, "Directory"),
            (Attributes::ARCHIVE, "Archive"),
            (Attributes::DEVICE, "Device"),
            (Attributes::NORMAL, "Normal"),
            (Attributes::TEMPORARY, "Temporary"),
            (Attributes::SPARSE_FILE, "SparseFile"),
            (Attributes::REPARSE_POINT, "ReparsePoint"),
            (Attributes::COMPRESSED, "Compressed"),
        ];
        let names: Vec<_> = NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "Attributes({:#x}: {})", self.0, names.join(" | "))
    }
}
