//! Compression method registry.
//!
//! A method is a capability object: it knows its numeric code, the minimum
//! ZIP version a reader needs to extract it, and how to wrap a sink with an
//! encoder or a source with a decoder. New methods are added by registering
//! another [`CompressionMethod`] implementation; the lookup itself never
//! changes.

mod deflate;
mod lzma;
mod store;

pub use deflate::Deflate;
pub use lzma::Lzma;
pub use store::Store;

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, LazyLock};

/// Streaming encoder produced by [`CompressionMethod::encoder`].
pub trait Encoder: Write {
    /// Flush any buffered state and write the method's trailer, if any.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// What a decoder may need to know about the entry it decodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeParams {
    /// Uncompressed size recorded in the entry's headers
    pub uncompressed_size: u64,
    /// General purpose bit flags of the entry
    pub flags: u16,
}

/// Upper bound for buffer reservations derived from header sizes.
pub(crate) const MAX_CAPACITY_HINT: u64 = 1 << 20;

impl DecodeParams {
    /// Initial capacity for a buffer of the decoded data. Header sizes are
    /// not trusted beyond [`MAX_CAPACITY_HINT`].
    pub fn capacity_hint(&self) -> usize {
        self.uncompressed_size.min(MAX_CAPACITY_HINT) as usize
    }
}

/// A pluggable compression method.
pub trait CompressionMethod: Send + Sync {
    /// Method code stored in the headers
    fn code(&self) -> u16;

    /// Short lowercase name, e.g. `deflate`
    fn name(&self) -> &'static str;

    /// Minimum "version needed to extract" for entries using this method
    fn version_needed(&self) -> u16;

    /// General purpose bits that entries written by this method must carry
    fn required_flags(&self) -> u16 {
        0
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn Encoder + 'a>>;

    fn decoder<'a>(
        &self,
        source: Box<dyn Read + 'a>,
        params: DecodeParams,
    ) -> io::Result<Box<dyn Read + 'a>>;
}

impl std::fmt::Debug for dyn CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// Maps method codes to method implementations.
#[derive(Clone)]
pub struct MethodRegistry {
    methods: HashMap<u16, Arc<dyn CompressionMethod>>,
}

static DEFAULT_REGISTRY: LazyLock<Arc<MethodRegistry>> =
    LazyLock::new(|| Arc::new(MethodRegistry::default()));

impl MethodRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Shared registry holding the built-in methods.
    pub fn shared() -> Arc<MethodRegistry> {
        DEFAULT_REGISTRY.clone()
    }

    /// Add a method, replacing any previous one with the same code.
    pub fn register(&mut self, method: Arc<dyn CompressionMethod>) {
        self.methods.insert(method.code(), method);
    }

    /// Look a method up by code. `None` means the entry cannot be decompressed.
    pub fn resolve(&self, code: u16) -> Option<Arc<dyn CompressionMethod>> {
        self.methods.get(&code).cloned()
    }

    /// Look a method up by its short name, ignoring case.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn CompressionMethod>> {
        self.methods
            .values()
            .find(|m| m.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.methods.keys().copied()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Store));
        registry.register(Arc::new(Deflate::default()));
        registry.register(Arc::new(Lzma));
        registry
    }
}
