use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::container::Instantiators;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::fault::Fault;
use crate::pack::Pack;
use crate::pack::Unpack;

/// An encoder scratch buffer bundled with the instantiators used on decode.
///
/// A `Codec` is not shared between threads; see `CodecConfig::with_codec`
/// for getting one per thread.
pub struct Codec {
    scratch: Encoder,
    instantiators: Arc<Instantiators>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    pub fn new() -> Self {
        Self::with_instantiators(Arc::new(Instantiators::standard()))
    }

    pub fn with_instantiators(instantiators: Arc<Instantiators>) -> Self {
        Self { scratch: Encoder::new(), instantiators }
    }

    pub fn instantiators(&self) -> &Instantiators {
        &self.instantiators
    }

    /// Encodes one value.
    pub fn encode<T: Pack + ?Sized>(&mut self, value: &T) -> Result<Vec<u8>> {
        self.encode_with(|enc| value.pack(enc))
    }

    /// Encodes whatever `write` puts at the root, in order.
    pub fn encode_with(&mut self, write: impl FnOnce(&mut Encoder) -> Result<()>) -> Result<Vec<u8>> {
        self.scratch.clear();
        let written = write(&mut self.scratch);
        let bytes = written.and_then(|()| self.scratch.as_bytes().map(<[u8]>::to_vec));
        self.scratch.clear();
        bytes
    }

    pub fn decoder<'a>(&'a self, bytes: &'a [u8]) -> Decoder<'a> {
        Decoder::with_instantiators(bytes, &self.instantiators)
    }

    /// Decodes exactly one value.
    ///
    /// An empty payload decodes as `T::absent()`.
    pub fn decode<T: Unpack>(&self, bytes: &[u8]) -> Result<T> {
        if bytes.is_empty() {
            return T::absent();
        }
        let mut dec = self.decoder(bytes);
        let value = T::unpack(&mut dec)?;
        dec.finish()?;
        Ok(value)
    }

    /// Decodes either a value or the fault sent in its place.
    pub fn decode_outcome<T: Unpack>(&self, bytes: &[u8]) -> Result<std::result::Result<T, Fault>> {
        if self.decoder(bytes).is_fault() {
            return self.decode::<Fault>(bytes).map(Err);
        }
        self.decode::<T>(bytes).map(Ok)
    }
}

static NEXT_CONFIG_ID: AtomicU64 = AtomicU64::new(1);

static STANDARD: OnceLock<CodecConfig> = OnceLock::new();

/// A thread's codec for one config, kept while any clone of the config lives.
struct Cached {
    alive: Weak<()>,
    codec: Codec,
}

thread_local! {
    static CODECS: RefCell<HashMap<u64, Cached>> = RefCell::new(HashMap::new());
}

/// Shareable codec settings.
///
/// Cloning is cheap and clones share the same per-thread codecs. Once the
/// last clone is dropped, its codecs are released the next time a thread
/// builds a codec for another config.
#[derive(Clone, Debug)]
pub struct CodecConfig {
    id: u64,
    instantiators: Arc<Instantiators>,
    alive: Arc<()>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecConfig {
    /// Standard settings. Every call returns a clone of the same config.
    pub fn new() -> Self {
        STANDARD.get_or_init(|| Self::builder().build()).clone()
    }

    pub fn builder() -> CodecConfigBuilder {
        CodecConfigBuilder { instantiators: Instantiators::standard() }
    }

    pub fn instantiators(&self) -> &Instantiators {
        &self.instantiators
    }

    /// Runs `f` with this thread's codec for these settings.
    ///
    /// Each thread lazily builds one codec per config and reuses it. A
    /// nested call on the same thread gets a private codec instead.
    pub fn with_codec<R>(&self, f: impl FnOnce(&mut Codec) -> R) -> R {
        CODECS.with(|cell| match cell.try_borrow_mut() {
            Ok(mut codecs) => {
                if !codecs.contains_key(&self.id) {
                    codecs.retain(|_, cached| cached.alive.strong_count() > 0);
                    let codec = Codec::with_instantiators(self.instantiators.clone());
                    codecs.insert(self.id, Cached { alive: Arc::downgrade(&self.alive), codec });
                }
                match codecs.get_mut(&self.id) {
                    Some(cached) => f(&mut cached.codec),
                    None => f(&mut Codec::with_instantiators(self.instantiators.clone())),
                }
            }
            Err(_) => f(&mut Codec::with_instantiators(self.instantiators.clone())),
        })
    }
}

/// Number of codecs cached on the calling thread.
#[cfg(test)]
pub(crate) fn cached_codecs() -> usize {
    CODECS.with(|cell| cell.borrow().len())
}

pub struct CodecConfigBuilder {
    instantiators: Instantiators,
}

impl CodecConfigBuilder {
    /// Registers (or replaces) the factory for an abstract container type.
    pub fn instantiator<T: ?Sized + 'static>(mut self, factory: fn() -> Box<T>) -> Self {
        self.instantiators.register::<T>(factory);
        self
    }

    /// Drops every factory registered so far, the standard ones included.
    pub fn without_defaults(mut self) -> Self {
        self.instantiators = Instantiators::empty();
        self
    }

    pub fn build(self) -> CodecConfig {
        CodecConfig {
            id: NEXT_CONFIG_ID.fetch_add(1, Ordering::Relaxed),
            instantiators: Arc::new(self.instantiators),
            alive: Arc::new(()),
        }
    }
}
