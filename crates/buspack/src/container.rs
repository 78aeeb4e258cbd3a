//! Abstract containers and the factories that build them.
//!
//! A field declared as `Box<dyn Mapping>` or `Box<dyn Sequence>` has no
//! concrete type to construct on decode. The decoder asks its
//! `Instantiators` for one; the standard set maps `dyn Mapping` to a
//! `HashMap` and `dyn Sequence` to a `Vec`.

use std::any::Any;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::OnceLock;

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::Error;
use crate::error::Result;
use crate::pack::Pack;
use crate::pack::Unpack;
use crate::value::Value;

/// An ordered, growable collection of values.
pub trait Sequence: std::fmt::Debug + Send + Sync {
    fn push(&mut self, item: Value);
    fn len(&self) -> usize;
    fn items(&self) -> Box<dyn Iterator<Item = &Value> + '_>;
    fn as_any(&self) -> &dyn Any;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A string-keyed collection of values.
pub trait Mapping: std::fmt::Debug + Send + Sync {
    fn insert(&mut self, key: String, value: Value);
    fn get(&self, key: &str) -> Option<&Value>;
    fn len(&self) -> usize;
    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_>;
    fn as_any(&self) -> &dyn Any;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sequence for Vec<Value> {
    fn push(&mut self, item: Value) { Vec::push(self, item) }
    fn len(&self) -> usize { Vec::len(self) }
    fn items(&self) -> Box<dyn Iterator<Item = &Value> + '_> { Box::new(self.iter()) }
    fn as_any(&self) -> &dyn Any { self }
}

impl Sequence for VecDeque<Value> {
    fn push(&mut self, item: Value) { self.push_back(item) }
    fn len(&self) -> usize { VecDeque::len(self) }
    fn items(&self) -> Box<dyn Iterator<Item = &Value> + '_> { Box::new(self.iter()) }
    fn as_any(&self) -> &dyn Any { self }
}

impl Mapping for HashMap<String, Value> {
    fn insert(&mut self, key: String, value: Value) { HashMap::insert(self, key, value); }
    fn get(&self, key: &str) -> Option<&Value> { HashMap::get(self, key) }
    fn len(&self) -> usize { HashMap::len(self) }
    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.as_str(), v)))
    }
    fn as_any(&self) -> &dyn Any { self }
}

impl Mapping for BTreeMap<String, Value> {
    fn insert(&mut self, key: String, value: Value) { BTreeMap::insert(self, key, value); }
    fn get(&self, key: &str) -> Option<&Value> { BTreeMap::get(self, key) }
    fn len(&self) -> usize { BTreeMap::len(self) }
    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.as_str(), v)))
    }
    fn as_any(&self) -> &dyn Any { self }
}

impl Pack for dyn Sequence {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.seq_begin()?;
        for item in self.items() {
            item.pack(enc)?;
        }
        enc.seq_end()
    }
}

impl Unpack for Box<dyn Sequence> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        let mut out = dec.instantiate::<dyn Sequence>()?;
        for item in dec.seq()? {
            out.push(Value::unpack(&mut item?)?);
        }
        Ok(out)
    }
}

impl Pack for dyn Mapping {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.map_begin()?;
        for (key, value) in self.entries() {
            enc.entry(key, value)?;
        }
        enc.map_end()
    }
}

impl Unpack for Box<dyn Mapping> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        let mut out = dec.instantiate::<dyn Mapping>()?;
        for entry in dec.map()? {
            let (key, mut value) = entry?;
            out.insert(key.to_owned(), Value::unpack(&mut value)?);
        }
        Ok(out)
    }
}

/// Factory stored in the registry, one per abstract type.
struct Factory<T: ?Sized>(fn() -> Box<T>);

/// Registry of factories for abstract container types.
pub struct Instantiators {
    factories: anymap::Map<dyn anymap::any::Any + Send + Sync>,
}

impl std::fmt::Debug for Instantiators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instantiators").field("len", &self.factories.len()).finish()
    }
}

impl Default for Instantiators {
    fn default() -> Self {
        Self::standard()
    }
}

fn new_hash_map() -> Box<dyn Mapping> {
    Box::new(HashMap::<String, Value>::new())
}

fn new_vec() -> Box<dyn Sequence> {
    Box::new(Vec::<Value>::new())
}

impl Instantiators {
    /// A registry with no factories at all.
    pub fn empty() -> Self {
        Self { factories: anymap::Map::new() }
    }

    /// `dyn Mapping` builds a `HashMap`, `dyn Sequence` builds a `Vec`.
    pub fn standard() -> Self {
        let mut out = Self::empty();
        out.register::<dyn Mapping>(new_hash_map);
        out.register::<dyn Sequence>(new_vec);
        out
    }

    /// Shared instance of `standard()`.
    pub fn standard_ref() -> &'static Instantiators {
        static STANDARD: OnceLock<Instantiators> = OnceLock::new();
        STANDARD.get_or_init(Instantiators::standard)
    }

    /// Registers (or replaces) the factory for `T`.
    pub fn register<T: ?Sized + 'static>(&mut self, factory: fn() -> Box<T>) -> &mut Self {
        self.factories.insert(Factory::<T>(factory));
        self
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.factories.contains::<Factory<T>>()
    }

    /// Builds a fresh `T`, or fails with `Error::NoInstantiator`.
    pub fn instantiate<T: ?Sized + 'static>(&self) -> Result<Box<T>> {
        match self.factories.get::<Factory<T>>() {
            Some(factory) => Ok((factory.0)()),
            None => Err(Error::NoInstantiator(std::any::type_name::<T>())),
        }
    }
}
