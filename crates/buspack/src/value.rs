use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::Error;
use crate::error::Result;
use crate::fault::Fault;
use crate::pack::Pack;
use crate::pack::Unpack;
use crate::tag::Tag;

/// A dynamically typed, owned value.
///
/// Decoding into `Value` accepts anything well-formed, so it is the type
/// to reach for when the shape of a payload is not known up front.
/// Integers widen to 64 bits and present optionals flatten to their payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Map(Vec<(String, Value)>),
    Record { name: String, fields: Vec<(String, Value)> },
    Fault(Box<Fault>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Looks up a key of a map or a field of a record.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) | Value::Record { fields: entries, .. } => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}

impl Pack for Value {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        match self {
            Value::Null => enc.null(),
            Value::Unit => enc.unit(),
            Value::Bool(v) => enc.bool(*v),
            Value::Int(v) => enc.i64(*v),
            Value::UInt(v) => enc.u64(*v),
            Value::Float(v) => enc.f64(*v),
            Value::Char(v) => enc.char(*v),
            Value::Str(v) => enc.str(v),
            Value::Bytes(v) => enc.bytes(v),
            Value::Seq(items) => {
                enc.seq_begin()?;
                for item in items {
                    item.pack(enc)?;
                }
                enc.seq_end()
            }
            Value::Map(entries) => {
                enc.map_begin()?;
                for (key, value) in entries {
                    enc.entry(key, value)?;
                }
                enc.map_end()
            }
            Value::Record { name, fields } => enc.record(name, |enc| {
                for (key, value) in fields {
                    enc.entry(key, value)?;
                }
                Ok(())
            }),
            Value::Fault(fault) => enc.fault(fault),
        }
    }
}

impl Unpack for Value {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        // Padding runs are skipped in place, never by recursion.
        let value = loop {
            break match dec.peek_tag()? {
                Tag::Pad => {
                    dec.skip()?;
                    continue;
                }
                Tag::True | Tag::False => Value::Bool(dec.bool()?),
                Tag::U8 => Value::UInt(dec.u8()?.into()),
                Tag::U16 => Value::UInt(dec.u16()?.into()),
                Tag::U32 => Value::UInt(dec.u32()?.into()),
                Tag::U64 => Value::UInt(dec.u64()?),
                Tag::I8 => Value::Int(dec.i8()?.into()),
                Tag::I16 => Value::Int(dec.i16()?.into()),
                Tag::I32 => Value::Int(dec.i32()?.into()),
                Tag::I64 => Value::Int(dec.i64()?),
                Tag::F32 => Value::Float(dec.f32()?.into()),
                Tag::F64 => Value::Float(dec.f64()?),
                Tag::Char => Value::Char(dec.char()?),
                Tag::Unit => {
                    dec.unit()?;
                    Value::Unit
                }
                Tag::Null => {
                    dec.null()?;
                    Value::Null
                }
                Tag::Str => Value::Str(dec.str()?.to_owned()),
                Tag::Bytes => Value::Bytes(dec.bytes()?.to_vec()),
                Tag::Seq => {
                    let mut items = Vec::new();
                    for item in dec.seq()? {
                        items.push(Value::unpack(&mut item?)?);
                    }
                    Value::Seq(items)
                }
                Tag::Map => {
                    let mut entries = Vec::new();
                    for entry in dec.map()? {
                        let (key, mut value) = entry?;
                        entries.push((key.to_owned(), Value::unpack(&mut value)?));
                    }
                    Value::Map(entries)
                }
                Tag::Some => match dec.option()? {
                    Some(mut inner) => Value::unpack(&mut inner)?,
                    None => Value::Null,
                },
                Tag::Record => {
                    let (name, fields) = dec.record_any()?;
                    let mut out = Vec::with_capacity(fields.len());
                    for (key, mut value) in fields.into_fields() {
                        out.push((key.to_owned(), Value::unpack(&mut value)?));
                    }
                    Value::Record { name: name.to_owned(), fields: out }
                }
                Tag::Fault => Value::Fault(Box::new(dec.fault()?)),
                Tag::Entry => return Err(Error::TypeMismatch { expected: Tag::Map, found: Tag::Entry }),
            };
        };
        Ok(value)
    }

    fn absent() -> Result<Self> {
        Ok(Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int(v.into()) }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self { Value::UInt(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.to_owned()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::Str(v) }
}

impl From<Fault> for Value {
    fn from(v: Fault) -> Self { Value::Fault(Box::new(v)) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}
