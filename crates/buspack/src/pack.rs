use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::BuildHasher;
use std::sync::Arc;

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::fault::Fault;

/// Types that write themselves as exactly one item.
pub trait Pack {
    fn pack(&self, enc: &mut Encoder) -> Result<()>;
}

/// Types that read themselves back from exactly one item.
pub trait Unpack: Sized {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self>;

    /// The value used when there is nothing on the wire at all: an empty
    /// payload, or a record field the writer did not send.
    ///
    /// Defaults to `Error::Absent`; optional-like types return their empty value.
    fn absent() -> Result<Self> {
        Err(crate::error::Error::Absent)
    }
}

for_each_scalar!(pack_scalar);

impl Pack for () {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.unit()
    }
}

impl Unpack for () {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.unit()
    }

    fn absent() -> Result<Self> {
        Ok(())
    }
}

impl Pack for str {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.str(self)
    }
}

impl Pack for String {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.str(self)
    }
}

impl Unpack for String {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(dec.str()?.to_owned())
    }
}

impl<T: Pack + ?Sized> Pack for &T {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        (**self).pack(enc)
    }
}

impl<T: Pack + ?Sized> Pack for Box<T> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        (**self).pack(enc)
    }
}

impl<T: Unpack> Unpack for Box<T> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        T::unpack(dec).map(Box::new)
    }

    fn absent() -> Result<Self> {
        T::absent().map(Box::new)
    }
}

impl<T: Pack + ?Sized> Pack for Arc<T> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        (**self).pack(enc)
    }
}

impl<T: Pack> Pack for Option<T> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        match self {
            None => enc.null(),
            Some(value) => {
                enc.some_begin()?;
                value.pack(enc)?;
                enc.some_end()
            }
        }
    }
}

impl<T: Unpack> Unpack for Option<T> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        match dec.option()? {
            None => Ok(None),
            Some(mut inner) => T::unpack(&mut inner).map(Some),
        }
    }

    fn absent() -> Result<Self> {
        Ok(None)
    }
}

impl<T: Pack> Pack for [T] {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.seq_begin()?;
        for item in self {
            item.pack(enc)?;
        }
        enc.seq_end()
    }
}

impl<T: Pack> Pack for Vec<T> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        self.as_slice().pack(enc)
    }
}

impl<T: Unpack> Unpack for Vec<T> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        let mut out = Vec::new();
        for item in dec.seq()? {
            out.push(T::unpack(&mut item?)?);
        }
        Ok(out)
    }
}

impl<T: Pack> Pack for VecDeque<T> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.seq_begin()?;
        for item in self {
            item.pack(enc)?;
        }
        enc.seq_end()
    }
}

impl<T: Unpack> Unpack for VecDeque<T> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        Vec::unpack(dec).map(VecDeque::from)
    }
}

fn pack_entries<'a, V: Pack + 'a>(
    enc: &mut Encoder,
    entries: impl Iterator<Item = (&'a String, &'a V)>,
) -> Result<()> {
    enc.map_begin()?;
    for (key, value) in entries {
        enc.entry(key, value)?;
    }
    enc.map_end()
}

impl<V: Pack, S> Pack for HashMap<String, V, S> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        pack_entries(enc, self.iter())
    }
}

impl<V: Unpack, S: BuildHasher + Default> Unpack for HashMap<String, V, S> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        let mut out = HashMap::with_hasher(S::default());
        for entry in dec.map()? {
            let (key, mut value) = entry?;
            out.insert(key.to_owned(), V::unpack(&mut value)?);
        }
        Ok(out)
    }
}

impl<V: Pack> Pack for BTreeMap<String, V> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        pack_entries(enc, self.iter())
    }
}

impl<V: Unpack> Unpack for BTreeMap<String, V> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        let mut out = BTreeMap::new();
        for entry in dec.map()? {
            let (key, mut value) = entry?;
            out.insert(key.to_owned(), V::unpack(&mut value)?);
        }
        Ok(out)
    }
}

impl Pack for Fault {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.fault(self)
    }
}

impl Unpack for Fault {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.fault()
    }
}
