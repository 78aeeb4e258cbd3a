//! Positional argument lists.
//!
//! A request body is the method's arguments written one after another at
//! the root of the payload, in declaration order. No arguments means an
//! empty body, which the server never looks at.

use buspack::Codec;
use buspack::Decoder;
use buspack::Encoder;
use buspack::Pack;
use buspack::Unpack;

/// A tuple of arguments.
pub trait Args: Sized + Send + 'static {
    const ARITY: usize;

    fn encode(&self, enc: &mut Encoder) -> buspack::Result<()>;

    fn decode(dec: &mut Decoder<'_>) -> buspack::Result<Self>;
}

impl Args for () {
    const ARITY: usize = 0;

    fn encode(&self, _enc: &mut Encoder) -> buspack::Result<()> {
        Ok(())
    }

    fn decode(_dec: &mut Decoder<'_>) -> buspack::Result<Self> {
        Ok(())
    }
}

macro_rules! impl_args {
    ($arity:literal; $($name:ident),+) => {
        impl<$($name),+> Args for ($($name,)+)
        where
            $($name: Pack + Unpack + Send + 'static),+
        {
            const ARITY: usize = $arity;

            #[allow(non_snake_case)]
            fn encode(&self, enc: &mut Encoder) -> buspack::Result<()> {
                let ($($name,)+) = self;
                $($name.pack(enc)?;)+
                Ok(())
            }

            fn decode(dec: &mut Decoder<'_>) -> buspack::Result<Self> {
                Ok(($(<$name as Unpack>::unpack(dec)?,)+))
            }
        }
    };
}

impl_args!(1; A);
impl_args!(2; A, B);
impl_args!(3; A, B, C);
impl_args!(4; A, B, C, D);
impl_args!(5; A, B, C, D, E);
impl_args!(6; A, B, C, D, E, F);
impl_args!(7; A, B, C, D, E, F, G);
impl_args!(8; A, B, C, D, E, F, G, H);

/// Writes a request body.
pub fn encode_body<A: Args>(codec: &mut Codec, args: &A) -> buspack::Result<Vec<u8>> {
    if A::ARITY == 0 {
        return Ok(Vec::new());
    }
    codec.encode_with(|enc| args.encode(enc))
}

/// Reads a request body, which must hold exactly `A::ARITY` values.
pub fn decode_body<A: Args>(codec: &Codec, body: &[u8]) -> buspack::Result<A> {
    let mut dec = codec.decoder(body);
    if A::ARITY == 0 {
        return A::decode(&mut dec);
    }
    let args = A::decode(&mut dec)?;
    dec.finish()?;
    Ok(args)
}
