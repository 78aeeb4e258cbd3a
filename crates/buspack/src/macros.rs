//! Scalar tables. Each callback receives the method name, the Rust type,
//! the tag variant and the encoded width in bytes.

/// Fixed-width numbers that round-trip through `to_le_bytes`.
macro_rules! for_each_number {
    ($m:ident) => {
        $m!(u16, u16, crate::tag::Tag::U16, 2);
        $m!(i16, i16, crate::tag::Tag::I16, 2);
        $m!(u32, u32, crate::tag::Tag::U32, 4);
        $m!(i32, i32, crate::tag::Tag::I32, 4);
        $m!(u64, u64, crate::tag::Tag::U64, 8);
        $m!(i64, i64, crate::tag::Tag::I64, 8);
        $m!(f32, f32, crate::tag::Tag::F32, 4);
        $m!(f64, f64, crate::tag::Tag::F64, 8);
    };
}

/// Every scalar with a direct `Encoder`/`Decoder` method of the same name.
macro_rules! for_each_scalar {
    ($m:ident) => {
        $m!(bool, bool);
        $m!(u8, u8);
        $m!(i8, i8);
        $m!(char, char);
        for_each_number!(__number_as_scalar);
    };
}

macro_rules! __number_as_scalar {
    ($name:ident, $ty:ty, $tag:expr, $width:literal) => {
        pack_scalar!($name, $ty);
    };
}

/// `Encoder` method for one fixed-width number.
macro_rules! encode_number {
    ($name:ident, $ty:ty, $tag:expr, $width:literal) => {
        #[doc = concat!("Encodes a `", stringify!($ty), "` (LE).")]
        pub fn $name(&mut self, v: $ty) -> Result<()> {
            self.write_tag($tag)?;
            self.buf.extend_from_slice(&v.to_le_bytes());
            self.on_item_written();
            Ok(())
        }
    };
}

/// `Decoder` method for one fixed-width number.
macro_rules! decode_number {
    ($name:ident, $ty:ty, $tag:expr, $width:literal) => {
        #[doc = concat!("Decodes a `", stringify!($ty), "` (LE).")]
        pub fn $name(&mut self) -> Result<$ty> {
            self.expect_tag($tag)?;
            Ok(<$ty>::from_le_bytes(self.read_array::<$width>()?))
        }
    };
}

/// `Pack`/`Unpack` for a scalar that maps onto one codec method.
macro_rules! pack_scalar {
    ($name:ident, $ty:ty) => {
        impl crate::pack::Pack for $ty {
            fn pack(&self, enc: &mut crate::encoder::Encoder) -> crate::error::Result<()> {
                enc.$name(*self)
            }
        }

        impl crate::pack::Unpack for $ty {
            fn unpack(dec: &mut crate::decoder::Decoder<'_>) -> crate::error::Result<Self> {
                dec.$name()
            }
        }
    };
}
