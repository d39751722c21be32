//! Byte-order conversion between a declared on-disk order and the host.
//!
//! `swap_ule32(v)` takes a value that was stored little-endian and returns
//! it in host order; on little-endian hosts it is the identity. The same
//! functions convert host values back to the declared order.

macro_rules! swaps {
    ($($name:ident: $ty:ty => $conv:ident;)*) => {
        $(
            #[inline]
            pub fn $name(value: $ty) -> $ty {
                <$ty>::$conv(value)
            }
        )*
    };
}

swaps! {
    swap_sle16: i16 => from_le;
    swap_ule16: u16 => from_le;
    swap_sle32: i32 => from_le;
    swap_ule32: u32 => from_le;
    swap_sle64: i64 => from_le;
    swap_ule64: u64 => from_le;
    swap_sbe16: i16 => from_be;
    swap_ube16: u16 => from_be;
    swap_sbe32: i32 => from_be;
    swap_ube32: u32 => from_be;
    swap_sbe64: i64 => from_be;
    swap_ube64: u64 => from_be;
}
