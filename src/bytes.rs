//! re-export of the `bytes` crate types used by this crate.

pub use ::bytes::{Buf, BufMut, Bytes, BytesMut};
