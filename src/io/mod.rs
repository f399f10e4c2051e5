//! Low-level byte reading.

mod byte_order;

pub use byte_order::ByteOrder;
