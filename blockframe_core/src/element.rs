//! Numeric element types the typed write/read adapters accept.
//!
//! Adapters copy elements as raw bytes in the platform's native layout.
//! No byte-order conversion happens, so the producer and the consumer of a
//! stream must agree on endianness out of band.

use bytemuck::Pod;

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width numeric type of 1, 2, 4 or 8 bytes.
///
/// Sealed: only the primitive integers and floats below implement it.
pub trait Element: Pod + sealed::Sealed {
    const WIDTH: usize = std::mem::size_of::<Self>();
}

macro_rules! element {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}
            impl Element for $t {}
        )*
    };
}

element!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Convert an `(offset, count)` element range over `len` elements into the
/// matching byte range. `None` when the range does not fit.
pub(crate) fn byte_range<T: Element>(len: usize, offset: usize, count: usize) -> Option<(usize, usize)> {
    let end = offset.checked_add(count)?;
    if end > len {
        return None;
    }
    Some((offset * T::WIDTH, count * T::WIDTH))
}
