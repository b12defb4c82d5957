//! Arithmetic and byte-merge helpers shared by the execute stage.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use crate::memory::{AccessWidth, Endianness};

const SIGN_32: u32 = 0x8000_0000;
const SIGN_64: u64 = 0x8000_0000_0000_0000;

/// Sign-extends a 16-bit immediate to 64 bits.
#[must_use]
pub const fn sign_extend_16(value: u16) -> u64 {
    value as i16 as i64 as u64
}

/// Sign-extends the low 32 bits of `value` to 64 bits.
#[must_use]
pub const fn sign_extend_32(value: u64) -> u64 {
    value as u32 as i32 as i64 as u64
}

/// Sign-extends the low `width` bits of `value` to 64 bits.
#[must_use]
pub const fn sign_extend(value: u64, width: AccessWidth) -> u64 {
    match width {
        AccessWidth::Byte => value as u8 as i8 as i64 as u64,
        AccessWidth::Half => value as u16 as i16 as i64 as u64,
        AccessWidth::Word => sign_extend_32(value),
        AccessWidth::Double => value,
    }
}

/// 32-bit add; `None` when the carry into bit 31 differs from the carry out.
#[must_use]
pub const fn checked_add_32(a: u64, b: u64) -> Option<u64> {
    let (a, b) = (a as u32, b as u32);
    let sum = a.wrapping_add(b);
    if !(a ^ b) & (a ^ sum) & SIGN_32 == 0 {
        Some(sign_extend_32(sum as u64))
    } else {
        None
    }
}

/// 32-bit subtract; `None` on two's-complement overflow.
#[must_use]
pub const fn checked_sub_32(a: u64, b: u64) -> Option<u64> {
    let (a, b) = (a as u32, b as u32);
    let diff = a.wrapping_sub(b);
    if (a ^ b) & (a ^ diff) & SIGN_32 == 0 {
        Some(sign_extend_32(diff as u64))
    } else {
        None
    }
}

/// 64-bit add; `None` when the carry into bit 63 differs from the carry out.
#[must_use]
pub const fn checked_add_64(a: u64, b: u64) -> Option<u64> {
    let sum = a.wrapping_add(b);
    if !(a ^ b) & (a ^ sum) & SIGN_64 == 0 {
        Some(sum)
    } else {
        None
    }
}

/// 64-bit subtract; `None` on two's-complement overflow.
#[must_use]
pub const fn checked_sub_64(a: u64, b: u64) -> Option<u64> {
    let diff = a.wrapping_sub(b);
    if (a ^ b) & (a ^ diff) & SIGN_64 == 0 {
        Some(diff)
    } else {
        None
    }
}

/// Index of the addressed byte counted from the most significant end of
/// the aligned container, whatever the byte order.
const fn leading_index(address: u64, width: AccessWidth, endianness: Endianness) -> u64 {
    let offset = address % width.bytes();
    match endianness {
        Endianness::Big => offset,
        Endianness::Little => width.bytes() - 1 - offset,
    }
}

/// Merge for `lwl`/`ldl`: the bytes from the addressed one to the least
/// significant end of the container fill the register from the top.
#[must_use]
pub const fn merge_load_left(
    register: u64,
    container: u64,
    address: u64,
    width: AccessWidth,
    endianness: Endianness,
) -> u64 {
    let shift = 8 * leading_index(address, width, endianness);
    let kept = if shift == 0 { 0 } else { (1u64 << shift) - 1 };
    ((register & kept) | (container << shift)) & width.mask()
}

/// Merge for `lwr`/`ldr`: the bytes from the most significant end of the
/// container up to the addressed one fill the register from the bottom.
#[must_use]
pub const fn merge_load_right(
    register: u64,
    container: u64,
    address: u64,
    width: AccessWidth,
    endianness: Endianness,
) -> u64 {
    let shift = 8 * (width.bytes() - 1 - leading_index(address, width, endianness));
    let loaded = width.mask() >> shift;
    ((register & !loaded) | ((container >> shift) & loaded)) & width.mask()
}

/// Merge for `swl`/`sdl`: the top of the register overwrites the container
/// from the addressed byte to its least significant end.
#[must_use]
pub const fn merge_store_left(
    register: u64,
    container: u64,
    address: u64,
    width: AccessWidth,
    endianness: Endianness,
) -> u64 {
    let shift = 8 * leading_index(address, width, endianness);
    let stored = width.mask() >> shift;
    ((container & !stored) | (((register & width.mask()) >> shift) & stored)) & width.mask()
}

/// Merge for `swr`/`sdr`: the bottom of the register overwrites the
/// container from its most significant end up to the addressed byte.
#[must_use]
pub const fn merge_store_right(
    register: u64,
    container: u64,
    address: u64,
    width: AccessWidth,
    endianness: Endianness,
) -> u64 {
    let shift = 8 * (width.bytes() - 1 - leading_index(address, width, endianness));
    let stored = (width.mask() << shift) & width.mask();
    ((container & !stored) | ((register << shift) & stored)) & width.mask()
}
