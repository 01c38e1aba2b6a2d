//! Protobuf wire-format primitives used by the message envelope.

use bytes::{Buf, BufMut};

use crate::DecodeError;

pub(crate) const WIRE_VARINT: u8 = 0;
pub(crate) const WIRE_FIXED64: u8 = 1;
pub(crate) const WIRE_LEN: u8 = 2;
pub(crate) const WIRE_FIXED32: u8 = 5;

pub(crate) fn put_varint(dst: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        dst.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

fn put_key(dst: &mut impl BufMut, field: u32, wire_type: u8) {
    put_varint(dst, (u64::from(field) << 3) | u64::from(wire_type));
}

pub(crate) fn put_bytes(dst: &mut impl BufMut, field: u32, data: &[u8]) {
    put_key(dst, field, WIRE_LEN);
    put_varint(dst, data.len() as u64);
    dst.put_slice(data);
}

pub(crate) fn put_uint32(dst: &mut impl BufMut, field: u32, value: u32) {
    put_key(dst, field, WIRE_VARINT);
    put_varint(dst, u64::from(value));
}

pub(crate) fn get_varint(src: &mut impl Buf) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        if !src.has_remaining() {
            return Err(DecodeError::Truncated("varint"));
        }
        let byte = src.get_u8();
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::VarintOverflow)
}

/// Read a field key, returning `(field_number, wire_type)`.
pub(crate) fn get_key(src: &mut impl Buf) -> Result<(u32, u8), DecodeError> {
    let key = get_varint(src)?;
    Ok(((key >> 3) as u32, (key & 0x07) as u8))
}

pub(crate) fn get_len_delimited(src: &mut impl Buf) -> Result<Vec<u8>, DecodeError> {
    let len = get_varint(src)? as usize;
    if src.remaining() < len {
        return Err(DecodeError::Truncated("length-delimited field"));
    }
    let mut out = vec![0u8; len];
    src.copy_to_slice(&mut out);
    Ok(out)
}

pub(crate) fn get_string(src: &mut impl Buf, field: u32) -> Result<String, DecodeError> {
    String::from_utf8(get_len_delimited(src)?).map_err(|_| DecodeError::Utf8(field))
}

/// Skip over a field this decoder does not know about.
pub(crate) fn skip_field(src: &mut impl Buf, field: u32, wire_type: u8) -> Result<(), DecodeError> {
    let width = match wire_type {
        WIRE_VARINT => {
            get_varint(src)?;
            return Ok(());
        }
        WIRE_LEN => get_varint(src)? as usize,
        WIRE_FIXED64 => 8,
        WIRE_FIXED32 => 4,
        _ => return Err(DecodeError::WireType { field, wire_type }),
    };
    if src.remaining() < width {
        return Err(DecodeError::Truncated("skipped field"));
    }
    src.advance(width);
    Ok(())
}
