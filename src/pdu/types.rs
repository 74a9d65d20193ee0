//! Wire-level field helpers: C-Octet Strings, Octet Strings and the fixed
//! integer widths SMPP v3.4 PDU bodies are built from.

use bytes::{Buf, BufMut, BytesMut};

use super::error::CodecError;

/// Reads a NUL-terminated ASCII string from `src`, advancing past the
/// terminator. Fails if no NUL byte appears before `src` is exhausted.
pub fn read_coctet_string(src: &mut BytesMut) -> Result<String, CodecError> {
    let nul_pos = src.iter().position(|&b| b == 0).ok_or_else(|| {
        CodecError::malformed("C-Octet String has no NUL terminator in remaining bytes")
    })?;
    let bytes = src.split_to(nul_pos);
    src.advance(1); // consume the NUL
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CodecError::malformed("C-Octet String is not valid ASCII"))
}

/// Writes `value` as a NUL-terminated C-Octet String, failing if the
/// encoded length (including the NUL) would exceed `max_len`.
pub fn write_coctet_string(
    dst: &mut BytesMut,
    field: &str,
    value: &str,
    max_len: usize,
) -> Result<(), CodecError> {
    if value.len() + 1 > max_len {
        return Err(CodecError::encoding(format!(
            "{field} is {} bytes, max is {} (excluding NUL)",
            value.len(),
            max_len - 1
        )));
    }
    dst.put_slice(value.as_bytes());
    dst.put_u8(0);
    Ok(())
}

/// Reads a single unsigned byte.
pub fn read_u8(src: &mut BytesMut) -> Result<u8, CodecError> {
    if src.is_empty() {
        return Err(CodecError::malformed("unexpected end of buffer reading u8"));
    }
    Ok(src.get_u8())
}

/// Reads a big-endian u32.
pub fn read_u32(src: &mut BytesMut) -> Result<u32, CodecError> {
    if src.len() < 4 {
        return Err(CodecError::malformed("unexpected end of buffer reading u32"));
    }
    Ok(src.get_u32())
}

/// Reads exactly `len` raw bytes (an Octet String with a length carried by
/// a preceding length field, e.g. `short_message`/`sm_length`).
pub fn read_octet_string(src: &mut BytesMut, len: usize) -> Result<Vec<u8>, CodecError> {
    if src.len() < len {
        return Err(CodecError::malformed(
            "unexpected end of buffer reading octet string",
        ));
    }
    Ok(src.split_to(len).to_vec())
}

pub fn write_octet_string(
    dst: &mut BytesMut,
    field: &str,
    value: &[u8],
    max_len: usize,
) -> Result<(), CodecError> {
    if value.len() > max_len {
        return Err(CodecError::encoding(format!(
            "{field} is {} bytes, max is {max_len}",
            value.len()
        )));
    }
    dst.put_slice(value);
    Ok(())
}

pub const MAX_SYSTEM_ID: usize = 16;
pub const MAX_PASSWORD: usize = 9;
pub const MAX_SYSTEM_TYPE: usize = 13;
pub const MAX_ADDRESS_RANGE: usize = 41;
pub const MAX_SERVICE_TYPE: usize = 6;
pub const MAX_ADDR: usize = 21;
pub const MAX_SCHEDULE_DELIVERY_TIME: usize = 17;
pub const MAX_VALIDITY_PERIOD: usize = 17;
pub const MAX_MESSAGE_ID: usize = 65;
pub const MAX_SHORT_MESSAGE: usize = 254;
