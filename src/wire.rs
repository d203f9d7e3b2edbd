//! # Identity Key Wire Format
//!
//! Hand-framed protobuf codec for the libp2p key envelope that travels inside
//! the certificate extension:
//!
//! ```text
//! message Key {
//!     KeyType type = 1;   // varint: Ed25519 = 0, RSA = 1, Secp256k1 = 2
//!     bytes   data = 2;   // length-delimited, per-type encoding
//! }
//! ```
//!
//! The same envelope carries public and private keys; only the meaning of
//! `data` differs. Decoding fills protobuf defaults (`type = 0`, `data`
//! empty), skips unknown fields by wire type, and treats any truncated or
//! overlong element as an error.
//!
//! The framing is written out by hand rather than generated: the byte layout
//! is an interoperability contract, and every rule here (field numbers, enum
//! numbering, skipping, truncation) is exercised directly by tests.

/// Decoded key envelope. `key_type` is the raw varint value; mapping it onto
/// a supported key type happens one layer up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyEnvelope {
    pub key_type: u64,
    pub data: Vec<u8>,
}

/// Framing-level decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireError {
    /// A varint or length-delimited field ran past the end of the buffer.
    Truncated,
    /// A varint exceeded 64 bits.
    InvalidVarint,
    /// A field used a wire type we cannot skip (groups, reserved values).
    UnsupportedWireType(u8),
    /// A known field carried the wrong wire type.
    UnexpectedWireType { field: u64, wire_type: u8 },
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Truncated => write!(f, "key protobuf is truncated"),
            WireError::InvalidVarint => write!(f, "varint exceeds 64 bits"),
            WireError::UnsupportedWireType(wt) => {
                write!(f, "unsupported protobuf wire type {wt}")
            }
            WireError::UnexpectedWireType { field, wire_type } => {
                write!(f, "field {field} has unexpected wire type {wire_type}")
            }
        }
    }
}

impl std::error::Error for WireError {}

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// Encode a key envelope. Both fields are always emitted, including the
/// `type` field when it equals the protobuf default.
pub(crate) fn encode_key(key_type: u64, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + varint_len(data.len() as u64) + data.len() + 10);
    out.push(0x08); // field 1, varint
    write_varint(&mut out, key_type);
    out.push(0x12); // field 2, length-delimited
    write_varint(&mut out, data.len() as u64);
    out.extend_from_slice(data);
    out
}

/// Decode a key envelope, filling defaults for absent fields.
pub(crate) fn decode_key(buf: &[u8]) -> Result<KeyEnvelope, WireError> {
    let mut envelope = KeyEnvelope {
        key_type: 0,
        data: Vec::new(),
    };
    let mut pos = 0usize;

    while pos < buf.len() {
        let (tag, n) = read_varint(&buf[pos..])?;
        pos += n;
        let field = tag >> 3;
        let wire_type = (tag & 0x07) as u8;

        match field {
            1 => {
                if wire_type != WIRE_VARINT {
                    return Err(WireError::UnexpectedWireType { field, wire_type });
                }
                let (value, n) = read_varint(&buf[pos..])?;
                pos += n;
                envelope.key_type = value;
            }
            2 => {
                if wire_type != WIRE_LEN {
                    return Err(WireError::UnexpectedWireType { field, wire_type });
                }
                let (bytes, n) = read_len_delimited(&buf[pos..])?;
                pos += n;
                envelope.data = bytes.to_vec();
            }
            _ => pos += skip_field(wire_type, &buf[pos..])?,
        }
    }

    Ok(envelope)
}

/// Skip over one unknown field body, returning the number of bytes consumed.
fn skip_field(wire_type: u8, buf: &[u8]) -> Result<usize, WireError> {
    match wire_type {
        WIRE_VARINT => {
            let (_, n) = read_varint(buf)?;
            Ok(n)
        }
        WIRE_FIXED64 => {
            if buf.len() < 8 {
                return Err(WireError::Truncated);
            }
            Ok(8)
        }
        WIRE_LEN => {
            let (_, n) = read_len_delimited(buf)?;
            Ok(n)
        }
        WIRE_FIXED32 => {
            if buf.len() < 4 {
                return Err(WireError::Truncated);
            }
            Ok(4)
        }
        other => Err(WireError::UnsupportedWireType(other)),
    }
}

fn read_len_delimited(buf: &[u8]) -> Result<(&[u8], usize), WireError> {
    let (len, n) = read_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| WireError::Truncated)?;
    let end = n.checked_add(len).ok_or(WireError::Truncated)?;
    if end > buf.len() {
        return Err(WireError::Truncated);
    }
    Ok((&buf[n..end], end))
}

fn read_varint(buf: &[u8]) -> Result<(u64, usize), WireError> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate().take(10) {
        if i == 9 && byte > 0x01 {
            return Err(WireError::InvalidVarint);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if buf.len() >= 10 {
        Err(WireError::InvalidVarint)
    } else {
        Err(WireError::Truncated)
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn varint_len(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        (64 - value.leading_zeros() as usize).div_ceil(7)
    }
}
