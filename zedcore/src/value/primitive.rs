//! Primitive bodies
//!
//! | Kind | Body |
//! |------|------|
//! | `uint*` | counted little-endian bytes |
//! | `int*`, `duration`, `time` | zig-zag, then counted little-endian bytes |
//! | `float16/32/64` | big-endian IEEE 754 of the stated width |
//! | `bool` | one byte, `0` or `1` |
//! | `bytes`, `string`, `type` | raw bytes |
//! | `ip` | 4 or 16 octets |
//! | `net` | address octets followed by mask octets |
//! | `enum` | counted selector |
//!
//! Decoders are lenient: a body of the wrong size decodes to the zero value
//! of the requested kind, except where an `Result` is returned.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;

use crate::{
    encoding::integer::{
        append_counted_uvarint, append_counted_varint, decode_counted_uvarint,
        decode_counted_varint,
    },
    error::{ZedError, ZedResult},
    types::PrimitiveId,
};

pub fn encode_int(v: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    append_counted_varint(&mut buf, v);
    buf
}

pub fn decode_int(body: &[u8]) -> i64 {
    decode_counted_varint(body)
}

pub fn encode_uint(v: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    append_counted_uvarint(&mut buf, v);
    buf
}

pub fn decode_uint(body: &[u8]) -> u64 {
    decode_counted_uvarint(body)
}

/// Encode `v` at the width of the float primitive `id`.
pub fn encode_float(id: PrimitiveId, v: f64) -> Vec<u8> {
    match id {
        PrimitiveId::Float16 => f32_to_f16(v as f32).to_be_bytes().to_vec(),
        PrimitiveId::Float32 => (v as f32).to_be_bytes().to_vec(),
        _ => v.to_be_bytes().to_vec(),
    }
}

/// Decode a float body; the width is taken from the body length.
pub fn decode_float(body: &[u8]) -> f64 {
    match body.len() {
        2 => f16_to_f32(u16::from_be_bytes([body[0], body[1]])) as f64,
        4 => f32::from_be_bytes([body[0], body[1], body[2], body[3]]) as f64,
        8 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(body);
            f64::from_be_bytes(b)
        }
        _ => 0.0,
    }
}

pub fn encode_bool(v: bool) -> Vec<u8> {
    vec![v as u8]
}

pub fn decode_bool(body: &[u8]) -> bool {
    body.first().is_some_and(|&b| b != 0)
}

pub fn encode_ip(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

pub fn decode_ip(body: &[u8]) -> ZedResult<IpAddr> {
    match body.len() {
        4 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(body);
            Ok(IpAddr::V4(Ipv4Addr::from(b)))
        }
        16 => {
            let mut b = [0u8; 16];
            b.copy_from_slice(body);
            Ok(IpAddr::V6(Ipv6Addr::from(b)))
        }
        _ => Err(ZedError::MalformedBytes("ip body must be 4 or 16 bytes")),
    }
}

pub fn encode_net(net: IpNetwork) -> Vec<u8> {
    let mut buf = encode_ip(net.network());
    buf.extend(encode_ip(net.mask()));
    buf
}

pub fn decode_net(body: &[u8]) -> ZedResult<IpNetwork> {
    let half = body.len() / 2;
    if (half != 4 && half != 16) || body.len() % 2 != 0 {
        return Err(ZedError::MalformedBytes("net body must be 8 or 32 bytes"));
    }
    let addr = decode_ip(&body[..half])?;
    let mask = decode_ip(&body[half..])?;
    let prefix = ipnetwork::ip_mask_to_prefix(mask)
        .map_err(|_| ZedError::MalformedBytes("net mask is not contiguous"))?;
    IpNetwork::new(addr, prefix).map_err(|_| ZedError::MalformedBytes("invalid net prefix"))
}

/// Round-to-nearest-even conversion to IEEE 754 binary16 bits.
pub fn f32_to_f16(value: f32) -> u16 {
    let x = value.to_bits();
    let sign = ((x >> 16) & 0x8000) as u16;
    let exp = ((x >> 23) & 0xff) as i32;
    let mant = x & 0x7f_ffff;
    if exp == 0xff {
        let nan = if mant != 0 { 0x200 } else { 0 };
        return sign | 0x7c00 | nan;
    }
    let e = exp - 127 + 15;
    if e >= 0x1f {
        return sign | 0x7c00;
    }
    let round = |m: u32, shift: u32| -> u32 {
        let h = m >> shift;
        let rem = m & ((1 << shift) - 1);
        let half = 1 << (shift - 1);
        if rem > half || (rem == half && h & 1 == 1) {
            h + 1
        } else {
            h
        }
    };
    if e <= 0 {
        if e < -10 {
            return sign;
        }
        let full = mant | 0x80_0000;
        return sign | round(full, (14 - e) as u32) as u16;
    }
    // A carry out of the mantissa correctly bumps the exponent.
    sign | round(((e as u32) << 23) | mant, 13) as u16
}

pub fn f16_to_f32(h: u16) -> f32 {
    let sign = ((h & 0x8000) as u32) << 16;
    let exp = ((h >> 10) & 0x1f) as u32;
    let mant = (h & 0x3ff) as u32;
    let bits = match (exp, mant) {
        (0, 0) => sign,
        (0, _) => {
            let mut e: u32 = 127 - 15 + 1;
            let mut m = mant;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            sign | (e << 23) | ((m & 0x3ff) << 13)
        }
        (0x1f, _) => sign | 0x7f80_0000 | (mant << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (mant << 13),
    };
    f32::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_are_minimal() {
        assert!(encode_int(0).is_empty());
        assert_eq!(encode_int(-1), vec![1]);
        assert_eq!(encode_uint(256), vec![0, 1]);
        for v in [i64::MIN, -300, 0, 5, i64::MAX] {
            assert_eq!(decode_int(&encode_int(v)), v);
        }
        assert_eq!(decode_uint(&encode_uint(u64::MAX)), u64::MAX);
    }

    #[test]
    fn float_widths() {
        assert_eq!(encode_float(PrimitiveId::Float64, 2.5).len(), 8);
        assert_eq!(decode_float(&encode_float(PrimitiveId::Float32, 2.5)), 2.5);
        assert_eq!(encode_float(PrimitiveId::Float16, 1.5), vec![0x3e, 0x00]);
        assert_eq!(decode_float(&[0x3e, 0x00]), 1.5);
        assert_eq!(decode_float(&encode_float(PrimitiveId::Float16, -0.25)), -0.25);
        assert!(decode_float(&encode_float(PrimitiveId::Float16, 1e9)).is_infinite());
    }

    #[test]
    fn f16_subnormals() {
        let tiny = f16_to_f32(1);
        assert!(tiny > 0.0 && tiny < 1e-7);
        assert_eq!(f32_to_f16(tiny), 1);
    }

    #[test]
    fn net_roundtrip() {
        let net: IpNetwork = "10.1.0.0/16".parse().unwrap();
        let body = encode_net(net);
        assert_eq!(body.len(), 8);
        assert_eq!(decode_net(&body).unwrap(), net);
        let v6: IpNetwork = "fe80::/10".parse().unwrap();
        assert_eq!(decode_net(&encode_net(v6)).unwrap(), v6);
        assert!(decode_net(&[1, 2, 3]).is_err());
    }
}
