//! X authority (`.Xauthority`) records.
//!
//! Record layout:
//!
//! ```text
//! [2-byte family, host byte order]
//! [2-byte BE len][address]
//! [2-byte BE len][display number, decimal]
//! [2-byte BE len][auth protocol name]
//! [2-byte BE len][auth data]
//! ```
//!
//! The family is the only field written in host byte order; authority
//! readers expect it that way. The order is passed in explicitly so records
//! for either platform can be produced and checked anywhere.

use crate::error::{XfwdError, XfwdResult};
use crate::requests::X11Request;

/// `AF_LOCAL`, the family used for the forwarded display entry.
pub const FAMILY_LOCAL: u16 = 1;

/// Fixed header bytes: family plus four length prefixes.
const HEADER_LEN: usize = 10;

/// Byte order used for the family field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// The byte order of the platform we were compiled for.
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    fn write_u16(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }
}

/// A single authority entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityRecord {
    pub family: u16,
    /// Host name the entry applies to.
    pub address: String,
    /// Display number rendered as decimal text.
    pub number: String,
    /// Auth protocol name, e.g. `MIT-MAGIC-COOKIE-1`.
    pub name: String,
    /// Raw cookie bytes.
    pub data: Vec<u8>,
}

impl AuthorityRecord {
    /// Build the entry for a forwarded display from the client's request.
    ///
    /// Fails with [`XfwdError::InvalidHexCredential`] when the request's auth
    /// data is not valid hex.
    pub fn for_request(request: &X11Request, hostname: &str, display: u16) -> XfwdResult<Self> {
        let data = hex::decode(&request.auth_data)?;
        Ok(Self {
            family: FAMILY_LOCAL,
            address: hostname.to_string(),
            number: display.to_string(),
            name: request.auth_protocol.clone(),
            data,
        })
    }

    /// Serialize the record, writing the family in `order`.
    pub fn encode(&self, order: ByteOrder) -> XfwdResult<Vec<u8>> {
        let fields: [&[u8]; 4] = [
            self.address.as_bytes(),
            self.number.as_bytes(),
            self.name.as_bytes(),
            &self.data,
        ];

        let body: usize = fields.iter().map(|f| f.len()).sum();
        let mut buf = Vec::with_capacity(HEADER_LEN + body);
        buf.extend_from_slice(&order.write_u16(self.family));
        for field in fields {
            let len = u16::try_from(field.len()).map_err(|_| {
                XfwdError::MalformedPayload(format!(
                    "authority field of {} bytes exceeds {}",
                    field.len(),
                    u16::MAX
                ))
            })?;
            buf.extend_from_slice(&len.to_be_bytes());
            buf.extend_from_slice(field);
        }
        Ok(buf)
    }

    /// Parse one record from the front of `buf`, returning it and the rest.
    pub fn decode(buf: &[u8], order: ByteOrder) -> XfwdResult<(Self, &[u8])> {
        if buf.len() < 2 {
            return Err(truncated());
        }
        let family = order.read_u16([buf[0], buf[1]]);

        let (address, rest) = take_field(&buf[2..])?;
        let (number, rest) = take_field(rest)?;
        let (name, rest) = take_field(rest)?;
        let (data, rest) = take_field(rest)?;

        let address = String::from_utf8_lossy(address).into_owned();
        let number = String::from_utf8_lossy(number).into_owned();
        let name = String::from_utf8_lossy(name).into_owned();
        let data = data.to_vec();

        Ok((
            Self {
                family,
                address,
                number,
                name,
                data,
            },
            rest,
        ))
    }
}

fn truncated() -> XfwdError {
    XfwdError::MalformedPayload("truncated authority record".into())
}

/// Split a big-endian u16 length-prefixed field off the front of `buf`.
fn take_field(buf: &[u8]) -> XfwdResult<(&[u8], &[u8])> {
    if buf.len() < 2 {
        return Err(truncated());
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let rest = &buf[2..];
    if rest.len() < len {
        return Err(truncated());
    }
    Ok(rest.split_at(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(auth_data: &str) -> X11Request {
        X11Request {
            single_connection: false,
            auth_protocol: "MIT-MAGIC-COOKIE-1".into(),
            auth_data: auth_data.into(),
            screen_number: 0,
        }
    }

    #[test]
    fn layout_is_bit_exact() {
        let record = AuthorityRecord::for_request(&request("abcd"), "box", 10).unwrap();
        let buf = record.encode(ByteOrder::Little).unwrap();

        let mut expected = vec![0x01, 0x00];
        expected.extend_from_slice(&[0x00, 0x03]);
        expected.extend_from_slice(b"box");
        expected.extend_from_slice(&[0x00, 0x02]);
        expected.extend_from_slice(b"10");
        expected.extend_from_slice(&[0x00, 0x12]);
        expected.extend_from_slice(b"MIT-MAGIC-COOKIE-1");
        expected.extend_from_slice(&[0x00, 0x02, 0xab, 0xcd]);
        assert_eq!(buf, expected);
        assert_eq!(buf.len(), HEADER_LEN + 3 + 2 + 18 + 2);
    }

    #[test]
    fn family_follows_byte_order() {
        let record = AuthorityRecord::for_request(&request(""), "h", 0).unwrap();
        let little = record.encode(ByteOrder::Little).unwrap();
        let big = record.encode(ByteOrder::Big).unwrap();
        assert_eq!(&little[..2], &[0x01, 0x00]);
        assert_eq!(&big[..2], &[0x00, 0x01]);
        // Only the family differs.
        assert_eq!(little[2..], big[2..]);
    }

    #[test]
    fn round_trip_data_lengths() {
        for len in [0usize, 16, 256] {
            let raw: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let req = request(&hex::encode(&raw));
            for order in [ByteOrder::Little, ByteOrder::Big] {
                let record = AuthorityRecord::for_request(&req, "workstation.local", 37).unwrap();
                let buf = record.encode(order).unwrap();
                assert_eq!(buf.len(), HEADER_LEN + 17 + 2 + 18 + len);

                let (decoded, rest) = AuthorityRecord::decode(&buf, order).unwrap();
                assert!(rest.is_empty());
                assert_eq!(decoded.family, FAMILY_LOCAL);
                assert_eq!(decoded.address, "workstation.local");
                assert_eq!(decoded.number, "37");
                assert_eq!(decoded.name, "MIT-MAGIC-COOKIE-1");
                assert_eq!(decoded.data, raw);
            }
        }
    }

    #[test]
    fn invalid_hex_rejected() {
        assert!(matches!(
            AuthorityRecord::for_request(&request("xyz"), "h", 0),
            Err(XfwdError::InvalidHexCredential(_))
        ));
        assert!(matches!(
            AuthorityRecord::for_request(&request("abc"), "h", 0),
            Err(XfwdError::InvalidHexCredential(_))
        ));
    }

    #[test]
    fn oversized_field_rejected() {
        let mut record = AuthorityRecord::for_request(&request(""), "h", 0).unwrap();
        record.data = vec![0; u16::MAX as usize + 1];
        assert!(record.encode(ByteOrder::native()).is_err());
    }

    #[test]
    fn decode_truncated() {
        let record = AuthorityRecord::for_request(&request("00ff"), "h", 3).unwrap();
        let buf = record.encode(ByteOrder::Big).unwrap();
        for len in 0..buf.len() {
            assert!(AuthorityRecord::decode(&buf[..len], ByteOrder::Big).is_err());
        }
    }
}
