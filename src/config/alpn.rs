//! ALPN protocol list wire encoding.
//!
//! Each protocol name is written as a one-byte length followed by the name's
//! bytes, and names are concatenated in preference order.

use crate::error::ConfigError;

pub const MAX_PROTOCOL_NAME_LEN: usize = u8::MAX as usize;

pub fn encode<S: AsRef<str>>(protocols: &[S]) -> Result<Vec<u8>, ConfigError> {
    let mut encoded = Vec::with_capacity(protocols.iter().map(|p| p.as_ref().len() + 1).sum());
    for protocol in protocols {
        let name = protocol.as_ref().as_bytes();
        if name.is_empty() {
            return Err(ConfigError::EmptyAlpnProtocol);
        }
        if name.len() > MAX_PROTOCOL_NAME_LEN {
            return Err(ConfigError::AlpnProtocolTooLong(name.len()));
        }
        encoded.push(name.len() as u8);
        encoded.extend_from_slice(name);
    }
    Ok(encoded)
}

pub fn decode(mut encoded: &[u8]) -> Result<Vec<String>, ConfigError> {
    let mut protocols = vec![];
    while let Some((&len, rest)) = encoded.split_first() {
        let len = len as usize;
        if len == 0 {
            return Err(ConfigError::EmptyAlpnProtocol);
        }
        if rest.len() < len {
            return Err(ConfigError::MalformedAlpnList(format!(
                "entry claims {} bytes, only {} remain",
                len,
                rest.len()
            )));
        }
        let (name, rest) = rest.split_at(len);
        let name = String::from_utf8(name.to_vec())
            .map_err(|e| ConfigError::MalformedAlpnList(format!("entry is not UTF-8: {e}")))?;
        protocols.push(name);
        encoded = rest;
    }
    Ok(protocols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let encoded = encode(&["h2", "http/1.1"]).unwrap();
        assert_eq!(encoded, b"\x02h2\x08http/1.1");
        assert_eq!(decode(&encoded).unwrap(), vec!["h2", "http/1.1"]);
    }

    #[test]
    fn test_empty_list() {
        assert!(encode::<&str>(&[]).unwrap().is_empty());
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_name_length_limit() {
        let longest = "a".repeat(255);
        let encoded = encode(&[longest.as_str()]).unwrap();
        assert_eq!(encoded[0], 255);
        assert_eq!(encoded.len(), 256);

        let too_long = "a".repeat(256);
        assert!(matches!(
            encode(&["h2", too_long.as_str()]),
            Err(ConfigError::AlpnProtocolTooLong(256))
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            encode(&["h2", ""]),
            Err(ConfigError::EmptyAlpnProtocol)
        ));
        assert!(matches!(
            decode(b"\x02h2\x00"),
            Err(ConfigError::EmptyAlpnProtocol)
        ));
    }

    #[test]
    fn test_truncated_list() {
        assert!(matches!(
            decode(b"\x08http/1"),
            Err(ConfigError::MalformedAlpnList(_))
        ));
    }
}
