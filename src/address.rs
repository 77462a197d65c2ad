use bech32::Hrp;

#[derive(thiserror::Error, Debug)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("malformed bech32 address: {0}")]
    Malformed(#[from] bech32::DecodeError),
    #[error("expected prefix {expected:?}, got {actual:?}")]
    WrongPrefix { expected: String, actual: String },
    #[error("address payload must be 20 or 32 bytes, got {0}")]
    BadLength(usize),
    #[error("cannot encode address: {0}")]
    Encode(String),
}

/// Converts account addresses between their string form and raw bytes.
pub trait AddressCodec: Send + Sync {
    fn string_to_bytes(&self, address: &str) -> Result<Vec<u8>, AddressError>;

    /// The single spelling an account is stored under, whichever accepted
    /// form it was submitted in.
    fn canonical(&self, address: &str) -> Result<String, AddressError>;
}

/// Bech32 account addresses under a fixed human-readable prefix.
#[derive(Debug, Clone)]
pub struct Bech32Codec {
    prefix: String,
}

impl Bech32Codec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl AddressCodec for Bech32Codec {
    fn string_to_bytes(&self, address: &str) -> Result<Vec<u8>, AddressError> {
        if address.trim().is_empty() {
            return Err(AddressError::Empty);
        }
        let (hrp, data) = bech32::decode(address)?;
        if !hrp.as_str().eq_ignore_ascii_case(&self.prefix) {
            return Err(AddressError::WrongPrefix {
                expected: self.prefix.clone(),
                actual: hrp.as_str().to_string(),
            });
        }
        match data.len() {
            20 | 32 => Ok(data),
            n => Err(AddressError::BadLength(n)),
        }
    }

    fn canonical(&self, address: &str) -> Result<String, AddressError> {
        let bytes = self.string_to_bytes(address)?;
        encode_address(&self.prefix.to_ascii_lowercase(), &bytes)
    }
}

/// Renders raw bytes as a bech32 address under `prefix`.
pub fn encode_address(prefix: &str, bytes: &[u8]) -> Result<String, AddressError> {
    let hrp = Hrp::parse(prefix).map_err(|e| AddressError::Encode(e.to_string()))?;
    bech32::encode::<bech32::Bech32>(hrp, bytes).map_err(|e| AddressError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_prefixed_address() {
        let codec = Bech32Codec::new("zeth");
        let addr = encode_address("zeth", &[7u8; 20]).unwrap();
        assert_eq!(codec.string_to_bytes(&addr).unwrap(), vec![7u8; 20]);
    }

    #[test]
    fn upper_and_lower_case_share_one_canonical_form() {
        let codec = Bech32Codec::new("zeth");
        let lower = encode_address("zeth", &[7u8; 20]).unwrap();
        let upper = lower.to_ascii_uppercase();
        assert_eq!(codec.string_to_bytes(&upper).unwrap(), vec![7u8; 20]);
        assert_eq!(codec.canonical(&upper).unwrap(), lower);
        assert_eq!(codec.canonical(&lower).unwrap(), lower);
        assert!(codec.canonical("addrA").is_err());
    }

    #[test]
    fn rejects_other_prefix() {
        let codec = Bech32Codec::new("zeth");
        let addr = encode_address("cosmos", &[7u8; 20]).unwrap();
        assert!(matches!(
            codec.string_to_bytes(&addr),
            Err(AddressError::WrongPrefix { .. })
        ));
    }

    #[test]
    fn rejects_garbage_and_empty() {
        let codec = Bech32Codec::new("zeth");
        assert!(matches!(codec.string_to_bytes(""), Err(AddressError::Empty)));
        assert!(matches!(
            codec.string_to_bytes("addrA"),
            Err(AddressError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_bad_checksum() {
        let codec = Bech32Codec::new("zeth");
        let mut addr = encode_address("zeth", &[1u8; 20]).unwrap();
        let last = addr.pop().unwrap();
        addr.push(if last == 'q' { 'p' } else { 'q' });
        assert!(codec.string_to_bytes(&addr).is_err());
    }

    #[test]
    fn rejects_odd_payload_length() {
        let codec = Bech32Codec::new("zeth");
        let addr = encode_address("zeth", &[1u8; 5]).unwrap();
        assert!(matches!(
            codec.string_to_bytes(&addr),
            Err(AddressError::BadLength(5))
        ));
    }
}
