/// Width in bytes of a ciphertext handle
pub const HANDLE_LEN: usize = 32;

/// Validity window of a freshly issued decryption signature
pub const SIGNATURE_DURATION_DAYS: u64 = 365;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Prefix of every key written to a `SignatureStorage`
pub const SIGNATURE_KEY_PREFIX: &str = "decryption-signature";
