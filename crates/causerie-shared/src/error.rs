use thiserror::Error;

/// Errors raised while decoding a wire payload. All of them are
/// recoverable by discarding the single offending message.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Payload is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("Malformed wire record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,
}

/// Errors raised while parsing key material from text.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Expected a 32-byte key, got {0} bytes")]
    Length(usize),
}
