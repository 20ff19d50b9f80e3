use anchor_lang::prelude::*;

#[error_code]
pub enum SpinError {
    #[msg("Encrypted input produced no handle")]
    EmptyEncryptedInput,

    #[msg("Spin transaction did not succeed")]
    TransactionFailed,

    #[msg("Decryption response is missing the reward handle")]
    MissingRewardValue,

    #[msg("Invalid handle encoding")]
    InvalidHandle,
}
