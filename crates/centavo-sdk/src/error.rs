use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not enough funds")]
    NotEnoughFunds,

    #[error("fee is too high (max is 50 sat/byte)")]
    ExcessiveFee,

    #[error("OP_RETURN message too large, needs to be no longer than 220 bytes")]
    OpReturnTooLarge,

    #[error("OP_RETURN error: {0}")]
    OpReturn(String),

    #[error("more than one output set to spend max")]
    MultipleMaxOutputs,

    #[error("invalid address: {0}")]
    Address(String),

    #[error("invalid amount: {0}")]
    Amount(String),

    #[error("invalid script: {0}")]
    Script(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("electrum error: {0}")]
    Electrum(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("broadcast error: {0}")]
    Broadcast(String),

    #[error("payment request error: {0}")]
    PaymentRequest(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
