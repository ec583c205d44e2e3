//! Parse and validation errors for domain primitives

/// Errors raised while constructing domain primitives
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Unknown reference type: {0}")]
    UnknownReferenceType(String),

    #[error("Invalid basis points {0}: must be at most 10000")]
    InvalidBasisPoints(u32),

    #[error("Invalid stock ratio {numerator}/{denominator}")]
    InvalidStockRatio { numerator: u64, denominator: u64 },

    #[error("Invalid denom: {0}")]
    InvalidDenom(String),
}
