//! Identifier newtypes

use crate::TypeError;
use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Company identifier assigned by the equity registry
    CompanyId
);
numeric_id!(
    /// Dividend identifier assigned by the dividend sequence
    DividendId
);
numeric_id!(
    /// Audit document identifier assigned by the audit registry
    AuditId
);
numeric_id!(
    /// Governance proposal identifier
    ProposalId
);
numeric_id!(
    /// Payment identifier assigned by the payment sequence
    PaymentId
);

/// Share class identifier (e.g. "COMMON", "PREF-A")
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShareClassId(pub String);

impl ShareClassId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShareClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency denomination of a cash dividend (e.g. "uusd")
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Denom(pub String);

impl Denom {
    pub fn parse(denom: impl Into<String>) -> Result<Self, TypeError> {
        let denom = denom.into();
        let valid = (2..=64).contains(&denom.len())
            && denom
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '/' || c == '-');
        if !valid {
            return Err(TypeError::InvalidDenom(denom));
        }
        Ok(Self(denom))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Denom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum accepted address length.
pub const MAX_ADDRESS_LEN: usize = 128;

/// Ledger account address.
///
/// Addresses are ASCII alphanumerics plus `_`, `-` and `.`. The `:`
/// character is never valid, so no address can be mistaken for a
/// synthetic routing key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(address: impl Into<String>) -> Result<Self, TypeError> {
        let address = address.into();
        let invalid = |reason: &str| TypeError::InvalidAddress {
            address: address.clone(),
            reason: reason.to_string(),
        };

        if address.is_empty() {
            return Err(invalid("empty"));
        }
        if address.len() > MAX_ADDRESS_LEN {
            return Err(invalid("too long"));
        }
        if let Some(c) = address
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(invalid(&format!("illegal character '{c}'")));
        }

        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::str::FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Who receives a dividend entitlement.
///
/// Ordering is derived, so a `BTreeMap<Recipient, _>` iterates direct holders
/// (by address) before treasury holders (by company id). Snapshots rely on
/// that order being stable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Recipient {
    /// A shareholder address, either a direct holder or a beneficial owner
    DirectHolder(Address),
    /// Another company's treasury holding the paying company's shares
    TreasuryHolder(CompanyId),
}

impl Recipient {
    pub fn holder(&self) -> Option<&Address> {
        match self {
            Self::DirectHolder(address) => Some(address),
            Self::TreasuryHolder(_) => None,
        }
    }

    pub fn is_treasury(&self) -> bool {
        matches!(self, Self::TreasuryHolder(_))
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectHolder(address) => write!(f, "holder:{address}"),
            Self::TreasuryHolder(company) => write!(f, "treasury:{company}"),
        }
    }
}

impl From<Address> for Recipient {
    fn from(address: Address) -> Self {
        Self::DirectHolder(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_accepts_plain_accounts() {
        assert!(Address::parse("alice").is_ok());
        assert!(Address::parse("equity1qxy-9_z.a").is_ok());
    }

    #[test]
    fn address_rejects_synthetic_and_malformed() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("treasury:7").is_err());
        assert!(Address::parse("has space").is_err());
        assert!(Address::parse("x".repeat(MAX_ADDRESS_LEN + 1)).is_err());
    }

    #[test]
    fn address_deserialization_validates() {
        assert!(serde_json::from_str::<Address>("\"bob\"").is_ok());
        assert!(serde_json::from_str::<Address>("\"treasury:1\"").is_err());
    }

    #[test]
    fn recipients_order_holders_before_treasuries() {
        let mut recipients = vec![
            Recipient::TreasuryHolder(CompanyId(1)),
            Recipient::DirectHolder(Address::parse("zed").unwrap()),
            Recipient::DirectHolder(Address::parse("amy").unwrap()),
        ];
        recipients.sort();
        assert_eq!(recipients[0].to_string(), "holder:amy");
        assert_eq!(recipients[2].to_string(), "treasury:1");
    }

    #[test]
    fn denom_validation() {
        assert!(Denom::parse("uusd").is_ok());
        assert!(Denom::parse("u").is_err());
        assert!(Denom::parse("bad denom").is_err());
    }
}
