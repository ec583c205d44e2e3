//! Holdings, custodial references and company records

use crate::{Address, CompanyId, ShareClassId, TypeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direct holding of one share class by one owner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shareholding {
    pub company_id: CompanyId,
    pub class_id: ShareClassId,
    pub owner: Address,
    /// Total shares held
    pub shares: u64,
    /// Shares that have vested
    pub vested_shares: u64,
    /// Shares locked by the registry (e.g. transfer restrictions)
    pub locked_shares: u64,
    /// Acquisition cost in minor units
    pub cost_basis: u128,
}

impl Shareholding {
    pub fn new(
        company_id: CompanyId,
        class_id: ShareClassId,
        owner: Address,
        shares: u64,
    ) -> Self {
        Self {
            company_id,
            class_id,
            owner,
            shares,
            vested_shares: shares,
            locked_shares: 0,
            cost_basis: 0,
        }
    }
}

/// Why a custodial account holds shares on someone's behalf
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Shares locked in an escrow agreement
    Escrow,
    /// Shares pledged as lending collateral
    Lending,
    /// Shares resting on an exchange order book
    Dex,
    /// Shares held by a treasury as an investment position
    TreasuryInvestment,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escrow => "escrow",
            Self::Lending => "lending",
            Self::Dex => "dex",
            Self::TreasuryInvestment => "treasury_investment",
        }
    }
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReferenceType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "escrow" => Ok(Self::Escrow),
            "lending" => Ok(Self::Lending),
            "dex" => Ok(Self::Dex),
            "treasury_investment" => Ok(Self::TreasuryInvestment),
            other => Err(TypeError::UnknownReferenceType(other.to_string())),
        }
    }
}

/// Shares held by a custodial account on behalf of their economic owner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficialOwnership {
    /// Account that technically holds the shares
    pub custodial_account: Address,
    pub company_id: CompanyId,
    pub class_id: ShareClassId,
    /// The economic owner
    pub beneficial_owner: Address,
    /// Reference inside the custodial module (order id, loan id, ...)
    pub reference_id: String,
    pub reference_type: ReferenceType,
    pub shares: u64,
    pub locked_at: DateTime<Utc>,
}

/// Company record as exposed by the equity registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub id: CompanyId,
    pub name: String,
    pub owner: Address,
    /// Address holding treasury shares kept for resale
    pub treasury_address: Address,
}

/// Treasury investment position of one company in another
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryHolding {
    /// Company whose treasury owns the position
    pub owner_company: CompanyId,
    /// Company whose shares are held
    pub target_company: CompanyId,
    pub class_id: ShareClassId,
    pub shares: u64,
}
