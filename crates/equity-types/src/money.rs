//! Rates applied to dividend entitlements

use crate::TypeError;
use serde::{Deserialize, Serialize};

/// Denominator of a basis-point rate.
pub const BASIS_POINTS_SCALE: u32 = 10_000;

/// A rate in basis points (1 bp = 0.01%)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BasisPoints(u32);

impl BasisPoints {
    pub fn new(bps: u32) -> Result<Self, TypeError> {
        if bps > BASIS_POINTS_SCALE {
            return Err(TypeError::InvalidBasisPoints(bps));
        }
        Ok(Self(bps))
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Portion of `amount` covered by this rate, rounded down.
    pub fn apply(&self, amount: u128) -> u128 {
        amount / u128::from(BASIS_POINTS_SCALE) * u128::from(self.0)
            + amount % u128::from(BASIS_POINTS_SCALE) * u128::from(self.0)
                / u128::from(BASIS_POINTS_SCALE)
    }
}

impl std::fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

/// New shares issued per held share for a stock dividend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRatio {
    pub numerator: u64,
    pub denominator: u64,
}

impl StockRatio {
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, TypeError> {
        if numerator == 0 || denominator == 0 {
            return Err(TypeError::InvalidStockRatio {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Shares to issue for a holding, rounded down.
    pub fn apply(&self, shares: u64) -> u64 {
        let issued =
            u128::from(shares) * u128::from(self.numerator) / u128::from(self.denominator);
        u64::try_from(issued).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Display for StockRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// Gross, withheld and net amounts for one entitlement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentBreakdown {
    pub gross: u128,
    pub withheld: u128,
    pub net: u128,
}

impl PaymentBreakdown {
    pub fn compute(gross: u128, tax: BasisPoints) -> Self {
        let withheld = tax.apply(gross);
        Self {
            gross,
            withheld,
            net: gross - withheld,
        }
    }

    pub fn untaxed(gross: u128) -> Self {
        Self {
            gross,
            withheld: 0,
            net: gross,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_points_bounds() {
        assert!(BasisPoints::new(10_000).is_ok());
        assert!(BasisPoints::new(10_001).is_err());
    }

    #[test]
    fn withholding_rounds_down() {
        let tax = BasisPoints::new(1_500).unwrap();
        let breakdown = PaymentBreakdown::compute(1_001, tax);
        assert_eq!(breakdown.withheld, 150);
        assert_eq!(breakdown.net, 851);
        assert_eq!(breakdown.gross, breakdown.withheld + breakdown.net);
    }

    #[test]
    fn withholding_does_not_overflow_near_max() {
        let tax = BasisPoints::new(10_000).unwrap();
        assert_eq!(tax.apply(u128::MAX), u128::MAX);
    }

    #[test]
    fn stock_ratio_applies_fraction() {
        let ratio = StockRatio::new(1, 10).unwrap();
        assert_eq!(ratio.apply(95), 9);
        assert!(StockRatio::new(0, 10).is_err());
        assert!(StockRatio::new(1, 0).is_err());
    }
}
