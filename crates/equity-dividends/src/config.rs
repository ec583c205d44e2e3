//! Configuration for the dividend module

use equity_types::{Address, BasisPoints};
use serde::{Deserialize, Serialize};

use crate::error::{DividendError, DividendResult};

/// Main dividend module configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendConfig {
    /// Account holding released dividend funds until payout
    #[serde(default = "default_module_account")]
    pub module_account: Address,

    /// Only this account may approve or reject pending dividends
    #[serde(default = "default_governance_authority")]
    pub governance_authority: Address,

    /// Withholding tax applied to gross payments
    #[serde(default)]
    pub withholding_tax_bps: u32,

    /// Whether cross-company treasury recipients are withheld like holders
    #[serde(default)]
    pub withhold_on_treasury_recipients: bool,

    /// Batch size used when a caller passes zero
    #[serde(default = "default_batch_size")]
    pub default_batch_size: u32,

    /// Upper bound for a single batch invocation
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,

    /// Oldest acceptable audit report
    #[serde(default = "default_audit_max_age_months")]
    pub audit_max_age_months: u32,

    /// Protocol addresses that never receive dividends
    #[serde(default)]
    pub excluded_addresses: Vec<Address>,

    /// Mint the shortfall when module custody cannot cover a payment
    #[serde(default)]
    pub allow_mint_fallback: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DividendConfig {
    fn default() -> Self {
        Self {
            module_account: default_module_account(),
            governance_authority: default_governance_authority(),
            withholding_tax_bps: 0,
            withhold_on_treasury_recipients: false,
            default_batch_size: default_batch_size(),
            max_batch_size: default_max_batch_size(),
            audit_max_age_months: default_audit_max_age_months(),
            excluded_addresses: Vec::new(),
            allow_mint_fallback: false,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_module_account() -> Address {
    Address::parse("dividend_module").expect("static module account is valid")
}

fn default_governance_authority() -> Address {
    Address::parse("gov_authority").expect("static governance account is valid")
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_batch_size() -> u32 {
    1_000
}

fn default_audit_max_age_months() -> u32 {
    24
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DividendConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `DIVIDENDS_*` environment variables (`__` separates nested keys).
    pub fn load(path: Option<&str>) -> DividendResult<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&DividendConfig::default()).map_err(config_err)?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DIVIDENDS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("excluded_addresses")
                .try_parsing(true),
        );

        let loaded: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_err)?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> DividendResult<()> {
        BasisPoints::new(self.withholding_tax_bps)?;
        if self.default_batch_size == 0 || self.max_batch_size == 0 {
            return Err(DividendError::InvalidConfig(
                "batch sizes must be positive".to_string(),
            ));
        }
        if self.default_batch_size > self.max_batch_size {
            return Err(DividendError::InvalidConfig(format!(
                "default batch size {} exceeds maximum {}",
                self.default_batch_size, self.max_batch_size
            )));
        }
        if self.audit_max_age_months == 0 {
            return Err(DividendError::InvalidConfig(
                "audit_max_age_months must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Withholding rate; falls back to zero for an out-of-range value that
    /// bypassed `validate`.
    pub fn withholding_tax(&self) -> BasisPoints {
        BasisPoints::new(self.withholding_tax_bps).unwrap_or_default()
    }

    /// Effective size for a batch request.
    pub fn batch_size(&self, requested: u32) -> u32 {
        match requested {
            0 => self.default_batch_size,
            n => n.min(self.max_batch_size),
        }
    }

    pub fn is_excluded(&self, address: &Address) -> bool {
        address == &self.module_account || self.excluded_addresses.contains(address)
    }
}

fn config_err(err: config::ConfigError) -> DividendError {
    DividendError::InvalidConfig(err.to_string())
}
