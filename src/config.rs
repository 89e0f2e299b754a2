use crate::domain::{default_broker_policies, Asset, AssetClass, BrokerPolicy, Decimal};
use crate::engine::{RebalancePolicy, RiskLimits, SizingParams, TradeThresholds};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Process configuration read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub state_file: PathBuf,
    pub signals_file: PathBuf,
    pub portfolio_config_file: PathBuf,
    pub history_dir: PathBuf,
    pub lock_file: PathBuf,
    /// JSON list of incoming signals, re-read every tick.
    pub signals_input: Option<PathBuf>,
    /// JSON market snapshot, re-read every tick.
    pub prices_input: Option<PathBuf>,
    pub initial_capital: Decimal,
    pub tick_secs: u64,
    pub reset_portfolio: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let data_dir = PathBuf::from(env_map.get("SV_DATA_DIR").map(|s| s.as_str()).unwrap_or("data"));
        let in_data_dir = |key: &str, default: &str| -> PathBuf {
            env_map
                .get(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(default))
        };

        let ledger_file = in_data_dir("SV_LEDGER_FILE", "portfolio.json");
        let state_file = in_data_dir("SV_STATE_FILE", "portfolio_state.json");
        let signals_file = in_data_dir("SV_SIGNALS_FILE", "portfolio_signals.json");
        let portfolio_config_file = in_data_dir("SV_CONFIG_FILE", "portfolio_config.json");
        let history_dir = in_data_dir("SV_HISTORY_DIR", "history");
        let lock_file = data_dir.join("portfolio.lock");

        let signals_input = env_map.get("SV_SIGNALS_INPUT").map(PathBuf::from);
        let prices_input = env_map.get("SV_PRICES_INPUT").map(PathBuf::from);

        let initial_capital = env_map
            .get("SV_INITIAL_CAPITAL")
            .map(|s| s.as_str())
            .unwrap_or("25000")
            .parse::<Decimal>()
            .ok()
            .filter(|c| c.is_positive())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SV_INITIAL_CAPITAL".to_string(),
                    "must be a positive decimal".to_string(),
                )
            })?;

        let tick_secs = env_map
            .get("SV_TICK_SECS")
            .map(|s| s.as_str())
            .unwrap_or("1800")
            .parse::<u64>()
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SV_TICK_SECS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let reset_portfolio = match env_map
            .get("SV_PORTFOLIO_RESET")
            .map(|s| s.as_str())
            .unwrap_or("0")
        {
            "0" | "false" => false,
            "1" | "true" => true,
            other => {
                return Err(ConfigError::InvalidValue(
                    "SV_PORTFOLIO_RESET".to_string(),
                    format!("must be 0 or 1, got {}", other),
                ))
            }
        };

        Ok(Config {
            data_dir,
            ledger_file,
            state_file,
            signals_file,
            portfolio_config_file,
            history_dir,
            lock_file,
            signals_input,
            prices_input,
            initial_capital,
            tick_secs,
            reset_portfolio,
        })
    }
}

/// `portfolio_config.json`. Every section falls back to its defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub target_allocations: BTreeMap<AssetClass, Decimal>,
    pub rebalance: RebalancePolicy,
    pub trade_thresholds: TradeThresholds,
    pub sizing: SizingParams,
    pub risk: RiskLimits,
    pub asset_classes: BTreeMap<Asset, AssetClass>,
    pub brokers: Vec<BrokerPolicy>,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            target_allocations: default_target_allocations(),
            rebalance: RebalancePolicy::default(),
            trade_thresholds: TradeThresholds::default(),
            sizing: SizingParams::default(),
            risk: RiskLimits::default(),
            asset_classes: default_asset_classes(),
            brokers: default_broker_policies(),
        }
    }
}

impl PortfolioConfig {
    /// Load from `path`. A missing or malformed file yields the defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                info!(path = %path.display(), error = %e, "portfolio config unavailable, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str::<PortfolioConfig>(&raw) {
            Ok(config) => config.normalized(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed portfolio config, using defaults");
                Self::default()
            }
        }
    }

    fn normalized(mut self) -> Self {
        let sum: Decimal = self.target_allocations.values().sum();
        if !self.target_allocations.is_empty() && sum != Decimal::one() {
            warn!(sum = %sum, "target allocations do not sum to 1");
        }
        if self.brokers.is_empty() {
            warn!("no broker policies configured, using defaults");
            self.brokers = default_broker_policies();
        }
        self
    }
}

fn default_target_allocations() -> BTreeMap<AssetClass, Decimal> {
    [("cash", 20), ("indices", 40), ("bonds", 20), ("crypto", 20)]
        .into_iter()
        .map(|(class, pct)| {
            (
                AssetClass::new(class),
                Decimal::new(rust_decimal::Decimal::new(pct, 2)),
            )
        })
        .collect()
}

fn default_asset_classes() -> BTreeMap<Asset, AssetClass> {
    let table: &[(&[&str], &str)] = &[
        (&["BTC", "ETH", "SOL", "XRP", "ADA", "DOT", "LINK"], "crypto"),
        (&["SPX", "^GSPC", "SP500", "SPY", "QQQ", "NDX", "DAX"], "indices"),
        (&["AAPL", "MSFT", "NVDA", "AMZN"], "equity"),
        (&["GOLD", "XAUUSD", "SILVER", "WTI"], "commodities"),
        (&["EURUSD", "GBPUSD", "USDJPY"], "fx"),
        (&["TLT", "IEF", "BUND"], "bonds"),
    ];
    table
        .iter()
        .flat_map(|(assets, class)| assets.iter().map(move |a| (Asset::new(*a), AssetClass::new(*class))))
        .collect()
}
