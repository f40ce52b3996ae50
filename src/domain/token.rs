//! 代币注册表
//!
//! 代币符号 → { 合约地址, 精度 }。原生 TRX 的合约地址为空。
//! 注册表在构造时显式传入，不使用全局状态。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::address,
    error::{CoreError, CoreResult},
};

pub const NATIVE_SYMBOL: &str = "TRX";

/// TronScan account/tokens 中原生 TRX 的 tokenId
pub const NATIVE_TOKEN_ID: &str = "_";

pub const USDT_SYMBOL: &str = "USDT";
pub const USDT_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub contract_address: String,
    pub decimals: u32,
}

impl TokenConfig {
    pub fn native() -> Self {
        Self {
            contract_address: String::new(),
            decimals: 6,
        }
    }

    pub fn contract(contract_address: impl Into<String>, decimals: u32) -> Self {
        Self {
            contract_address: contract_address.into(),
            decimals,
        }
    }

    pub fn is_native(&self) -> bool {
        self.contract_address.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenRegistry(BTreeMap<String, TokenConfig>);

impl Default for TokenRegistry {
    fn default() -> Self {
        let mut tokens = BTreeMap::new();
        tokens.insert(NATIVE_SYMBOL.to_string(), TokenConfig::native());
        tokens.insert(USDT_SYMBOL.to_string(), TokenConfig::contract(USDT_CONTRACT, 6));
        Self(tokens)
    }
}

impl TokenRegistry {
    pub fn new(tokens: BTreeMap<String, TokenConfig>) -> Self {
        Self(tokens)
    }

    /// 按符号查找 (忽略大小写)，返回规范化后的符号
    pub fn lookup(&self, symbol: &str) -> CoreResult<(&str, &TokenConfig)> {
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(symbol))
            .map(|(name, cfg)| (name.as_str(), cfg))
            .ok_or_else(|| CoreError::UnsupportedToken(symbol.to_string()))
    }

    pub fn get(&self, symbol: &str) -> CoreResult<&TokenConfig> {
        self.lookup(symbol).map(|(_, cfg)| cfg)
    }

    pub fn native(&self) -> Option<(&str, &TokenConfig)> {
        self.0
            .iter()
            .find(|(_, cfg)| cfg.is_native())
            .map(|(name, cfg)| (name.as_str(), cfg))
    }

    /// 所有合约代币
    pub fn contract_tokens(&self) -> impl Iterator<Item = (&str, &TokenConfig)> {
        self.0
            .iter()
            .filter(|(_, cfg)| !cfg.is_native())
            .map(|(name, cfg)| (name.as_str(), cfg))
    }

    pub fn symbol_for_contract(&self, contract_address: &str) -> Option<&str> {
        self.contract_tokens()
            .find(|(_, cfg)| cfg.contract_address == contract_address)
            .map(|(name, _)| name)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.native().is_none() {
            return Err(CoreError::Validation(format!(
                "token registry must contain a native entry ({})",
                NATIVE_SYMBOL
            )));
        }
        for (symbol, cfg) in self.contract_tokens() {
            if !address::is_valid(&cfg.contract_address) {
                return Err(CoreError::Validation(format!(
                    "token {}: invalid contract address {}",
                    symbol, cfg.contract_address
                )));
            }
            // 10^decimals 需要能放入 u128
            if cfg.decimals > 28 {
                return Err(CoreError::Validation(format!(
                    "token {}: decimals {} out of range",
                    symbol, cfg.decimals
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = TokenRegistry::default();
        assert!(registry.validate().is_ok());

        let (symbol, trx) = registry.lookup("trx").unwrap();
        assert_eq!(symbol, NATIVE_SYMBOL);
        assert!(trx.is_native());
        assert_eq!(trx.decimals, 6);

        let usdt = registry.get("USDT").unwrap();
        assert_eq!(usdt.contract_address, USDT_CONTRACT);
        assert_eq!(registry.symbol_for_contract(USDT_CONTRACT), Some("USDT"));
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let registry = TokenRegistry::default();
        assert!(matches!(
            registry.get("DOGE"),
            Err(CoreError::UnsupportedToken(_))
        ));
    }

    #[test]
    fn test_registry_from_toml() {
        let registry: TokenRegistry = toml::from_str(
            r#"
            [TRX]
            decimals = 6

            [USDC]
            contract_address = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"
            decimals = 6
            "#,
        )
        .unwrap();

        assert!(registry.validate().is_ok());
        assert_eq!(registry.contract_tokens().count(), 1);
        assert!(registry.get("USDT").is_err());
    }

    #[test]
    fn test_registry_without_native_is_invalid() {
        let mut tokens = BTreeMap::new();
        tokens.insert(USDT_SYMBOL.to_string(), TokenConfig::contract(USDT_CONTRACT, 6));
        assert!(TokenRegistry::new(tokens).validate().is_err());
    }
}
