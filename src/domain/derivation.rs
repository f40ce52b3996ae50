//! 钱包密钥派生
//!
//! 128 位系统随机熵 → 12 词 BIP39 助记词 → 种子 (空口令)
//! → BIP32 路径 m/44'/195'/0'/0/0 → secp256k1 密钥对 → TRON 地址

use bip39::{Language, Mnemonic};
use coins_bip32::{path::DerivationPath, prelude::*};
use k256::ecdsa::SigningKey;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use crate::{
    domain::{address, models::WalletKind, secret::SecretString},
    error::{CoreError, CoreResult},
};

/// TRON (SLIP-44 coin type 195) 第一个外部地址
pub const TRON_DERIVATION_PATH: &str = "m/44'/195'/0'/0/0";

const ENTROPY_BYTES: usize = 16;

/// 派生结果
#[derive(Debug, Clone)]
pub struct DerivedWallet {
    pub address: String,
    /// 未压缩公钥 (65 字节，hex)
    pub public_key: String,
    pub private_key: SecretString,
    pub mnemonic: SecretString,
}

/// 密钥派生能力
pub trait KeyDerivation: Send + Sync {
    fn derive(&self, kind: WalletKind, owner: &str) -> CoreResult<DerivedWallet>;
}

#[derive(Debug, Clone, Default)]
pub struct Bip44TronDerivation;

impl Bip44TronDerivation {
    pub fn new() -> Self {
        Self
    }

    /// 生成新的 12 词助记词
    pub fn generate_mnemonic(&self) -> CoreResult<SecretString> {
        let mut entropy = [0u8; ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut entropy)
            .map_err(|e| CoreError::KeyDerivation(format!("entropy source unavailable: {}", e)))?;

        let mnemonic = Mnemonic::from_entropy(&entropy);
        entropy.zeroize();

        let mnemonic = mnemonic
            .map_err(|e| CoreError::KeyDerivation(format!("mnemonic encoding failed: {}", e)))?;
        Ok(SecretString::new(mnemonic.to_string()))
    }

    /// 由已有助记词确定性派生 (恢复 / 校验)
    pub fn derive_from_mnemonic(&self, phrase: &SecretString) -> CoreResult<DerivedWallet> {
        // 错误信息中不得回显助记词
        let mnemonic = Mnemonic::parse_in(Language::English, phrase.expose())
            .map_err(|_| CoreError::KeyDerivation("invalid mnemonic".to_string()))?;

        let mut seed = mnemonic.to_seed("");
        let derived = derive_signing_key(&seed);
        seed.zeroize();
        let signing_key = derived?;

        let mut private_key_bytes = signing_key.to_bytes().to_vec();
        let private_key = SecretString::new(hex::encode(&private_key_bytes));
        private_key_bytes.zeroize();

        let encoded_point = signing_key.verifying_key().to_encoded_point(false);
        let public_key_bytes = encoded_point.as_bytes();
        let address = address::encode(public_key_bytes)?;

        Ok(DerivedWallet {
            address,
            public_key: hex::encode(public_key_bytes),
            private_key,
            mnemonic: phrase.clone(),
        })
    }
}

impl KeyDerivation for Bip44TronDerivation {
    fn derive(&self, kind: WalletKind, owner: &str) -> CoreResult<DerivedWallet> {
        let mnemonic = self.generate_mnemonic()?;
        let wallet = self.derive_from_mnemonic(&mnemonic)?;

        tracing::debug!(
            owner = %owner,
            kind = %kind,
            address = %wallet.address,
            path = TRON_DERIVATION_PATH,
            "Derived wallet key material"
        );
        Ok(wallet)
    }
}

fn derive_signing_key(seed: &[u8]) -> CoreResult<SigningKey> {
    let path = TRON_DERIVATION_PATH
        .parse::<DerivationPath>()
        .map_err(|e| CoreError::KeyDerivation(format!("invalid derivation path: {}", e)))?;

    let master_key = XPriv::root_from_seed(seed, None)
        .map_err(|e| CoreError::KeyDerivation(format!("master key derivation failed: {}", e)))?;
    let derived_key = master_key
        .derive_path(&path)
        .map_err(|e| CoreError::KeyDerivation(format!("child key derivation failed: {}", e)))?;

    // XPriv 实现 AsRef<SigningKey>
    let signing_key: &SigningKey = derived_key.as_ref();
    Ok(signing_key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_derivation_is_deterministic() {
        let engine = Bip44TronDerivation::new();
        let phrase = SecretString::new(TEST_MNEMONIC);

        let first = engine.derive_from_mnemonic(&phrase).unwrap();
        let second = engine.derive_from_mnemonic(&phrase).unwrap();

        assert_eq!(first.address, second.address);
        assert_eq!(first.public_key, second.public_key);
        assert_eq!(first.private_key, second.private_key);
    }

    #[test]
    fn test_derived_address_matches_public_key() {
        let engine = Bip44TronDerivation::new();
        let wallet = engine
            .derive_from_mnemonic(&SecretString::new(TEST_MNEMONIC))
            .unwrap();

        let public_key = hex::decode(&wallet.public_key).unwrap();
        assert_eq!(public_key.len(), 65);
        assert_eq!(public_key[0], 0x04);
        assert_eq!(address::encode(&public_key).unwrap(), wallet.address);
        assert!(wallet.address.starts_with('T'));
        assert_eq!(wallet.address.len(), 34);
        assert!(address::is_valid(&wallet.address));

        // 私钥与公钥对应
        let key_bytes = hex::decode(wallet.private_key.expose()).unwrap();
        let signing_key = SigningKey::from_slice(&key_bytes).unwrap();
        assert_eq!(
            signing_key.verifying_key().to_encoded_point(false).as_bytes(),
            public_key.as_slice()
        );
    }

    #[test]
    fn test_fresh_wallets_use_twelve_words_and_differ() {
        let engine = Bip44TronDerivation::new();
        let a = engine.derive(WalletKind::Regular, "alice").unwrap();
        let b = engine.derive(WalletKind::Bank, "bank").unwrap();

        assert_eq!(a.mnemonic.expose().split_whitespace().count(), 12);
        assert_ne!(a.address, b.address);

        let recovered = engine.derive_from_mnemonic(&a.mnemonic).unwrap();
        assert_eq!(recovered.address, a.address);
    }

    #[test]
    fn test_invalid_mnemonic_error_does_not_echo_phrase() {
        let engine = Bip44TronDerivation::new();
        let err = engine
            .derive_from_mnemonic(&SecretString::new("correct horse battery staple"))
            .unwrap_err();

        assert!(matches!(err, CoreError::KeyDerivation(_)));
        assert!(!err.to_string().contains("horse"));
    }
}
