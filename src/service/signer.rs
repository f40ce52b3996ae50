//! 交易构造与签名
//!
//! 原生 TRX 走 createtransaction，TRC-20 走 triggersmartcontract
//! 调用 `transfer(address,uint256)`。签名对 raw_data_hex 的 SHA-256
//! 摘要做可恢复 ECDSA，得到 65 字节 r‖s‖v。

use k256::ecdsa::SigningKey;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{
    domain::{address, models::Transfer, secret::SecretString, token::TokenRegistry},
    error::{CoreError, CoreResult},
    service::tron_client::{
        CreateTransactionRequest, SignedTransaction, TransactionEnvelope,
        TriggerSmartContractRequest, TRANSFER_SELECTOR,
    },
};

/// 显示单位 → 最小单位，截断小数部分
pub fn to_base_units(amount: Decimal, decimals: u32) -> CoreResult<u128> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }

    let mut scaled = amount;
    for _ in 0..decimals {
        scaled = scaled.checked_mul(Decimal::TEN).ok_or_else(|| {
            CoreError::InvalidAmount(format!("amount {} overflows at {} decimals", amount, decimals))
        })?;
    }

    let units = scaled.trunc();
    if units.is_zero() {
        return Err(CoreError::InvalidAmount(format!(
            "amount {} is below the smallest unit",
            amount
        )));
    }

    units
        .to_u128()
        .ok_or_else(|| CoreError::InvalidAmount(format!("amount {} out of range", amount)))
}

/// ABI 编码 transfer(address,uint256) 参数：两个 32 字节字
pub fn encode_transfer_parameters(to_address: &str, units: u128) -> CoreResult<String> {
    let recipient = address::to_hex_param(to_address)?;
    Ok(format!("{:0>64}{:064x}", recipient, units))
}

/// 发往节点的构造请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    Native(CreateTransactionRequest),
    Contract(TriggerSmartContractRequest),
}

#[derive(Debug, Clone)]
pub struct TransactionSigner {
    registry: TokenRegistry,
    fee_limit: u64,
}

impl TransactionSigner {
    pub fn new(registry: TokenRegistry, fee_limit: u64) -> Self {
        Self {
            registry,
            fee_limit,
        }
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// 构造未签名交易请求；所有本地校验在任何网络调用之前完成
    pub fn build(&self, transfer: &Transfer) -> CoreResult<TransferCall> {
        address::decode(&transfer.from_address)?;
        address::decode(&transfer.to_address)?;

        let token = self.registry.get(&transfer.token)?;
        let units = to_base_units(transfer.amount, token.decimals)?;

        if token.is_native() {
            let amount = i64::try_from(units).map_err(|_| {
                CoreError::InvalidAmount(format!("amount {} out of range", transfer.amount))
            })?;
            return Ok(TransferCall::Native(CreateTransactionRequest {
                owner_address: transfer.from_address.clone(),
                to_address: transfer.to_address.clone(),
                amount,
                visible: true,
            }));
        }

        Ok(TransferCall::Contract(TriggerSmartContractRequest {
            contract_address: token.contract_address.clone(),
            function_selector: TRANSFER_SELECTOR.to_string(),
            parameter: encode_transfer_parameters(&transfer.to_address, units)?,
            fee_limit: self.fee_limit,
            call_value: 0,
            owner_address: transfer.from_address.clone(),
            visible: true,
        }))
    }

    /// 对未签名交易签名，除 signature 外不修改任何字段
    pub fn sign(
        &self,
        mut envelope: TransactionEnvelope,
        private_key: &SecretString,
    ) -> CoreResult<SignedTransaction> {
        let raw = hex::decode(&envelope.raw_data_hex)
            .map_err(|e| CoreError::Signing(format!("raw_data_hex is not valid hex: {}", e)))?;
        let digest = Sha256::digest(&raw);

        if !envelope.tx_id.eq_ignore_ascii_case(&hex::encode(digest)) {
            return Err(CoreError::Signing(format!(
                "txID {} does not match raw_data_hex digest",
                envelope.tx_id
            )));
        }

        let signing_key = parse_private_key(private_key)?;
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| CoreError::Signing(format!("ecdsa signing failed: {}", e)))?;

        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte());
        envelope.signature = vec![hex::encode(bytes)];

        Ok(SignedTransaction::new(envelope))
    }
}

fn parse_private_key(private_key: &SecretString) -> CoreResult<SigningKey> {
    // 错误信息中不得包含私钥内容
    let mut key_bytes = hex::decode(private_key.expose())
        .map_err(|_| CoreError::Signing("private key is not valid hex".to_string()))?;
    let signing_key = SigningKey::from_slice(&key_bytes)
        .map_err(|_| CoreError::Signing("private key is not a valid secp256k1 scalar".to_string()));
    key_bytes.zeroize();
    signing_key
}
