//! TRON 全节点 HTTP API 与 TronScan 索引服务客户端
//!
//! 只负责传输与报文解析，业务判断 (result=false 等) 由上层完成。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    config::TronConfig,
    error::{CoreError, CoreResult, LedgerStage},
};

pub const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";
pub const TRANSFER_SELECTOR: &str = "transfer(address,uint256)";

const ERROR_BODY_PREVIEW: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTransactionRequest {
    pub owner_address: String,
    pub to_address: String,
    /// sun
    pub amount: i64,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerSmartContractRequest {
    pub contract_address: String,
    pub function_selector: String,
    pub parameter: String,
    pub fee_limit: u64,
    pub call_value: u64,
    pub owner_address: String,
    pub visible: bool,
}

/// 节点返回的未签名交易
///
/// 未识别字段通过 `extra` 原样保留，广播时不做任何改动。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub raw_data: Value,
    pub raw_data_hex: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 已签名、可广播的交易，只能由签名器构造
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SignedTransaction(TransactionEnvelope);

impl SignedTransaction {
    pub(crate) fn new(envelope: TransactionEnvelope) -> Self {
        Self(envelope)
    }

    pub fn tx_id(&self) -> &str {
        &self.0.tx_id
    }

    pub fn signature(&self) -> &[String] {
        &self.0.signature
    }

    pub fn envelope(&self) -> &TransactionEnvelope {
        &self.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerResult {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerSmartContractResponse {
    #[serde(default)]
    pub result: TriggerResult,
    #[serde(default)]
    pub transaction: Option<TransactionEnvelope>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BroadcastResult {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
}

impl BroadcastResult {
    /// 失败原因；节点通常以 hex 编码返回 message
    pub fn reason(&self) -> String {
        let message = self.message.as_deref().map(decode_node_message);
        match (self.code.as_deref(), message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (Some(code), None) => code.to_string(),
            (None, Some(message)) => message,
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountToken {
    #[serde(rename = "tokenId")]
    pub token_id: String,
    /// 显示单位，TronScan 可能返回数字或字符串
    #[serde(default)]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AccountTokensResponse {
    #[serde(default)]
    data: Vec<AccountToken>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "blockNumber")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub receipt: Option<Receipt>,
    #[serde(default, rename = "resMessage")]
    pub res_message: Option<String>,
}

impl TransactionInfo {
    /// 原生转账的 receipt 不含 result 字段，只在存在时判断
    pub fn is_failed(&self) -> bool {
        if self.result.as_deref() == Some("FAILED") {
            return true;
        }
        matches!(
            self.receipt.as_ref().and_then(|r| r.result.as_deref()),
            Some(result) if result != "SUCCESS"
        )
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.res_message.as_deref().map(decode_node_message)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BlockRawData {
    #[serde(default)]
    number: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct BlockHeader {
    raw_data: BlockRawData,
}

#[derive(Debug, Clone, Deserialize)]
struct NowBlock {
    block_header: BlockHeader,
}

/// 账本节点能力
#[async_trait]
pub trait TronNode: Send + Sync {
    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> CoreResult<TransactionEnvelope>;

    async fn trigger_smart_contract(
        &self,
        request: &TriggerSmartContractRequest,
    ) -> CoreResult<TriggerSmartContractResponse>;

    async fn broadcast_transaction(&self, tx: &SignedTransaction) -> CoreResult<BroadcastResult>;

    async fn account_tokens(&self, address: &str) -> CoreResult<Vec<AccountToken>>;

    /// 节点尚未收录时返回 None
    async fn transaction_info(&self, tx_id: &str) -> CoreResult<Option<TransactionInfo>>;

    async fn latest_block_number(&self) -> CoreResult<u64>;
}

pub struct TronHttpClient {
    http_client: reqwest::Client,
    api_node_url: String,
    api_node_key: Option<String>,
    scan_url: String,
    scan_key: Option<String>,
    scan_page_limit: u32,
}

impl TronHttpClient {
    pub fn new(config: &TronConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client: client,
            api_node_url: normalize_base_url(&config.api_node_url),
            api_node_key: config.api_node_key.clone().filter(|k| !k.is_empty()),
            scan_url: normalize_base_url(&config.scan_url),
            scan_key: config.scan_key.clone().filter(|k| !k.is_empty()),
            scan_page_limit: config.scan_page_limit,
        }
    }

    pub fn api_node_url(&self) -> &str {
        &self.api_node_url
    }

    async fn post<B, T>(&self, stage: LedgerStage, path: &str, body: &B) -> CoreResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.api_node_url, path);
        let mut request = self
            .http_client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(body);
        if let Some(key) = &self.api_node_key {
            request = request.header(API_KEY_HEADER, key);
        }

        tracing::debug!(stage = %stage, url = %url, "Calling TRON node");
        let response = request
            .send()
            .await
            .map_err(|e| CoreError::network(stage, e))?;

        decode_response(stage, response).await
    }
}

#[async_trait]
impl TronNode for TronHttpClient {
    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> CoreResult<TransactionEnvelope> {
        self.post(
            LedgerStage::CreateTransaction,
            "/wallet/createtransaction",
            request,
        )
        .await
    }

    async fn trigger_smart_contract(
        &self,
        request: &TriggerSmartContractRequest,
    ) -> CoreResult<TriggerSmartContractResponse> {
        self.post(
            LedgerStage::TriggerSmartContract,
            "/wallet/triggersmartcontract",
            request,
        )
        .await
    }

    async fn broadcast_transaction(&self, tx: &SignedTransaction) -> CoreResult<BroadcastResult> {
        self.post(LedgerStage::Broadcast, "/wallet/broadcasttransaction", tx)
            .await
    }

    async fn account_tokens(&self, address: &str) -> CoreResult<Vec<AccountToken>> {
        let stage = LedgerStage::AccountTokens;
        let url = format!("{}/account/tokens", self.scan_url);
        let limit = self.scan_page_limit.to_string();

        let mut request = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(&[
                ("address", address),
                ("start", "0"),
                ("limit", limit.as_str()),
                ("hidden", "0"),
                ("show", "0"),
                ("sortType", "0"),
                ("sortBy", "0"),
            ]);
        if let Some(key) = &self.scan_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::network(stage, e))?;
        let body: AccountTokensResponse = decode_response(stage, response).await?;
        Ok(body.data)
    }

    async fn transaction_info(&self, tx_id: &str) -> CoreResult<Option<TransactionInfo>> {
        let info: TransactionInfo = self
            .post(
                LedgerStage::TransactionInfo,
                "/wallet/gettransactioninfobyid",
                &serde_json::json!({ "value": tx_id }),
            )
            .await?;

        // 空对象表示节点尚未收录
        Ok(info.id.is_some().then_some(info))
    }

    async fn latest_block_number(&self) -> CoreResult<u64> {
        let block: NowBlock = self
            .post(
                LedgerStage::LatestBlock,
                "/wallet/getnowblock",
                &serde_json::json!({}),
            )
            .await?;
        Ok(block.block_header.raw_data.number)
    }
}

async fn decode_response<T: DeserializeOwned>(
    stage: LedgerStage,
    response: reqwest::Response,
) -> CoreResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CoreError::network(
            stage,
            format!("HTTP {}: {}", status, preview(&body)),
        ));
    }

    let value: Value = response
        .json()
        .await
        .map_err(|e| CoreError::network(stage, format!("invalid JSON body: {}", e)))?;

    parse_node_value(stage, value)
}

/// 节点在 HTTP 200 中以 {"Error": ...} 表示拒绝
fn parse_node_value<T: DeserializeOwned>(stage: LedgerStage, value: Value) -> CoreResult<T> {
    if let Some(err) = value.get("Error") {
        let message = err
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(CoreError::rejected(stage, message));
    }

    serde_json::from_value(value)
        .map_err(|e| CoreError::network(stage, format!("unexpected response shape: {}", e)))
}

/// 补全协议前缀并去掉结尾斜杠
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// hex 编码的节点消息解码为文本，失败时原样返回
pub fn decode_node_message(message: &str) -> String {
    hex::decode(message)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| message.to_string())
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("api.trongrid.io/"),
            "https://api.trongrid.io"
        );
        assert_eq!(
            normalize_base_url("http://127.0.0.1:8090"),
            "http://127.0.0.1:8090"
        );
    }

    #[test]
    fn test_envelope_preserves_unknown_fields() {
        let raw = json!({
            "visible": true,
            "txID": "abcd",
            "raw_data": { "expiration": 1, "contract": [] },
            "raw_data_hex": "0a02",
            "ret": [{ "contractRet": "SUCCESS" }]
        });

        let envelope: TransactionEnvelope = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(envelope.tx_id, "abcd");
        assert!(envelope.signature.is_empty());

        let back = serde_json::to_value(&envelope).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_broadcast_reason_decodes_hex_message() {
        let result: BroadcastResult = serde_json::from_value(json!({
            "code": "SIGERROR",
            "message": hex::encode("validate signature error")
        }))
        .unwrap();

        assert!(!result.result);
        assert_eq!(result.reason(), "SIGERROR: validate signature error");
    }

    #[test]
    fn test_error_key_is_rejection() {
        let err = parse_node_value::<TransactionEnvelope>(
            LedgerStage::CreateTransaction,
            json!({ "Error": "class org.tron.core.exception.ContractValidateException : balance is not sufficient" }),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Rejected {
                stage: LedgerStage::CreateTransaction,
                ..
            }
        ));
    }

    #[test]
    fn test_transaction_info_failure_detection() {
        let pending: TransactionInfo = serde_json::from_value(json!({})).unwrap();
        assert!(pending.id.is_none());
        assert!(!pending.is_failed());

        let native_ok: TransactionInfo = serde_json::from_value(json!({
            "id": "aa", "blockNumber": 100, "receipt": { "net_usage": 268 }
        }))
        .unwrap();
        assert!(!native_ok.is_failed());

        let reverted: TransactionInfo = serde_json::from_value(json!({
            "id": "bb", "blockNumber": 100, "result": "FAILED",
            "receipt": { "result": "REVERT" },
            "resMessage": hex::encode("REVERT opcode executed")
        }))
        .unwrap();
        assert!(reverted.is_failed());
        assert_eq!(reverted.failure_reason().unwrap(), "REVERT opcode executed");

        let out_of_energy: TransactionInfo = serde_json::from_value(json!({
            "id": "cc", "blockNumber": 100, "receipt": { "result": "OUT_OF_ENERGY" }
        }))
        .unwrap();
        assert!(out_of_energy.is_failed());
    }

    #[test]
    fn test_account_tokens_accept_string_and_number_quantity() {
        let body: AccountTokensResponse = serde_json::from_value(json!({
            "data": [
                { "tokenId": "_", "quantity": 12.5 },
                { "tokenId": "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", "quantity": "3.25" },
                { "tokenId": "1002000" }
            ]
        }))
        .unwrap();

        assert_eq!(body.data.len(), 3);
        assert_eq!(body.data[0].quantity, Decimal::new(125, 1));
        assert_eq!(body.data[1].quantity, Decimal::new(325, 2));
        assert_eq!(body.data[2].quantity, Decimal::ZERO);
    }

    #[test]
    fn test_now_block_number() {
        let block: NowBlock = serde_json::from_value(json!({
            "blockID": "00",
            "block_header": { "raw_data": { "number": 61234567, "timestamp": 1 } }
        }))
        .unwrap();
        assert_eq!(block.block_header.raw_data.number, 61_234_567);
    }
}
