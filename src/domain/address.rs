//! TRON 地址编解码
//!
//! 地址 = Base58( 0x41 ‖ keccak256(pubkey[1..])[12..] ‖ checksum )，
//! checksum 为 21 字节载荷双重 SHA-256 的前 4 字节。

use sha2::{Digest, Sha256};
use sha3::Keccak256;

use crate::error::{CoreError, CoreResult};

/// 主网地址版本字节
pub const ADDRESS_VERSION: u8 = 0x41;

const RAW_ADDRESS_LEN: usize = 20;
const PAYLOAD_LEN: usize = RAW_ADDRESS_LEN + 1;
const CHECKSUM_LEN: usize = 4;
const ENCODED_LEN: usize = PAYLOAD_LEN + CHECKSUM_LEN;

/// 未压缩公钥 (65 字节，0x04 前缀) 或去前缀的 64 字节公钥 → TRON 地址
pub fn encode(public_key: &[u8]) -> CoreResult<String> {
    let key_body = match public_key.len() {
        65 if public_key[0] == 0x04 => &public_key[1..],
        64 => public_key,
        len => {
            return Err(CoreError::InvalidAddress(format!(
                "expected uncompressed secp256k1 public key, got {} bytes",
                len
            )))
        }
    };

    let hash = Keccak256::digest(key_body);
    let mut raw = [0u8; RAW_ADDRESS_LEN];
    raw.copy_from_slice(&hash[hash.len() - RAW_ADDRESS_LEN..]);

    Ok(encode_raw(&raw))
}

/// 20 字节原始地址 → Base58Check
pub fn encode_raw(raw: &[u8; RAW_ADDRESS_LEN]) -> String {
    let mut payload = Vec::with_capacity(ENCODED_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(raw);

    let checksum = checksum(&payload);
    payload.extend_from_slice(&checksum);

    bs58::encode(payload).into_string()
}

/// 校验并解码地址，返回去掉版本字节与校验和的 20 字节
pub fn decode(address: &str) -> CoreResult<[u8; RAW_ADDRESS_LEN]> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| CoreError::InvalidAddress(format!("{}: not base58 ({})", address, e)))?;

    if bytes.len() != ENCODED_LEN {
        return Err(CoreError::InvalidAddress(format!(
            "{}: decoded length {} != {}",
            address,
            bytes.len(),
            ENCODED_LEN
        )));
    }

    let (payload, sum) = bytes.split_at(PAYLOAD_LEN);
    if payload[0] != ADDRESS_VERSION {
        return Err(CoreError::InvalidAddress(format!(
            "{}: unexpected version byte 0x{:02x}",
            address, payload[0]
        )));
    }
    if checksum(payload) != sum {
        return Err(CoreError::InvalidAddress(format!("{}: checksum mismatch", address)));
    }

    let mut raw = [0u8; RAW_ADDRESS_LEN];
    raw.copy_from_slice(&payload[1..]);
    Ok(raw)
}

/// 合约调用参数使用的地址形式：不含版本字节的 40 位 hex
pub fn to_hex_param(address: &str) -> CoreResult<String> {
    decode(address).map(hex::encode)
}

pub fn is_valid(address: &str) -> bool {
    decode(address).is_ok()
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}
