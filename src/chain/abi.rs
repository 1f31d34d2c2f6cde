//! Minimal Solidity ABI encoding for the static argument types the vault
//! contracts use (`uint*`, `address`, `bool`).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sha3::{Digest, Keccak256};
use std::str::FromStr;

use super::ChainError;

pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Splits `name(type,type)` into the canonical signature and its argument types.
pub fn parse_signature(signature: &str) -> Result<(String, Vec<String>), ChainError> {
    let open = signature
        .find('(')
        .ok_or_else(|| ChainError::Encoding(format!("'{}' is not a function signature", signature)))?;
    if !signature.ends_with(')') {
        return Err(ChainError::Encoding(format!(
            "'{}' is not a function signature",
            signature
        )));
    }

    let name = signature[..open].trim();
    let types: Vec<String> = signature[open + 1..signature.len() - 1]
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let canonical = format!("{}({})", name, types.join(","));
    Ok((canonical, types))
}

/// Converts a decimal token amount into integer base units.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<u128, ChainError> {
    let value = Decimal::from_str(amount.trim())
        .map_err(|e| ChainError::InvalidParameters(format!("amount '{}': {}", amount, e)))?;
    if value.is_sign_negative() {
        return Err(ChainError::InvalidParameters(format!(
            "amount '{}' is negative",
            amount
        )));
    }

    let scale = Decimal::from(10u64.pow(decimals));
    let scaled = value
        .checked_mul(scale)
        .ok_or_else(|| ChainError::InvalidParameters(format!("amount '{}' overflows", amount)))?;
    if !scaled.fract().is_zero() {
        return Err(ChainError::InvalidParameters(format!(
            "amount '{}' has more than {} decimals",
            amount, decimals
        )));
    }

    scaled
        .to_u128()
        .ok_or_else(|| ChainError::InvalidParameters(format!("amount '{}' overflows", amount)))
}

fn encode_uint(value: &Value) -> Result<[u8; 32], ChainError> {
    let n: u128 = match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| ChainError::Encoding(format!("{} is not an unsigned integer", n)))?,
        Value::String(s) => to_base_units(s, 0)?,
        other => {
            return Err(ChainError::Encoding(format!(
                "{} is not an unsigned integer",
                other
            )))
        }
    };
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&n.to_be_bytes());
    Ok(word)
}

// Caller guarantees an ASCII hex digit
fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

fn encode_address(value: &Value) -> Result<[u8; 32], ChainError> {
    let text = value
        .as_str()
        .ok_or_else(|| ChainError::Encoding(format!("{} is not an address", value)))?;
    let hex = text.strip_prefix("0x").unwrap_or(text).as_bytes();
    if hex.len() != 40 || !hex.iter().all(u8::is_ascii_hexdigit) {
        return Err(ChainError::Encoding(format!("'{}' is not an address", text)));
    }

    let mut word = [0u8; 32];
    for (i, pair) in hex.chunks(2).enumerate() {
        word[12 + i] = (hex_value(pair[0]) << 4) | hex_value(pair[1]);
    }
    Ok(word)
}

fn encode_bool(value: &Value) -> Result<[u8; 32], ChainError> {
    let flag = match value {
        Value::Bool(b) => *b,
        Value::String(s) if s == "true" => true,
        Value::String(s) if s == "false" => false,
        other => return Err(ChainError::Encoding(format!("{} is not a bool", other))),
    };
    let mut word = [0u8; 32];
    word[31] = flag as u8;
    Ok(word)
}

/// ABI-encodes a call: 4-byte selector followed by one word per argument.
pub fn encode_call(signature: &str, args: &[Value]) -> Result<Vec<u8>, ChainError> {
    let (canonical, types) = parse_signature(signature)?;
    if types.len() != args.len() {
        return Err(ChainError::Encoding(format!(
            "{} expects {} arguments, got {}",
            canonical,
            types.len(),
            args.len()
        )));
    }

    let mut data = selector(&canonical).to_vec();
    for (ty, arg) in types.iter().zip(args) {
        let word = match ty.as_str() {
            t if t.starts_with("uint") => encode_uint(arg)?,
            "address" => encode_address(arg)?,
            "bool" => encode_bool(arg)?,
            other => {
                return Err(ChainError::Encoding(format!(
                    "unsupported argument type '{}'",
                    other
                )))
            }
        };
        data.extend_from_slice(&word);
    }
    Ok(data)
}
