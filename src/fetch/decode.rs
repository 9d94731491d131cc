use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppError;

use super::{FetchResult, ThotPair};

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawThot {
    #[serde(rename = "User", default)]
    user: Option<Value>,
    #[serde(rename = "Trade", default)]
    trade: Option<Value>,
}

/// Decode a `thots` body. Null items and items with neither half are dropped and counted.
pub fn decode_thots(body: &[u8]) -> FetchResult<(Vec<ThotPair>, usize)> {
    let items = data_array(body, "thots")?;
    let raw: Vec<Option<RawThot>> = serde_json::from_value(Value::Array(items))
        .map_err(|err| AppError::schema(format!("unexpected thot shape: {err}")))?;

    let total = raw.len();
    let pairs: Vec<ThotPair> = raw
        .into_iter()
        .flatten()
        .filter(|thot| thot.user.is_some() || thot.trade.is_some())
        .map(|thot| ThotPair {
            user: thot.user,
            trade: thot.trade,
        })
        .collect();

    let discarded = total - pairs.len();
    Ok((pairs, discarded))
}

/// Decode a `trades` body into bare trade objects. Null items are dropped and counted.
pub fn decode_trades(body: &[u8]) -> FetchResult<(Vec<Value>, usize)> {
    let items = data_array(body, "trades")?;
    let total = items.len();
    let trades: Vec<Value> = items.into_iter().filter(|item| !item.is_null()).collect();
    let discarded = total - trades.len();
    Ok((trades, discarded))
}

fn data_array(body: &[u8], key: &str) -> FetchResult<Vec<Value>> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|err| AppError::schema(format!("response is not a JSON envelope: {err}")))?;

    let mut data = envelope
        .data
        .ok_or_else(|| AppError::schema("response envelope is missing `data`"))?;

    match data.remove(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) | None => Err(AppError::schema(format!(
            "response envelope is missing `data.{key}`"
        ))),
        Some(_) => Err(AppError::schema(format!("`data.{key}` is not an array"))),
    }
}
