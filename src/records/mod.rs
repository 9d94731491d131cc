use std::fmt;

use serde_json::{Map, Value};

use crate::error::{AppError, Result};

pub mod lock;
pub mod store;

pub use lock::RunLock;
pub use store::{JsonStore, UpsertOutcome};

/// Field every stored document is keyed on.
pub const GUID_FIELD: &str = "guid";
pub const USERNAME_FIELD: &str = "username";
pub const SYMBOL_FIELD: &str = "symbol";

/// The two logical tables inside the store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Users,
    Trades,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Users, Table::Trades];

    pub fn name(self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Trades => "trades",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JSON object that is guaranteed to carry a non-empty string `guid`.
///
/// Every other field is kept verbatim so the store mirrors what the API sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(AppError::schema(format!(
                    "expected a JSON object, found {}",
                    kind_of(&other)
                )));
            }
        };

        match map.get(GUID_FIELD) {
            Some(Value::String(guid)) if !guid.is_empty() => Ok(Record(map)),
            Some(Value::String(_)) => Err(AppError::schema("record has an empty `guid`")),
            Some(other) => Err(AppError::schema(format!(
                "record `guid` must be a string, found {}",
                kind_of(other)
            ))),
            None => Err(AppError::schema("record is missing the `guid` field")),
        }
    }

    pub fn guid(&self) -> &str {
        self.str_field(GUID_FIELD).unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String value of `field`, if present and a string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

/// Trader profile half of a thot.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord(Record);

impl UserRecord {
    pub fn from_value(value: Value) -> Result<Self> {
        Record::from_value(value).map(UserRecord)
    }

    pub fn username(&self) -> Option<&str> {
        self.0.str_field(USERNAME_FIELD)
    }

    pub fn guid(&self) -> &str {
        self.0.guid()
    }
}

/// Options trade half of a thot.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord(Record);

impl TradeRecord {
    pub fn from_value(value: Value) -> Result<Self> {
        Record::from_value(value).map(TradeRecord)
    }

    pub fn symbol(&self) -> Option<&str> {
        self.0.str_field(SYMBOL_FIELD)
    }

    pub fn guid(&self) -> &str {
        self.0.guid()
    }
}

impl From<UserRecord> for Record {
    fn from(user: UserRecord) -> Self {
        user.0
    }
}

impl From<TradeRecord> for Record {
    fn from(trade: TradeRecord) -> Self {
        trade.0
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
