use std::{collections::HashMap, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Reserved hash holding the next identifier to hand out. Never an account.
pub const COUNTER_KEY: &str = "nextId";
pub const COUNTER_FIELD: &str = "nextId";

const FIELD_ID: &str = "id";
const FIELD_NAME: &str = "name";
const FIELD_BALANCE: &str = "balance";
const FIELD_ACTIVE: &str = "active";

/// A persisted bank account.
///
/// Stored as a hash keyed by the decimal id with string fields `id`, `name`,
/// `balance` and `active` (`1`/`0`). The balance travels as a decimal string
/// on the wire too, so it never passes through a float.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: u64,
    pub name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub active: bool,
}

impl Account {
    pub fn new(id: u64, fields: AccountFields) -> Self {
        Self { id, name: fields.name, balance: fields.balance, active: fields.active }
    }

    /// Hash fields in write order.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_ID, self.id.to_string()),
            (FIELD_NAME, self.name.clone()),
            (FIELD_BALANCE, self.balance.to_string()),
            (FIELD_ACTIVE, encode_active(self.active).to_string()),
        ]
    }

    /// Decode a stored hash. A hash missing any required field is not an
    /// account and yields `Ok(None)`; a field that is present but unreadable
    /// is reported as corrupt.
    pub fn from_fields(key: &str, hash: &HashMap<String, String>) -> Result<Option<Self>, ServiceError> {
        let (Some(id), Some(name), Some(balance), Some(active)) = (
            hash.get(FIELD_ID),
            hash.get(FIELD_NAME),
            hash.get(FIELD_BALANCE),
            hash.get(FIELD_ACTIVE),
        ) else {
            return Ok(None);
        };

        let corrupt = |reason: String| ServiceError::Corrupt { key: key.to_string(), reason };
        let id = id.parse::<u64>().map_err(|e| corrupt(format!("id {id:?}: {e}")))?;
        let balance = Decimal::from_str(balance.trim())
            .map_err(|e| corrupt(format!("balance {balance:?}: {e}")))?;
        let active = parse_active(active).ok_or_else(|| corrupt(format!("active {active:?}")))?;

        Ok(Some(Self { id, name: name.clone(), balance, active }))
    }
}

pub(crate) fn encode_active(active: bool) -> &'static str {
    if active { "1" } else { "0" }
}

// 兼容历史数据：旧服务写入过 "True"/"False"
fn parse_active(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "True" | "TRUE" => Some(true),
        "0" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Parse a path segment into an account id. The counter key, non-numeric
/// text, zero and non-canonical forms such as `007` are not account ids.
pub fn parse_account_key(raw: &str) -> Option<u64> {
    if raw == COUNTER_KEY {
        return None;
    }
    let id = raw.parse::<u64>().ok()?;
    (id > 0 && id.to_string() == raw).then_some(id)
}

/// The active flag as clients send it: a JSON bool, `0`/`1`, or a string
/// spelling of either.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawActive")]
pub struct ActiveFlag(pub bool);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawActive {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl TryFrom<RawActive> for ActiveFlag {
    type Error = String;

    fn try_from(raw: RawActive) -> Result<Self, Self::Error> {
        match raw {
            RawActive::Bool(b) => Ok(Self(b)),
            RawActive::Int(0) => Ok(Self(false)),
            RawActive::Int(1) => Ok(Self(true)),
            RawActive::Int(n) => Err(format!("active must be 0 or 1, got {n}")),
            RawActive::Str(s) => parse_active(&s)
                .map(Self)
                .ok_or_else(|| format!("active must be true/false or 0/1, got {s:?}")),
        }
    }
}

/// Create/update payload. Every field is optional at the wire level so that
/// absent and null fields can be reported together by [`AccountInput::validate`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AccountInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub balance: Option<Decimal>,
    #[serde(default)]
    pub active: Option<ActiveFlag>,
}

/// An [`AccountInput`] with all three fields present.
#[derive(Clone, Debug, PartialEq)]
pub struct AccountFields {
    pub name: String,
    pub balance: Decimal,
    pub active: bool,
}

impl AccountInput {
    /// Names of the absent fields, in `active`, `balance`, `name` order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.active.is_none() {
            missing.push(FIELD_ACTIVE);
        }
        if self.balance.is_none() {
            missing.push(FIELD_BALANCE);
        }
        if self.name.is_none() {
            missing.push(FIELD_NAME);
        }
        missing
    }

    pub fn validate(self) -> Result<AccountFields, ServiceError> {
        match (self.name, self.balance, self.active) {
            (Some(name), Some(balance), Some(ActiveFlag(active))) => Ok(AccountFields { name, balance, active }),
            (name, balance, active) => Err(ServiceError::Validation {
                missing: AccountInput { name, balance, active }.missing_fields(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn input(v: serde_json::Value) -> AccountInput {
        serde_json::from_value(v).expect("valid input json")
    }

    #[test]
    fn validate_accepts_complete_payload() {
        let fields = input(json!({"name": "alice", "balance": 100, "active": true}))
            .validate()
            .unwrap();
        assert_eq!(fields.name, "alice");
        assert_eq!(fields.balance, Decimal::from(100));
        assert!(fields.active);
    }

    #[test]
    fn validate_lists_missing_and_null_fields() {
        let err = input(json!({"name": "alice", "active": 1})).validate().unwrap_err();
        assert!(matches!(&err, ServiceError::Validation { missing } if missing == &vec!["balance"]));
        assert_eq!(err.to_string(), "Missing balance");

        let err = input(json!({"name": null})).validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation { missing } if missing == vec!["active", "balance", "name"]));
    }

    #[test]
    fn active_flag_spellings() {
        for (raw, want) in [
            (json!(true), true),
            (json!(0), false),
            (json!(1), true),
            (json!("True"), true),
            (json!("0"), false),
            (json!("false"), false),
        ] {
            let flag: ActiveFlag = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(flag.0, want, "{raw}");
        }
        assert!(serde_json::from_value::<ActiveFlag>(json!(2)).is_err());
        assert!(serde_json::from_value::<ActiveFlag>(json!("maybe")).is_err());
    }

    #[test]
    fn balance_accepts_numbers_and_strings() {
        let a = input(json!({"balance": "-12.50"}));
        assert_eq!(a.balance, Some(Decimal::new(-1250, 2)));
        let b = input(json!({"balance": 7}));
        assert_eq!(b.balance, Some(Decimal::from(7)));
    }

    #[test]
    fn hash_encoding_is_readable_back() {
        let account = Account { id: 3, name: "bob".into(), balance: Decimal::new(-505, 1), active: false };
        let hash: HashMap<String, String> =
            account.to_fields().into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        assert_eq!(hash["active"], "0");
        assert_eq!(hash["balance"], "-50.5");
        assert_eq!(Account::from_fields("3", &hash).unwrap(), Some(account));
    }

    #[test]
    fn high_precision_balance_survives_json() {
        let fields = input(json!({"name": "big", "balance": "12345678901234567.89", "active": true}))
            .validate()
            .unwrap();
        let account = Account::new(1, fields);
        let wire = serde_json::to_value(&account).unwrap();
        assert_eq!(wire["balance"], "12345678901234567.89");

        // a client echoing the record back must not change the balance
        let echoed: AccountInput = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(echoed.balance, Some(account.balance));
        let parsed: Account = serde_json::from_value(wire).unwrap();
        assert_eq!(parsed, account);
    }

    #[test]
    fn partial_hash_is_not_an_account() {
        let hash: HashMap<String, String> = [("id".to_string(), "4".to_string()), ("name".to_string(), "x".to_string())].into();
        assert_eq!(Account::from_fields("4", &hash).unwrap(), None);
    }

    #[test]
    fn unreadable_field_is_corrupt() {
        let hash: HashMap<String, String> = [
            ("id".to_string(), "4".to_string()),
            ("name".to_string(), "x".to_string()),
            ("balance".to_string(), "lots".to_string()),
            ("active".to_string(), "1".to_string()),
        ]
        .into();
        assert!(matches!(Account::from_fields("4", &hash), Err(ServiceError::Corrupt { .. })));
    }

    #[test]
    fn account_keys() {
        assert_eq!(parse_account_key("12"), Some(12));
        assert_eq!(parse_account_key(COUNTER_KEY), None);
        assert_eq!(parse_account_key("0"), None);
        assert_eq!(parse_account_key("007"), None);
        assert_eq!(parse_account_key("abc"), None);
        assert_eq!(parse_account_key("-1"), None);
    }
}
