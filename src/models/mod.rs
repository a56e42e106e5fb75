//! Document schemas: typed records, field rules, defaults and the query helpers
//! that belong to each collection.
//!
//! Every collection follows the same shape:
//!
//! - a record struct serialized into API responses,
//! - `Create*`/`Update*` request bodies implementing [`validate::Validate`],
//! - associated async helpers (`insert`, `find_by_id`, `list`, `stats`, ...) that own
//!   the SQL for that table.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Declares a string-backed enum stored as TEXT and serialized as snake_case.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

pub mod order;
pub mod product;
pub mod profile;
pub mod report;
pub mod shop;
pub mod supplier;
pub mod user;
pub mod validate;

string_enum! {
    /// Product line shared by suppliers and products.
    Category {
        Seeds => "seeds",
        Fertilizers => "fertilizers",
        Pesticides => "pesticides",
        Equipment => "equipment",
        Feed => "feed",
        Veterinary => "veterinary",
        Irrigation => "irrigation",
        Other => "other",
    }
}

/// Formats a timestamp the way every table stores it (fixed-width UTC, sortable as text).
pub fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_ts() -> String {
    ts(Utc::now())
}

pub fn parse_ts(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("stored timestamp '{}' is malformed: {}", raw, e)))
}

pub fn parse_opt_ts(raw: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

pub fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::Internal(anyhow::anyhow!("stored id '{}' is malformed: {}", raw, e)))
}

pub fn parse_opt_id(raw: Option<String>) -> AppResult<Option<Uuid>> {
    raw.as_deref().map(parse_id).transpose()
}

pub fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> AppResult<T> {
    raw.parse::<T>().map_err(|e| AppError::Internal(anyhow::anyhow!("stored value is malformed: {}", e)))
}

/// Decodes a JSON-text list column.
pub fn parse_json_list<T: serde::de::DeserializeOwned>(raw: &str) -> AppResult<Vec<T>> {
    Ok(serde_json::from_str(raw)?)
}

/// Human label for a 0..=5 rating.
pub fn rating_description(rating: f64) -> &'static str {
    if rating <= 0.0 {
        "Not Rated"
    } else if rating < 1.5 {
        "Poor"
    } else if rating < 2.5 {
        "Fair"
    } else if rating < 3.5 {
        "Good"
    } else if rating < 4.5 {
        "Very Good"
    } else {
        "Excellent"
    }
}
