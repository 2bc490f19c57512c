//! Tenant settings value object

use serde::{Deserialize, Serialize};

use super::error::{required, DomainError};

/// Per-tenant preferences and limits
///
/// Stored as JSONB on the tenant row. Missing keys fall back to defaults so
/// older rows keep deserializing when fields are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantSettings {
    pub time_zone: String,
    pub language: String,
    pub currency: String,
    pub date_format: String,
    pub max_users: u32,
    pub storage_quota_mb: u64,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            language: "en".to_string(),
            currency: "USD".to_string(),
            date_format: "YYYY-MM-DD".to_string(),
            max_users: 10,
            storage_quota_mb: 1024,
        }
    }
}

impl TenantSettings {
    pub fn with_time_zone(self, time_zone: &str) -> Result<Self, DomainError> {
        Ok(Self {
            time_zone: required("time_zone", time_zone)?,
            ..self
        })
    }

    pub fn with_language(self, language: &str) -> Result<Self, DomainError> {
        Ok(Self {
            language: required("language", language)?.to_lowercase(),
            ..self
        })
    }

    /// Currency must be a three-letter ISO 4217 code
    pub fn with_currency(self, currency: &str) -> Result<Self, DomainError> {
        let currency = required("currency", currency)?.to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::invalid("currency", "expected a 3-letter ISO code"));
        }
        Ok(Self { currency, ..self })
    }

    pub fn with_date_format(self, date_format: &str) -> Result<Self, DomainError> {
        Ok(Self {
            date_format: required("date_format", date_format)?,
            ..self
        })
    }

    pub fn with_limits(self, max_users: u32, storage_quota_mb: u64) -> Result<Self, DomainError> {
        if max_users == 0 {
            return Err(DomainError::invalid("max_users", "must be at least 1"));
        }
        Ok(Self {
            max_users,
            storage_quota_mb,
            ..self
        })
    }
}
