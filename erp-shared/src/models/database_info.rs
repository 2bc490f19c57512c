//! Physical database description of a tenant
//!
//! `DatabaseInfo` is an immutable value object. Every change produces a new
//! value through one of the `with_*` methods; nothing is mutated in place.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;

use super::error::{required, DomainError};

/// Where a tenant's business database lives and how to reach it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    database_name: String,
    server: String,
    port: u16,
    username: String,
    password: String,
    created_at: DateTime<Utc>,
    last_maintenance_at: Option<DateTime<Utc>>,
    last_backup_at: Option<DateTime<Utc>>,
}

impl DatabaseInfo {
    /// Creates a new database description
    ///
    /// # Errors
    ///
    /// Returns a validation error when a name is blank, the port is zero, or
    /// the database name contains characters other than ASCII letters,
    /// digits and underscores.
    pub fn new(
        database_name: &str,
        server: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<Self, DomainError> {
        let database_name = required("database_name", database_name)?;
        if !database_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DomainError::invalid(
                "database_name",
                "only letters, digits and underscores are allowed",
            ));
        }

        Ok(Self {
            database_name,
            server: required("server", server)?,
            port: validate_port(port)?,
            username: required("username", username)?,
            password: password.to_string(),
            created_at: Utc::now(),
            last_maintenance_at: None,
            last_backup_at: None,
        })
    }

    /// Restores a value loaded from storage without re-validating it
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        database_name: String,
        server: String,
        port: u16,
        username: String,
        password: String,
        created_at: DateTime<Utc>,
        last_maintenance_at: Option<DateTime<Utc>>,
        last_backup_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            database_name,
            server,
            port,
            username,
            password,
            created_at,
            last_maintenance_at,
            last_backup_at,
        }
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_maintenance_at(&self) -> Option<DateTime<Utc>> {
        self.last_maintenance_at
    }

    pub fn last_backup_at(&self) -> Option<DateTime<Utc>> {
        self.last_backup_at
    }

    /// Returns a copy pointing at another server
    pub fn with_server(&self, server: &str, port: u16) -> Result<Self, DomainError> {
        Ok(Self {
            server: required("server", server)?,
            port: validate_port(port)?,
            ..self.clone()
        })
    }

    /// Returns a copy with rotated credentials
    pub fn with_credentials(&self, username: &str, password: &str) -> Result<Self, DomainError> {
        Ok(Self {
            username: required("username", username)?,
            password: password.to_string(),
            ..self.clone()
        })
    }

    /// Returns a copy with the maintenance timestamp set
    pub fn with_maintenance(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_maintenance_at: Some(at),
            ..self.clone()
        }
    }

    /// Returns a copy with the backup timestamp set
    pub fn with_backup(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_backup_at: Some(at),
            ..self.clone()
        }
    }

    /// Driver connect options for this database
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.server)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database_name)
    }

    /// Connection URL with the password in clear text
    ///
    /// Only used for provisioning (`CREATE DATABASE`); never log it.
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.server, self.port, self.database_name
        )
    }
}

fn validate_port(port: u16) -> Result<u16, DomainError> {
    if port == 0 {
        return Err(DomainError::invalid("port", "must be between 1 and 65535"));
    }
    Ok(port)
}

// Password is redacted so the value can be logged.
impl fmt::Display for DatabaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "postgres://{}:***@{}:{}/{}",
            self.username, self.server, self.port, self.database_name
        )
    }
}

impl fmt::Debug for DatabaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseInfo")
            .field("database_name", &self.database_name)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("created_at", &self.created_at)
            .field("last_maintenance_at", &self.last_maintenance_at)
            .field("last_backup_at", &self.last_backup_at)
            .finish()
    }
}
