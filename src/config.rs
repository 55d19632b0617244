// src/config.rs
//! Environment-driven configuration for the relay server and the terminal client.
//! Both binaries call `dotenvy::dotenv()` first, so a local `.env` file works too.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::groq_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_RELAY_URL: &str = "http://localhost:3000/api/generate-code";
pub const DEFAULT_DATA_DIR: &str = ".codegen-chat";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub groq_api_key: String,
    pub groq_base_url: String,
    pub groq_model: String,
    pub bind_addr: SocketAddr,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let groq_api_key = lookup("GROQ_API_KEY")
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("GROQ_API_KEY"))?;

        let host = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
        let addr = format!("{}:{}", host, port);
        let bind_addr = addr.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR/PORT",
            value: addr.clone(),
        })?;

        Ok(Self {
            groq_api_key,
            groq_base_url: lookup("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            groq_model: lookup("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            bind_addr,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay_url: String,
    pub data_dir: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            relay_url: lookup("RELAY_URL").unwrap_or_else(|| DEFAULT_RELAY_URL.to_string()),
            data_dir: lookup("CHAT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        }
    }
}
