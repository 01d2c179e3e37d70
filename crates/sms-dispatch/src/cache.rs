//! Confirmation Cache
//!
//! Best-effort key/value store for delivery confirmations. Nothing in the
//! dispatch path depends on a write succeeding.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::{DispatchError, Result};

#[async_trait]
pub trait ConfirmationCache: Send + Sync {
    /// Store `value` under `key`. `ttl == None` means no expiration.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
}

/// Redis-backed cache using a shared `ConnectionManager`
pub struct RedisConfirmationCache {
    conn: ConnectionManager,
}

impl RedisConfirmationCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| DispatchError::Config(e.to_string()))?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis confirmation cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl ConfirmationCache for RedisConfirmationCache {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = set_command(key, value, ttl).query_async(&mut conn).await?;
        Ok(())
    }
}

fn set_command(key: &str, value: &str, ttl: Option<Duration>) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl {
        // EX rejects zero
        cmd.arg("EX").arg(ttl.as_secs().max(1));
    }
    cmd
}
