//! Redis connection pool.

use crate::error::{Failure, Result};
use deadpool_redis::{Config, Connection, Pool, Runtime};

/// Redis-backed repository of videos and renditions.
#[derive(Clone)]
pub struct RedisRepository {
    pool: Pool,
}

impl RedisRepository {
    /// Create a new RedisRepository with connection pool.
    pub fn new(redis_url: &str) -> Result<Self> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(Failure::repository)?;
        Ok(Self { pool })
    }

    pub(super) async fn connection(&self) -> Result<Connection> {
        self.pool.get().await.map_err(Failure::repository)
    }
}
