// libs/appointment-cell/src/cache.rs
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Appointment;

/// Entries expire after this many seconds. The cache is advisory for latency
/// only; every hit still goes through the access policy before returning.
pub const CACHE_TTL_SECONDS: u64 = 300;

const CACHE_PREFIX: &str = "appointment:";

/// Read-through cache keyed by appointment id. Mutations delete the entry
/// rather than updating it in place; repopulation happens on the next read.
#[async_trait]
pub trait AppointmentCache: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<Appointment>;
    async fn set(&self, appointment: &Appointment);
    async fn delete(&self, id: Uuid);
}

// ==============================================================================
// REDIS CACHE
// ==============================================================================

pub struct RedisAppointmentCache {
    pool: Pool,
}

impl RedisAppointmentCache {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| anyhow::anyhow!("Failed to create Redis pool: {e}"))?;
        Ok(Self { pool })
    }

    fn key(id: Uuid) -> String {
        format!("{CACHE_PREFIX}{id}")
    }
}

#[async_trait]
impl AppointmentCache for RedisAppointmentCache {
    async fn get(&self, id: Uuid) -> Option<Appointment> {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Redis connection unavailable, treating as cache miss: {}", e);
                return None;
            }
        };

        let raw: Option<String> = match conn.get(Self::key(id)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Redis GET failed for appointment {}: {}", id, e);
                return None;
            }
        };

        raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(appointment) => Some(appointment),
            Err(e) => {
                warn!("Discarding undeserializable cache entry for {}: {}", id, e);
                None
            }
        })
    }

    async fn set(&self, appointment: &Appointment) {
        let json = match serde_json::to_string(appointment) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize appointment {} for cache: {}", appointment.id, e);
                return;
            }
        };

        if let Ok(mut conn) = self.pool.get().await {
            let result: Result<(), redis::RedisError> =
                conn.set_ex(Self::key(appointment.id), json, CACHE_TTL_SECONDS).await;
            if let Err(e) = result {
                warn!("Redis SETEX failed for appointment {}: {}", appointment.id, e);
            } else {
                debug!("Cached appointment {}", appointment.id);
            }
        }
    }

    async fn delete(&self, id: Uuid) {
        if let Ok(mut conn) = self.pool.get().await {
            let result: Result<(), redis::RedisError> = conn.del(Self::key(id)).await;
            if let Err(e) = result {
                warn!("Redis DEL failed for appointment {}: {}", id, e);
            } else {
                debug!("Invalidated cache for appointment {}", id);
            }
        }
    }
}

// ==============================================================================
// IN-MEMORY CACHE
// ==============================================================================

/// TTL-aware map cache, for tests and single-process deployments. Expired
/// entries are evicted on read, and every write sweeps out whatever else has
/// expired, so the map stays bounded by the live working set.
pub struct InMemoryAppointmentCache {
    entries: RwLock<HashMap<Uuid, (Instant, Appointment)>>,
    ttl: Duration,
}

impl Default for InMemoryAppointmentCache {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(CACHE_TTL_SECONDS))
    }
}

impl InMemoryAppointmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl AppointmentCache for InMemoryAppointmentCache {
    async fn get(&self, id: Uuid) -> Option<Appointment> {
        let mut entries = self.entries.write().await;
        match entries.get(&id) {
            Some((expires_at, appointment)) if Instant::now() < *expires_at => {
                Some(appointment.clone())
            }
            Some(_) => {
                entries.remove(&id);
                None
            }
            None => None,
        }
    }

    async fn set(&self, appointment: &Appointment) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| now < entry.0);
        entries.insert(appointment.id, (now + self.ttl, appointment.clone()));
    }

    async fn delete(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }
}
