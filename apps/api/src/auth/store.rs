use redis::AsyncCommands;
use uuid::Uuid;

use crate::auth::flow::{CredentialFlow, FLOW_TTL_SECS};
use crate::errors::AppError;

/// Redis-backed store for in-progress credential flows.
///
/// Records carry the same TTL as the one-time code they track, so an
/// abandoned flow disappears together with its code. The provider remains
/// the sole authority on code validity; this store only holds flow position.
#[derive(Clone)]
pub struct FlowStore {
    redis: redis::Client,
}

impl FlowStore {
    pub fn new(redis: redis::Client) -> Self {
        Self { redis }
    }

    fn key(id: Uuid) -> String {
        format!("credential_flow:{id}")
    }

    pub async fn put(&self, flow: &CredentialFlow) -> Result<(), AppError> {
        let payload = serde_json::to_string(flow)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("flow serialization failed: {e}")))?;
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn
            .set_ex(Self::key(flow.id), payload, FLOW_TTL_SECS)
            .await?;
        Ok(())
    }

    /// Returns `None` for unknown or expired flows; the caller reports those
    /// the same way as a rejected code.
    pub async fn get(&self, id: Uuid) -> Result<Option<CredentialFlow>, AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(Self::key(id)).await?;
        match payload {
            Some(raw) => {
                let flow = serde_json::from_str(&raw).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("flow deserialization failed: {e}"))
                })?;
                Ok(Some(flow))
            }
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.del(Self::key(id)).await?;
        Ok(())
    }
}
