use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::curriculum::Curriculum;
use crate::services::storage::BlobStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    blobs: Option<Arc<dyn BlobStore>>,
    curriculum: Arc<Curriculum>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        blobs: Option<Arc<dyn BlobStore>>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerState {
                settings,
                db,
                redis,
                blobs,
                curriculum: Curriculum::standard(),
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn blobs(&self) -> Option<&Arc<dyn BlobStore>> {
        self.inner.blobs.as_ref()
    }

    pub(crate) fn curriculum(&self) -> &Curriculum {
        &self.inner.curriculum
    }
}
