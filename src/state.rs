use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{ImageStore, TokenStore};

/// Long-lived shared resources: configuration, the database store, the
/// session token map and the image storage area.
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub tokens: Arc<TokenStore>,

    pub images: Arc<ImageStore>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let images = Arc::new(ImageStore::new(
            &config.uploads.upload_path,
            &config.uploads.profile_dir,
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            tokens: Arc::new(TokenStore::new()),
            images,
        })
    }
}
