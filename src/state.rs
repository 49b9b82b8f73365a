use std::sync::Arc;

use crate::{
    config::VnPayConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    middleware::auth::TokenVerifier,
    storage::ImageStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub verifier: Arc<TokenVerifier>,
    pub vnpay: Arc<VnPayConfig>,
    pub storage: Option<Arc<ImageStorage>>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        verifier: TokenVerifier,
        vnpay: VnPayConfig,
        storage: Option<ImageStorage>,
    ) -> Self {
        let orm = orm_from_pool(&pool);
        Self {
            pool,
            orm,
            verifier: Arc::new(verifier),
            vnpay: Arc::new(vnpay),
            storage: storage.map(Arc::new),
        }
    }
}
