//! Gateway application state

use sqlx::PgPool;
use std::sync::Arc;

use vidframe_processing::ArchiveBuilder;
use vidframe_services::{UploadAdmission, VideoCatalog};

use crate::auth::{InternalKey, JwtValidator};

#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<UploadAdmission>,
    pub catalog: VideoCatalog,
    pub archives: ArchiveBuilder,
    pub jwt: Arc<JwtValidator>,
    pub internal_key: InternalKey,
    /// `None` when running over in-memory repositories
    pub pool: Option<PgPool>,
}

impl AppState {
    /// Largest request body the gateway accepts
    pub fn body_limit(&self) -> usize {
        self.admission.validator().max_file_size() + crate::constants::MULTIPART_OVERHEAD_BYTES
    }
}
