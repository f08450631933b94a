use std::sync::Arc;

use braid_service::BraidService;
use braid_storage::{db::Db, vector::VectorStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<BraidService>,
}
impl AppState {
	pub async fn new(config: braid_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.qdrant.vector_dim).await?;

		let store = VectorStore::new(&config.storage.qdrant)?;
		let service = BraidService::new(config, db, store);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: BraidService) -> Self {
		Self { service: Arc::new(service) }
	}
}
