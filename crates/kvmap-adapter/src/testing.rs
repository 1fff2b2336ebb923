//! Shared test fixtures.

use std::sync::Arc;

use kvmap_mapper::{Entity, SerdeMapping};
use kvmap_store::{InMemoryDatastore, StoreClient};
use kvmap_types::EntityId;
use serde::{Deserialize, Serialize};

use crate::adapter::Adapter;
use crate::config::AdapterConfig;

pub const WIDGETS: &str = "widgets";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: Option<EntityId>,
    pub name: String,
    pub size: Option<i64>,
}

impl Widget {
    pub fn new(name: &str, size: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            size: Some(size),
        }
    }
}

impl Entity for Widget {
    fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}

pub fn adapter() -> (Arc<InMemoryDatastore>, Adapter) {
    adapter_with(AdapterConfig::default())
}

pub fn adapter_with(config: AdapterConfig) -> (Arc<InMemoryDatastore>, Adapter) {
    let store = Arc::new(InMemoryDatastore::new());
    let client: Arc<dyn StoreClient> = store.clone();
    let adapter = Adapter::builder(client)
        .register::<Widget, _>(WIDGETS, SerdeMapping::new("Widget"))
        .unwrap()
        .config(config)
        .build()
        .unwrap();
    (store, adapter)
}
