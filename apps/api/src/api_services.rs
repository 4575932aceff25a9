mod database;
mod email;
mod state_builder;

pub use database::connect_and_migrate;
pub use state_builder::{
    ApiRuntime, EmailWorker, InMemoryStorage, StorageBackend, build_api_runtime, connect_storage,
};
