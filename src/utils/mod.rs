// Adaptadores del navegador

pub mod spawner;
pub mod storage;

pub use spawner::BrowserSpawner;
pub use storage::LocalStorageStore;
