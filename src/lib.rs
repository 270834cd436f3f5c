pub mod prelude;
pub mod error;
pub mod config;
pub mod serializer;
pub mod scene;
pub mod meshlet;
