// Network adapter modules split by external client sockets vs plain HTTP routes.

pub mod client;
pub mod internal;

pub use client::{replication_serializer, world_update_serializer, ws_handler};
pub use internal::{highscores_handler, status_handler};
