pub mod client;
pub mod updater;

pub use client::{IndexClient, SolrClient};
pub use updater::{CoreRegistry, IndexCore, IndexUpdater};
