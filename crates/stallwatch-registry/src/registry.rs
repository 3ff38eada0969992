//! The consumer registry.
//!
//! Bundles the three consumer lists the dispatcher notifies: entry consumers
//! (operation string), exit consumers (blocking event) and storage
//! initialization consumers (no payload).

use tracing::debug;

use crate::consumer::{
    EntryConsumer, ExitConsumer, SharedEntryConsumer, SharedExitConsumer,
    SharedStorageInitConsumer, StorageInitConsumer,
};
use crate::list::ConsumerList;

/// Entry, exit and storage-initialization consumer lists.
#[derive(Default, Debug)]
pub struct ConsumerRegistry {
    entry: ConsumerList<dyn EntryConsumer>,
    exit: ConsumerList<dyn ExitConsumer>,
    storage_init: ConsumerList<dyn StorageInitConsumer>,
}

impl ConsumerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry consumer list.
    pub fn entry(&self) -> &ConsumerList<dyn EntryConsumer> {
        &self.entry
    }

    /// The exit consumer list.
    pub fn exit(&self) -> &ConsumerList<dyn ExitConsumer> {
        &self.exit
    }

    /// The storage-initialization consumer list.
    pub fn storage_init(&self) -> &ConsumerList<dyn StorageInitConsumer> {
        &self.storage_init
    }

    /// Register an entry consumer ahead of the others.
    ///
    /// Use this for observers that must see every blocking call, even ones a
    /// later policy consumer rejects.
    pub fn add_consumer_first(&self, consumer: SharedEntryConsumer) {
        self.entry.add_first(consumer);
        debug!(position = "first", total = self.entry.len(), "Entry consumer added");
    }

    /// Register an entry consumer after the others.
    ///
    /// Use this for policy consumers that reject calls by returning an error.
    pub fn add_consumer_last(&self, consumer: SharedEntryConsumer) {
        self.entry.add_last(consumer);
        debug!(position = "last", total = self.entry.len(), "Entry consumer added");
    }

    /// Remove an entry consumer.
    pub fn remove_consumer(&self, consumer: &SharedEntryConsumer) -> bool {
        self.entry.remove(consumer)
    }

    /// Register an exit consumer ahead of the others.
    pub fn add_on_exit_consumer_first(&self, consumer: SharedExitConsumer) {
        self.exit.add_first(consumer);
        debug!(position = "first", total = self.exit.len(), "Exit consumer added");
    }

    /// Register an exit consumer after the others.
    pub fn add_on_exit_consumer_last(&self, consumer: SharedExitConsumer) {
        self.exit.add_last(consumer);
        debug!(position = "last", total = self.exit.len(), "Exit consumer added");
    }

    /// Remove an exit consumer.
    pub fn remove_on_exit_consumer(&self, consumer: &SharedExitConsumer) -> bool {
        self.exit.remove(consumer)
    }

    /// Register a storage-initialization consumer.
    pub fn add_storage_init_consumer(&self, consumer: SharedStorageInitConsumer) {
        self.storage_init.add_last(consumer);
        debug!(total = self.storage_init.len(), "Storage init consumer added");
    }

    /// Remove a storage-initialization consumer.
    pub fn remove_storage_init_consumer(&self, consumer: &SharedStorageInitConsumer) -> bool {
        self.storage_init.remove(consumer)
    }

    /// Remove all entry and exit consumers.
    ///
    /// Storage-initialization consumers are left in place.
    pub fn clear_consumers(&self) {
        self.entry.clear();
        self.exit.clear();
        debug!("Entry and exit consumers cleared");
    }
}
