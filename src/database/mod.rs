// =============================================================================
// Matrixon Timeline - Database Module
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Transactional key/value store for timeline records. Every service
//   operation runs against a `Transaction`; a transaction journals its
//   writes over the committed trees and replays them only when the whole
//   closure succeeds.
//
// =============================================================================

pub mod abstraction;
pub mod key_value;

use std::sync::RwLock;

use tracing::{debug, warn};

use crate::{Error, Result};

use self::abstraction::{Journal, KvTree, Layer};

macro_rules! named_trees {
    ($($name:ident),* $(,)?) => {
        /// Every keyspace of the store.
        #[derive(Clone, Debug, Default)]
        pub struct Trees<T = KvTree> {
            $(pub $name: T,)*
        }

        impl Trees {
            pub const fn new() -> Self {
                Self {
                    $($name: KvTree::new(),)*
                }
            }

            fn layers(&self) -> Trees<Layer<'_>> {
                Trees {
                    $($name: Layer::over(&self.$name),)*
                }
            }

            fn apply(&mut self, journal: Trees<Journal>) {
                $(self.$name.apply(journal.$name);)*
            }
        }

        impl Trees<Layer<'_>> {
            fn into_journal(self) -> Trees<Journal> {
                Trees {
                    $($name: self.$name.into_journal(),)*
                }
            }
        }
    };
}

named_trees! {
    chunkid_chunk,
    roomid_chunkid,
    chunkideventid_timelineevent,
    chunkid_displayrange,
    roomeventid_event,
    roomuserid_readreceipt,
    roomeventid_readreceipts,
    roomuserid_membersummary,
    roomeventid_annotations,
    counters,
}

/// Committed side of transactions that are not attached to a database.
static DETACHED: Trees = Trees::new();

#[derive(Debug, Default)]
pub struct KeyValueDatabase {
    trees: RwLock<Trees>,
}

impl KeyValueDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` inside a transaction.
    ///
    /// Writers are serialized. Changes become visible when `f` returns
    /// `Ok`; an `Err` discards all of them.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut committed = self
            .trees
            .write()
            .map_err(|_| Error::bad_database("Database lock is poisoned."))?;

        let mut txn = Transaction {
            trees: committed.layers(),
        };
        match f(&mut txn) {
            Ok(value) => {
                let journal = txn.trees.into_journal();
                committed.apply(journal);
                debug!("Transaction committed");
                Ok(value)
            }
            Err(e) => {
                warn!("Transaction rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Runs `f` against a consistent snapshot without write access.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let committed = self
            .trees
            .read()
            .map_err(|_| Error::bad_database("Database lock is poisoned."))?;

        f(&Transaction {
            trees: committed.layers(),
        })
    }
}

/// View of the store inside [`KeyValueDatabase::transaction`] or
/// [`KeyValueDatabase::read`]. All service `Data` traits are implemented on
/// it.
#[derive(Debug)]
pub struct Transaction<'a> {
    trees: Trees<Layer<'a>>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn trees(&self) -> &Trees<Layer<'a>> {
        &self.trees
    }

    pub(crate) fn trees_mut(&mut self) -> &mut Trees<Layer<'a>> {
        &mut self.trees
    }
}

/// A transaction that is not attached to any database, starting empty.
impl Default for Transaction<'static> {
    fn default() -> Self {
        Self {
            trees: DETACHED.layers(),
        }
    }
}
