mod annotations;
mod chunks;
mod edus;
mod event;
mod state_cache;
mod timeline;

use crate::{database::Transaction, service};

impl service::rooms::Data for Transaction<'_> {}
