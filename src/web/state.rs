//! Shared application state.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::datasets::DataStore;
use crate::ncbi::GenbankClient;

/// Cheap to clone; every handler sees the same datasets and remote client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    datasets: DataStore,
    client: Arc<dyn GenbankClient>,
    static_dir: Utf8PathBuf,
}

impl AppState {
    pub fn new(
        datasets: DataStore,
        client: Arc<dyn GenbankClient>,
        static_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerState {
                datasets,
                client,
                static_dir: static_dir.into(),
            }),
        }
    }

    pub fn datasets(&self) -> &DataStore {
        &self.inner.datasets
    }

    pub fn client(&self) -> Arc<dyn GenbankClient> {
        Arc::clone(&self.inner.client)
    }

    pub fn static_dir(&self) -> &Utf8Path {
        &self.inner.static_dir
    }
}
