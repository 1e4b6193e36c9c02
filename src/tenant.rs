use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::accounts::is_valid_account_id;
use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;

/// Per-account engines, created on first use. Each gets its own WAL file,
/// notification hub and compactor task.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    shutdown: CancellationToken,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, shutdown: CancellationToken) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            shutdown,
        }
    }

    pub fn get_or_create(&self, account: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(account) {
            return Ok(engine.value().clone());
        }
        if account.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "account id too long",
            ));
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many accounts"));
        }

        // Account ids become file names verbatim, so distinct ids never share a WAL.
        if !is_valid_account_id(account) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid account id",
            ));
        }

        // Two first requests may race here; the entry API keeps one engine.
        let entry = self.engines.entry(account.to_string());
        let engine = match entry {
            dashmap::mapref::entry::Entry::Occupied(e) => return Ok(e.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let wal_path = self.data_dir.join(format!("{account}.wal"));
                let engine = Arc::new(Engine::new(wal_path, Arc::new(NotifyHub::new()))?);
                slot.insert(engine.clone());
                engine
            }
        };

        tokio::spawn(compactor::run_compactor(
            engine.clone(),
            self.compact_threshold,
            self.shutdown.child_token(),
        ));

        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        info!(account = %account, "loaded account engine");
        Ok(engine)
    }

    pub fn loaded(&self) -> usize {
        self.engines.len()
    }
}
