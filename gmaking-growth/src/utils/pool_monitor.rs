//! Connection pool monitoring utilities
//!
//! Instrumented transactions that log how long a connection waited in the
//! pool and how long it was held. The growth coordinator opens two short
//! transactions per request; a long hold here means a slow write, never a
//! slow generation.

use gmaking_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;

const SLOW_ACQUIRE_MS: u128 = 1000;
const LONG_HOLD_MS: u128 = 2000;

/// Transaction wrapper that logs acquisition and release timing
pub struct MonitoredTransaction<'c> {
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> MonitoredTransaction<'c> {
    fn new(tx: Transaction<'c, Sqlite>, caller: &'static str) -> Self {
        Self {
            tx: Some(tx),
            caller,
            acquired_at: Instant::now(),
        }
    }

    /// Connection to run statements on
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        let caller = self.caller;
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already finished", caller)))
    }

    /// Commit and log hold time
    pub async fn commit(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.commit().await?;
        self.log_release("commit");
        Ok(())
    }

    /// Roll back and log hold time
    pub async fn rollback(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.rollback().await?;
        self.log_release("rollback");
        Ok(())
    }

    fn take(&mut self) -> Result<Transaction<'c, Sqlite>> {
        let caller = self.caller;
        self.tx
            .take()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already finished", caller)))
    }

    fn log_release(&self, how: &'static str) {
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > LONG_HOLD_MS {
            tracing::warn!(
                caller = self.caller,
                held_ms = held_ms,
                how,
                "LONG TRANSACTION - Connection held for extended period"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms = held_ms, how, "Connection released");
        }
    }
}

impl<'c> Drop for MonitoredTransaction<'c> {
    fn drop(&mut self) {
        // sqlx rolls back an unfinished transaction on drop
        if self.tx.is_some() {
            let held_ms = self.acquired_at.elapsed().as_millis();
            tracing::debug!(
                caller = self.caller,
                held_ms = held_ms,
                "Connection released (drop, rolled back)"
            );
        }
    }
}

/// Begin a monitored transaction
///
/// ```ignore
/// let mut tx = begin_monitored(&pool, "growth::persist").await?;
/// db::characters::update_character_stats(tx.conn()?, id, user, &stats).await?;
/// tx.commit().await?;
/// ```
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();
    tracing::debug!(caller = caller, "Connection acquisition requested");

    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > SLOW_ACQUIRE_MS {
        tracing::warn!(
            caller = caller,
            wait_ms = wait_ms,
            "SLOW CONNECTION ACQUISITION - Pool may be saturated"
        );
    } else {
        tracing::debug!(caller = caller, wait_ms = wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction::new(tx, caller))
}
