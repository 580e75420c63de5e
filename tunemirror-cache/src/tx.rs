use rusqlite::{Connection, DropBehavior, Transaction};
use std::ops::Deref;
use tracing::debug;
use tunemirror_core::error::Result;

/// Transaction that commits only if [`set_ok`](TxGuard::set_ok) was called.
///
/// Dropping the guard (for instance through an early `?` return) rolls back,
/// so a multi-row write either lands completely or not at all.
pub(crate) struct TxGuard<'conn> {
    tx: Transaction<'conn>,
    ok: bool,
}

impl<'conn> TxGuard<'conn> {
    pub(crate) fn begin(conn: &'conn Connection) -> Result<Self> {
        let mut tx = conn.unchecked_transaction()?;
        tx.set_drop_behavior(DropBehavior::Rollback);
        Ok(Self { tx, ok: false })
    }

    pub(crate) fn set_ok(&mut self) {
        self.ok = true;
        self.tx.set_drop_behavior(DropBehavior::Commit);
    }

    /// Commit or roll back now, surfacing any error the engine reports.
    pub(crate) fn finish(self) -> Result<()> {
        if !self.ok {
            debug!("Rolling back cache transaction");
        }
        self.tx.finish()?;
        Ok(())
    }
}

impl Deref for TxGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}
