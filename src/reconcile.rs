//! Reconciliation of the store against the external completion ledger.
//!
//! The executor can finish an item, record it in the ledger, and then crash
//! before the store is updated. Reconciliation repairs exactly that drift:
//! any unfinished item with ledger evidence is flipped to passed. It runs
//! unconditionally at the top of every loop pass, so an interrupt between
//! ledger and store updates heals on the next invocation.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::io::ledger::Ledger;
use crate::io::store::Store;

/// Repair `passes` flags from ledger evidence; returns the number of fixes.
///
/// Monotonic (only false to true), idempotent (a second call with no new
/// ledger entries mutates nothing), and writes the store at most once; a
/// no-op pass never rewrites the file. Ledger query failures count as "no
/// evidence" for that item and are never fatal.
#[instrument(skip_all)]
pub fn reconcile(store: &Store, ledger: &dyn Ledger) -> Result<usize> {
    let list = store.load()?;

    let mut confirmed: Vec<String> = Vec::new();
    for item in &list.items {
        if item.passes {
            continue;
        }
        match ledger.has_completion(&item.id) {
            Ok(true) => confirmed.push(item.id.clone()),
            Ok(false) => {}
            Err(err) => {
                warn!(item = %item.id, err = %err, "ledger query failed, treating as no evidence");
            }
        }
    }

    if confirmed.is_empty() {
        debug!("store and ledger agree, nothing to repair");
        return Ok(0);
    }

    // Re-check under the store lock; another writer may have landed since the
    // read above.
    let fixes = store.update(|list| {
        let mut fixes = 0;
        for id in &confirmed {
            if let Some(item) = list.get_mut(id) {
                if !item.passes {
                    item.passes = true;
                    fixes += 1;
                }
            }
        }
        fixes
    })?;

    info!(fixes, "repaired store from ledger evidence");
    Ok(fixes)
}
