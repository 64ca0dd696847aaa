// ── Update callbacks ──
//
// Registry of caller-supplied update callbacks. Registration can happen
// at any time from any task; the listener reads a snapshot per datagram.

use std::error::Error as StdError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::warn;

use toyama_api::StateUpdate;

/// Outcome of one callback invocation. An `Err` is logged and otherwise
/// ignored.
pub type CallbackResult = Result<(), Box<dyn StdError + Send + Sync>>;

/// A registered update callback.
pub type UpdateCallback = Arc<dyn Fn(&StateUpdate) -> CallbackResult + Send + Sync>;

/// Lock-free, append-only list of callbacks.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    callbacks: ArcSwap<Vec<UpdateCallback>>,
}

impl CallbackRegistry {
    pub(crate) fn register<F>(&self, callback: F)
    where
        F: Fn(&StateUpdate) -> CallbackResult + Send + Sync + 'static,
    {
        let callback: UpdateCallback = Arc::new(callback);
        self.callbacks.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&callback));
            next
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.load().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback with `update`, in registration order.
    ///
    /// Each invocation is isolated: an `Err` or a panic is logged and the
    /// remaining callbacks still run. Returns how many succeeded.
    pub(crate) fn dispatch(&self, update: &StateUpdate) -> usize {
        let snapshot = self.callbacks.load();
        let mut delivered = 0;

        for (index, callback) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback(update))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(
                    callback = index,
                    board = %update.board,
                    button_id = update.button_id,
                    error = %e,
                    "update callback failed"
                ),
                Err(panic) => warn!(
                    callback = index,
                    board = %update.board,
                    button_id = update.button_id,
                    panic = panic_message(&*panic),
                    "update callback panicked"
                ),
            }
        }

        delivered
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
