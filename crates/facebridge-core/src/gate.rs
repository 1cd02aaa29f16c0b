//! Readiness gate: lazy, memoized, single-flight capability loading.

use crate::capability::{CapabilityLoader, LoadError, Recognition};
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;

type Slot<C> = Arc<OnceCell<Arc<C>>>;

/// Holds the loader and, once loaded, the shared capability.
///
/// The first caller of [`ready`](Self::ready) runs the loader; concurrent
/// callers wait on that same load. A failed load leaves the gate empty, so the
/// next caller makes a fresh attempt. A loaded capability that reports itself
/// unhealthy is dropped and reloaded once per call.
pub struct ModelGate<L: CapabilityLoader> {
    loader: L,
    slot: RwLock<Slot<L::Capability>>,
}

impl<L: CapabilityLoader> ModelGate<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            slot: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    /// Whether the capability has been loaded.
    pub fn is_ready(&self) -> bool {
        self.current().initialized()
    }

    /// Wait until the capability is loaded, loading it if nobody has yet.
    pub async fn ready(&self) -> Result<Arc<L::Capability>, LoadError> {
        let slot = self.current();
        let capability = slot.get_or_try_init(|| self.load()).await?;
        if capability.is_healthy() {
            return Ok(Arc::clone(capability));
        }

        tracing::error!("recognition capability stopped responding, reloading");
        self.discard(&slot);
        let slot = self.current();
        let capability = slot.get_or_try_init(|| self.load()).await?;
        Ok(Arc::clone(capability))
    }

    fn current(&self) -> Slot<L::Capability> {
        let slot = self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*slot)
    }

    /// Replace `stale` with an empty slot unless another caller already did.
    fn discard(&self, stale: &Slot<L::Capability>) {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if Arc::ptr_eq(&*slot, stale) {
            *slot = Arc::new(OnceCell::new());
        }
    }

    async fn load(&self) -> Result<Arc<L::Capability>, LoadError> {
        tracing::info!("loading recognition capability");
        match self.loader.load().await {
            Ok(capability) => {
                tracing::info!("recognition capability ready");
                Ok(Arc::new(capability))
            }
            Err(err) => {
                tracing::error!(error = %err, "recognition capability failed to load");
                Err(err)
            }
        }
    }
}
