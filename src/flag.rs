use std::sync::Arc;
use tokio::sync::watch;

/// Single-flight flag: at most one holder at a time, and anyone can await
/// the moment it is released.
#[derive(Debug, Clone)]
pub struct Flag {
    state: Arc<watch::Sender<bool>>,
}

impl Default for Flag {
    fn default() -> Self {
        Self::new()
    }
}

impl Flag {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Raises the flag, or returns `None` if someone already holds it.
    pub fn try_acquire(&self) -> Option<FlagGuard> {
        let acquired = self.state.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        acquired.then(|| FlagGuard {
            state: Arc::clone(&self.state),
        })
    }

    pub fn is_set(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the flag is down.
    pub async fn cleared(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|busy| !*busy).await;
    }
}

/// Lowers the flag on drop.
#[derive(Debug)]
pub struct FlagGuard {
    state: Arc<watch::Sender<bool>>,
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        self.state.send_replace(false);
    }
}
