// ===============================
// src/store.rs
// ===============================
//
// Immutable state snapshot + pure reducer.
// Each dispatch computes the next snapshot from the current one and
// replaces it in a watch channel; subscribers re-render on replacement.
//
use std::sync::Arc;

use tokio::sync::watch;

pub trait Reducer: Sized + Send + Sync + 'static {
    type Action;

    /// Pure transition: current snapshot + action -> next snapshot.
    fn reduce(&self, action: Self::Action) -> Self;
}

pub struct Store<S: Reducer> {
    tx: watch::Sender<Arc<S>>,
}

impl<S: Reducer> Store<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<S> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.tx.subscribe()
    }

    /// Applies `action` and returns the snapshot it produced.
    pub fn dispatch(&self, action: S::Action) -> Arc<S> {
        let mut produced = None;
        self.tx.send_modify(|cur| {
            let next = Arc::new(cur.reduce(action));
            produced = Some(next.clone());
            *cur = next;
        });
        produced.unwrap_or_else(|| self.snapshot())
    }
}
