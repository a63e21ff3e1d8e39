//! Server-side carts keyed by an opaque id, expiring after a period of disuse.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rosso_core::Cart;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug)]
struct CartEntry {
    cart: Cart,
    expires_at: DateTime<Utc>,
}

/// Holds at most `max_carts` live carts.
#[derive(Debug, Clone)]
pub struct CartStore {
    ttl: chrono::Duration,
    max_carts: usize,
    carts: Arc<Mutex<HashMap<Uuid, CartEntry>>>,
}

impl CartStore {
    #[must_use]
    pub fn new(ttl: Duration, max_carts: usize) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            max_carts: max_carts.max(1),
            carts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Opens an empty cart and returns its id.
    ///
    /// When the store is full after dropping expired carts, the cart that
    /// was touched least recently is evicted.
    pub async fn create(&self) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut carts = self.carts.lock().await;
        carts.retain(|_, entry| entry.expires_at > now);
        while carts.len() >= self.max_carts {
            let Some(oldest) = carts
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(id, _)| *id)
            else {
                break;
            };
            carts.remove(&oldest);
            tracing::warn!(
                cart_id = %oldest,
                max_carts = self.max_carts,
                "cart store full, evicted oldest cart"
            );
        }
        carts.insert(
            id,
            CartEntry {
                cart: Cart::new(),
                expires_at: self.expiry(now),
            },
        );
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<Cart> {
        self.with_cart(id, |cart| cart.clone()).await
    }

    /// Runs `f` against the live cart `id`, refreshing its expiry.
    /// Returns `None` when the cart is unknown or expired.
    pub async fn with_cart<T>(&self, id: Uuid, f: impl FnOnce(&mut Cart) -> T) -> Option<T> {
        let now = Utc::now();
        let mut carts = self.carts.lock().await;
        let entry = carts.get_mut(&id)?;
        if entry.expires_at <= now {
            carts.remove(&id);
            return None;
        }
        entry.expires_at = self.expiry(now);
        Some(f(&mut entry.cart))
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.carts.lock().await.remove(&id).is_some()
    }

    fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
