//! Wallet identity tracking
//!
//! The wallet-connection provider is external; this module only mirrors what
//! it reports. A connected address becomes the chat identity and is
//! remembered across restarts, a disconnect clears both.

use crate::db::{DbPool, KvStore};

/// Storage key for the last connected wallet address
pub const WALLET_KEY: &str = "walletAddress";

/// Mirrors the wallet provider's connection state into durable storage
#[derive(Clone)]
pub struct WalletLink {
    kv: KvStore,
    address: Option<String>,
}

impl WalletLink {
    /// Create a wallet link, restoring the last stored address for display
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        let kv = KvStore::new(pool);
        let address = match kv.get(WALLET_KEY) {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored wallet address");
                None
            }
        };
        Self { kv, address }
    }

    /// Apply a provider update and return the identity to send with chats
    ///
    /// The identity is the address while connected and an empty string
    /// otherwise.
    pub fn update(&mut self, is_connected: bool, address: Option<&str>) -> String {
        match address.filter(|a| is_connected && !a.is_empty()) {
            Some(address) => {
                if let Err(e) = self.kv.set(WALLET_KEY, address) {
                    tracing::warn!(error = %e, "failed to store wallet address");
                }
                tracing::info!(address, "wallet connected");
                self.address = Some(address.to_string());
                address.to_string()
            }
            None => {
                if let Err(e) = self.kv.remove(WALLET_KEY) {
                    tracing::warn!(error = %e, "failed to clear wallet address");
                }
                if self.address.take().is_some() {
                    tracing::info!("wallet disconnected");
                }
                String::new()
            }
        }
    }

    /// Last known wallet address, if any
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_persists_address() {
        let pool = crate::db::init_memory().unwrap();
        let mut link = WalletLink::new(pool.clone());

        let identity = link.update(true, Some("0xabc"));
        assert_eq!(identity, "0xabc");

        let restored = WalletLink::new(pool);
        assert_eq!(restored.address(), Some("0xabc"));
    }

    #[test]
    fn disconnect_clears_address() {
        let pool = crate::db::init_memory().unwrap();
        let mut link = WalletLink::new(pool.clone());
        link.update(true, Some("0xabc"));

        let identity = link.update(false, Some("0xabc"));
        assert!(identity.is_empty());
        assert!(link.address().is_none());
        assert!(WalletLink::new(pool).address().is_none());
    }

    #[test]
    fn connected_without_address_is_anonymous() {
        let pool = crate::db::init_memory().unwrap();
        let mut link = WalletLink::new(pool);
        assert!(link.update(true, None).is_empty());
        assert!(link.update(true, Some("")).is_empty());
    }
}
