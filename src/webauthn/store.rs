//! User store abstraction
//!
//! The ceremony code never owns user state. It talks to a [`UserStore`] keyed
//! by account name (the email the user signed up with). Implementations must
//! make [`UserStore::take_challenge`], [`UserStore::get_or_insert`] and
//! [`UserStore::update`] single atomic operations; everything else may be a
//! plain read or write.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::errors::CeremonyError;
use super::types::{CeremonyKind, PendingChallenge, User};

/// Storage collaborator for user aggregates
pub trait UserStore: Send + Sync {
    /// Fetch a copy of the user
    ///
    /// # Errors
    /// Returns `Store` if the backend fails.
    fn get(&self, account: &str) -> Result<Option<User>, CeremonyError>;

    /// Insert or replace the user
    ///
    /// # Errors
    /// Returns `Store` if the backend fails.
    fn put(&self, account: &str, user: User) -> Result<(), CeremonyError>;

    /// Insert `user` unless the account already exists, as one atomic step
    ///
    /// Returns the stored user and whether it was inserted by this call.
    ///
    /// # Errors
    /// Returns `Store` if the backend fails.
    fn get_or_insert(&self, account: &str, user: User) -> Result<(User, bool), CeremonyError>;

    /// Fetch, mutate and store the user as one atomic step
    ///
    /// The closure's error aborts the update and is returned unchanged.
    ///
    /// # Errors
    /// Returns `UnknownUser` if there is no such user, `Store` if the backend
    /// fails, or whatever the closure returns.
    fn update(
        &self,
        account: &str,
        apply: &mut dyn FnMut(&mut User) -> Result<(), CeremonyError>,
    ) -> Result<(), CeremonyError>;

    /// Replace the user's pending challenge
    ///
    /// # Errors
    /// Returns `UnknownUser` if there is no such user, `Store` if the backend fails.
    fn set_challenge(&self, account: &str, challenge: PendingChallenge)
        -> Result<(), CeremonyError>;

    /// Atomically read and clear the pending challenge if it has the given kind
    ///
    /// Returns `None` when nothing of that kind is pending; a challenge of the
    /// other kind stays in place.
    ///
    /// # Errors
    /// Returns `Store` if the backend fails.
    fn take_challenge(
        &self,
        account: &str,
        kind: CeremonyKind,
    ) -> Result<Option<PendingChallenge>, CeremonyError>;
}

/// In-memory store guarded by a single mutex
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    ///
    /// # Errors
    /// Returns `Store` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, CeremonyError> {
        Ok(self.lock()?.len())
    }

    /// Whether the store is empty
    ///
    /// # Errors
    /// Returns `Store` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, CeremonyError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, User>>, CeremonyError> {
        self.users
            .lock()
            .map_err(|_| CeremonyError::Store("user store lock poisoned".to_string()))
    }
}

impl UserStore for MemoryUserStore {
    fn get(&self, account: &str) -> Result<Option<User>, CeremonyError> {
        Ok(self.lock()?.get(account).cloned())
    }

    fn put(&self, account: &str, user: User) -> Result<(), CeremonyError> {
        self.lock()?.insert(account.to_string(), user);
        Ok(())
    }

    fn get_or_insert(&self, account: &str, user: User) -> Result<(User, bool), CeremonyError> {
        let mut users = self.lock()?;
        if let Some(existing) = users.get(account) {
            return Ok((existing.clone(), false));
        }
        users.insert(account.to_string(), user.clone());
        Ok((user, true))
    }

    fn update(
        &self,
        account: &str,
        apply: &mut dyn FnMut(&mut User) -> Result<(), CeremonyError>,
    ) -> Result<(), CeremonyError> {
        let mut users = self.lock()?;
        let stored = users.get_mut(account).ok_or(CeremonyError::UnknownUser)?;
        // Work on a copy so a failing closure leaves the stored user untouched
        let mut user = stored.clone();
        apply(&mut user)?;
        *stored = user;
        Ok(())
    }

    fn set_challenge(
        &self,
        account: &str,
        challenge: PendingChallenge,
    ) -> Result<(), CeremonyError> {
        let mut users = self.lock()?;
        let user = users.get_mut(account).ok_or(CeremonyError::UnknownUser)?;
        user.pending_challenge = Some(challenge);
        Ok(())
    }

    fn take_challenge(
        &self,
        account: &str,
        kind: CeremonyKind,
    ) -> Result<Option<PendingChallenge>, CeremonyError> {
        let mut users = self.lock()?;
        let Some(user) = users.get_mut(account) else {
            return Ok(None);
        };
        if user.pending_challenge.as_ref().map(|c| c.kind) != Some(kind) {
            return Ok(None);
        }
        Ok(user.pending_challenge.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::thread;

    fn pending(kind: CeremonyKind) -> PendingChallenge {
        PendingChallenge {
            value: vec![9; 32],
            kind,
            issued_at: Utc::now(),
        }
    }

    fn store_with_alice() -> MemoryUserStore {
        let store = MemoryUserStore::new();
        store
            .put("alice", User::new(vec![1; 32], "alice"))
            .unwrap();
        store
    }

    #[test]
    fn test_get_put() {
        let store = store_with_alice();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get("alice").unwrap().unwrap().email, "alice");
        assert!(store.get("bob").unwrap().is_none());
    }

    #[test]
    fn test_get_or_insert_keeps_existing_user() {
        let store = store_with_alice();
        store
            .set_challenge("alice", pending(CeremonyKind::Registration))
            .unwrap();

        let (user, inserted) = store
            .get_or_insert("alice", User::new(vec![2; 32], "alice"))
            .unwrap();
        assert!(!inserted);
        assert_eq!(user.id, vec![1; 32]);
        assert!(store.get("alice").unwrap().unwrap().pending_challenge.is_some());

        let (user, inserted) = store
            .get_or_insert("bob", User::new(vec![3; 32], "bob"))
            .unwrap();
        assert!(inserted);
        assert_eq!(user.id, vec![3; 32]);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_get_or_insert_creates_once() {
        let store = Arc::new(MemoryUserStore::new());

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .get_or_insert("carol", User::new(vec![i; 32], "carol"))
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|(_, inserted)| *inserted).count(), 1);
        let stored_id = store.get("carol").unwrap().unwrap().id;
        assert!(results.iter().all(|(user, _)| user.id == stored_id));
    }

    #[test]
    fn test_take_challenge_is_single_use() {
        let store = store_with_alice();
        store
            .set_challenge("alice", pending(CeremonyKind::Registration))
            .unwrap();

        assert!(store
            .take_challenge("alice", CeremonyKind::Registration)
            .unwrap()
            .is_some());
        assert!(store
            .take_challenge("alice", CeremonyKind::Registration)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_take_challenge_leaves_other_kind() {
        let store = store_with_alice();
        store
            .set_challenge("alice", pending(CeremonyKind::Authentication))
            .unwrap();

        assert!(store
            .take_challenge("alice", CeremonyKind::Registration)
            .unwrap()
            .is_none());
        assert!(store
            .get("alice")
            .unwrap()
            .unwrap()
            .pending_challenge
            .is_some());
    }

    #[test]
    fn test_set_challenge_unknown_user() {
        let store = MemoryUserStore::new();
        assert_eq!(
            store.set_challenge("nobody", pending(CeremonyKind::Registration)),
            Err(CeremonyError::UnknownUser)
        );
        assert!(store
            .take_challenge("nobody", CeremonyKind::Registration)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_failed_update_leaves_user_untouched() {
        let store = store_with_alice();
        let result = store.update("alice", &mut |user: &mut User| {
            user.email = "changed".to_string();
            Err(CeremonyError::CounterRegression)
        });
        assert_eq!(result, Err(CeremonyError::CounterRegression));
        assert_eq!(store.get("alice").unwrap().unwrap().email, "alice");

        store
            .update("alice", &mut |user: &mut User| {
                user.email = "alice@example.com".to_string();
                Ok(())
            })
            .unwrap();
        assert_eq!(
            store.get("alice").unwrap().unwrap().email,
            "alice@example.com"
        );
    }

    #[test]
    fn test_concurrent_take_yields_one_winner() {
        let store = Arc::new(store_with_alice());
        store
            .set_challenge("alice", pending(CeremonyKind::Authentication))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .take_challenge("alice", CeremonyKind::Authentication)
                        .unwrap()
                        .is_some()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
