//! Profile and credential mutation
//!
//! One implementation serves both roles; the target relation is picked
//! through the [`AccountDirectory`].

use tracing::{debug, info};

use crate::store::AccountDirectory;
use crate::{Account, ArenaError, ProfileUpdate, Result, Role};

/// Applies partial profile updates and password changes
#[derive(Clone)]
pub struct ProfileMutator {
    accounts: AccountDirectory,
}

impl ProfileMutator {
    pub fn new(accounts: AccountDirectory) -> Self {
        Self { accounts }
    }

    /// Change only the fields present in `update`
    ///
    /// Names and address may be cleared with an empty string. Email and
    /// phone identify the account and may not.
    pub async fn update_profile(
        &self,
        account_id: i64,
        role: Role,
        update: &ProfileUpdate,
    ) -> Result<()> {
        validate_update(update)?;

        let updated = self
            .accounts
            .for_role(role)
            .update_profile(account_id, update)
            .await?;
        if !updated {
            return Err(ArenaError::NotFound(format!("{role} {account_id}")));
        }

        debug!(%role, account_id, "Profile updated");
        Ok(())
    }

    /// Replace the password of the active account whose stored hash equals
    /// `current_hash`
    ///
    /// An unknown hash and an inactive account are indistinguishable.
    pub async fn change_password(
        &self,
        role: Role,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<Account> {
        require_hash(new_hash)?;

        let account = self
            .accounts
            .for_role(role)
            .update_password_by_hash(current_hash, new_hash)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("{role} with matching password")))?;

        info!(%role, account_id = account.id, "Password changed");
        Ok(account)
    }

    /// Replace the password of the active account registered under `email`
    ///
    /// The caller has already verified the reset request.
    pub async fn reset_password(&self, role: Role, email: &str, new_hash: &str) -> Result<Account> {
        require_hash(new_hash)?;

        let account = self
            .accounts
            .for_role(role)
            .update_password_by_email(email, new_hash)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("{role} '{email}'")))?;

        info!(%role, account_id = account.id, "Password reset");
        Ok(account)
    }

    /// Record the profile image URL for every account named `username`
    pub async fn set_profile_image(&self, username: &str, url: &str) -> Result<()> {
        let mut updated = false;
        for role in Role::ALL {
            updated |= self
                .accounts
                .for_role(role)
                .set_image_url(username, url)
                .await?;
        }

        if !updated {
            return Err(ArenaError::NotFound(format!("Account '{username}'")));
        }
        Ok(())
    }
}

fn validate_update(update: &ProfileUpdate) -> Result<()> {
    if let Some(email) = &update.email {
        if email.trim().is_empty() {
            return Err(ArenaError::validation("email", "cannot be cleared"));
        }
        if !email.contains('@') {
            return Err(ArenaError::validation("email", "must be a valid email address"));
        }
    }
    if let Some(phone) = &update.phone {
        if phone.trim().is_empty() {
            return Err(ArenaError::validation("phone", "cannot be cleared"));
        }
    }
    Ok(())
}

fn require_hash(hash: &str) -> Result<()> {
    if hash.is_empty() {
        return Err(ArenaError::validation("password", "new password hash is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::store::AccountStore;
    use crate::NewAccount;

    async fn seeded() -> (MemoryBackend, ProfileMutator, Account) {
        let backend = MemoryBackend::new();
        let account = backend
            .buyers
            .create(&NewAccount {
                username: "ada".into(),
                email: "ada@example.com".into(),
                password_hash: "hash-old".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                phone: "08000000001".into(),
                address: "London".into(),
            })
            .await
            .unwrap();
        let mutator = ProfileMutator::new(backend.directory());
        (backend, mutator, account)
    }

    #[tokio::test]
    async fn test_update_profile_changes_only_provided_fields() {
        let (backend, mutator, account) = seeded().await;

        mutator
            .update_profile(
                account.id,
                Role::Buyer,
                &ProfileUpdate {
                    first_name: Some("Augusta".into()),
                    address: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = backend.buyers.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Augusta");
        assert_eq!(stored.last_name, "Lovelace");
        assert_eq!(stored.address, "");
        assert_eq!(stored.email, "ada@example.com");
        assert!(stored.is_active);
    }

    #[tokio::test]
    async fn test_update_profile_rejects_clearing_identity_fields() {
        let (backend, mutator, account) = seeded().await;

        let err = mutator
            .update_profile(
                account.id,
                Role::Buyer,
                &ProfileUpdate {
                    email: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::Validation { ref field, .. } if field == "email"));

        let stored = backend.buyers.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored, account);
    }

    #[tokio::test]
    async fn test_update_profile_targets_role_relation() {
        let (_backend, mutator, account) = seeded().await;

        let err = mutator
            .update_profile(
                account.id,
                Role::Seller,
                &ProfileUpdate {
                    first_name: Some("X".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_change_password_by_hash() {
        let (_backend, mutator, account) = seeded().await;

        let updated = mutator
            .change_password(Role::Buyer, "hash-old", "hash-new")
            .await
            .unwrap();
        assert_eq!(updated.id, account.id);
        assert_eq!(updated.password_hash, "hash-new");
    }

    #[tokio::test]
    async fn test_change_password_unknown_hash_leaves_records() {
        let (backend, mutator, _account) = seeded().await;
        let before = backend.buyers.snapshot().await;

        let err = mutator
            .change_password(Role::Buyer, "hash-wrong", "hash-new")
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::NotFound(_)));
        assert_eq!(backend.buyers.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_inactive_account_is_invisible_to_credential_updates() {
        let (backend, mutator, _account) = seeded().await;
        backend.buyers.set_active("ada@example.com", false).await;

        let change = mutator
            .change_password(Role::Buyer, "hash-old", "hash-new")
            .await;
        assert!(matches!(change, Err(ArenaError::NotFound(_))));

        let reset = mutator
            .reset_password(Role::Buyer, "ada@example.com", "hash-new")
            .await;
        assert!(matches!(reset, Err(ArenaError::NotFound(_))));

        let stored = backend.buyers.snapshot().await;
        assert_eq!(stored[0].password_hash, "hash-old");
        assert!(!stored[0].is_active);
    }

    #[tokio::test]
    async fn test_reset_password_by_email() {
        let (_backend, mutator, _account) = seeded().await;

        let updated = mutator
            .reset_password(Role::Buyer, "ada@example.com", "hash-reset")
            .await
            .unwrap();
        assert_eq!(updated.password_hash, "hash-reset");

        let missing = mutator
            .reset_password(Role::Seller, "ada@example.com", "hash-reset")
            .await;
        assert!(matches!(missing, Err(ArenaError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_change_password_persists_one_hash() {
        let (backend, mutator, _account) = seeded().await;

        let a = {
            let mutator = mutator.clone();
            tokio::spawn(async move {
                mutator
                    .change_password(Role::Buyer, "hash-old", "hash-a")
                    .await
            })
        };
        let b = {
            let mutator = mutator.clone();
            tokio::spawn(async move {
                mutator
                    .change_password(Role::Buyer, "hash-old", "hash-b")
                    .await
            })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let stored = &backend.buyers.snapshot().await[0].password_hash;
        assert!(stored == "hash-a" || stored == "hash-b");
        let winner = if a.is_ok() { "hash-a" } else { "hash-b" };
        assert_eq!(stored, winner);
    }

    #[tokio::test]
    async fn test_set_profile_image_across_relations() {
        let (backend, mutator, _account) = seeded().await;

        mutator
            .set_profile_image("ada", "https://cdn.example.com/ada.png")
            .await
            .unwrap();
        let stored = backend.buyers.find_by_username("ada").await.unwrap().unwrap();
        assert_eq!(stored.image_url, "https://cdn.example.com/ada.png");

        let err = mutator
            .set_profile_image("nobody", "https://cdn.example.com/x.png")
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::NotFound(_)));
    }
}
