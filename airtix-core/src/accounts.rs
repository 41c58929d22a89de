use std::sync::Arc;

use tracing::{info, warn};

use crate::repository::UserRepository;
use crate::security::{hash_password_async, verify_password_async, PasswordCipher};
use crate::user::{
    require, NewAccount, PasswordReset, ProfileChanges, ProfileUpdate, RegisterUser,
    SecurityChallenge, UserProfile,
};
use crate::{CoreResult, UserId};

/// User-facing account operations: login, registration, profile and password recovery.
pub struct AccountManager {
    users: Arc<dyn UserRepository>,
    cipher: Arc<dyn PasswordCipher>,
}

impl AccountManager {
    pub fn new(users: Arc<dyn UserRepository>, cipher: Arc<dyn PasswordCipher>) -> Self {
        Self { users, cipher }
    }

    /// Returns the user id when the credentials match an active user.
    pub async fn validate_user_info(
        &self,
        username: &str,
        password: &str,
    ) -> CoreResult<Option<UserId>> {
        let password = self.cipher.decrypt(password)?;
        let credential = self.users.find_credential(username.trim()).await?;

        if let Some(c) = credential {
            if verify_password_async(password, c.password_hash).await? {
                return Ok(Some(c.user_id));
            }
        }
        warn!("Rejected login for '{}'", username);
        Ok(None)
    }

    pub async fn add_user(&self, user: &RegisterUser) -> CoreResult<UserId> {
        user.validate()?;
        let password = self.cipher.decrypt(&user.password)?;

        let account = NewAccount {
            username: user.username.trim().to_string(),
            password_hash: hash_password_async(password).await?,
            person: user.person.clone(),
            security_question: user.security_question.clone(),
            security_answer: user.security_answer.clone(),
        };

        let user_id = self.users.insert_user(&account).await?;
        info!("Registered user {} as '{}'", user_id, account.username);
        Ok(user_id)
    }

    pub async fn get_user_info(&self, user_id: UserId) -> CoreResult<Option<UserProfile>> {
        self.users.get_user(user_id).await
    }

    pub async fn update_user_detail(&self, update: &ProfileUpdate) -> CoreResult<()> {
        update.validate()?;

        let password_hash = match &update.password {
            Some(transmitted) => {
                let password = self.cipher.decrypt(transmitted)?;
                Some(hash_password_async(password).await?)
            }
            None => None,
        };

        let changes = ProfileChanges {
            user_id: update.user_id,
            username: update.username.trim().to_string(),
            password_hash,
            person_name: update.person_name.trim().to_string(),
            contact_number: update.contact_number.trim().to_string(),
            address: update.address.clone(),
        };

        self.users.update_user(&changes).await?;
        info!("Updated profile of user {}", update.user_id);
        Ok(())
    }

    /// Stored question and answer; callers decide how much of it to reveal.
    pub async fn get_security_question(
        &self,
        username: &str,
    ) -> CoreResult<Option<SecurityChallenge>> {
        self.users.security_challenge(username.trim()).await
    }

    pub async fn set_password(&self, reset: &PasswordReset) -> CoreResult<()> {
        require("password", &reset.password)?;
        let password = self.cipher.decrypt(&reset.password)?;
        let hash = hash_password_async(password).await?;

        self.users.set_password_hash(reset.username.trim(), &hash).await?;
        info!("Password reset for '{}'", reset.username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::security::PlainTextCipher;
    use crate::user::{Gender, PersonDetail};
    use crate::CoreError;

    fn manager() -> AccountManager {
        let store = Arc::new(InMemoryStore::new());
        AccountManager::new(store, Arc::new(PlainTextCipher))
    }

    fn alice() -> RegisterUser {
        RegisterUser {
            username: "alice".to_string(),
            password: "pw1".to_string(),
            person: PersonDetail {
                name: "Alice Liddell".to_string(),
                contact_number: "555-0100".to_string(),
                address: "1 Rabbit Hole".to_string(),
                gender: Gender::Female,
            },
            security_question: "First pet?".to_string(),
            security_answer: "Dinah".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let accounts = manager();
        let user_id = accounts.add_user(&alice()).await.unwrap();
        assert!(user_id > 0);

        assert_eq!(accounts.validate_user_info("alice", "pw1").await.unwrap(), Some(user_id));
        assert_eq!(accounts.validate_user_info("alice", "wrong").await.unwrap(), None);
        assert_eq!(accounts.validate_user_info("bob", "pw1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let accounts = manager();
        let input = alice();
        let user_id = accounts.add_user(&input).await.unwrap();

        let profile = accounts.get_user_info(user_id).await.unwrap().unwrap();
        assert_eq!(profile.username, input.username);
        assert_eq!(profile.person, input.person);

        assert!(accounts.get_user_info(user_id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let accounts = manager();
        accounts.add_user(&alice()).await.unwrap();
        let result = accounts.add_user(&alice()).await;
        assert!(matches!(result, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_profile_and_password() {
        let accounts = manager();
        let user_id = accounts.add_user(&alice()).await.unwrap();

        let update = ProfileUpdate {
            user_id,
            username: "alice2".to_string(),
            password: Some("pw2".to_string()),
            person_name: "Alice L.".to_string(),
            contact_number: "555-0199".to_string(),
            address: "2 Looking Glass".to_string(),
        };
        accounts.update_user_detail(&update).await.unwrap();

        let profile = accounts.get_user_info(user_id).await.unwrap().unwrap();
        assert_eq!(profile.username, "alice2");
        assert_eq!(profile.person.name, "Alice L.");
        assert_eq!(profile.person.contact_number, "555-0199");
        assert_eq!(profile.person.address, "2 Looking Glass");
        assert_eq!(profile.person.gender, Gender::Female);

        assert_eq!(accounts.validate_user_info("alice2", "pw2").await.unwrap(), Some(user_id));
        assert_eq!(accounts.validate_user_info("alice", "pw1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overlong_registration_is_rejected_before_storage() {
        let accounts = manager();

        let mut long_username = alice();
        long_username.username = "a".repeat(80);
        let result = accounts.add_user(&long_username).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let mut long_contact = alice();
        long_contact.person.contact_number = "9".repeat(40);
        let result = accounts.add_user(&long_contact).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));

        // Nothing was written, so the name is still free.
        accounts.add_user(&alice()).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let accounts = manager();
        let update = ProfileUpdate {
            user_id: 42,
            username: "ghost".to_string(),
            password: None,
            person_name: "Ghost".to_string(),
            contact_number: "0".to_string(),
            address: String::new(),
        };
        assert!(matches!(
            accounts.update_user_detail(&update).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_password_recovery() {
        let accounts = manager();
        let user_id = accounts.add_user(&alice()).await.unwrap();

        let challenge = accounts.get_security_question("alice").await.unwrap().unwrap();
        assert_eq!(challenge.question, "First pet?");
        assert!(challenge.accepts("dinah"));
        assert!(accounts.get_security_question("nobody").await.unwrap().is_none());

        let reset = PasswordReset { username: "alice".to_string(), password: "fresh".to_string() };
        accounts.set_password(&reset).await.unwrap();
        assert_eq!(accounts.validate_user_info("alice", "fresh").await.unwrap(), Some(user_id));

        let unknown = PasswordReset { username: "nobody".to_string(), password: "x".to_string() };
        assert!(matches!(accounts.set_password(&unknown).await, Err(CoreError::NotFound(_))));
    }
}
