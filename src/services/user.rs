//! User service
//!
//! Accounts and authentication:
//! - registration, login and logout with session tokens
//! - profile and password changes for the signed-in user
//! - the forgot/reset password flow (emailed single-use token)
//! - admin management of every account

use crate::config::AuthConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, UpdateUserInput, User, UserRole};
use crate::query::{AdvancedResults, ListQuery};
use crate::services::email::{Mailer, OutgoingMail};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::password::{digest_token, generate_reset_token, hash_password, verify_password};
use crate::services::validate::{require_email, require_password, require_text};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDetailsInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    mailer: Arc<dyn Mailer>,
    session_ttl: Duration,
    reset_ttl: Duration,
    public_url: String,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        mailer: Arc<dyn Mailer>,
        auth: &AuthConfig,
        public_url: &str,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            mailer,
            session_ttl: Duration::days(auth.session_expiration_days),
            reset_ttl: Duration::minutes(auth.reset_token_minutes),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an account and sign it in
    ///
    /// The admin role cannot be self-assigned.
    pub async fn register(&self, input: CreateUserInput) -> ServiceResult<(User, Session)> {
        if input.role == Some(UserRole::Admin) {
            return Err(ServiceError::validation("The admin role cannot be self-assigned"));
        }
        let user = self.create_account(input).await?;
        let session = self.create_session(user.id).await?;
        tracing::info!("Registered user {} ({})", user.id, user.role);
        Ok((user, session))
    }

    pub async fn login(&self, input: LoginInput) -> ServiceResult<(User, Session)> {
        if input.email.trim().is_empty() || input.password.is_empty() {
            return Err(ServiceError::validation("Please provide an email and password"));
        }

        let user = self
            .user_repo
            .get_by_email(input.email.trim())
            .await?
            .ok_or_else(|| ServiceError::unauthorized("Invalid credentials"))?;

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(ServiceError::unauthorized("Invalid credentials"));
        }

        let session = self.create_session(user.id).await?;
        Ok((user, session))
    }

    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a session token
    ///
    /// Expired sessions are deleted and treated as absent.
    pub async fn validate_session(&self, token: &str) -> ServiceResult<Option<User>> {
        let Some(session) = self.session_repo.get_by_id(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        Ok(self.user_repo.get_by_id(session.user_id).await?)
    }

    pub async fn update_details(&self, user: &User, input: UpdateDetailsInput) -> ServiceResult<User> {
        let mut updated = user.clone();
        if let Some(name) = input.name {
            require_text("name", &name, Some(100))?;
            updated.name = name.trim().to_string();
        }
        if let Some(email) = input.email {
            let email = email.trim().to_string();
            require_email(&email)?;
            self.ensure_email_free(&email, Some(user.id)).await?;
            updated.email = email;
        }
        Ok(self.user_repo.update(&updated).await?)
    }

    /// Change the password and issue a fresh token
    pub async fn update_password(
        &self,
        user: &User,
        input: UpdatePasswordInput,
    ) -> ServiceResult<Session> {
        let valid = verify_password(&input.current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(ServiceError::unauthorized("Password is incorrect"));
        }
        require_password(&input.new_password)?;

        let mut updated = user.clone();
        updated.password_hash = hash_password(&input.new_password)?;
        self.user_repo.update(&updated).await?;
        self.revoke_sessions(user.id).await?;
        self.create_session(user.id).await
    }

    /// Email a reset link carrying a fresh single-use token
    ///
    /// If the mail cannot be sent the token is withdrawn again.
    pub async fn forgot_password(&self, email: &str) -> ServiceResult<()> {
        let mut user = self
            .user_repo
            .get_by_email(email.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("There is no user with that email"))?;

        let (token, digest) = generate_reset_token();
        user.reset_password_token = Some(digest);
        user.reset_password_expire = Some(Utc::now() + self.reset_ttl);
        let user = self.user_repo.update(&user).await?;

        let reset_url = format!("{}/api/v1/auth/resetpassword/{}", self.public_url, token);
        let mail = OutgoingMail {
            to: user.email.clone(),
            subject: "Password reset token".to_string(),
            body: format!(
                "You are receiving this email because you (or someone else) has requested \
                 the reset of a password. Please make a PUT request to:\n\n{}",
                reset_url
            ),
        };

        if let Err(e) = self.mailer.send(mail).await {
            tracing::error!("Failed to send reset email to user {}: {:#}", user.id, e);
            let mut user = user;
            user.reset_password_token = None;
            user.reset_password_expire = None;
            self.user_repo.update(&user).await?;
            return Err(ServiceError::upstream("Email could not be sent"));
        }
        Ok(())
    }

    /// Set a new password with an emailed token; the token is consumed
    pub async fn reset_password(&self, token: &str, password: &str) -> ServiceResult<(User, Session)> {
        let mut user = self
            .user_repo
            .get_by_reset_token(&digest_token(token), Utc::now())
            .await?
            .ok_or_else(|| ServiceError::validation("Invalid token"))?;

        require_password(password)?;
        user.password_hash = hash_password(password)?;
        user.reset_password_token = None;
        user.reset_password_expire = None;
        let user = self.user_repo.update(&user).await?;

        self.revoke_sessions(user.id).await?;
        let session = self.create_session(user.id).await?;
        Ok((user, session))
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<AdvancedResults> {
        let page = self.user_repo.find(query).await?;
        Ok(AdvancedResults::build(&page.records, page.total, query)?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<User> {
        self.user_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User not found with id of {}", id)))
    }

    /// Admin account creation; any role may be assigned
    pub async fn create(&self, input: CreateUserInput) -> ServiceResult<User> {
        self.create_account(input).await
    }

    pub async fn update(&self, id: i64, input: UpdateUserInput) -> ServiceResult<User> {
        let mut user = self.get(id).await?;
        if let Some(name) = input.name {
            require_text("name", &name, Some(100))?;
            user.name = name.trim().to_string();
        }
        if let Some(email) = input.email {
            let email = email.trim().to_string();
            require_email(&email)?;
            self.ensure_email_free(&email, Some(id)).await?;
            user.email = email;
        }
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(password) = input.password {
            require_password(&password)?;
            user.password_hash = hash_password(&password)?;
        }
        Ok(self.user_repo.update(&user).await?)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.user_repo.delete(id).await? {
            return Err(ServiceError::not_found(format!("User not found with id of {}", id)));
        }
        Ok(())
    }

    async fn create_account(&self, input: CreateUserInput) -> ServiceResult<User> {
        require_text("name", &input.name, Some(100))?;
        let email = input.email.trim().to_string();
        require_email(&email)?;
        require_password(&input.password)?;
        self.ensure_email_free(&email, None).await?;

        let password_hash = hash_password(&input.password)?;
        let user = User::new(
            input.name.trim().to_string(),
            email,
            password_hash,
            input.role.unwrap_or_default(),
        );
        Ok(self.user_repo.create(&user).await?)
    }

    async fn ensure_email_free(&self, email: &str, owner: Option<i64>) -> ServiceResult<()> {
        match self.user_repo.get_by_email(email).await? {
            Some(existing) if Some(existing.id) != owner => {
                Err(ServiceError::validation("Duplicate field value entered"))
            }
            _ => Ok(()),
        }
    }

    /// Tokens issued under the old password stop working
    async fn revoke_sessions(&self, user_id: i64) -> ServiceResult<()> {
        self.session_repo
            .delete_by_user(user_id)
            .await
            .context("Failed to revoke sessions")?;
        Ok(())
    }

    async fn create_session(&self, user_id: i64) -> ServiceResult<Session> {
        let session = Session::issue(user_id, self.session_ttl);
        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::email::RecordingMailer;

    pub(crate) fn register_input(name: &str, role: Option<UserRole>) -> CreateUserInput {
        CreateUserInput {
            name: name.to_string(),
            email: format!("{}@example.com", name),
            password: "123456".to_string(),
            role,
        }
    }

    async fn setup(mailer: Arc<RecordingMailer>) -> UserService {
        let db = create_test_pool().await.unwrap();
        migrations::run_migrations(&db).await.unwrap();
        UserService::new(
            SqlxUserRepository::boxed(db.clone()),
            SqlxSessionRepository::boxed(db),
            mailer,
            &AuthConfig::default(),
            "http://localhost:5000/",
        )
    }

    fn token_from(mail: &OutgoingMail) -> String {
        mail.body.rsplit('/').next().unwrap().trim().to_string()
    }

    #[tokio::test]
    async fn test_register_login_logout() {
        let service = setup(Arc::new(RecordingMailer::default())).await;
        let (user, session) = service.register(register_input("jane", None)).await.unwrap();
        assert_eq!(user.role, UserRole::User);
        assert_eq!(
            service.validate_session(&session.id).await.unwrap().map(|u| u.id),
            Some(user.id)
        );

        let (_, login) = service
            .login(LoginInput { email: "jane@example.com".into(), password: "123456".into() })
            .await
            .unwrap();
        service.logout(&login.id).await.unwrap();
        assert!(service.validate_session(&login.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_rules() {
        let service = setup(Arc::new(RecordingMailer::default())).await;
        let err = service
            .register(register_input("root", Some(UserRole::Admin)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        service.register(register_input("jane", None)).await.unwrap();
        let err = service.register(register_input("jane", None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Duplicate field value entered");

        let mut bad = register_input("bob", None);
        bad.email = "bob".into();
        assert!(matches!(service.register(bad).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let service = setup(Arc::new(RecordingMailer::default())).await;
        service.register(register_input("jane", None)).await.unwrap();

        let err = service
            .login(LoginInput { email: "jane@example.com".into(), password: "wrong!".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = service
            .login(LoginInput { email: "".into(), password: "".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_password_issues_new_token() {
        let service = setup(Arc::new(RecordingMailer::default())).await;
        let (user, first) = service.register(register_input("jane", None)).await.unwrap();

        let err = service
            .update_password(
                &user,
                UpdatePasswordInput { current_password: "nope".into(), new_password: "abcdef".into() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let second = service
            .update_password(
                &user,
                UpdatePasswordInput { current_password: "123456".into(), new_password: "abcdef".into() },
            )
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert!(service.validate_session(&first.id).await.unwrap().is_none());
        assert_eq!(service.validate_session(&second.id).await.unwrap().unwrap().id, user.id);
        assert!(service
            .login(LoginInput { email: "jane@example.com".into(), password: "abcdef".into() })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_reset_token_single_use() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = setup(mailer.clone()).await;
        service.register(register_input("jane", None)).await.unwrap();

        service.forgot_password("jane@example.com").await.unwrap();
        let mail = mailer.last().unwrap();
        assert_eq!(mail.to, "jane@example.com");
        assert!(mail.body.contains("http://localhost:5000/api/v1/auth/resetpassword/"));
        let token = token_from(&mail);

        let (user, _) = service.reset_password(&token, "newpass").await.unwrap();
        assert!(user.reset_password_token.is_none());

        let err = service.reset_password(&token, "again!").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid token");
    }

    #[tokio::test]
    async fn test_reset_token_expires() {
        let mailer = Arc::new(RecordingMailer::default());
        let db = create_test_pool().await.unwrap();
        migrations::run_migrations(&db).await.unwrap();
        let auth = AuthConfig { reset_token_minutes: -1, ..AuthConfig::default() };
        let service = UserService::new(
            SqlxUserRepository::boxed(db.clone()),
            SqlxSessionRepository::boxed(db),
            mailer.clone(),
            &auth,
            "http://localhost:5000",
        );
        service.register(register_input("jane", None)).await.unwrap();
        service.forgot_password("jane@example.com").await.unwrap();

        let token = token_from(&mailer.last().unwrap());
        assert!(matches!(
            service.reset_password(&token, "newpass").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_mail_failure_withdraws_token() {
        let service = setup(Arc::new(RecordingMailer::failing())).await;
        let (user, _) = service.register(register_input("jane", None)).await.unwrap();

        let err = service.forgot_password("jane@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
        let stored = service.get(user.id).await.unwrap();
        assert!(stored.reset_password_token.is_none());

        let err = service.forgot_password("ghost@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_admin_crud() {
        let service = setup(Arc::new(RecordingMailer::default())).await;
        let admin = service
            .create(register_input("boss", Some(UserRole::Admin)))
            .await
            .unwrap();
        assert!(admin.is_admin());

        let updated = service
            .update(admin.id, UpdateUserInput { role: Some(UserRole::Publisher), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::Publisher);

        service.delete(admin.id).await.unwrap();
        assert!(matches!(service.get(admin.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete(admin.id).await, Err(ServiceError::NotFound(_))));
    }
}
