// ============================================================================
// Comanda Core - Authentication Service
// File: crates/comanda-core/src/services/auth_service.rs
// ============================================================================
//! Authentication service: login, self-registration and token verification.
//!
//! The same service runs in the control plane (main port) and in every
//! tenant process (the tenant's own port as declared port), so the port gate
//! is applied identically everywhere.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use comanda_security::{
    login_port_allowed, JwtError, JwtService, PasswordService, Role, TenantClaims, TokenSubject,
};

use crate::domain::{normalize_email, NewRestaurant, Restaurant, RestaurantPatch, SubscriptionStatus};
use crate::error::DomainError;
use crate::repositories::RestaurantRepository;
use crate::services::hash_password;

/// Configured platform operator. Only an Argon2 hash is accepted here.
#[derive(Debug, Clone)]
pub struct PlatformAdmin {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub email: String,
    pub password: String,
    /// Port the caller intends to use the token on. `None` means the main
    /// port.
    pub declared_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub access_token: String,
    pub expires_in: i64,
    pub claims: TenantClaims,
    /// `None` for the platform admin.
    pub restaurant: Option<Restaurant>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

pub struct AuthService {
    repo: Arc<dyn RestaurantRepository>,
    jwt: Arc<JwtService>,
    main_port: u16,
    admin: Option<PlatformAdmin>,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn RestaurantRepository>,
        jwt: Arc<JwtService>,
        main_port: u16,
        admin: Option<PlatformAdmin>,
    ) -> Self {
        Self {
            repo,
            jwt,
            main_port,
            admin: admin.map(|a| PlatformAdmin {
                email: normalize_email(&a.email),
                password_hash: a.password_hash,
            }),
        }
    }

    pub fn main_port(&self) -> u16 {
        self.main_port
    }

    /// Login as platform admin or as a restaurant owner.
    pub async fn login(&self, attempt: LoginAttempt) -> Result<LoginResult, DomainError> {
        let email = normalize_email(&attempt.email);
        info!("Login attempt for email: {} (port={:?})", email, attempt.declared_port);

        if let Some(admin) = self.admin.as_ref().filter(|a| a.email == email) {
            return self.login_admin(admin, &attempt);
        }

        // 1. Find restaurant by email
        let Some(restaurant) = self.repo.find_by_email(&email).await? else {
            PasswordService::verify_dummy(&attempt.password);
            warn!("Login failed: email not found: {}", email);
            return Err(DomainError::InvalidCredentials);
        };

        // 2. Port gate, before the password is looked at
        if !login_port_allowed(attempt.declared_port, self.main_port, restaurant.port) {
            PasswordService::verify_dummy(&attempt.password);
            warn!(
                "Login failed: declared port {:?} does not belong to {} (assigned={:?})",
                attempt.declared_port, email, restaurant.port
            );
            return Err(DomainError::InvalidCredentials);
        }

        // 3. Verify password
        let valid = PasswordService::verify_stored(&attempt.password, &restaurant.password)
            .map_err(|e| {
                warn!("Stored credential for {} could not be parsed: {}", email, e);
                DomainError::InvalidCredentials
            })?;
        if !valid {
            warn!("Login failed: invalid password for: {}", email);
            return Err(DomainError::InvalidCredentials);
        }

        // 4. Check subscription
        let port = match restaurant.port {
            Some(port) if restaurant.is_approved() => port,
            _ => {
                warn!(
                    "Login failed: restaurant not active (status: {})",
                    restaurant.subscription_status.as_str()
                );
                return Err(DomainError::RestaurantNotActive);
            }
        };

        // 5. Upgrade legacy credential
        if PasswordService::needs_rehash(&restaurant.password) {
            self.upgrade_credential(&restaurant.id, &attempt.password).await;
        }

        // 6. Mint token bound to the restaurant's port
        let subject = TokenSubject {
            id: restaurant.id,
            restaurant_id: Some(restaurant.id),
            port,
            subdomain: Some(restaurant.subdomain.clone()),
            role: Role::RestaurantAdmin,
        };
        let (access_token, claims) = self.mint(&subject)?;

        info!("Login successful for: {} (port={})", email, port);

        Ok(LoginResult {
            access_token,
            expires_in: self.jwt.access_token_expiry(),
            claims,
            restaurant: Some(restaurant),
        })
    }

    /// Self-service sign-up. The record is `pending`, holds its subdomain
    /// and has no port until approved.
    pub async fn register(&self, registration: Registration) -> Result<Restaurant, DomainError> {
        let email = normalize_email(&registration.email);
        info!("Registration attempt for email: {}", email);

        // 1. Check if email already exists
        if self.repo.find_by_email(&email).await?.is_some() {
            warn!("Registration failed: email already exists: {}", email);
            return Err(DomainError::EmailAlreadyExists(email));
        }

        // 2. Hash password
        let password_hash = hash_password(&registration.password)?;

        // 3. Validate
        let new = NewRestaurant::new(
            registration.name,
            email,
            password_hash,
            registration.phone,
            registration.address,
            SubscriptionStatus::Pending,
        )?;

        // 4. Save without a port
        let created = self.repo.create(&new, None).await?;

        info!("Registration successful for: {} (subdomain={})", created.email, created.subdomain);
        Ok(created)
    }

    /// Signature and expiry only. Port binding is checked by the caller
    /// with `comanda_security::authorize`.
    pub fn verify_token(&self, token: &str) -> Result<TenantClaims, DomainError> {
        self.jwt.validate_token(token).map_err(|e| match e {
            JwtError::TokenExpired => DomainError::TokenExpired,
            other => DomainError::InvalidToken(other.to_string()),
        })
    }

    fn login_admin(&self, admin: &PlatformAdmin, attempt: &LoginAttempt) -> Result<LoginResult, DomainError> {
        if !login_port_allowed(attempt.declared_port, self.main_port, None) {
            PasswordService::verify_dummy(&attempt.password);
            warn!("Admin login refused on port {:?}", attempt.declared_port);
            return Err(DomainError::InvalidCredentials);
        }

        let valid = PasswordService::verify(&attempt.password, &admin.password_hash).map_err(|e| {
            error!("Configured admin password hash is unusable: {}", e);
            DomainError::InvalidCredentials
        })?;
        if !valid {
            warn!("Login failed: invalid admin password");
            return Err(DomainError::InvalidCredentials);
        }

        let subject = TokenSubject {
            id: Uuid::nil(),
            restaurant_id: None,
            port: self.main_port,
            subdomain: None,
            role: Role::SuperAdmin,
        };
        let (access_token, claims) = self.mint(&subject)?;

        info!("Admin login successful");

        Ok(LoginResult {
            access_token,
            expires_in: self.jwt.access_token_expiry(),
            claims,
            restaurant: None,
        })
    }

    fn mint(&self, subject: &TokenSubject) -> Result<(String, TenantClaims), DomainError> {
        let token = self
            .jwt
            .generate_access_token(subject)
            .map_err(|e| DomainError::TokenGenerationError(e.to_string()))?;
        let claims = self.verify_token(&token)?;
        Ok((token, claims))
    }

    async fn upgrade_credential(&self, id: &Uuid, password: &str) {
        let hash = match PasswordService::hash(password) {
            Ok(hash) => hash,
            Err(e) => {
                error!("Failed to rehash legacy credential for {}: {}", id, e);
                return;
            }
        };

        // Don't fail login for this
        match self.repo.update(id, &RestaurantPatch::password(hash)).await {
            Ok(_) => info!("Legacy credential upgraded to argon2 for {}", id),
            Err(e) => error!("Failed to store upgraded credential for {}: {}", id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryRestaurantRepository, MockRestaurantRepository};
    use crate::allocator::PortRange;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";
    const MAIN_PORT: u16 = 3000;

    fn jwt() -> Arc<JwtService> {
        Arc::new(JwtService::new(SECRET, 3600))
    }

    fn admin() -> PlatformAdmin {
        PlatformAdmin {
            email: "Ops@Comanda.io".into(),
            password_hash: PasswordService::hash("admin-password").unwrap(),
        }
    }

    fn service(repo: Arc<InMemoryRestaurantRepository>) -> AuthService {
        AuthService::new(repo, jwt(), MAIN_PORT, Some(admin()))
    }

    async fn seed(repo: &InMemoryRestaurantRepository, email: &str, stored: &str, status: SubscriptionStatus) -> Restaurant {
        let new = NewRestaurant::new("Casa Pepe".into(), email.into(), stored.into(), None, None, status).unwrap();
        let ports = (status == SubscriptionStatus::Active).then(PortRange::default);
        repo.create(&new, ports).await.unwrap()
    }

    fn attempt(email: &str, password: &str, port: Option<u16>) -> LoginAttempt {
        LoginAttempt {
            email: email.into(),
            password: password.into(),
            declared_port: port,
        }
    }

    #[tokio::test]
    async fn test_login_issues_token_for_assigned_port() {
        let repo = Arc::new(InMemoryRestaurantRepository::new());
        let hash = PasswordService::hash("owner-password").unwrap();
        let record = seed(&repo, "owner@pepe.es", &hash, SubscriptionStatus::Active).await;
        let svc = service(repo);

        let result = svc.login(attempt("owner@pepe.es", "owner-password", None)).await.unwrap();

        assert_eq!(result.claims.puerto, 3001);
        assert_eq!(result.claims.restaurant_id, Some(record.id));
        assert_eq!(result.claims.rol, Role::RestaurantAdmin);
        assert_eq!(result.claims.subdominio.as_deref(), Some("casa-pepe"));
        assert_eq!(svc.verify_token(&result.access_token).unwrap(), result.claims);
    }

    #[tokio::test]
    async fn test_login_port_gate_runs_before_password() {
        let repo = Arc::new(InMemoryRestaurantRepository::new());
        let hash = PasswordService::hash("owner-password").unwrap();
        seed(&repo, "owner@pepe.es", &hash, SubscriptionStatus::Active).await;
        let svc = service(repo);

        // Correct password, wrong port: same error as a wrong password.
        let wrong_port = svc.login(attempt("owner@pepe.es", "owner-password", Some(3002))).await;
        assert!(matches!(wrong_port, Err(DomainError::InvalidCredentials)));

        let own_port = svc.login(attempt("owner@pepe.es", "owner-password", Some(3001))).await;
        assert!(own_port.is_ok());

        let main_port = svc.login(attempt("owner@pepe.es", "owner-password", Some(MAIN_PORT))).await;
        assert!(main_port.is_ok());
    }

    #[tokio::test]
    async fn test_login_unknown_email_and_bad_password_are_indistinguishable() {
        let repo = Arc::new(InMemoryRestaurantRepository::new());
        let hash = PasswordService::hash("owner-password").unwrap();
        seed(&repo, "owner@pepe.es", &hash, SubscriptionStatus::Active).await;
        let svc = service(repo);

        let unknown = svc.login(attempt("nobody@pepe.es", "owner-password", None)).await.unwrap_err();
        let wrong = svc.login(attempt("owner@pepe.es", "bad-password", None)).await.unwrap_err();

        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_login_pending_restaurant_not_active() {
        let repo = Arc::new(InMemoryRestaurantRepository::new());
        let hash = PasswordService::hash("owner-password").unwrap();
        seed(&repo, "owner@pepe.es", &hash, SubscriptionStatus::Pending).await;
        let svc = service(repo);

        let result = svc.login(attempt("owner@pepe.es", "owner-password", None)).await;
        assert!(matches!(result, Err(DomainError::RestaurantNotActive)));
    }

    #[tokio::test]
    async fn test_login_upgrades_plaintext_credential() {
        let repo = Arc::new(InMemoryRestaurantRepository::new());
        let record = seed(&repo, "legacy@pepe.es", "legacy-secret", SubscriptionStatus::Active).await;
        let svc = service(repo.clone());

        svc.login(attempt("legacy@pepe.es", "legacy-secret", None)).await.unwrap();

        let stored = repo.find_by_id(&record.id).await.unwrap().unwrap();
        assert!(stored.password.starts_with("$argon2"));
        assert!(svc.login(attempt("legacy@pepe.es", "legacy-secret", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_survives_failed_credential_upgrade() {
        let record = NewRestaurant::new(
            "Casa Pepe".into(),
            "legacy@pepe.es".into(),
            "legacy-secret".into(),
            None,
            None,
            SubscriptionStatus::Active,
        )
        .unwrap()
        .into_record("casa-pepe".into(), Some(3001));

        let mut repo = MockRestaurantRepository::new();
        repo.expect_find_by_email()
            .returning(move |_| Ok(Some(record.clone())));
        repo.expect_update()
            .times(1)
            .returning(|_, _| Err(DomainError::DatabaseError("read-only".into())));

        let svc = AuthService::new(Arc::new(repo), jwt(), MAIN_PORT, None);
        let result = svc.login(attempt("legacy@pepe.es", "legacy-secret", None)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_admin_login_only_on_main_port() {
        let svc = service(Arc::new(InMemoryRestaurantRepository::new()));

        let ok = svc.login(attempt("ops@comanda.io", "admin-password", None)).await.unwrap();
        assert_eq!(ok.claims.rol, Role::SuperAdmin);
        assert_eq!(ok.claims.puerto, MAIN_PORT);
        assert!(ok.restaurant.is_none());

        let elsewhere = svc.login(attempt("ops@comanda.io", "admin-password", Some(3001))).await;
        assert!(matches!(elsewhere, Err(DomainError::InvalidCredentials)));

        let wrong = svc.login(attempt("ops@comanda.io", "nope-nope", None)).await;
        assert!(matches!(wrong, Err(DomainError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_creates_pending_without_port() {
        let repo = Arc::new(InMemoryRestaurantRepository::new());
        let svc = service(repo.clone());

        let created = svc
            .register(Registration {
                name: "Casa Pepe".into(),
                email: "Owner@Pepe.es".into(),
                password: "owner-password".into(),
                phone: Some("600000000".into()),
                address: None,
            })
            .await
            .unwrap();

        assert_eq!(created.subscription_status, SubscriptionStatus::Pending);
        assert!(!created.active);
        assert!(created.port.is_none());
        assert_eq!(created.subdomain, "casa-pepe");
        assert_eq!(created.email, "owner@pepe.es");

        let duplicate = svc
            .register(Registration {
                name: "Otra Casa".into(),
                email: "owner@pepe.es".into(),
                password: "owner-password".into(),
                phone: None,
                address: None,
            })
            .await;
        assert!(matches!(duplicate, Err(DomainError::EmailAlreadyExists(_))));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_token_expired() {
        let svc = service(Arc::new(InMemoryRestaurantRepository::new()));
        let subject = TokenSubject {
            id: Uuid::new_v4(),
            restaurant_id: None,
            port: 3001,
            subdomain: None,
            role: Role::RestaurantAdmin,
        };
        let token = jwt().generate_token(&subject, -3600).unwrap();

        assert!(matches!(svc.verify_token(&token), Err(DomainError::TokenExpired)));
        assert!(matches!(svc.verify_token("garbage"), Err(DomainError::InvalidToken(_))));
    }
}
