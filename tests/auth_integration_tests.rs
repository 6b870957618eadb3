use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use storefront_gateway::{
    AppConfig, AppState, InMemoryDirectory, NotificationBridge,
    auth::{self, Claims, DEV_BYPASS_HEADER, Identity},
    config::Env,
    directory::{DirectoryError, DirectoryState, Employee, EmployeeDirectory},
    error::ApiError,
    roles::Role,
};
use uuid::Uuid;

// --- Mock Directory for Failure Paths ---

/// Directory whose backing store is unreachable.
struct UnreachableDirectory;

#[async_trait]
impl EmployeeDirectory for UnreachableDirectory {
    async fn find_by_id(&self, _id: Uuid) -> Result<Option<Employee>, DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn find_by_email(&self, _email: &str) -> Result<Option<Employee>, DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn list(&self) -> Result<Vec<Employee>, DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }
}

// --- Helpers ---

const SECRET: &str = "auth-test-secret";

fn cashier() -> Employee {
    Employee {
        id: Uuid::new_v4(),
        name: "Casey Cashier".into(),
        email: "casey@storefront.test".into(),
        role: Role::Cashier,
        password_hash: String::new(),
        active: true,
    }
}

fn config(env: Env) -> AppConfig {
    AppConfig {
        env,
        jwt_secret: SECRET.into(),
        ..AppConfig::default()
    }
}

fn state_with(directory: DirectoryState, env: Env) -> AppState {
    AppState {
        directory,
        notifier: NotificationBridge::new(),
        config: config(env),
    }
}

fn state_for(employees: Vec<Employee>, env: Env) -> AppState {
    state_with(Arc::new(InMemoryDirectory::with_employees(employees)), env)
}

fn parts_with(headers: &[(&str, String)]) -> Parts {
    let mut builder = Request::builder().uri("/api/employee/me");
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }
    builder.body(()).unwrap().into_parts().0
}

fn token_for(employee: &Employee, env: Env) -> String {
    auth::issue_token(employee, &config(env)).unwrap().0
}

fn signed(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn now() -> usize {
    chrono::Utc::now().timestamp() as usize
}

async fn extract(parts: &mut Parts, state: &AppState) -> Result<Identity, ApiError> {
    Identity::from_request_parts(parts, state).await
}

// --- Bearer tokens ---

#[tokio::test]
async fn valid_token_resolves_identity() {
    let employee = cashier();
    let state = state_for(vec![employee.clone()], Env::Production);
    let mut parts = parts_with(&[(
        header::AUTHORIZATION.as_str(),
        format!("Bearer {}", token_for(&employee, Env::Production)),
    )]);

    let identity = extract(&mut parts, &state).await.unwrap();

    assert_eq!(identity, Identity { id: employee.id, role: Role::Cashier });
    assert_eq!(parts.extensions.get::<Identity>(), Some(&identity));
}

#[tokio::test]
async fn missing_or_malformed_authorization_is_unauthenticated() {
    let state = state_for(vec![cashier()], Env::Production);

    let cases = [
        vec![],
        vec![(header::AUTHORIZATION.as_str(), "Bearer ".to_string())],
        vec![(header::AUTHORIZATION.as_str(), "Token abc".to_string())],
        vec![(header::AUTHORIZATION.as_str(), "Bearer not.a.jwt".to_string())],
    ];
    for headers in cases {
        let mut parts = parts_with(&headers);
        let result = extract(&mut parts, &state).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated)), "{headers:?}");
    }
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let employee = cashier();
    let state = state_for(vec![employee.clone()], Env::Production);
    let claims = Claims {
        sub: employee.id,
        role: employee.role,
        iat: now() - 7200,
        exp: now() - 3600,
    };
    let mut parts = parts_with(&[(
        header::AUTHORIZATION.as_str(),
        format!("Bearer {}", signed(&claims, SECRET)),
    )]);

    assert!(matches!(extract(&mut parts, &state).await, Err(ApiError::Unauthenticated)));
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let employee = cashier();
    let state = state_for(vec![employee.clone()], Env::Production);
    let claims = Claims {
        sub: employee.id,
        role: Role::Admin,
        iat: now(),
        exp: now() + 3600,
    };
    let mut parts = parts_with(&[(
        header::AUTHORIZATION.as_str(),
        format!("Bearer {}", signed(&claims, "someone-elses-secret")),
    )]);

    assert!(matches!(extract(&mut parts, &state).await, Err(ApiError::Unauthenticated)));
}

#[tokio::test]
async fn deactivated_or_removed_employee_is_rejected() {
    let mut departed = cashier();
    let token = token_for(&departed, Env::Production);
    departed.active = false;

    for directory in [vec![departed.clone()], vec![]] {
        let state = state_for(directory, Env::Production);
        let mut parts = parts_with(&[(header::AUTHORIZATION.as_str(), format!("Bearer {token}"))]);
        assert!(matches!(extract(&mut parts, &state).await, Err(ApiError::Unauthenticated)));
    }
}

#[tokio::test]
async fn directory_role_overrides_token_role() {
    let mut employee = cashier();
    let token = token_for(&employee, Env::Production);
    employee.role = Role::Admin;
    let state = state_for(vec![employee.clone()], Env::Production);
    let mut parts = parts_with(&[(header::AUTHORIZATION.as_str(), format!("Bearer {token}"))]);

    let identity = extract(&mut parts, &state).await.unwrap();

    assert_eq!(identity.role, Role::Admin);
}

#[tokio::test]
async fn directory_outage_is_an_internal_error() {
    let employee = cashier();
    let state = state_with(Arc::new(UnreachableDirectory), Env::Production);
    let mut parts = parts_with(&[(
        header::AUTHORIZATION.as_str(),
        format!("Bearer {}", token_for(&employee, Env::Production)),
    )]);

    let err = extract(&mut parts, &state).await.unwrap_err();

    assert!(matches!(err, ApiError::Internal(_)));
    assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// --- Local bypass header ---

#[tokio::test]
async fn bypass_header_resolves_in_local_mode() {
    let employee = cashier();
    let state = state_for(vec![employee.clone()], Env::Local);
    let mut parts = parts_with(&[(DEV_BYPASS_HEADER, employee.id.to_string())]);

    let identity = extract(&mut parts, &state).await.unwrap();

    assert_eq!(identity.id, employee.id);
}

#[tokio::test]
async fn bypass_header_is_ignored_in_production() {
    let employee = cashier();
    let state = state_for(vec![employee.clone()], Env::Production);
    let mut parts = parts_with(&[(DEV_BYPASS_HEADER, employee.id.to_string())]);

    assert!(matches!(extract(&mut parts, &state).await, Err(ApiError::Unauthenticated)));
}

#[tokio::test]
async fn unknown_bypass_id_falls_back_to_the_token() {
    let employee = cashier();
    let state = state_for(vec![employee.clone()], Env::Local);
    let mut parts = parts_with(&[
        (DEV_BYPASS_HEADER, Uuid::new_v4().to_string()),
        (
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token_for(&employee, Env::Local)),
        ),
    ]);

    let identity = extract(&mut parts, &state).await.unwrap();

    assert_eq!(identity.id, employee.id);
}

// --- Extractor reuse ---

#[tokio::test]
async fn identity_stored_by_the_gate_is_reused() {
    // An empty directory would reject any fresh authentication.
    let state = state_for(vec![], Env::Production);
    let stored = Identity { id: Uuid::new_v4(), role: Role::Associate };
    let mut parts = parts_with(&[]);
    parts.extensions.insert(stored);

    assert_eq!(extract(&mut parts, &state).await.unwrap(), stored);
}
