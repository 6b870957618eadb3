use std::{collections::HashMap, sync::Arc};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    models::EmployeeProfile,
    roles::Role,
};

/// Employee
///
/// The directory record behind an authenticated identity. `password_hash` is an
/// argon2 PHC string and never leaves this module through the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    pub active: bool,
}

impl Employee {
    pub fn profile(&self) -> EmployeeProfile {
        EmployeeProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("employee {id} has unknown role tag '{tag}'")]
    CorruptRole { id: Uuid, tag: String },
}

impl From<DirectoryError> for crate::error::ApiError {
    fn from(err: DirectoryError) -> Self {
        crate::error::ApiError::Internal(format!("directory: {err}"))
    }
}

/// EmployeeDirectory
///
/// Lookup contract used by authentication and the login handler. Implementations
/// must be shareable across request tasks (`Arc<dyn EmployeeDirectory>`).
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Employee>, DirectoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Employee>, DirectoryError>;
    async fn list(&self) -> Result<Vec<Employee>, DirectoryError>;
}

/// DirectoryState
///
/// The type shared through `AppState` and pulled out with `FromRef`.
pub type DirectoryState = Arc<dyn EmployeeDirectory>;

// --- Postgres ---

#[derive(FromRow)]
struct EmployeeRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    password_hash: String,
    active: bool,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = DirectoryError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(|_| DirectoryError::CorruptRole {
            id: row.id,
            tag: row.role.clone(),
        })?;
        Ok(Employee {
            id: row.id,
            name: row.name,
            email: row.email,
            role,
            password_hash: row.password_hash,
            active: row.active,
        })
    }
}

/// PostgresDirectory
///
/// Reads the `employees` table:
/// `id uuid, name text, email text unique, role text, password_hash text, active bool`.
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EMPLOYEE_COLUMNS: &str = "SELECT id, name, email, role, password_hash, active FROM employees";

#[async_trait]
impl EmployeeDirectory for PostgresDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Employee>, DirectoryError> {
        sqlx::query_as::<_, EmployeeRow>(&format!("{EMPLOYEE_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Employee::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Employee>, DirectoryError> {
        sqlx::query_as::<_, EmployeeRow>(&format!("{EMPLOYEE_COLUMNS} WHERE lower(email) = lower($1)"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(Employee::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Employee>, DirectoryError> {
        sqlx::query_as::<_, EmployeeRow>(&format!("{EMPLOYEE_COLUMNS} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Employee::try_from)
            .collect()
    }
}

// --- In-memory ---

/// InMemoryDirectory
///
/// Directory for local runs without a database and for tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    employees: RwLock<HashMap<Uuid, Employee>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employees(employees: impl IntoIterator<Item = Employee>) -> Self {
        let directory = Self::new();
        for employee in employees {
            directory.insert(employee);
        }
        directory
    }

    pub fn insert(&self, employee: Employee) {
        self.employees.write().insert(employee.id, employee);
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Employee>, DirectoryError> {
        Ok(self.employees.read().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Employee>, DirectoryError> {
        Ok(self
            .employees
            .read()
            .values()
            .find(|employee| employee.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Employee>, DirectoryError> {
        let mut all: Vec<Employee> = self.employees.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

// --- Passwords ---

/// Verified in place of a real hash when no active employee matches a login, so a
/// rejection costs one argon2 run whether or not the email exists. Same parameters
/// as `Argon2::default()`; no password verifies against it.
pub const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$IF0GI5BWKxg9QeG7sWC8lg$/l8WaKilw9DOdHAnsroSKafuWHhc9r6YEaC8Va/4zyU";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("no entropy for a salt: {0}")]
    Entropy(getrandom::Error),

    #[error("argon2: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Hashes `password` into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(PasswordError::Entropy)?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordError::Hash)?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(PasswordError::Hash)
}

/// Constant-time check of `password` against a stored PHC string. A hash that
/// does not parse never verifies.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// The hash a login attempt is verified against: the candidate's own when it is an
/// active employee, [`DUMMY_PASSWORD_HASH`] otherwise.
pub fn login_hash(candidate: Option<&Employee>) -> &str {
    match candidate {
        Some(employee) if employee.active => &employee.password_hash,
        _ => DUMMY_PASSWORD_HASH,
    }
}

/// check_credentials
///
/// Resolves a login attempt to the employee it authenticates, if any. Exactly one
/// argon2 verification runs on every path, on the blocking pool so request workers
/// stay free.
pub async fn check_credentials(
    candidate: Option<Employee>,
    password: String,
) -> Result<Option<Employee>, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || {
        let verified = verify_password(login_hash(candidate.as_ref()), &password);
        candidate.filter(|employee| verified && employee.active)
    })
    .await
}
