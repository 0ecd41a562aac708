//! Session and role context.
//!
//! The one piece of state that outlives a single view: the authenticated
//! identity, persisted across restarts through a pluggable [`SessionStore`]
//! (a JSON file in production, memory in tests). The role string is
//! normalized once at login and mapped to a capability set through a
//! declarative table. That table decides which actions the console offers;
//! it is not a security boundary, the server enforces authorization
//! independently.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// Known console roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    LabTechnician,
    Pharmacist,
    Receptionist,
    /// A role string the console does not recognise. Carries no
    /// capabilities but does not fail login; the server stays the
    /// authority.
    #[serde(untagged)]
    Unknown(String),
}

impl Role {
    /// Normalizes a raw role string (case, whitespace, separators) and
    /// maps it to a known role; `"Lab Technician"`, `"lab_technician"` and
    /// `"LABTECHNICIAN"` are the same role.
    pub fn normalize(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "admin" | "administrator" => Role::Admin,
            "doctor" => Role::Doctor,
            "nurse" => Role::Nurse,
            "labtechnician" => Role::LabTechnician,
            "pharmacist" => Role::Pharmacist,
            "receptionist" => Role::Receptionist,
            _ => Role::Unknown(normalized),
        }
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::normalize(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::LabTechnician => "lab_technician",
            Role::Pharmacist => "pharmacist",
            Role::Receptionist => "receptionist",
            Role::Unknown(s) => s.as_str(),
        };
        f.write_str(name)
    }
}

/// Actions the console can offer, gated per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManagePatients,
    ScheduleAppointments,
    ManageAdmissions,
    OrderLabTests,
    EnterLabResults,
    DispenseStock,
    ManageInventory,
    ManageBilling,
    ManageVendors,
    RunConsultations,
}

impl Role {
    /// The declarative role-to-capability table.
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Admin => &[
                ManagePatients,
                ScheduleAppointments,
                ManageAdmissions,
                OrderLabTests,
                ManageInventory,
                ManageBilling,
                ManageVendors,
            ],
            Role::Doctor => &[
                ManagePatients,
                ScheduleAppointments,
                ManageAdmissions,
                OrderLabTests,
                RunConsultations,
            ],
            Role::Nurse => &[ManagePatients, ManageAdmissions, ScheduleAppointments],
            Role::LabTechnician => &[OrderLabTests, EnterLabResults],
            Role::Pharmacist => &[DispenseStock, ManageInventory, ManageBilling],
            Role::Receptionist => &[ManagePatients, ScheduleAppointments],
            Role::Unknown(_) => &[],
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// The authenticated identity: an opaque bearer token plus the normalized
/// role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub token: String,
    pub role: Role,
}

/// Durable storage for the identity. Implementations must tolerate an
/// absent record (fresh install, after logout).
pub trait SessionStore: Send + Sync {
    fn load(&self) -> ServiceResult<Option<SessionIdentity>>;
    fn save(&self, identity: &SessionIdentity) -> ServiceResult<()>;
    fn clear(&self) -> ServiceResult<()>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identity: RwLock<Option<SessionIdentity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> ServiceResult<Option<SessionIdentity>> {
        Ok(self.identity.read().map_err(poisoned)?.clone())
    }

    fn save(&self, identity: &SessionIdentity) -> ServiceResult<()> {
        *self.identity.write().map_err(poisoned)? = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) -> ServiceResult<()> {
        *self.identity.write().map_err(poisoned)? = None;
        Ok(())
    }
}

fn poisoned<T>(_: T) -> ServiceError {
    ServiceError::Storage("session lock poisoned".into())
}

/// JSON-file-backed store; the durable-browser-storage analog.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> ServiceResult<Option<SessionIdentity>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ServiceError::Storage(err.to_string())),
        };
        match serde_json::from_str(&contents) {
            Ok(identity) => Ok(Some(identity)),
            Err(err) => {
                // A corrupt session file means logging in again, not a
                // broken console.
                tracing::warn!("discarding unreadable session file: {err}");
                Ok(None)
            }
        }
    }

    fn save(&self, identity: &SessionIdentity) -> ServiceResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ServiceError::Storage(e.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(identity)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| ServiceError::Storage(e.to_string()))
    }

    fn clear(&self) -> ServiceResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ServiceError::Storage(err.to_string())),
        }
    }
}

/// Process-wide session context: single writer (login/logout), snapshot
/// reads everywhere else.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    cached: Arc<RwLock<Option<SessionIdentity>>>,
}

impl SessionContext {
    /// Wraps a store, loading any persisted identity so a restart does not
    /// log the user out.
    pub fn new(store: Arc<dyn SessionStore>) -> ServiceResult<Self> {
        let cached = store.load()?;
        Ok(Self {
            store,
            cached: Arc::new(RwLock::new(cached)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Records a login: normalizes the role and persists the identity.
    pub fn login(&self, token: impl Into<String>, role: &str) -> ServiceResult<SessionIdentity> {
        let identity = SessionIdentity {
            token: token.into(),
            role: Role::normalize(role),
        };
        self.store.save(&identity)?;
        *self.cached.write().map_err(poisoned)? = Some(identity.clone());
        Ok(identity)
    }

    pub fn logout(&self) -> ServiceResult<()> {
        self.store.clear()?;
        *self.cached.write().map_err(poisoned)? = None;
        Ok(())
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.cached.read().ok().and_then(|g| g.clone())
    }

    /// Gate for protected operations: the identity, or
    /// [`ServiceError::Unauthenticated`] so the caller redirects to login
    /// before any network call is issued.
    pub fn require(&self) -> ServiceResult<SessionIdentity> {
        self.identity().ok_or(ServiceError::Unauthenticated)
    }

    /// Whether the current identity may perform `capability`. Absent
    /// identity means no.
    pub fn allows(&self, capability: Capability) -> bool {
        self.identity()
            .map(|identity| identity.role.allows(capability))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_normalizes_case_and_separators() {
        assert_eq!("Lab Technician".parse::<Role>().unwrap(), Role::LabTechnician);
        assert_eq!("lab_technician".parse::<Role>().unwrap(), Role::LabTechnician);
        assert_eq!("DOCTOR".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(
            "ward-clerk".parse::<Role>().unwrap(),
            Role::Unknown("wardclerk".into())
        );
    }

    #[test]
    fn capability_table_gates_actions() {
        assert!(Role::LabTechnician.allows(Capability::EnterLabResults));
        assert!(!Role::Receptionist.allows(Capability::EnterLabResults));
        assert!(Role::Doctor.allows(Capability::RunConsultations));
        assert!(Role::Unknown("wardclerk".into()).capabilities().is_empty());
    }

    #[test]
    fn context_requires_identity() {
        let context = SessionContext::in_memory();
        assert!(matches!(
            context.require(),
            Err(ServiceError::Unauthenticated)
        ));
        assert!(!context.allows(Capability::ManagePatients));

        context.login("tok-1", "doctor").unwrap();
        assert_eq!(context.require().unwrap().role, Role::Doctor);
        assert!(context.allows(Capability::RunConsultations));

        context.logout().unwrap();
        assert!(context.identity().is_none());
    }

    #[test]
    fn file_store_survives_reload_and_tolerates_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = Arc::new(FileStore::new(&path));

        let context = SessionContext::new(store.clone()).unwrap();
        context.login("tok-9", "pharmacist").unwrap();

        // A fresh context over the same file sees the login.
        let reloaded = SessionContext::new(store.clone()).unwrap();
        assert_eq!(reloaded.require().unwrap().token, "tok-9");

        std::fs::write(&path, "{ not json").unwrap();
        let corrupted = SessionContext::new(store.clone()).unwrap();
        assert!(corrupted.identity().is_none());

        context.logout().unwrap();
        assert!(!path.exists());
    }
}
