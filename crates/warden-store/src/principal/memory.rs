//! In-memory [`PrincipalStore`].
//!
//! Mirrors the PostgreSQL schema's uniqueness rules (unique code, email,
//! mobile with country code) and its transaction semantics: provisioning
//! writes are staged and only become visible on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use warden_core::{
    Clock, NaturalKey, NewPrincipal, Principal, PrincipalId, Role, RoleCode, SystemClock, UniCode,
};

use super::{PrincipalStore, ProvisioningTx, RoleStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    principals: Vec<Principal>,
    roles: BTreeMap<RoleCode, Role>,
    next_principal_id: i64,
    next_role_id: i64,
}

impl Tables {
    fn next_principal_id(&mut self) -> PrincipalId {
        self.next_principal_id += 1;
        PrincipalId(self.next_principal_id)
    }

    fn insert_role(&mut self, code: RoleCode) -> bool {
        if self.roles.contains_key(&code) {
            return false;
        }
        self.next_role_id += 1;
        let id = self.next_role_id;
        self.roles.insert(
            code,
            Role {
                id,
                code,
                enabled: true,
            },
        );
        true
    }

    fn conflict_with(&self, candidate: &Principal) -> Option<String> {
        self.principals
            .iter()
            .find_map(|existing| uniqueness_clash(existing, candidate))
    }
}

/// Name of the uniqueness rule `candidate` would break next to `existing`.
fn uniqueness_clash(existing: &Principal, candidate: &Principal) -> Option<String> {
    if existing.uni_code == candidate.uni_code {
        return Some("principals_uni_code_key".into());
    }
    if candidate.email.is_some() && existing.email == candidate.email {
        return Some("principals_email_key".into());
    }
    if candidate.mobile.is_some()
        && existing.mobile == candidate.mobile
        && existing.country_code == candidate.country_code
    {
        return Some("principals_mobile_country_code_key".into());
    }
    None
}

/// Cloneable handle; clones share the same tables.
#[derive(Debug, Clone)]
pub struct MemoryPrincipalStore {
    tables: Arc<Mutex<Tables>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryPrincipalStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryPrincipalStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            clock,
        }
    }

    /// A store pre-seeded with `codes` as enabled roles.
    pub fn with_roles(codes: &[RoleCode]) -> Self {
        let store = Self::default();
        {
            let mut tables = store.tables.lock();
            for code in codes {
                tables.insert_role(*code);
            }
        }
        store
    }

    /// Insert a committed principal directly, bypassing provisioning.
    pub fn insert_principal(
        &self,
        code: UniCode,
        key: &NaturalKey,
        roles: &[RoleCode],
    ) -> Result<Principal, StoreError> {
        let mut tables = self.tables.lock();
        let id = tables.next_principal_id();
        let principal = build_principal(
            id,
            code,
            key,
            key.display_name(),
            roles.to_vec(),
            self.clock.as_ref(),
        );
        if let Some(rule) = tables.conflict_with(&principal) {
            return Err(StoreError::Conflict(rule));
        }
        tables.principals.push(principal.clone());
        Ok(principal)
    }

    /// Bind `role` to the principal with `code`. Returns false if no such principal.
    pub fn grant_role(&self, code: &UniCode, role: RoleCode) -> bool {
        let mut tables = self.tables.lock();
        tables.insert_role(role);
        match tables.principals.iter_mut().find(|p| &p.uni_code == code) {
            Some(principal) => {
                if !principal.roles.contains(&role) {
                    principal.roles.push(role);
                }
                true
            }
            None => false,
        }
    }

    pub fn set_role_enabled(&self, role: RoleCode, enabled: bool) {
        let mut tables = self.tables.lock();
        tables.insert_role(role);
        if let Some(record) = tables.roles.get_mut(&role) {
            record.enabled = enabled;
        }
    }

    /// Number of committed principals.
    pub fn len(&self) -> usize {
        self.tables.lock().principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_by_natural_key(&self, key: &NaturalKey) -> usize {
        self.tables
            .lock()
            .principals
            .iter()
            .filter(|p| p.matches(key))
            .count()
    }
}

fn build_principal(
    id: PrincipalId,
    uni_code: UniCode,
    key: &NaturalKey,
    nickname: &str,
    roles: Vec<RoleCode>,
    clock: &dyn Clock,
) -> Principal {
    let (email, mobile, country_code) = match key {
        NaturalKey::Email(email) => (Some(email.clone()), None, None),
        NaturalKey::Mobile {
            mobile,
            country_code,
        } => (None, Some(mobile.clone()), Some(country_code.clone())),
    };
    Principal {
        id,
        uni_code,
        email,
        mobile,
        country_code,
        nickname: nickname.to_string(),
        roles,
        created_at: clock.now(),
    }
}

#[async_trait]
impl RoleStore for MemoryPrincipalStore {
    async fn enabled_roles(&self, code: &UniCode) -> Result<Vec<RoleCode>, StoreError> {
        let tables = self.tables.lock();
        let Some(principal) = tables.principals.iter().find(|p| &p.uni_code == code) else {
            return Ok(Vec::new());
        };
        Ok(principal
            .roles
            .iter()
            .copied()
            .filter(|role| tables.roles.get(role).is_some_and(|r| r.enabled))
            .collect())
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .tables
            .lock()
            .principals
            .iter()
            .find(|p| p.matches(key))
            .cloned())
    }

    async fn find_by_code(&self, code: &UniCode) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .tables
            .lock()
            .principals
            .iter()
            .find(|p| &p.uni_code == code)
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn ProvisioningTx>, StoreError> {
        Ok(Box::new(MemoryProvisioningTx {
            tables: Arc::clone(&self.tables),
            clock: Arc::clone(&self.clock),
            staged: Vec::new(),
        }))
    }

    async fn ensure_roles(&self, codes: &[RoleCode]) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock();
        Ok(codes.iter().filter(|code| tables.insert_role(**code)).count())
    }
}

struct MemoryProvisioningTx {
    tables: Arc<Mutex<Tables>>,
    clock: Arc<dyn Clock>,
    staged: Vec<Principal>,
}

#[async_trait]
impl ProvisioningTx for MemoryProvisioningTx {
    async fn code_exists(&mut self, code: &UniCode) -> Result<bool, StoreError> {
        let committed = self
            .tables
            .lock()
            .principals
            .iter()
            .any(|p| &p.uni_code == code);
        Ok(committed || self.staged.iter().any(|p| &p.uni_code == code))
    }

    async fn find_role(&mut self, code: RoleCode) -> Result<Option<Role>, StoreError> {
        Ok(self.tables.lock().roles.get(&code).cloned())
    }

    async fn create_principal(&mut self, new: &NewPrincipal) -> Result<Principal, StoreError> {
        let mut tables = self.tables.lock();
        let id = tables.next_principal_id();
        let principal = build_principal(
            id,
            new.uni_code.clone(),
            &new.key,
            &new.nickname,
            vec![new.role.code],
            self.clock.as_ref(),
        );

        let staged_clash = self
            .staged
            .iter()
            .find_map(|existing| uniqueness_clash(existing, &principal));
        if let Some(rule) = tables.conflict_with(&principal).or(staged_clash) {
            return Err(StoreError::Conflict(rule));
        }

        self.staged.push(principal.clone());
        Ok(principal)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self { tables, staged, .. } = *self;
        let mut tables = tables.lock();
        // Another transaction may have committed the same key meanwhile.
        if let Some(rule) = staged.iter().find_map(|p| tables.conflict_with(p)) {
            return Err(StoreError::Conflict(rule));
        }
        tables.principals.extend(staged);
        Ok(())
    }
}
