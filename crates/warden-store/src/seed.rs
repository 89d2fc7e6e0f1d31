//! Role seeding at startup.

use warden_core::RoleCode;

use crate::principal::{PrincipalStore, StoreError};

/// Ensure every [`RoleCode`] exists as a role record.
///
/// Idempotent; existing roles keep their enabled flag.
pub async fn seed_roles(store: &dyn PrincipalStore) -> Result<usize, StoreError> {
    let inserted = store.ensure_roles(&RoleCode::ALL).await?;
    if inserted > 0 {
        tracing::info!(inserted, "seeded roles");
    } else {
        tracing::debug!("roles already seeded");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::memory::MemoryPrincipalStore;
    use crate::principal::RoleStore;
    use warden_core::{NaturalKey, UniCode};

    #[tokio::test]
    async fn seeding_twice_inserts_once() {
        let store = MemoryPrincipalStore::default();
        assert_eq!(seed_roles(&store).await.unwrap(), RoleCode::ALL.len());
        assert_eq!(seed_roles(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reseeding_keeps_disabled_roles_disabled() {
        let store = MemoryPrincipalStore::default();
        seed_roles(&store).await.unwrap();
        store.set_role_enabled(RoleCode::Guest, false);
        seed_roles(&store).await.unwrap();

        let code = UniCode::new("AAAA-AAAA-AAAA-AAAA");
        store
            .insert_principal(code.clone(), &NaturalKey::email("g@example.com"), &[RoleCode::Guest])
            .unwrap();
        assert!(store.enabled_roles(&code).await.unwrap().is_empty());
    }
}
