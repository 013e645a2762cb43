//! Shared in-process fakes for service tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use castellan_core::{AppError, AppResult, ConstraintViolation, NonEmptyString};
use castellan_domain::{
    LegacyPermissionMatrix, PermissionCode, PermissionDefinition, PermissionId, RevocationMarker,
    Role, RoleHierarchy, RoleId, UserId, UserRoleGrant, UserScope,
};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    AuditEvent, AuditRepository, IssuedSession, PasswordHasher, PermissionCatalogService,
    PermissionRepository, RevokedTokenRepository, RoleChanges, RoleDeletionBlockers,
    RoleRepository, SessionClaims, SessionTokenCodec, UserAccount, UserDirectory,
    UserRoleRepository, UserScopeRepository,
};

#[derive(Default)]
pub(crate) struct FakeStore {
    pub(crate) roles: Mutex<Vec<Role>>,
    pub(crate) role_permissions: Mutex<Vec<(RoleId, PermissionId)>>,
    pub(crate) permissions: Mutex<Vec<PermissionDefinition>>,
    pub(crate) grants: Mutex<Vec<UserRoleGrant>>,
    pub(crate) users: Mutex<Vec<UserAccount>>,
    pub(crate) scopes: Mutex<Vec<UserScope>>,
    pub(crate) markers: Mutex<Vec<RevocationMarker>>,
    pub(crate) events: Mutex<Vec<AuditEvent>>,
    pub(crate) fail_marker_reads: AtomicBool,
}

impl FakeStore {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) async fn add_user(&self, username: &str) -> UserId {
        let id = UserId::new();
        self.users.lock().await.push(UserAccount {
            id,
            username: username.to_owned(),
            email: format!("{username}@example.com"),
            password_hash: format!("hashed:{username}-password"),
            is_active: true,
            primary_role_id: None,
            department_id: None,
        });
        id
    }

    pub(crate) async fn add_role(
        &self,
        name: &str,
        parent_id: Option<RoleId>,
        permissions: &[&str],
    ) -> RoleId {
        self.add_labelled_role(name, name, parent_id, permissions).await
    }

    pub(crate) async fn add_labelled_role(
        &self,
        name: &str,
        display_name: &str,
        parent_id: Option<RoleId>,
        permissions: &[&str],
    ) -> RoleId {
        let role = Role::new(
            RoleId::new(),
            NonEmptyString::new(name).unwrap_or_else(|_| unreachable!()),
            NonEmptyString::new(display_name).unwrap_or_else(|_| unreachable!()),
            None,
            parent_id,
            Utc::now(),
        )
        .unwrap_or_else(|_| unreachable!());
        let role_id = role.id();
        self.roles.lock().await.push(role);

        for permission in permissions {
            let permission_id = self.add_permission(permission).await;
            self.role_permissions
                .lock()
                .await
                .push((role_id, permission_id));
        }

        role_id
    }

    pub(crate) async fn add_permission(&self, code: &str) -> PermissionId {
        let code = PermissionCode::parse(code).unwrap_or_else(|_| unreachable!());
        let mut permissions = self.permissions.lock().await;
        if let Some(existing) = permissions.iter().find(|permission| permission.code() == code) {
            return existing.id();
        }

        let definition = PermissionDefinition::new(
            PermissionId::new(),
            code,
            NonEmptyString::new(code.to_string()).unwrap_or_else(|_| unreachable!()),
            None,
        );
        let id = definition.id();
        permissions.push(definition);
        id
    }
}

#[async_trait]
impl RoleRepository for FakeStore {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        Ok(self.roles.lock().await.clone())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| role.id() == role_id)
            .cloned())
    }

    async fn create_role(&self, role: Role, permission_ids: &[PermissionId]) -> AppResult<Role> {
        let mut roles = self.roles.lock().await;
        if roles.iter().any(|existing| existing.name() == role.name()) {
            return Err(AppError::Conflict(format!("role '{}' exists", role.name())));
        }
        RoleHierarchy::from_roles(roles.iter()).check_new_role(role.parent_id())?;
        roles.push(role.clone());
        self.role_permissions
            .lock()
            .await
            .extend(permission_ids.iter().map(|permission_id| (role.id(), *permission_id)));
        Ok(role)
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Role> {
        let mut roles = self.roles.lock().await;
        let hierarchy = RoleHierarchy::from_roles(roles.iter());
        let role = roles
            .iter_mut()
            .find(|role| role.id() == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?;
        changes.apply_to(role, &hierarchy, now)?;
        let updated = role.clone();

        if let Some(permission_ids) = changes.permission_ids {
            let mut links = self.role_permissions.lock().await;
            links.retain(|(linked_role, _)| *linked_role != role_id);
            links.extend(permission_ids.into_iter().map(|permission_id| (role_id, permission_id)));
        }

        Ok(updated)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut roles = self.roles.lock().await;
        let blockers = RoleDeletionBlockers {
            children: roles
                .iter()
                .filter(|role| role.parent_id() == Some(role_id))
                .count() as u64,
            primary_users: self
                .users
                .lock()
                .await
                .iter()
                .filter(|user| user.primary_role_id == Some(role_id))
                .count() as u64,
            active_grants: self
                .grants
                .lock()
                .await
                .iter()
                .filter(|grant| grant.role_id() == role_id && grant.is_active())
                .count() as u64,
        };
        blockers.check()?;
        roles.retain(|role| role.id() != role_id);
        Ok(())
    }

    async fn list_role_permissions(
        &self,
        role_id: RoleId,
    ) -> AppResult<Vec<PermissionDefinition>> {
        let links = self.role_permissions.lock().await;
        let permissions = self.permissions.lock().await;
        Ok(permissions
            .iter()
            .filter(|permission| links.contains(&(role_id, permission.id())))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PermissionRepository for FakeStore {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        Ok(self.permissions.lock().await.clone())
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .find(|permission| permission.id() == permission_id)
            .cloned())
    }

    async fn create_permission(
        &self,
        permission: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        let mut permissions = self.permissions.lock().await;
        if permissions
            .iter()
            .any(|existing| existing.code() == permission.code())
        {
            return Err(AppError::Conflict("duplicate permission code".to_owned()));
        }
        permissions.push(permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        permission: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        let mut permissions = self.permissions.lock().await;
        permissions.retain(|existing| existing.id() != permission.id());
        permissions.push(permission.clone());
        Ok(permission)
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let roles = self
            .role_permissions
            .lock()
            .await
            .iter()
            .filter(|(_, linked)| *linked == permission_id)
            .count() as u64;
        if roles > 0 {
            return Err(ConstraintViolation::PermissionInUse { roles }.into());
        }
        self.permissions
            .lock()
            .await
            .retain(|permission| permission.id() != permission_id);
        Ok(())
    }

    async fn ensure_permissions(&self, seeds: Vec<PermissionDefinition>) -> AppResult<u64> {
        let mut permissions = self.permissions.lock().await;
        let mut inserted = 0;
        for seed in seeds {
            if permissions
                .iter()
                .all(|existing| existing.code() != seed.code())
            {
                permissions.push(seed);
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl UserRoleRepository for FakeStore {
    async fn insert_grant(&self, grant: UserRoleGrant) -> AppResult<UserRoleGrant> {
        let mut grants = self.grants.lock().await;
        if grants.iter().any(|existing| {
            existing.is_active()
                && existing.user_id() == grant.user_id()
                && existing.role_id() == grant.role_id()
        }) {
            return Err(ConstraintViolation::DuplicateActiveGrant.into());
        }
        grants.push(grant.clone());
        Ok(grant)
    }

    async fn find_active_grant(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Option<UserRoleGrant>> {
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .find(|grant| {
                grant.is_active() && grant.user_id() == user_id && grant.role_id() == role_id
            })
            .cloned())
    }

    async fn save_transition(&self, grant: &UserRoleGrant) -> AppResult<UserRoleGrant> {
        let mut grants = self.grants.lock().await;
        let stored = grants
            .iter_mut()
            .find(|stored| stored.id() == grant.id() && stored.is_active())
            .ok_or(AppError::Constraint(ConstraintViolation::NoActiveGrant))?;
        *stored = grant.clone();
        Ok(grant.clone())
    }

    async fn list_user_grants(
        &self,
        user_id: UserId,
        active_only: bool,
    ) -> AppResult<Vec<UserRoleGrant>> {
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|grant| grant.user_id() == user_id && (!active_only || grant.is_active()))
            .cloned()
            .collect())
    }

    async fn expire_lapsed_grants(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut expired = 0;
        for grant in self.grants.lock().await.iter_mut() {
            if grant.has_lapsed_at(now) && grant.expire(now).is_ok() {
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl UserDirectory for FakeStore {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.id == user_id)
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserAccount>> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn create_user(&self, account: UserAccount) -> AppResult<()> {
        self.users.lock().await.push(account);
        Ok(())
    }

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
        let mut users = self.users.lock().await;
        let user = users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or_else(|| AppError::NotFound("user".to_owned()))?;
        user.password_hash = password_hash.to_owned();
        Ok(())
    }
}

#[async_trait]
impl UserScopeRepository for FakeStore {
    async fn list_user_scopes(&self, user_id: UserId) -> AppResult<Vec<UserScope>> {
        Ok(self
            .scopes
            .lock()
            .await
            .iter()
            .filter(|scope| scope.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn replace_user_scopes(
        &self,
        user_id: UserId,
        scopes: Vec<UserScope>,
    ) -> AppResult<()> {
        let mut stored = self.scopes.lock().await;
        stored.retain(|scope| scope.user_id() != user_id);
        stored.extend(scopes);
        Ok(())
    }
}

#[async_trait]
impl RevokedTokenRepository for FakeStore {
    async fn insert_marker(&self, marker: RevocationMarker) -> AppResult<()> {
        self.markers.lock().await.push(marker);
        Ok(())
    }

    async fn markers_for_token(
        &self,
        token_id: &str,
        user_id: UserId,
    ) -> AppResult<Vec<RevocationMarker>> {
        if self.fail_marker_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("marker store unavailable".to_owned()));
        }

        Ok(self
            .markers
            .lock()
            .await
            .iter()
            .filter(|marker| {
                marker.stored_token_id() == token_id
                    || (marker.user_id() == user_id
                        && marker.stored_token_id() == castellan_domain::ALL_SESSIONS_MARKER)
            })
            .cloned()
            .collect())
    }

    async fn prune_markers(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let mut markers = self.markers.lock().await;
        let before = markers.len();
        markers.retain(|marker| marker.revoked_at() >= older_than);
        Ok((before - markers.len()) as u64)
    }
}

#[async_trait]
impl AuditRepository for FakeStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Reversible "hash" so tests can assert on stored values.
pub(crate) struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("hashed:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("hashed:{password}"))
    }
}

/// Token codec that keeps issued claims in memory, keyed by an opaque token.
#[derive(Default)]
pub(crate) struct MemoryTokenCodec {
    pub(crate) issued: std::sync::Mutex<Vec<(String, SessionClaims)>>,
}

impl SessionTokenCodec for MemoryTokenCodec {
    fn issue(
        &self,
        user_id: UserId,
        username: &str,
        role: Option<String>,
        permissions: Vec<String>,
    ) -> AppResult<IssuedSession> {
        let now = Utc::now();
        let claims = SessionClaims {
            user_id,
            username: username.to_owned(),
            token_id: Uuid::new_v4().to_string(),
            issued_at: now,
            expires_at: now + Duration::hours(1),
            role,
            permissions,
        };
        let token = format!("token-{}", claims.token_id);
        self.issued
            .lock()
            .map_err(|_| AppError::Internal("codec lock poisoned".to_owned()))?
            .push((token.clone(), claims.clone()));

        Ok(IssuedSession { token, claims })
    }

    fn decode(&self, token: &str) -> AppResult<SessionClaims> {
        self.issued
            .lock()
            .map_err(|_| AppError::Internal("codec lock poisoned".to_owned()))?
            .iter()
            .find(|(issued, _)| issued == token)
            .map(|(_, claims)| claims.clone())
            .ok_or_else(|| AppError::Unauthorized("unknown token".to_owned()))
    }
}

pub(crate) fn catalog(store: &Arc<FakeStore>, legacy: LegacyPermissionMatrix) -> PermissionCatalogService {
    PermissionCatalogService::new(store.clone(), Arc::new(legacy))
}
