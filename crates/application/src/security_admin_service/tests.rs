use std::sync::Arc;

use castellan_core::{AppError, ConstraintViolation, NonEmptyString, UserIdentity};
use castellan_domain::{AuditAction, GrantAmendment, GrantPriority, LegacyPermissionMatrix, RoleId, UserId};
use chrono::Utc;

use super::SecurityAdminService;
use crate::test_support::{FakeStore, MemoryTokenCodec, PlainHasher, catalog};
use crate::{
    AssignRoleInput, AuthorizationService, CreateRoleInput, PermissionResolver,
    RoleAssignmentLedger, RoleGraphService, SessionService, TokenRevocationRegistry,
};

const ADMIN_PERMISSIONS: &[&str] = &["role:*", "permission:*", "user:manage", "user:read"];

fn service(store: &Arc<FakeStore>) -> SecurityAdminService {
    let roles = RoleGraphService::new(store.clone());
    let ledger = RoleAssignmentLedger::new(store.clone(), store.clone(), store.clone());
    let catalog = catalog(store, LegacyPermissionMatrix::disabled());
    let resolver = PermissionResolver::new(roles.clone(), ledger.clone(), catalog.clone());
    let sessions = SessionService::new(
        store.clone(),
        Arc::new(PlainHasher),
        Arc::new(MemoryTokenCodec::default()),
        resolver.clone(),
        TokenRevocationRegistry::new(store.clone()),
        store.clone(),
    );

    SecurityAdminService::new(
        AuthorizationService::new(resolver, store.clone()),
        roles,
        catalog,
        ledger,
        sessions,
        store.clone(),
    )
}

fn identity(user_id: UserId, username: &str) -> UserIdentity {
    UserIdentity::new(user_id.as_uuid(), username, "jti-test", Utc::now())
}

async fn admin_identity(store: &Arc<FakeStore>) -> UserIdentity {
    let user_id = store.add_user("root").await;
    let role_id = store.add_role("security-admin", None, ADMIN_PERMISSIONS).await;
    let assigned = RoleAssignmentLedger::new(store.clone(), store.clone(), store.clone())
        .assign(AssignRoleInput {
            user_id,
            role_id,
            valid_from: None,
            valid_to: None,
            priority: GrantPriority::DEFAULT,
            assigned_by: None,
            reason: None,
        })
        .await;
    assert!(assigned.is_ok());
    identity(user_id, "root")
}

fn role_input(name: &str, parent_id: Option<RoleId>) -> CreateRoleInput {
    CreateRoleInput {
        name: NonEmptyString::new(name).unwrap_or_else(|_| unreachable!()),
        display_name: NonEmptyString::new(name).unwrap_or_else(|_| unreachable!()),
        description: None,
        parent_id,
        permission_ids: Vec::new(),
    }
}

#[tokio::test]
async fn caller_without_permission_is_forbidden_and_nothing_is_written() {
    let store = FakeStore::shared();
    let user_id = store.add_user("casey").await;
    let service = service(&store);

    let result = service
        .create_role(&identity(user_id, "casey"), role_input("auditors", None))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(store.roles.lock().await.is_empty());
    assert!(store.events.lock().await.is_empty());
}

#[tokio::test]
async fn role_mutations_are_audited_with_the_caller() {
    let store = FakeStore::shared();
    let admin = admin_identity(&store).await;
    let service = service(&store);

    let role = service
        .create_role(&admin, role_input("auditors", None))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(service.delete_role(&admin, role.id()).await.is_ok());

    let events = store.events.lock().await;
    let actions: Vec<AuditAction> = events.iter().map(|event| event.action).collect();
    assert_eq!(actions, vec![AuditAction::RoleCreated, AuditAction::RoleDeleted]);
    assert!(events.iter().all(|event| event.subject == "root"));
    assert_eq!(events[0].resource_id, role.id().to_string());
}

#[tokio::test]
async fn rejected_delete_leaves_no_audit_trail() {
    let store = FakeStore::shared();
    let admin = admin_identity(&store).await;
    let service = service(&store);
    let parent = store.add_role("ops", None, &[]).await;
    let _child = store.add_role("ops-oncall", Some(parent), &[]).await;

    let result = service.delete_role(&admin, parent).await;

    assert_eq!(
        result.err().and_then(|error| error.constraint().cloned()),
        Some(ConstraintViolation::HasChildren)
    );
    assert!(store.events.lock().await.is_empty());
}

#[tokio::test]
async fn assigned_grant_records_the_administrator() {
    let store = FakeStore::shared();
    let admin = admin_identity(&store).await;
    let service = service(&store);
    let user_id = store.add_user("casey").await;
    let role_id = store.add_role("auditor", None, &[]).await;

    let grant = service
        .assign_role(
            &admin,
            AssignRoleInput {
                user_id,
                role_id,
                valid_from: None,
                valid_to: None,
                priority: GrantPriority::DEFAULT,
                assigned_by: None,
                reason: Some("quarterly audit".to_owned()),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        grant.assigned_by().map(|id| id.as_uuid()),
        Some(admin.user_id())
    );
    let revoked = service
        .revoke_role(&admin, user_id, role_id, None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(
        revoked.revoked_by().map(|id| id.as_uuid()),
        Some(admin.user_id())
    );

    let events = store.events.lock().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].action, AuditAction::RoleGrantRevoked);
}

#[tokio::test]
async fn amending_a_grant_keeps_the_original_assigner() {
    let store = FakeStore::shared();
    let admin = admin_identity(&store).await;
    let service = service(&store);
    let onboarding_lead = store.add_user("morgan").await;
    let user_id = store.add_user("casey").await;
    let role_id = store.add_role("auditor", None, &[]).await;
    let assigned = RoleAssignmentLedger::new(store.clone(), store.clone(), store.clone())
        .assign(AssignRoleInput {
            user_id,
            role_id,
            valid_from: None,
            valid_to: None,
            priority: GrantPriority::DEFAULT,
            assigned_by: Some(onboarding_lead),
            reason: None,
        })
        .await;
    assert!(assigned.is_ok());

    let amended = service
        .update_role_grant(
            &admin,
            user_id,
            role_id,
            GrantAmendment {
                priority: GrantPriority::new(2).ok(),
                ..GrantAmendment::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(amended.assigned_by(), Some(onboarding_lead));
    assert_eq!(
        amended.updated_by().map(|id| id.as_uuid()),
        Some(admin.user_id())
    );
}

#[tokio::test]
async fn users_read_their_own_grants_but_not_others() {
    let store = FakeStore::shared();
    let _admin = admin_identity(&store).await;
    let service = service(&store);
    let casey = store.add_user("casey").await;
    let robin = store.add_user("robin").await;
    let caller = identity(casey, "casey");

    assert!(service.list_user_roles(&caller, casey, true).await.is_ok());
    assert!(matches!(
        service.list_user_roles(&caller, robin, true).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        service
            .check_authorization(&caller, robin, "report:read", None)
            .await,
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(
        service
            .check_authorization(&caller, casey, "report:read", None)
            .await
            .ok(),
        Some(false)
    );
}

#[tokio::test]
async fn terminating_sessions_is_audited() {
    let store = FakeStore::shared();
    let admin = admin_identity(&store).await;
    let service = service(&store);
    let casey = store.add_user("casey").await;

    assert!(service.terminate_sessions(&admin, casey).await.is_ok());
    assert!(matches!(
        service.terminate_sessions(&admin, UserId::new()).await,
        Err(AppError::NotFound(_))
    ));

    assert_eq!(store.markers.lock().await.len(), 1);
    let events = store.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::SessionsTerminated);
}
