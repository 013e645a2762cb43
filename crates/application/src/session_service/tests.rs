use std::sync::Arc;

use castellan_core::AppError;
use castellan_domain::{AuditAction, GrantPriority, LegacyPermissionMatrix};

use super::SessionService;
use crate::test_support::{FakeStore, MemoryTokenCodec, PlainHasher, catalog};
use crate::{
    AssignRoleInput, PermissionResolver, RoleAssignmentLedger, RoleGraphService,
    TokenRevocationRegistry,
};

fn sessions(store: &Arc<FakeStore>) -> SessionService {
    let resolver = PermissionResolver::new(
        RoleGraphService::new(store.clone()),
        RoleAssignmentLedger::new(store.clone(), store.clone(), store.clone()),
        catalog(store, LegacyPermissionMatrix::disabled()),
    );
    SessionService::new(
        store.clone(),
        Arc::new(PlainHasher),
        Arc::new(MemoryTokenCodec::default()),
        resolver,
        TokenRevocationRegistry::new(store.clone()),
        store.clone(),
    )
}

#[tokio::test]
async fn login_embeds_permissions_and_role() {
    let store = FakeStore::shared();
    let user_id = store.add_user("noor").await;
    let role_id = store.add_role("analyst", None, &["report:read"]).await;
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

    let session = sessions(&store)
        .login("Noor", "noor-password")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(session.claims.user_id, user_id);
    assert_eq!(session.claims.role.as_deref(), Some("analyst"));
    assert_eq!(session.claims.permissions, vec!["report:read".to_owned()]);
}

#[tokio::test]
async fn bad_credentials_share_one_message() {
    let store = FakeStore::shared();
    let _ = store.add_user("noor").await;
    let service = sessions(&store);

    let wrong_password = service.login("noor", "nope").await;
    let unknown_user = service.login("ghost", "nope").await;
    for result in [wrong_password, unknown_user] {
        assert!(matches!(result, Err(AppError::Unauthorized(message)) if message == "invalid credentials"));
    }
}

#[tokio::test]
async fn disabled_account_cannot_login_or_authenticate() {
    let store = FakeStore::shared();
    let user_id = store.add_user("noor").await;
    let service = sessions(&store);
    let session = service
        .login("noor", "noor-password")
        .await
        .unwrap_or_else(|_| unreachable!());

    if let Some(user) = store
        .users
        .lock()
        .await
        .iter_mut()
        .find(|user| user.id == user_id)
    {
        user.is_active = false;
    }

    assert!(matches!(
        service.login("noor", "noor-password").await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        service.authenticate(&session.token).await,
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn logout_revokes_only_the_current_token() {
    let store = FakeStore::shared();
    let _ = store.add_user("noor").await;
    let service = sessions(&store);

    let first = service
        .login("noor", "noor-password")
        .await
        .unwrap_or_else(|_| unreachable!());
    let second = service
        .login("noor", "noor-password")
        .await
        .unwrap_or_else(|_| unreachable!());

    let authenticated = service
        .authenticate(&first.token)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(service.logout(&authenticated.identity).await.is_ok());

    assert!(service.authenticate(&first.token).await.is_err());
    assert!(service.authenticate(&second.token).await.is_ok());
}

#[tokio::test]
async fn password_change_revokes_every_session() {
    let store = FakeStore::shared();
    let _ = store.add_user("noor").await;
    let service = sessions(&store);
    let session = service
        .login("noor", "noor-password")
        .await
        .unwrap_or_else(|_| unreachable!());
    let authenticated = service
        .authenticate(&session.token)
        .await
        .unwrap_or_else(|_| unreachable!());

    let wrong_current = service
        .change_password(&authenticated.identity, "guess", "a much better passphrase")
        .await;
    assert!(matches!(wrong_current, Err(AppError::Unauthorized(_))));

    let result = service
        .change_password(
            &authenticated.identity,
            "noor-password",
            "a much better passphrase",
        )
        .await;
    assert!(result.is_ok());
    assert!(service.authenticate(&session.token).await.is_err());

    let events = store.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::PasswordChanged);
}

#[tokio::test]
async fn weak_new_password_is_rejected() {
    let store = FakeStore::shared();
    let _ = store.add_user("noor").await;
    let service = sessions(&store);
    let session = service
        .login("noor", "noor-password")
        .await
        .unwrap_or_else(|_| unreachable!());
    let authenticated = service
        .authenticate(&session.token)
        .await
        .unwrap_or_else(|_| unreachable!());

    let result = service
        .change_password(&authenticated.identity, "noor-password", "short")
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn authenticate_recomputes_permissions() {
    let store = FakeStore::shared();
    let user_id = store.add_user("noor").await;
    let service = sessions(&store);
    let session = service
        .login("noor", "noor-password")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(session.claims.permissions.is_empty());

    let role_id = store.add_role("stock", None, &["inventory:read"]).await;
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

    let authenticated = service
        .authenticate(&session.token)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(authenticated.permissions.contains("inventory:read"));
}
