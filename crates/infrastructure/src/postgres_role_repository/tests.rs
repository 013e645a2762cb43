use castellan_application::{
    RevokedTokenRepository, RoleChanges, RoleRepository, UserAccount, UserDirectory,
    UserRoleRepository,
};
use castellan_core::{AppError, ConstraintViolation, NonEmptyString};
use castellan_domain::{
    GrantAmendment, GrantPriority, NewGrant, RevocationMarker, RevocationReason, Role, RoleId, UserId,
    UserRoleGrant, is_token_valid,
};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresRoleRepository;
use crate::{
    MIGRATOR, PostgresRevokedTokenRepository, PostgresUserRepository, PostgresUserRoleRepository,
};

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres role tests: {error}");
    }

    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn role(name: &str, parent_id: Option<RoleId>) -> Role {
    Role::new(
        RoleId::new(),
        NonEmptyString::new(name).unwrap_or_else(|_| unreachable!()),
        NonEmptyString::new(name).unwrap_or_else(|_| unreachable!()),
        None,
        parent_id,
        Utc::now(),
    )
    .unwrap_or_else(|_| unreachable!())
}

async fn user(pool: &PgPool) -> UserId {
    let id = UserId::new();
    let created = PostgresUserRepository::new(pool.clone())
        .create_user(UserAccount {
            id,
            username: unique("user"),
            email: "user@example.com".to_owned(),
            password_hash: "unused".to_owned(),
            is_active: true,
            primary_role_id: None,
            department_id: None,
        })
        .await;
    assert!(created.is_ok());
    id
}

#[tokio::test]
async fn reparent_under_descendant_is_rejected_in_transaction() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool);

    let parent = role(&unique("parent"), None);
    let parent_id = parent.id();
    assert!(repository.create_role(parent, &[]).await.is_ok());
    let child = role(&unique("child"), Some(parent_id));
    let child_id = child.id();
    assert!(repository.create_role(child, &[]).await.is_ok());

    let result = repository
        .update_role(
            parent_id,
            RoleChanges {
                parent_id: Some(Some(child_id)),
                ..RoleChanges::default()
            },
            Utc::now(),
        )
        .await;
    assert_eq!(
        result.err().and_then(|error| error.constraint().cloned()),
        Some(ConstraintViolation::CircularReference)
    );

    let blocked = repository.delete_role(parent_id).await;
    assert_eq!(
        blocked.err().and_then(|error| error.constraint().cloned()),
        Some(ConstraintViolation::HasChildren)
    );
    assert!(repository.delete_role(child_id).await.is_ok());
    assert!(repository.delete_role(parent_id).await.is_ok());
}

#[tokio::test]
async fn partial_index_rejects_second_active_grant() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let roles = PostgresRoleRepository::new(pool.clone());
    let grants = PostgresUserRoleRepository::new(pool.clone());

    let granted_role = role(&unique("grantee"), None);
    let role_id = granted_role.id();
    assert!(roles.create_role(granted_role, &[]).await.is_ok());
    let user_id = user(&pool).await;

    let new_grant = || {
        UserRoleGrant::new(
            NewGrant {
                user_id,
                role_id,
                valid_from: Utc::now() - Duration::minutes(1),
                valid_to: None,
                priority: GrantPriority::DEFAULT,
                assigned_by: None,
                reason: None,
            },
            Utc::now(),
        )
        .unwrap_or_else(|_| unreachable!())
    };

    let first = grants.insert_grant(new_grant()).await;
    assert!(first.is_ok());
    let second = grants.insert_grant(new_grant()).await;
    assert_eq!(
        second.err().and_then(|error| error.constraint().cloned()),
        Some(ConstraintViolation::DuplicateActiveGrant)
    );

    let Some(mut active) = grants
        .find_active_grant(user_id, role_id)
        .await
        .unwrap_or_default()
    else {
        unreachable!();
    };
    assert!(active.revoke(None, None, Utc::now()).is_ok());
    assert!(grants.save_transition(&active).await.is_ok());
    let stale_write = grants.save_transition(&active).await;
    assert_eq!(
        stale_write.err().and_then(|error| error.constraint().cloned()),
        Some(ConstraintViolation::NoActiveGrant)
    );

    assert!(grants.insert_grant(new_grant()).await.is_ok());
    let history = grants
        .list_user_grants(user_id, false)
        .await
        .unwrap_or_default();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn role_delete_leaves_grant_rows_in_place() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let roles = PostgresRoleRepository::new(pool.clone());
    let grants = PostgresUserRoleRepository::new(pool.clone());

    let retired = role(&unique("retired"), None);
    let role_id = retired.id();
    assert!(roles.create_role(retired, &[]).await.is_ok());
    let user_id = user(&pool).await;

    let grant = UserRoleGrant::new(
        NewGrant {
            user_id,
            role_id,
            valid_from: Utc::now() - Duration::minutes(1),
            valid_to: None,
            priority: GrantPriority::DEFAULT,
            assigned_by: None,
            reason: None,
        },
        Utc::now(),
    )
    .unwrap_or_else(|_| unreachable!());
    let Ok(mut grant) = grants.insert_grant(grant).await else {
        unreachable!();
    };
    assert!(grant.revoke(None, Some("retired".to_owned()), Utc::now()).is_ok());
    assert!(grants.save_transition(&grant).await.is_ok());

    assert!(roles.delete_role(role_id).await.is_ok());

    let history = grants
        .list_user_grants(user_id, false)
        .await
        .unwrap_or_default();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role_id(), role_id);

    let late = UserRoleGrant::new(
        NewGrant {
            user_id,
            role_id,
            valid_from: Utc::now(),
            valid_to: None,
            priority: GrantPriority::DEFAULT,
            assigned_by: None,
            reason: None,
        },
        Utc::now(),
    )
    .unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        grants.insert_grant(late).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn amended_grant_stores_updater_beside_assigner() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let roles = PostgresRoleRepository::new(pool.clone());
    let grants = PostgresUserRoleRepository::new(pool.clone());

    let granted_role = role(&unique("amended"), None);
    let role_id = granted_role.id();
    assert!(roles.create_role(granted_role, &[]).await.is_ok());
    let user_id = user(&pool).await;
    let assigner = user(&pool).await;
    let updater = user(&pool).await;

    let grant = UserRoleGrant::new(
        NewGrant {
            user_id,
            role_id,
            valid_from: Utc::now() - Duration::minutes(1),
            valid_to: None,
            priority: GrantPriority::DEFAULT,
            assigned_by: Some(assigner),
            reason: None,
        },
        Utc::now(),
    )
    .unwrap_or_else(|_| unreachable!());
    let Ok(mut grant) = grants.insert_grant(grant).await else {
        unreachable!();
    };
    let amendment = GrantAmendment {
        priority: GrantPriority::new(4).ok(),
        updated_by: Some(updater),
        ..GrantAmendment::default()
    };
    assert!(grant.amend(amendment, Utc::now()).is_ok());
    assert!(grants.save_transition(&grant).await.is_ok());

    let Some(stored) = grants
        .find_active_grant(user_id, role_id)
        .await
        .unwrap_or_default()
    else {
        unreachable!();
    };
    assert_eq!(stored.assigned_by(), Some(assigner));
    assert_eq!(stored.updated_by(), Some(updater));
    assert_eq!(stored.priority().value(), 4);
}

#[tokio::test]
async fn bulk_marker_is_found_for_any_token_of_the_user() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let markers = PostgresRevokedTokenRepository::new(pool);
    let user_id = UserId::new();
    let issued_at = Utc::now() - Duration::minutes(10);

    let inserted = markers
        .insert_marker(RevocationMarker::all_sessions(
            user_id,
            RevocationReason::Administrative,
            Utc::now(),
        ))
        .await;
    assert!(inserted.is_ok());

    let token_id = unique("jti");
    let found = markers
        .markers_for_token(&token_id, user_id)
        .await
        .unwrap_or_default();
    assert_eq!(found.len(), 1);
    assert!(!is_token_valid(&found, &token_id, user_id, issued_at));
}
