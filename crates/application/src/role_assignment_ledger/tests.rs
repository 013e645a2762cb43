use std::sync::Arc;

use castellan_core::{AppError, AppResult, ConstraintViolation};
use castellan_domain::{
    AUTO_EXPIRED_REASON, GrantAmendment, GrantPriority, GrantStatus, RoleId, UserId,
};
use chrono::{Duration, Utc};

use super::{AssignRoleInput, RoleAssignmentLedger};
use crate::test_support::FakeStore;

fn ledger(store: &Arc<FakeStore>) -> RoleAssignmentLedger {
    RoleAssignmentLedger::new(store.clone(), store.clone(), store.clone())
}

fn assignment(user_id: UserId, role_id: RoleId, priority: i32) -> AssignRoleInput {
    AssignRoleInput {
        user_id,
        role_id,
        valid_from: None,
        valid_to: None,
        priority: GrantPriority::new(priority).unwrap_or_default(),
        assigned_by: None,
        reason: None,
    }
}

fn violation<T>(result: AppResult<T>) -> Option<ConstraintViolation> {
    result.err().and_then(|error| error.constraint().cloned())
}

#[tokio::test]
async fn second_active_grant_is_rejected() {
    let store = FakeStore::shared();
    let user_id = store.add_user("dana").await;
    let role_id = store.add_role("auditor", None, &[]).await;
    let ledger = ledger(&store);

    assert!(ledger.assign(assignment(user_id, role_id, 1)).await.is_ok());
    let second = ledger.assign(assignment(user_id, role_id, 2)).await;
    assert_eq!(violation(second), Some(ConstraintViolation::DuplicateActiveGrant));
}

#[tokio::test]
async fn unknown_user_or_role_is_not_found() {
    let store = FakeStore::shared();
    let user_id = store.add_user("dana").await;
    let role_id = store.add_role("auditor", None, &[]).await;
    let ledger = ledger(&store);

    let missing_user = ledger.assign(assignment(UserId::new(), role_id, 1)).await;
    assert!(matches!(missing_user, Err(AppError::NotFound(_))));
    let missing_role = ledger.assign(assignment(user_id, RoleId::new(), 1)).await;
    assert!(matches!(missing_role, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn revoke_then_reassign_keeps_history() {
    let store = FakeStore::shared();
    let user_id = store.add_user("dana").await;
    let role_id = store.add_role("auditor", None, &[]).await;
    let ledger = ledger(&store);

    let assigned = ledger.assign(assignment(user_id, role_id, 1)).await;
    assert!(assigned.is_ok());
    let revoked = ledger
        .revoke(user_id, role_id, None, Some("rotation".to_owned()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(revoked.status(), GrantStatus::Revoked);
    assert!(revoked.valid_to().is_some());

    let again = ledger.revoke(user_id, role_id, None, None).await;
    assert_eq!(violation(again), Some(ConstraintViolation::NoActiveGrant));

    assert!(ledger.assign(assignment(user_id, role_id, 1)).await.is_ok());
    let history = ledger.list_user_roles(user_id, false).await.unwrap_or_default();
    let active = ledger.list_user_roles(user_id, true).await.unwrap_or_default();
    assert_eq!(history.len(), 2);
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn future_and_lapsed_grants_are_not_active() {
    let store = FakeStore::shared();
    let user_id = store.add_user("dana").await;
    let future_role = store.add_role("future", None, &[]).await;
    let current_role = store.add_role("current", None, &[]).await;
    let ledger = ledger(&store);
    let now = Utc::now();

    let assigned = ledger
        .assign(AssignRoleInput {
            valid_from: Some(now + Duration::days(1)),
            ..assignment(user_id, future_role, 1)
        })
        .await;
    assert!(assigned.is_ok());
    let assigned = ledger.assign(assignment(user_id, current_role, 3)).await;
    assert!(assigned.is_ok());

    let active = ledger.active_roles(user_id).await.unwrap_or_default();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].role_id(), current_role);
}

#[tokio::test]
async fn highest_priority_uses_lowest_value() {
    let store = FakeStore::shared();
    let user_id = store.add_user("dana").await;
    let manager = store.add_role("manager", None, &[]).await;
    let employee = store.add_role("employee", None, &[]).await;
    let ledger = ledger(&store);

    let assigned = ledger.assign(assignment(user_id, manager, 1)).await;
    assert!(assigned.is_ok());
    let assigned = ledger.assign(assignment(user_id, employee, 2)).await;
    assert!(assigned.is_ok());

    let top = ledger.highest_priority_role(user_id).await.unwrap_or_default();
    assert_eq!(top.map(|grant| grant.role_id()), Some(manager));

    let revoked = ledger.revoke(user_id, manager, None, None).await;
    assert!(revoked.is_ok());
    let top = ledger.highest_priority_role(user_id).await.unwrap_or_default();
    assert_eq!(top.map(|grant| grant.role_id()), Some(employee));
}

#[tokio::test]
async fn update_changes_priority_of_active_grant() {
    let store = FakeStore::shared();
    let user_id = store.add_user("dana").await;
    let role_id = store.add_role("auditor", None, &[]).await;
    let ledger = ledger(&store);
    let assigned = ledger.assign(assignment(user_id, role_id, 4)).await;
    assert!(assigned.is_ok());

    let updated = ledger
        .update(
            user_id,
            role_id,
            GrantAmendment {
                priority: GrantPriority::new(2).ok(),
                ..GrantAmendment::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(updated.priority().value(), 2);
    assert_eq!(updated.status(), GrantStatus::Active);
}

#[tokio::test]
async fn sweep_closes_lapsed_grants_once() {
    let store = FakeStore::shared();
    let user_id = store.add_user("dana").await;
    let role_id = store.add_role("contractor", None, &[]).await;
    let ledger = ledger(&store);
    let now = Utc::now();

    let assigned = ledger
        .assign(AssignRoleInput {
            valid_from: Some(now - Duration::days(2)),
            valid_to: Some(now - Duration::days(1)),
            ..assignment(user_id, role_id, 1)
        })
        .await;
    assert!(assigned.is_ok());

    assert_eq!(ledger.sweep_expired().await.unwrap_or(0), 1);
    assert_eq!(ledger.sweep_expired().await.unwrap_or(99), 0);

    let history = ledger.list_user_roles(user_id, false).await.unwrap_or_default();
    assert_eq!(history[0].status(), GrantStatus::Expired);
    assert_eq!(history[0].revoked_reason(), Some(AUTO_EXPIRED_REASON));
}
