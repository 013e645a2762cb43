use std::sync::Arc;

use castellan_domain::{GrantPriority, LegacyPermissionMatrix, RoleId, UserId};

use super::{PermissionResolver, PermissionSource};
use crate::test_support::{FakeStore, catalog};
use crate::{AssignRoleInput, RoleAssignmentLedger, RoleGraphService};

fn resolver(store: &Arc<FakeStore>, legacy: LegacyPermissionMatrix) -> PermissionResolver {
    PermissionResolver::new(
        RoleGraphService::new(store.clone()),
        RoleAssignmentLedger::new(store.clone(), store.clone(), store.clone()),
        catalog(store, legacy),
    )
}

async fn grant(store: &Arc<FakeStore>, user_id: UserId, role_id: RoleId) {
    let ledger = RoleAssignmentLedger::new(store.clone(), store.clone(), store.clone());
    let assigned = ledger
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
}

#[tokio::test]
async fn child_inherits_parent_permissions_but_not_the_reverse() {
    let store = FakeStore::shared();
    let parent = store.add_role("a", None, &["inventory:read"]).await;
    let child = store.add_role("b", Some(parent), &["inventory:write"]).await;
    let resolver = resolver(&store, LegacyPermissionMatrix::disabled());

    let child_set = resolver.role_permissions(child).await.unwrap_or_default();
    let parent_set = resolver.role_permissions(parent).await.unwrap_or_default();

    let child_codes: Vec<&str> = child_set.iter().map(|p| p.permission.as_str()).collect();
    let parent_codes: Vec<&str> = parent_set.iter().map(|p| p.permission.as_str()).collect();
    assert_eq!(child_codes, vec!["inventory:write", "inventory:read"]);
    assert_eq!(parent_codes, vec!["inventory:read"]);
    assert!(matches!(
        &child_set[1].source,
        PermissionSource::Inherited { role_id, .. } if *role_id == parent
    ));
}

#[tokio::test]
async fn direct_assignment_wins_over_inherited_copy() {
    let store = FakeStore::shared();
    let parent = store.add_role("a", None, &["report:read"]).await;
    let child = store.add_role("b", Some(parent), &["report:read"]).await;
    let resolver = resolver(&store, LegacyPermissionMatrix::disabled());

    let resolved = resolver.role_permissions(child).await.unwrap_or_default();
    assert_eq!(resolved.len(), 1);
    assert!(matches!(resolved[0].source, PermissionSource::Direct { .. }));
}

#[tokio::test]
async fn user_set_spans_all_active_roles_with_wildcards() {
    let store = FakeStore::shared();
    let user_id = store.add_user("mira").await;
    let stock = store.add_role("stock", None, &["inventory:*"]).await;
    let reports = store.add_role("reports", None, &["*:export"]).await;
    grant(&store, user_id, stock).await;
    grant(&store, user_id, reports).await;
    let resolver = resolver(&store, LegacyPermissionMatrix::disabled());

    assert!(resolver.has_permission(user_id, "inventory:delete").await.unwrap_or(false));
    assert!(resolver.has_permission(user_id, "project:export").await.unwrap_or(false));
    assert!(!resolver.has_permission(user_id, "project:read").await.unwrap_or(true));
}

#[tokio::test]
async fn legacy_matrix_follows_display_names_and_can_be_disabled() {
    let store = FakeStore::shared();
    let user_id = store.add_user("mira").await;
    let manager = store.add_role("Manager", None, &[]).await;
    grant(&store, user_id, manager).await;

    let enabled = resolver(
        &store,
        LegacyPermissionMatrix::standard().unwrap_or_default(),
    );
    let permissions = enabled.user_permissions(user_id).await;
    let permissions = permissions.unwrap_or_else(|_| unreachable!());
    assert!(permissions.allows("project:update"));
    assert!(permissions.details.iter().any(|detail| matches!(
        &detail.source,
        PermissionSource::Legacy { role_name } if role_name == "Manager"
    )));

    let disabled = resolver(&store, LegacyPermissionMatrix::disabled());
    assert!(!disabled.has_permission(user_id, "project:update").await.unwrap_or(true));
}

#[tokio::test]
async fn legacy_matrix_is_keyed_by_display_name() {
    let store = FakeStore::shared();
    let regional = store.add_user("mira").await;
    let clerk = store.add_user("otto").await;
    let labelled_manager = store
        .add_labelled_role("regional_mgr", "Manager", None, &[])
        .await;
    let named_manager = store
        .add_labelled_role("manager", "Stock clerk", None, &[])
        .await;
    grant(&store, regional, labelled_manager).await;
    grant(&store, clerk, named_manager).await;

    let resolver = resolver(
        &store,
        LegacyPermissionMatrix::standard().unwrap_or_default(),
    );
    assert!(resolver.has_permission(regional, "inventory:read").await.unwrap_or(false));
    assert!(!resolver.has_permission(clerk, "inventory:read").await.unwrap_or(true));
}

#[tokio::test]
async fn user_without_grants_has_nothing() {
    let store = FakeStore::shared();
    let user_id = store.add_user("mira").await;
    let resolver = resolver(&store, LegacyPermissionMatrix::disabled());

    let permissions = resolver
        .user_permissions(user_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(permissions.permissions.is_empty());
    assert_eq!(permissions.primary_role_name(), None);
}
