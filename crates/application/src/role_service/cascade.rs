use std::collections::{HashMap, HashSet};

use council_core::AppResult;
use council_domain::{RoleBinding, RoleChangeReason, RoleId, RoleUpdateType};
use tracing::error;

use crate::{RoleTransaction, RoleUpdate};

/// Removes `root` and, depth-first, every binding issued through a revoked
/// cascading grant.
///
/// Runs inside the caller's transaction so no reader observes a parent
/// removed while a child it issued remains. Returns one update per removed
/// binding, root first.
pub(super) async fn revoke_with_cascade(
    transaction: &mut dyn RoleTransaction,
    root: &RoleBinding,
    reason: RoleChangeReason,
    removed_by: Option<&str>,
    max_depth: usize,
) -> AppResult<Vec<RoleUpdate>> {
    if !transaction
        .delete_binding(&root.user_id, root.role_id)
        .await?
    {
        return Ok(Vec::new());
    }

    let mut updates = vec![RoleUpdate {
        role_id: root.role_id,
        user_id: root.user_id.clone(),
        update_type: RoleUpdateType::Removed,
        reason,
        is_cascading: false,
        removed_by: removed_by.map(str::to_owned),
    }];

    let mut cascading_roles: HashMap<RoleId, bool> = HashMap::new();
    let mut visited: HashSet<(String, RoleId)> = HashSet::from([(root.user_id.clone(), root.role_id)]);
    let mut stack: Vec<(RoleBinding, usize)> = vec![(root.clone(), 0)];

    while let Some((parent, depth)) = stack.pop() {
        let cascades = match cascading_roles.get(&parent.role_id) {
            Some(cascades) => *cascades,
            None => {
                let cascades = transaction
                    .find_role(parent.role_id)
                    .await?
                    .is_some_and(|role| role.cascade());
                cascading_roles.insert(parent.role_id, cascades);
                cascades
            }
        };

        if !cascades {
            continue;
        }

        if depth >= max_depth {
            error!(
                user_id = %parent.user_id,
                role_id = %parent.role_id,
                max_depth,
                "cascade revocation reached maximum depth, descent stopped"
            );
            continue;
        }

        let children = transaction
            .list_issued_bindings(&parent.user_id, parent.role_id)
            .await?;

        for child in children {
            if !visited.insert((child.user_id.clone(), child.role_id)) {
                continue;
            }

            if transaction
                .delete_binding(&child.user_id, child.role_id)
                .await?
            {
                updates.push(RoleUpdate {
                    role_id: child.role_id,
                    user_id: child.user_id.clone(),
                    update_type: RoleUpdateType::Removed,
                    reason: RoleChangeReason::Cascading,
                    is_cascading: true,
                    removed_by: None,
                });
                stack.push((child, depth + 1));
            }
        }
    }

    Ok(updates)
}
