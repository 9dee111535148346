use council_application::TallyView;
use council_domain::{
    BuiltinRole, Permission, PermissionSet, Position, RoleDraft, VoteId, VoteKind, VoteTally,
};
use serde_json::json;

use super::{CommandResponse, GovernanceCommand, PermissionSetResponse, RoleResponse};

fn decode(value: serde_json::Value) -> Option<GovernanceCommand> {
    serde_json::from_value::<GovernanceCommand>(value).ok()
}

#[test]
fn cast_position_command_decodes() {
    let command = decode(json!({
        "operation": "cast_position",
        "arguments": { "vote_id": 12, "position": "abstain" }
    }));

    assert_eq!(
        command,
        Some(GovernanceCommand::CastPosition {
            vote_id: VoteId::new(12),
            position: Position::Abstain,
        })
    );
}

#[test]
fn create_vote_command_applies_defaults() {
    let Some(GovernanceCommand::CreateVote {
        kind,
        duration_seconds,
        is_private,
        has_abstain,
        description,
        ..
    }) = decode(json!({
        "operation": "create_vote",
        "arguments": { "name": "Budget", "kind": "qualified", "duration_seconds": 3600 }
    }))
    else {
        panic!("create_vote should decode");
    };

    assert_eq!(kind, VoteKind::Qualified);
    assert_eq!(duration_seconds, 3600);
    assert!(!is_private);
    assert!(!has_abstain);
    assert!(description.is_empty());
}

#[test]
fn modify_role_flattens_the_definition() {
    let role_id = BuiltinRole::Member.role_id();
    let Some(GovernanceCommand::ModifyRole {
        role_id: decoded,
        definition,
    }) = decode(json!({
        "operation": "modify_role",
        "arguments": {
            "role_id": role_id.to_string(),
            "name": "Scribe",
            "permissions": ["suggest", "public_info"],
            "timeout_seconds": 600
        }
    }))
    else {
        panic!("modify_role should decode");
    };

    assert_eq!(decoded, role_id);
    let draft = RoleDraft::from(definition);
    assert_eq!(
        draft.permissions,
        PermissionSet::from(Permission::Suggest) | Permission::PublicInfo
    );
    assert!(!draft.cascade);
}

#[test]
fn unknown_operations_and_permissions_are_rejected() {
    assert!(decode(json!({ "operation": "delete_everything", "arguments": {} })).is_none());
    assert!(
        decode(json!({
            "operation": "create_role",
            "arguments": { "name": "X", "permissions": ["root"], "timeout_seconds": 1 }
        }))
        .is_none()
    );
}

#[test]
fn role_response_lists_permission_names() {
    let response = RoleResponse::from(BuiltinRole::Observer.to_role());

    assert!(response.builtin);
    assert_eq!(response.name, "Observer");
    assert_eq!(response.permissions.bits, 96);
    assert_eq!(
        response.permissions,
        PermissionSetResponse {
            bits: 96,
            permissions: vec!["public_info", "suggest"],
        }
    );
}

#[test]
fn command_response_is_adjacently_tagged() {
    let tally = CommandResponse::Tally(TallyView::Anonymous {
        counts: VoteTally {
            for_count: 2,
            against_count: 1,
            abstain_count: 0,
        },
    });

    let value = serde_json::to_value(&tally).unwrap_or_default();
    assert_eq!(value["result"], "tally");
    assert_eq!(value["value"]["visibility"], "anonymous");
    assert_eq!(value["value"]["counts"]["for"], 2);

    let removed = serde_json::to_value(CommandResponse::Removed { removed: 3 }).unwrap_or_default();
    assert_eq!(removed, json!({ "result": "removed", "value": { "removed": 3 } }));
}
