//! Serde roundtrip and JsonSchema validation tests for the backend row types.
//!
//! Row payloads come from the backend's REST API, so the schemas generated
//! here must accept what the tables actually return.

use std::collections::BTreeSet;

use chrono::Utc;
use pretty_assertions::assert_eq;
use schemars::schema_for;
use portico_core::entities::*;
use portico_core::enums::UserRole;
use portico_core::identity::AuthSession;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(recovered, val, "serde roundtrip failed for {}", stringify!($ty));

            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

roundtrip_and_validate!(
    org_admin_profile_roundtrip,
    UserProfile,
    UserProfile {
        id: "0b5c7f0e-2f6a-4a38-9d0e-1f1f0c1e2d3a".into(),
        email: "ops@acme.test".into(),
        first_name: Some("Grace".into()),
        last_name: Some("Hopper".into()),
        role: UserRole::OrgAdmin,
        organization_id: Some("org-acme".into()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    system_role_roundtrip,
    Role,
    Role {
        id: "role-1".into(),
        name: "auditor".into(),
        organization_id: None,
        is_system_role: true,
        permissions: BTreeSet::from(["audit.read".to_string()]),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    global_setting_roundtrip,
    SettingEntry,
    SettingEntry::new("app_name", None, "Default Portal")
);

#[test]
fn postgrest_profile_row_matches_schema() {
    // Shape returned by `GET /rest/v1/users?id=eq.…` (timestamptz with micros).
    let row = serde_json::json!({
        "id": "u-1",
        "email": "root@acme.test",
        "first_name": null,
        "last_name": null,
        "role": "super_admin",
        "organization_id": null,
        "created_at": "2024-05-01T10:00:00.123456+00:00",
        "updated_at": "2024-05-01T10:00:00.123456+00:00"
    });
    let schema = serde_json::to_value(schema_for!(UserProfile)).unwrap();
    assert!(validate_against_schema(&schema, &row).is_empty());

    let profile: UserProfile = serde_json::from_value(row).unwrap();
    assert_eq!(profile.role, UserRole::SuperAdmin);
}

#[test]
fn unknown_role_column_is_rejected() {
    let row = serde_json::json!({
        "id": "u-1",
        "email": "x@acme.test",
        "role": "owner",
        "created_at": "2024-05-01T10:00:00+00:00",
        "updated_at": "2024-05-01T10:00:00+00:00"
    });
    assert!(serde_json::from_value::<UserProfile>(row).is_err());
}

#[test]
fn persisted_session_tolerates_missing_optionals() {
    let json = r#"{"subject_id":"s","access_token":"a","refresh_token":"r"}"#;
    let session: AuthSession = serde_json::from_str(json).unwrap();
    assert!(session.email.is_none());
    assert!(session.expires_at.is_none());
}
