//! Admin operations and routing through a fully wired portal.

use std::sync::Arc;

use base64::Engine as _;
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;

use portico_auth::admin::{IMPERSONATE_FUNCTION, InviteUser, SYNC_FUNCTION, SetupForm};
use portico_auth::token_store::GuardedStorage;
use portico_auth::{AuthError, Navigation, Portal, PortalOptions, Route, SessionState};
use portico_backend::{AuthEventKind, BackendError, ProviderEvent};
use portico_backend::memory::{MemoryBackend, ops};
use portico_core::enums::UserRole;

const PASSWORD: &str = "pw-123456";

async fn started(backend: &Arc<MemoryBackend>) -> Portal<MemoryBackend> {
    let portal = Portal::new(
        Arc::clone(backend),
        GuardedStorage::memory("portico-auth-token"),
        PortalOptions::default(),
    );
    portal.start().await;
    portal
}

async fn signed_in_as(backend: &Arc<MemoryBackend>, email: &str) -> Portal<MemoryBackend> {
    let portal = started(backend).await;
    portal.sign_in(email, PASSWORD).await.unwrap();
    portal
}

fn setup_form() -> SetupForm {
    SetupForm {
        org_name: "Acme Corp".into(),
        org_shortname: "acme".into(),
        email: "founder@acme.test".into(),
        password: "founder-secret".into(),
        password_confirmation: "founder-secret".into(),
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
    }
}

fn invite(role: UserRole, organization_id: Option<&str>) -> InviteUser {
    InviteUser {
        email: "new@acme.test".into(),
        first_name: "New".into(),
        last_name: "Person".into(),
        role,
        organization_id: organization_id.map(str::to_string),
    }
}

fn unsigned_jwt(subject: &str) -> String {
    let encode = |value: serde_json::Value| {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(value.to_string())
    };
    format!(
        "{}.{}.sig",
        encode(json!({ "alg": "HS256", "typ": "JWT" })),
        encode(json!({ "sub": subject, "exp": Utc::now().timestamp() + 3600 })),
    )
}

#[tokio::test]
async fn setup_route_open_until_a_super_admin_exists() {
    let backend = Arc::new(MemoryBackend::new());
    let portal = started(&backend).await;
    assert_eq!(portal.navigate("/setup").await, Navigation::Proceed(Route::Setup));

    backend.add_user("root@example.com", PASSWORD, UserRole::SuperAdmin, None);
    assert_eq!(portal.navigate("/setup").await, Navigation::Redirect(Route::Login));
}

#[tokio::test]
async fn setup_route_fails_open_when_the_lookup_errors() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("root@example.com", PASSWORD, UserRole::SuperAdmin, None);
    backend.fail(ops::EXISTS_SUPER_ADMIN, BackendError::Transient("connection reset".into()));
    let portal = started(&backend).await;

    assert_eq!(portal.navigate("setup").await, Navigation::Proceed(Route::Setup));
}

#[tokio::test]
async fn guarded_routes_follow_the_current_user() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("ada@acme.test", PASSWORD, UserRole::User, Some("acme"));
    let portal = started(&backend).await;

    assert_eq!(portal.navigate("/dashboard").await, Navigation::Redirect(Route::Login));
    assert_eq!(portal.navigate("/nowhere").await, Navigation::Redirect(Route::Login));
    assert_eq!(portal.navigate("").await, Navigation::Redirect(Route::Login));

    portal.sign_in("ada@acme.test", PASSWORD).await.unwrap();
    assert_eq!(portal.navigate("/dashboard").await, Navigation::Proceed(Route::Dashboard));
    assert_eq!(
        portal.navigate("/organizations").await,
        Navigation::Redirect(Route::Unauthorized)
    );
    assert_eq!(
        portal.navigate("/organization-settings").await,
        Navigation::Proceed(Route::OrganizationSettings)
    );
}

#[tokio::test]
async fn initial_setup_bootstraps_and_signs_in_the_founder() {
    let backend = Arc::new(MemoryBackend::new());
    let portal = started(&backend).await;

    let outcome = portal.admin().initial_setup(&setup_form()).await.unwrap();
    assert!(outcome.signed_in);
    portal.settled().await;

    let user = portal.current_user().unwrap();
    assert_eq!(user.id, outcome.user_id);
    assert_eq!(user.role, UserRole::SuperAdmin);
    assert!(matches!(portal.session().state(), SessionState::Authenticated(_)));
    assert_eq!(portal.navigate("/organizations").await, Navigation::Proceed(Route::Organizations));

    let again = portal.admin().initial_setup(&setup_form()).await.unwrap_err();
    assert!(matches!(again, AuthError::Forbidden(_)));
    assert_eq!(backend.calls(ops::INITIAL_SETUP), 1);
}

#[tokio::test]
async fn initial_setup_rejects_mismatched_passwords_before_any_call() {
    let backend = Arc::new(MemoryBackend::new());
    let portal = started(&backend).await;
    let mut form = setup_form();
    form.password_confirmation = "something-else".into();

    assert!(matches!(
        portal.admin().initial_setup(&form).await,
        Err(AuthError::Validation(_))
    ));
    assert_eq!(backend.calls(ops::SIGN_UP), 0);
}

#[tokio::test]
async fn only_super_admins_create_organizations() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("root@example.com", PASSWORD, UserRole::SuperAdmin, None);
    backend.add_user("admin@acme.test", PASSWORD, UserRole::OrgAdmin, Some("acme"));

    let anonymous = started(&backend).await;
    assert!(matches!(
        anonymous.admin().create_organization("Globex", "globex").await,
        Err(AuthError::NotAuthenticated)
    ));

    let org_admin = signed_in_as(&backend, "admin@acme.test").await;
    assert!(matches!(
        org_admin.admin().create_organization("Globex", "globex").await,
        Err(AuthError::Forbidden(_))
    ));
    assert_eq!(backend.calls(ops::CREATE_ORGANIZATION), 0);

    let root = signed_in_as(&backend, "root@example.com").await;
    assert!(matches!(
        root.admin().create_organization("Globex", "Not A Shortname").await,
        Err(AuthError::Validation(_))
    ));
    let organization = root.admin().create_organization("Globex", "globex").await.unwrap();
    assert_eq!(organization.shortname, "globex");
    let listed = root.admin().list_organizations().await.unwrap();
    assert!(listed.iter().any(|org| org.id == organization.id));
}

#[tokio::test]
async fn org_admin_invites_into_own_organization_only() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("admin@acme.test", PASSWORD, UserRole::OrgAdmin, Some("acme"));
    let portal = signed_in_as(&backend, "admin@acme.test").await;
    let admin_id = portal.current_user().unwrap().id;

    let invited = portal
        .admin()
        .invite_user(&invite(UserRole::User, Some("acme")))
        .await
        .unwrap();
    assert_eq!(invited.profile.organization_id.as_deref(), Some("acme"));
    assert_eq!(invited.temporary_password.len(), 12);
    assert_eq!(
        backend.password_of("new@acme.test").as_deref(),
        Some(invited.temporary_password.as_str())
    );
    // Inviting never replaces the inviter's session.
    assert_eq!(portal.current_user().unwrap().id, admin_id);

    let users = portal.admin().list_users("acme").await.unwrap();
    assert_eq!(users.len(), 2);
    assert!(matches!(
        portal.admin().list_users("globex").await,
        Err(AuthError::Forbidden(_))
    ));

    for attempt in [
        invite(UserRole::User, Some("globex")),
        invite(UserRole::SuperAdmin, None),
    ] {
        assert!(matches!(
            portal.admin().invite_user(&attempt).await,
            Err(AuthError::Forbidden(_))
        ));
    }
}

#[tokio::test]
async fn non_super_roles_need_an_organization() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("root@example.com", PASSWORD, UserRole::SuperAdmin, None);
    let portal = signed_in_as(&backend, "root@example.com").await;

    for organization_id in [None, Some("  ")] {
        assert!(matches!(
            portal
                .admin()
                .invite_user(&invite(UserRole::OrgAdmin, organization_id))
                .await,
            Err(AuthError::Validation(_))
        ));
    }
    assert_eq!(backend.calls(ops::SIGN_UP), 0);

    let invited = portal
        .admin()
        .invite_user(&invite(UserRole::SuperAdmin, None))
        .await
        .unwrap();
    assert_eq!(invited.profile.role, UserRole::SuperAdmin);
    assert_eq!(invited.profile.organization_id, None);
}

#[tokio::test]
async fn custom_roles_are_never_system_roles() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("admin@acme.test", PASSWORD, UserRole::OrgAdmin, Some("acme"));
    backend.add_user("ada@acme.test", PASSWORD, UserRole::User, Some("acme"));

    let admin = signed_in_as(&backend, "admin@acme.test").await;
    let role = admin
        .admin()
        .create_role(
            "Auditor",
            Some("acme"),
            ["reports:read".to_string(), " ".to_string()],
        )
        .await
        .unwrap();
    assert!(!role.is_system_role);
    assert_eq!(role.permissions.len(), 1);
    let roles = admin.admin().list_roles(Some("acme")).await.unwrap();
    assert!(roles.iter().any(|listed| listed.id == role.id));

    let user = signed_in_as(&backend, "ada@acme.test").await;
    assert!(matches!(
        user.admin().create_role("Sneaky", Some("acme"), Vec::new()).await,
        Err(AuthError::Forbidden(_))
    ));
}

#[tokio::test]
async fn super_admin_impersonates_another_user() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("root@example.com", PASSWORD, UserRole::SuperAdmin, None);
    let target = backend.add_user("ada@acme.test", PASSWORD, UserRole::User, Some("acme"));
    let token = unsigned_jwt(&target.id);
    backend.accept_token(&token, &target.id);
    backend.put_function(
        IMPERSONATE_FUNCTION,
        json!({ "access_token": token, "refresh_token": "refresh-impersonated" }),
    );

    let portal = signed_in_as(&backend, "root@example.com").await;
    let session = portal.admin().impersonate(&target.id).await.unwrap();
    portal.settled().await;

    assert_eq!(session.subject_id, target.id);
    assert!(session.expires_at.is_some());
    assert_eq!(portal.current_user().unwrap().id, target.id);
    assert_eq!(
        backend.function_calls(),
        vec![(IMPERSONATE_FUNCTION.to_string(), json!({ "user_id": target.id }))]
    );
}

#[tokio::test]
async fn impersonation_rejects_tokens_for_someone_else() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("root@example.com", PASSWORD, UserRole::SuperAdmin, None);
    let target = backend.add_user("ada@acme.test", PASSWORD, UserRole::User, Some("acme"));
    backend.put_function(
        IMPERSONATE_FUNCTION,
        json!({ "access_token": unsigned_jwt("someone-else"), "refresh_token": "r" }),
    );

    let portal = signed_in_as(&backend, "root@example.com").await;
    let root_id = portal.current_user().unwrap().id;
    assert!(matches!(
        portal.admin().impersonate(&target.id).await,
        Err(AuthError::Validation(_))
    ));
    assert_eq!(portal.current_user().unwrap().id, root_id);
}

#[tokio::test]
async fn sync_requires_super_admin() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("root@example.com", PASSWORD, UserRole::SuperAdmin, None);
    backend.add_user("admin@acme.test", PASSWORD, UserRole::OrgAdmin, Some("acme"));
    backend.put_function(SYNC_FUNCTION, json!({ "synced": 3 }));

    let org_admin = signed_in_as(&backend, "admin@acme.test").await;
    assert!(matches!(
        org_admin.admin().sync_external_database().await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(backend.function_calls().is_empty());

    let root = signed_in_as(&backend, "root@example.com").await;
    assert_eq!(root.admin().sync_external_database().await.unwrap(), json!({ "synced": 3 }));
}

#[tokio::test]
async fn password_reset_round_trip() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("ada@acme.test", PASSWORD, UserRole::User, Some("acme"));
    let portal = started(&backend).await;

    portal.admin().send_password_reset("ada@acme.test").await.unwrap();
    assert_eq!(backend.password_resets(), vec!["ada@acme.test".to_string()]);
    let token = backend.recovery_token("ada@acme.test").unwrap();

    assert!(matches!(
        portal
            .admin()
            .complete_password_reset(&token, "n3w-secret", "n3w-secrte")
            .await,
        Err(AuthError::Validation(_))
    ));
    assert_eq!(backend.calls(ops::VERIFY_RECOVERY), 0);

    portal
        .admin()
        .complete_password_reset(&token, "n3w-secret", "n3w-secret")
        .await
        .unwrap();
    portal.settled().await;
    assert_eq!(backend.password_of("ada@acme.test").as_deref(), Some("n3w-secret"));
    assert_eq!(portal.current_user().unwrap().email, "ada@acme.test");

    assert!(matches!(
        portal
            .admin()
            .complete_password_reset(&token, "other-secret", "other-secret")
            .await,
        Err(AuthError::InvalidCredentials(_))
    ));
}

#[tokio::test]
async fn each_user_updated_event_refetches_the_profile() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("ada@acme.test", PASSWORD, UserRole::User, Some("acme"));
    let portal = signed_in_as(&backend, "ada@acme.test").await;
    portal.settled().await;
    let fetches = backend.calls(ops::FETCH_PROFILE);

    portal.session().handle_event(ProviderEvent::new(AuthEventKind::UserUpdated, None));
    portal.settled().await;
    portal.session().handle_event(ProviderEvent::new(AuthEventKind::UserUpdated, None));
    portal.settled().await;

    assert_eq!(backend.calls(ops::FETCH_PROFILE), fetches + 2);
}

#[tokio::test]
async fn password_change_refetches_the_profile_once() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("ada@acme.test", PASSWORD, UserRole::User, Some("acme"));
    let portal = signed_in_as(&backend, "ada@acme.test").await;
    portal.settled().await;
    let fetches = backend.calls(ops::FETCH_PROFILE);

    portal.session().update_password("n3w-secret").await.unwrap();
    // Let the event pump drain the provider's echo.
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    portal.settled().await;

    assert_eq!(backend.calls(ops::FETCH_PROFILE), fetches + 1);
}
