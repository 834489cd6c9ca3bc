//! Row API (`/rest/v1`), RPC and function calls.

use reqwest::Method;
use urlencoding::encode;

use portico_core::entities::{
    NewOrganization, NewRole, NewUserProfile, Organization, Role, SettingEntry, UserProfile,
};

use super::{RestClient, Surface};
use crate::error::BackendError;
use crate::provider::{Directory, InitialSetup, ProfileSource, SettingsStore, SetupCheck};

const RETURN_REPRESENTATION: &str = "return=representation";

/// `organization_id` filter: `eq.<id>` or `is.null` for the global row.
fn organization_filter(organization_id: Option<&str>) -> String {
    match organization_id {
        Some(id) => format!("organization_id=eq.{}", encode(id)),
        None => "organization_id=is.null".to_string(),
    }
}

/// First row of a `return=representation` insert.
fn first_row<T>(op: &str, rows: Vec<T>) -> Result<T, BackendError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| BackendError::Decode(format!("{op}: insert returned no rows")))
}

/// RPC results are loosely typed; `check_super_admin_exists` may answer a
/// bare boolean, a count, or `null`.
fn truthy(op: &str, value: &serde_json::Value) -> Result<bool, BackendError> {
    match value {
        serde_json::Value::Bool(flag) => Ok(*flag),
        serde_json::Value::Null => Ok(false),
        serde_json::Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        other => Err(BackendError::Decode(format!("{op}: expected boolean, got {other}"))),
    }
}

impl RestClient {
    async fn insert<T, R>(&self, op: &str, table: &str, row: &T) -> Result<R, BackendError>
    where
        T: serde::Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let request = self
            .request(Method::POST, &format!("/rest/v1/{table}"))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[row]);
        let rows = self.send_json::<Vec<R>>(op, Surface::Rows, request).await?;
        first_row(op, rows)
    }

    async fn rpc(
        &self,
        op: &str,
        function: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let request = self
            .request(Method::POST, &format!("/rest/v1/rpc/{function}"))
            .json(&params);
        self.send_value(op, Surface::Rows, request).await
    }
}

impl ProfileSource for RestClient {
    async fn fetch_profile(&self, subject_id: &str) -> Result<UserProfile, BackendError> {
        let path = format!("/rest/v1/users?select=*&id=eq.{}&limit=1", encode(subject_id));
        let rows = self
            .send_json::<Vec<UserProfile>>("fetch profile", Surface::Rows, self.request(Method::GET, &path))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found("user", subject_id))
    }
}

impl SetupCheck for RestClient {
    async fn exists_super_admin(&self) -> Result<bool, BackendError> {
        let value = self
            .rpc(
                "check super admin",
                "check_super_admin_exists",
                serde_json::json!({}),
            )
            .await?;
        truthy("check super admin", &value)
    }
}

impl SettingsStore for RestClient {
    async fn get_setting(
        &self,
        key: &str,
        organization_id: Option<&str>,
    ) -> Result<SettingEntry, BackendError> {
        let path = format!(
            "/rest/v1/app_settings?select=key,organization_id,value&key=eq.{}&{}&limit=1",
            encode(key),
            organization_filter(organization_id)
        );
        let rows = self
            .send_json::<Vec<SettingEntry>>("get setting", Surface::Rows, self.request(Method::GET, &path))
            .await?;
        rows.into_iter().next().ok_or_else(|| {
            BackendError::not_found(
                "setting",
                format!("{key}@{}", organization_id.unwrap_or("global")),
            )
        })
    }

    async fn upsert_setting(&self, entry: &SettingEntry) -> Result<(), BackendError> {
        if let Some(organization_id) = entry.organization_id.as_deref() {
            let request = self
                .request(
                    Method::POST,
                    "/rest/v1/app_settings?on_conflict=key,organization_id",
                )
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&[entry]);
            self.send("upsert setting", Surface::Rows, request).await?;
            tracing::info!(key = %entry.key, organization_id, "organization setting saved");
            return Ok(());
        }

        // A unique index does not collide on NULL, so the global row is
        // updated in place and only inserted when the update matched nothing.
        let path = format!(
            "/rest/v1/app_settings?key=eq.{}&organization_id=is.null",
            encode(&entry.key)
        );
        let request = self
            .request(Method::PATCH, &path)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&serde_json::json!({ "value": entry.value }));
        let updated = self
            .send_json::<Vec<SettingEntry>>("upsert setting", Surface::Rows, request)
            .await?;
        if updated.is_empty() {
            let _: SettingEntry = self.insert("upsert setting", "app_settings", entry).await?;
        }
        tracing::info!(key = %entry.key, "global setting saved");
        Ok(())
    }
}

impl Directory for RestClient {
    async fn list_organizations(&self) -> Result<Vec<Organization>, BackendError> {
        let request = self.request(Method::GET, "/rest/v1/organizations?select=*&order=name.asc");
        self.send_json("list organizations", Surface::Rows, request)
            .await
    }

    async fn create_organization(
        &self,
        input: &NewOrganization,
    ) -> Result<Organization, BackendError> {
        let organization: Organization = self
            .insert("create organization", "organizations", input)
            .await?;
        tracing::info!(id = %organization.id, shortname = %organization.shortname, "organization created");
        Ok(organization)
    }

    async fn list_users(&self, organization_id: &str) -> Result<Vec<UserProfile>, BackendError> {
        let path = format!(
            "/rest/v1/users?select=*&organization_id=eq.{}&order=email.asc",
            encode(organization_id)
        );
        self.send_json("list users", Surface::Rows, self.request(Method::GET, &path))
            .await
    }

    async fn insert_profile(&self, input: &NewUserProfile) -> Result<UserProfile, BackendError> {
        self.insert("insert profile", "users", input).await
    }

    async fn list_roles(&self, organization_id: Option<&str>) -> Result<Vec<Role>, BackendError> {
        let filter = match organization_id {
            Some(id) => format!(
                "or=(organization_id.is.null,organization_id.eq.{})",
                encode(id)
            ),
            None => "organization_id=is.null".to_string(),
        };
        let path = format!("/rest/v1/roles?select=*&{filter}&order=name.asc");
        self.send_json("list roles", Surface::Rows, self.request(Method::GET, &path))
            .await
    }

    async fn create_role(&self, input: &NewRole) -> Result<Role, BackendError> {
        self.insert("create role", "roles", input).await
    }

    async fn create_initial_setup(
        &self,
        input: &InitialSetup,
    ) -> Result<serde_json::Value, BackendError> {
        let params = serde_json::to_value(input)
            .map_err(|e| BackendError::Decode(format!("initial setup params: {e}")))?;
        self.rpc("initial setup", "create_initial_setup", params)
            .await
    }

    async fn invoke_function(
        &self,
        name: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let request = self
            .request(Method::POST, &format!("/functions/v1/{}", encode(name)))
            .json(&body);
        self.send_value(name, Surface::Rows, request).await
    }
}
