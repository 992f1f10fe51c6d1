//! Minimal client for the Grafana HTTP API endpoints the harness exercises.

use crate::config::GrafanaSettings;
use crate::error::{HarnessError, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

pub const ADMIN_SETTINGS: &str = "/api/admin/settings";
pub const ADMIN_STATS: &str = "/api/admin/stats";
pub const DATASOURCES: &str = "/api/datasources";
pub const USER_PASSWORD: &str = "/api/user/password";

/// Grafana's main organization. Replies to `POST /api/datasources` from
/// releases before 5.1 do not echo the datasource, so its org is assumed.
pub const MAIN_ORG_ID: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Body of `POST /api/datasources`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDatasource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub access: String,
    pub basic_auth: bool,
}

impl NewDatasource {
    pub fn graphite(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "graphite".to_string(),
            url: url.into(),
            access: "proxy".to_string(),
            basic_auth: false,
        }
    }
}

/// Body of `PUT /api/datasources/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceUpdate {
    pub id: u64,
    pub org_id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub access: String,
    pub url: String,
    pub password: String,
    pub user: String,
    pub database: String,
    pub basic_auth: bool,
    pub basic_auth_user: String,
    pub basic_auth_password: String,
    pub is_default: bool,
    pub json_data: Option<Value>,
}

impl DatasourceUpdate {
    /// Turns basic auth on for the datasource `target` created from `created`.
    pub fn enable_basic_auth(target: DatasourceRef, created: &NewDatasource, user: &str, password: &str) -> Self {
        Self {
            id: target.id,
            org_id: target.org_id,
            name: created.name.clone(),
            kind: created.kind.clone(),
            access: created.access.clone(),
            url: created.url.clone(),
            password: String::new(),
            user: String::new(),
            database: String::new(),
            basic_auth: true,
            basic_auth_user: user.to_string(),
            basic_auth_password: password.to_string(),
            is_default: false,
            json_data: None,
        }
    }
}

/// Reply to `POST /api/datasources`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasourceCreated {
    pub id: Option<u64>,
    pub message: Option<String>,
    pub datasource: Option<StoredDatasource>,
}

/// The stored datasource as echoed back by Grafana 5.1 and later.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDatasource {
    pub org_id: u64,
}

/// Identity of a datasource that exists on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasourceRef {
    pub id: u64,
    pub org_id: u64,
}

impl DatasourceCreated {
    pub fn into_ref(self) -> Result<DatasourceRef> {
        let id = self
            .id
            .ok_or_else(|| HarnessError::Assertion("datasource created without an id".to_string()))?;
        let org_id = self.datasource.map_or(MAIN_ORG_ID, |ds| ds.org_id);
        Ok(DatasourceRef { id, org_id })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    old_password: &'a str,
    new_password: &'a str,
    confirm_new: &'a str,
}

/// Grafana API client, optionally authenticating with Basic auth.
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    http: Client,
    base: Url,
    credentials: Option<Credentials>,
}

impl GrafanaClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let base = Url::parse(&format!("http://{host}:{port}"))?;
        Ok(Self {
            http: Client::new(),
            base,
            credentials: None,
        })
    }

    /// Client authenticated with the provisioned default credentials.
    pub fn from_settings(settings: &GrafanaSettings) -> Result<Self> {
        Ok(Self::new(&settings.host, settings.port)?
            .with_credentials(&settings.default_user, &settings.default_password))
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            user: user.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Same endpoint, no credentials.
    pub fn anonymous(&self) -> Self {
        Self {
            credentials: None,
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base.join(path)?;
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        Ok(match &self.credentials {
            Some(c) => builder.basic_auth(&c.user, Some(&c.password)),
            None => builder,
        })
    }

    pub async fn get_status(&self, path: &str) -> Result<StatusCode> {
        let response = self.request(Method::GET, path)?.send().await?;
        Ok(response.status())
    }

    pub async fn create_datasource(&self, datasource: &NewDatasource) -> Result<DatasourceRef> {
        let response = self
            .request(Method::POST, DATASOURCES)?
            .json(datasource)
            .send()
            .await?;
        expect_ok("POST", DATASOURCES, response.status())?;

        let created: DatasourceCreated = response.json().await?;
        debug!("created datasource: {:?}", created);
        created.into_ref()
    }

    pub async fn update_datasource(&self, update: &DatasourceUpdate) -> Result<()> {
        let path = format!("{}/{}", DATASOURCES, update.id);
        let response = self.request(Method::PUT, &path)?.json(update).send().await?;
        expect_ok("PUT", &path, response.status())?;
        debug!("{}", response.text().await?);
        Ok(())
    }

    pub async fn delete_datasource(&self, id: u64) -> Result<()> {
        let path = format!("{}/{}", DATASOURCES, id);
        let response = self.request(Method::DELETE, &path)?.send().await?;
        expect_ok("DELETE", &path, response.status())?;
        debug!("{}", response.text().await?);
        Ok(())
    }

    /// `PUT /api/user/password`; returns the status and the response body.
    pub async fn change_password(&self, old: &str, new: &str) -> Result<(StatusCode, String)> {
        let body = PasswordChange {
            old_password: old,
            new_password: new,
            confirm_new: new,
        };
        let response = self
            .request(Method::PUT, USER_PASSWORD)?
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }
}

/// Fails with [`HarnessError::UnexpectedStatus`] unless `actual == expected`.
pub fn expect_status(method: &str, path: &str, expected: StatusCode, actual: StatusCode) -> Result<()> {
    if actual == expected {
        return Ok(());
    }
    Err(HarnessError::UnexpectedStatus {
        method: method.to_string(),
        path: path.to_string(),
        expected: expected.as_u16(),
        actual: actual.as_u16(),
    })
}

fn expect_ok(method: &str, path: &str, actual: StatusCode) -> Result<()> {
    expect_status(method, path, StatusCode::OK, actual)
}
