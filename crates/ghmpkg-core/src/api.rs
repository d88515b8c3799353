//! Enumeration of packages, versions and files through the GitHub packages API.

use std::sync::Arc;

use ghmpkg_dl::transport::Transport;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::Url;

use crate::{error::MigrateError, MigrateResult, PackageType};

const PER_PAGE: usize = 100;

/// A package owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    /// Repository the package is linked to; empty for organization-scoped packages.
    pub repository: String,
}

/// A published version of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub id: u64,
    pub name: String,
    /// Container tags pointing at this version; empty for other types.
    pub tags: Vec<String>,
}

/// Files published under one version, as reported by the GraphQL API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFiles {
    pub version: String,
    pub files: Vec<String>,
}

/// Read access to an organization's package catalog.
///
/// `list_versions` returns versions in the order the API lists them, which for
/// GitHub is newest first.
pub trait CatalogApi: Send + Sync {
    fn list_packages(&self, org: &str, package_type: PackageType) -> MigrateResult<Vec<PackageInfo>>;

    fn list_versions(
        &self,
        org: &str,
        package_type: PackageType,
        package_name: &str,
    ) -> MigrateResult<Vec<VersionInfo>>;

    /// Whether `org` already has a package with this name and type. A 404 means no.
    fn package_exists(
        &self,
        org: &str,
        package_type: PackageType,
        package_name: &str,
    ) -> MigrateResult<bool>;

    /// Every version of the package with the files it contains.
    fn package_files(
        &self,
        org: &str,
        package_type: PackageType,
        package_name: &str,
    ) -> MigrateResult<Vec<VersionFiles>>;
}

#[derive(Deserialize)]
struct RawRepository {
    name: String,
}

#[derive(Deserialize)]
struct RawPackage {
    name: String,
    repository: Option<RawRepository>,
}

#[derive(Deserialize, Default)]
struct RawContainer {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize, Default)]
struct RawMetadata {
    #[serde(default)]
    container: Option<RawContainer>,
}

#[derive(Deserialize)]
struct RawVersion {
    id: u64,
    name: String,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

const FILES_QUERY: &str = r#"query($owner: String!, $name: String!, $packageType: PackageType!, $after: String) {
  organization(login: $owner) {
    packages(first: 1, names: [$name], packageType: $packageType) {
      nodes {
        versions(first: 100, after: $after) {
          nodes {
            id
            version
            files(first: 100) {
              nodes { name }
              pageInfo { hasNextPage endCursor }
            }
          }
          pageInfo { hasNextPage endCursor }
        }
      }
    }
  }
}"#;

const VERSION_FILES_QUERY: &str = r#"query($id: ID!, $after: String) {
  node(id: $id) {
    ... on PackageVersion {
      files(first: 100, after: $after) {
        nodes { name }
        pageInfo { hasNextPage endCursor }
      }
    }
  }
}"#;

fn file_names(files: &Value) -> impl Iterator<Item = String> + '_ {
    files["nodes"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|f| f["name"].as_str().map(String::from))
}

/// Cursor of the next page of a GraphQL connection, if there is one.
fn next_cursor(connection: &Value) -> Option<Value> {
    if connection.pointer("/pageInfo/hasNextPage").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    Some(
        connection
            .pointer("/pageInfo/endCursor")
            .cloned()
            .unwrap_or(Value::Null),
    )
}

/// [`CatalogApi`] backed by the GitHub REST and GraphQL endpoints.
pub struct GitHubCatalogApi {
    transport: Arc<dyn Transport>,
    rest_base: String,
    graphql_url: String,
    token: String,
}

impl GitHubCatalogApi {
    pub fn new(transport: Arc<dyn Transport>, hostname: &str, token: impl Into<String>) -> Self {
        let hostname = hostname.trim_end_matches('/');
        let (rest_base, graphql_url) = if hostname == "github.com" {
            (
                "https://api.github.com/".to_string(),
                "https://api.github.com/graphql".to_string(),
            )
        } else {
            (
                format!("https://{hostname}/api/v3/"),
                format!("https://{hostname}/api/graphql"),
            )
        };
        Self {
            transport,
            rest_base,
            graphql_url,
            token: token.into(),
        }
    }

    pub fn rest_base(&self) -> &str {
        &self.rest_base
    }

    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    fn rest_url(&self, segments: &[&str], query: &[(&str, String)]) -> MigrateResult<String> {
        let mut url = Url::parse(&self.rest_base)
            .map_err(|e| MigrateError::Custom(format!("invalid API base {}: {e}", self.rest_base)))?;
        url.path_segments_mut()
            .map_err(|_| MigrateError::Custom(format!("invalid API base {}", self.rest_base)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url.to_string())
    }

    /// Fetches every page of a list endpoint, stopping at the first short page.
    fn paginate<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> MigrateResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let mut params = query.to_vec();
            params.push(("per_page", PER_PAGE.to_string()));
            params.push(("page", page.to_string()));
            let url = self.rest_url(segments, &params)?;

            trace!(url, "fetching page");
            let body = self.transport.get_json(&url, &self.token)?;
            let batch: Vec<T> = serde_json::from_value(body)
                .map_err(|e| MigrateError::InvalidApiResponse(format!("{url}: {e}")))?;

            let count = batch.len();
            items.extend(batch);
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    fn graphql(&self, query: &str, variables: Value) -> MigrateResult<Value> {
        let body = json!({ "query": query, "variables": variables });
        let response = self.transport.post_json(&self.graphql_url, &self.token, &body)?;
        if let Some(errors) = response.get("errors") {
            return Err(MigrateError::InvalidApiResponse(errors.to_string()));
        }
        Ok(response)
    }

    /// Follows a version's file connection past the page embedded in the versions query.
    fn remaining_files(
        &self,
        version_id: &str,
        mut after: Value,
        files: &mut Vec<String>,
    ) -> MigrateResult<()> {
        loop {
            let response = self.graphql(
                VERSION_FILES_QUERY,
                json!({ "id": version_id, "after": after }),
            )?;
            let Some(page) = response.pointer("/data/node/files") else {
                return Ok(());
            };
            files.extend(file_names(page));
            match next_cursor(page) {
                Some(cursor) => after = cursor,
                None => return Ok(()),
            }
        }
    }
}

impl CatalogApi for GitHubCatalogApi {
    fn list_packages(&self, org: &str, package_type: PackageType) -> MigrateResult<Vec<PackageInfo>> {
        let raw: Vec<RawPackage> = self.paginate(
            &["orgs", org, "packages"],
            &[
                ("package_type", package_type.to_string()),
                ("state", "active".to_string()),
            ],
        )?;
        debug!(org, %package_type, count = raw.len(), "listed packages");
        Ok(raw
            .into_iter()
            .map(|p| {
                PackageInfo {
                    name: p.name,
                    repository: p.repository.map(|r| r.name).unwrap_or_default(),
                }
            })
            .collect())
    }

    fn list_versions(
        &self,
        org: &str,
        package_type: PackageType,
        package_name: &str,
    ) -> MigrateResult<Vec<VersionInfo>> {
        let raw: Vec<RawVersion> = self.paginate(
            &[
                "orgs",
                org,
                "packages",
                package_type.as_str(),
                package_name,
                "versions",
            ],
            &[("state", "active".to_string())],
        )?;
        Ok(raw
            .into_iter()
            .map(|v| {
                VersionInfo {
                    id: v.id,
                    name: v.name,
                    tags: v
                        .metadata
                        .and_then(|m| m.container)
                        .map(|c| c.tags)
                        .unwrap_or_default(),
                }
            })
            .collect())
    }

    fn package_exists(
        &self,
        org: &str,
        package_type: PackageType,
        package_name: &str,
    ) -> MigrateResult<bool> {
        let url = self.rest_url(
            &["orgs", org, "packages", package_type.as_str(), package_name],
            &[],
        )?;
        match self.transport.status(&url, &self.token)? {
            404 => Ok(false),
            status if (200..300).contains(&status) => Ok(true),
            status => {
                Err(ghmpkg_dl::error::TransportError::HttpError {
                    status,
                    url,
                }
                .into())
            }
        }
    }

    fn package_files(
        &self,
        org: &str,
        package_type: PackageType,
        package_name: &str,
    ) -> MigrateResult<Vec<VersionFiles>> {
        let mut versions = Vec::new();
        let mut after = Value::Null;
        loop {
            let response = self.graphql(
                FILES_QUERY,
                json!({
                    "owner": org,
                    "name": package_name,
                    "packageType": package_type.as_str().to_ascii_uppercase(),
                    "after": after,
                }),
            )?;

            let Some(page) = response.pointer("/data/organization/packages/nodes/0/versions") else {
                break;
            };
            for node in page["nodes"].as_array().into_iter().flatten() {
                let version = node["version"].as_str().unwrap_or_default().to_string();
                let mut files: Vec<String> = file_names(&node["files"]).collect();
                if let Some(cursor) = next_cursor(&node["files"]) {
                    let id = node["id"].as_str().ok_or_else(|| {
                        MigrateError::InvalidApiResponse(format!(
                            "version {version} of {package_name} has more files but no id"
                        ))
                    })?;
                    trace!(package = package_name, version = %version, "fetching more files");
                    self.remaining_files(id, cursor, &mut files)?;
                }
                versions.push(VersionFiles {
                    version,
                    files,
                });
            }

            match next_cursor(page) {
                Some(cursor) => after = cursor,
                None => break,
            }
        }
        debug!(org, package = package_name, versions = versions.len(), "listed package files");
        Ok(versions)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::VecDeque, path::Path, sync::Mutex};

    use ghmpkg_dl::{
        error::{Result as TransportResult, TransportError},
        transport::UploadStatus,
    };

    use super::*;

    /// Transport that replays canned JSON responses and records requested URLs.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<Value>>,
        statuses: Mutex<VecDeque<u16>>,
        pub(crate) urls: Mutex<Vec<String>>,
        pub(crate) bodies: Mutex<Vec<Value>>,
    }

    impl ScriptedTransport {
        pub(crate) fn with_responses(responses: Vec<Value>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        pub(crate) fn with_statuses(statuses: Vec<u16>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Default::default()
            }
        }

        fn next(&self, url: &str) -> TransportResult<Value> {
            self.urls.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::InvalidResponse { url: url.into() })
        }
    }

    impl Transport for ScriptedTransport {
        fn download(&self, url: &str, _: &str, _: &Path) -> TransportResult<u64> {
            Err(TransportError::InvalidResponse { url: url.into() })
        }

        fn upload(&self, url: &str, _: &str, _: &Path) -> TransportResult<UploadStatus> {
            Err(TransportError::InvalidResponse { url: url.into() })
        }

        fn get_json(&self, url: &str, _: &str) -> TransportResult<Value> {
            self.next(url)
        }

        fn post_json(&self, url: &str, _: &str, body: &Value) -> TransportResult<Value> {
            self.bodies.lock().unwrap().push(body.clone());
            self.next(url)
        }

        fn status(&self, url: &str, _: &str) -> TransportResult<u16> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.statuses.lock().unwrap().pop_front().unwrap_or(500))
        }
    }

    fn api(transport: Arc<ScriptedTransport>) -> GitHubCatalogApi {
        GitHubCatalogApi::new(transport, "github.com", "token")
    }

    #[test]
    fn test_api_bases() {
        let transport = Arc::new(ScriptedTransport::default());
        let cloud = GitHubCatalogApi::new(transport.clone(), "github.com", "t");
        assert_eq!(cloud.rest_base(), "https://api.github.com/");
        assert_eq!(cloud.graphql_url(), "https://api.github.com/graphql");

        let ghes = GitHubCatalogApi::new(transport, "ghe.example.com", "t");
        assert_eq!(ghes.rest_base(), "https://ghe.example.com/api/v3/");
        assert_eq!(ghes.graphql_url(), "https://ghe.example.com/api/graphql");
    }

    #[test]
    fn test_list_packages_pages_until_short_page() {
        let full: Vec<Value> = (0..PER_PAGE)
            .map(|i| json!({ "name": format!("pkg-{i}"), "repository": { "name": "repo" } }))
            .collect();
        let transport = Arc::new(ScriptedTransport::with_responses(vec![
            Value::Array(full),
            json!([{ "name": "last", "repository": null }]),
        ]));

        let packages = api(transport.clone())
            .list_packages("acme", PackageType::Npm)
            .unwrap();

        assert_eq!(packages.len(), PER_PAGE + 1);
        assert_eq!(packages[0].repository, "repo");
        assert_eq!(packages[PER_PAGE].name, "last");
        assert_eq!(packages[PER_PAGE].repository, "");

        let urls = transport.urls.lock().unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with("https://api.github.com/orgs/acme/packages?"));
        assert!(urls[0].contains("package_type=npm"));
        assert!(urls[0].contains("page=1"));
        assert!(urls[1].contains("page=2"));
    }

    #[test]
    fn test_list_versions_reads_container_tags() {
        let transport = Arc::new(ScriptedTransport::with_responses(vec![json!([
            { "id": 2, "name": "sha256:bbb", "metadata": { "container": { "tags": ["latest", "2.0"] } } },
            { "id": 1, "name": "sha256:aaa", "metadata": { "container": { "tags": [] } } }
        ])]));

        let versions = api(transport.clone())
            .list_versions("acme", PackageType::Container, "team/app")
            .unwrap();

        assert_eq!(versions[0].tags, vec!["latest", "2.0"]);
        assert_eq!(versions[1].name, "sha256:aaa");
        let urls = transport.urls.lock().unwrap();
        assert!(urls[0].contains("/orgs/acme/packages/container/team%2Fapp/versions"));
    }

    #[test]
    fn test_package_exists() {
        let transport = Arc::new(ScriptedTransport::with_statuses(vec![200, 404, 403]));
        let api = api(transport);
        assert!(api.package_exists("acme-new", PackageType::Npm, "left-pad").unwrap());
        assert!(!api.package_exists("acme-new", PackageType::Npm, "left-pad").unwrap());
        assert!(api.package_exists("acme-new", PackageType::Npm, "left-pad").is_err());
    }

    #[test]
    fn test_package_files_follows_cursor() {
        let page = |versions: Value, next: bool, cursor: &str| {
            json!({ "data": { "organization": { "packages": { "nodes": [ { "versions": {
                "nodes": versions,
                "pageInfo": { "hasNextPage": next, "endCursor": cursor }
            } } ] } } } })
        };
        let transport = Arc::new(ScriptedTransport::with_responses(vec![
            page(
                json!([{ "version": "2.0", "files": { "nodes": [{ "name": "core-2.0.jar" }, { "name": "core-2.0.pom" }] } }]),
                true,
                "c1",
            ),
            page(
                json!([{ "version": "1.0", "files": { "nodes": [{ "name": "core-1.0.jar" }] } }]),
                false,
                "c2",
            ),
        ]));

        let files = api(transport.clone())
            .package_files("acme", PackageType::Maven, "com.acme.core")
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].files, vec!["core-2.0.jar", "core-2.0.pom"]);
        assert_eq!(files[1].version, "1.0");

        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies[0]["variables"]["packageType"], "MAVEN");
        assert_eq!(bodies[0]["variables"]["after"], Value::Null);
        assert_eq!(bodies[1]["variables"]["after"], "c1");
    }

    #[test]
    fn test_package_files_pages_through_large_versions() {
        let first: Vec<Value> = (0..100)
            .map(|i| json!({ "name": format!("core-3.0-{i}.jar") }))
            .collect();
        let transport = Arc::new(ScriptedTransport::with_responses(vec![
            json!({ "data": { "organization": { "packages": { "nodes": [ { "versions": {
                "nodes": [
                    { "id": "PV_3", "version": "3.0", "files": {
                        "nodes": first,
                        "pageInfo": { "hasNextPage": true, "endCursor": "f1" }
                    } },
                    { "id": "PV_2", "version": "2.0", "files": {
                        "nodes": [{ "name": "core-2.0.jar" }],
                        "pageInfo": { "hasNextPage": false, "endCursor": "x" }
                    } }
                ],
                "pageInfo": { "hasNextPage": false, "endCursor": "v1" }
            } } ] } } } }),
            json!({ "data": { "node": { "files": {
                "nodes": [{ "name": "core-3.0.pom" }],
                "pageInfo": { "hasNextPage": true, "endCursor": "f2" }
            } } } }),
            json!({ "data": { "node": { "files": {
                "nodes": [{ "name": "core-3.0.module" }],
                "pageInfo": { "hasNextPage": false, "endCursor": "f3" }
            } } } }),
        ]));

        let files = api(transport.clone())
            .package_files("acme", PackageType::Maven, "com.acme.core")
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].files.len(), 102);
        assert_eq!(files[0].files[100], "core-3.0.pom");
        assert_eq!(files[0].files[101], "core-3.0.module");
        assert_eq!(files[1].files, vec!["core-2.0.jar"]);

        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[1]["variables"]["id"], "PV_3");
        assert_eq!(bodies[1]["variables"]["after"], "f1");
        assert_eq!(bodies[2]["variables"]["after"], "f2");
    }

    #[test]
    fn test_package_files_surfaces_graphql_errors() {
        let transport = Arc::new(ScriptedTransport::with_responses(vec![json!({
            "errors": [{ "message": "Could not resolve to an Organization" }]
        })]));
        let err = api(transport)
            .package_files("ghost", PackageType::Maven, "x")
            .unwrap_err();
        assert!(matches!(err, MigrateError::InvalidApiResponse(_)));
    }
}
