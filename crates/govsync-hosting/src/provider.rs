//! GitHubPlatform - IHostingPlatform implementation for the GitHub REST API
//!
//! Wraps a shared [`HostingClient`] and maps the port operations onto the
//! repositories and contents endpoints.
//!
//! ## Design Notes
//!
//! - Writes and deletes need the current blob `sha`, so each one is
//!   preceded by a metadata read. A `409`/`422` on write means the file
//!   changed in between; the sha is re-read once before giving up.
//! - Files over 1 MB come back from the contents endpoint without inline
//!   content (`encoding: none`) and are fetched again with the raw media type.
//! - Organizations and user accounts are both accepted as discovery roots.

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Method, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use govsync_core::domain::{RepoPath, RepositoryId};
use govsync_core::ports::{IHostingPlatform, RepositoryInfo};

use crate::client::HostingClient;
use crate::rate_limit::EndpointClass;
use crate::HostingError;

const PAGE_SIZE: usize = 100;

const MEDIA_TYPE_RAW: &str = "application/vnd.github.raw";

// ============================================================================
// GitHub API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    owner: RepoOwner,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    archived: bool,
}

impl RepoResponse {
    fn into_info(self) -> Result<RepositoryInfo> {
        let id = RepositoryId::new(&self.owner.login, &self.name).with_context(|| {
            format!("invalid repository name {}/{}", self.owner.login, self.name)
        })?;
        Ok(RepositoryInfo {
            id,
            default_branch: self.default_branch.unwrap_or_else(|| "main".to_string()),
            archived: self.archived,
        })
    }
}

/// File metadata from `GET /repos/{o}/{r}/contents/{path}`
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteContentsRequest<'a> {
    message: &'a str,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

/// Decodes the inline base64 content, which GitHub wraps at 60 columns
fn decode_content(encoded: &str) -> Result<Vec<u8>, HostingError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| HostingError::InvalidResponse(format!("bad base64 content: {e}")))
}

// ============================================================================
// GitHubPlatform
// ============================================================================

/// Hosting platform backed by the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubPlatform {
    client: Arc<HostingClient>,
    branch: Option<String>,
}

impl GitHubPlatform {
    pub fn new(client: Arc<HostingClient>) -> Self {
        Self {
            client,
            branch: None,
        }
    }

    /// Targets `branch` instead of each repository's default branch
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn client(&self) -> &Arc<HostingClient> {
        &self.client
    }

    fn contents_url(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
    ) -> Result<Url, HostingError> {
        let mut segments = vec!["repos", repository.owner(), repository.name(), "contents"];
        segments.extend(path.as_str().split('/'));
        self.client.endpoint(&segments)
    }

    async fn send(
        &self,
        class: EndpointClass,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<Response, HostingError> {
        let response = self.client.execute_with_retry(class, build).await?;
        HostingClient::check(response).await
    }

    /// Fetches file metadata, `None` if the file does not exist
    async fn contents(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
    ) -> Result<Option<(Url, ContentsResponse)>, HostingError> {
        let url = self.contents_url(repository, path)?;
        let result = self
            .send(EndpointClass::Read, || {
                let request = self.client.request(Method::GET, url.clone());
                match &self.branch {
                    Some(branch) => request.query(&[("ref", branch.as_str())]),
                    None => request,
                }
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(HostingError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        // A directory listing is a JSON array and fails to parse here
        let meta: ContentsResponse = response
            .json()
            .await
            .map_err(|e| HostingError::InvalidResponse(format!("{path}: {e}")))?;
        if meta.kind != "file" {
            return Err(HostingError::InvalidResponse(format!(
                "{path} is a {}, not a file",
                meta.kind
            )));
        }
        Ok(Some((url, meta)))
    }

    async fn read_raw(&self, url: Url) -> Result<Vec<u8>, HostingError> {
        let response = self
            .send(EndpointClass::Read, || {
                let request =
                    self.client
                        .request_with_accept(Method::GET, url.clone(), MEDIA_TYPE_RAW);
                match &self.branch {
                    Some(branch) => request.query(&[("ref", branch.as_str())]),
                    None => request,
                }
            })
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn put(
        &self,
        url: &Url,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), HostingError> {
        let body = PutContentsRequest {
            message,
            content: STANDARD.encode(content),
            sha,
            branch: self.branch.as_deref(),
        };
        self.send(EndpointClass::Write, || {
            self.client.request(Method::PUT, url.clone()).json(&body)
        })
        .await?;
        Ok(())
    }

    async fn list_page(
        &self,
        owner_kind: &str,
        owner: &str,
        page: usize,
    ) -> Result<Vec<RepoResponse>, HostingError> {
        let url = self.client.endpoint(&[owner_kind, owner, "repos"])?;
        let page = page.to_string();
        let per_page = PAGE_SIZE.to_string();
        let response = self
            .send(EndpointClass::Discovery, || {
                self.client
                    .request(Method::GET, url.clone())
                    .query(&[("per_page", per_page.as_str()), ("page", page.as_str())])
            })
            .await?;
        response
            .json()
            .await
            .map_err(|e| HostingError::InvalidResponse(format!("repository listing: {e}")))
    }
}

#[async_trait::async_trait]
impl IHostingPlatform for GitHubPlatform {
    async fn list_repositories(&self, organization: &str) -> Result<Vec<RepositoryInfo>> {
        let mut owner_kind = "orgs";
        let mut repositories = Vec::new();
        let mut page = 1;

        loop {
            let batch = match self.list_page(owner_kind, organization, page).await {
                Ok(batch) => batch,
                Err(HostingError::NotFound(_)) if owner_kind == "orgs" && page == 1 => {
                    debug!(organization, "Not an organization, listing user repositories");
                    owner_kind = "users";
                    continue;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to list repositories of {organization}"))
                }
            };

            let last = batch.len() < PAGE_SIZE;
            for repo in batch {
                repositories.push(repo.into_info()?);
            }
            if last {
                break;
            }
            page += 1;
        }

        repositories.sort_by(|a, b| a.id.cmp(&b.id));
        info!(
            organization,
            count = repositories.len(),
            "Discovered repositories"
        );
        Ok(repositories)
    }

    async fn get_repository(&self, repository: &RepositoryId) -> Result<RepositoryInfo> {
        let url = self
            .client
            .endpoint(&["repos", repository.owner(), repository.name()])?;
        let response = self
            .send(EndpointClass::Discovery, || {
                self.client.request(Method::GET, url.clone())
            })
            .await
            .with_context(|| format!("failed to look up {repository}"))?;
        let repo: RepoResponse = response
            .json()
            .await
            .with_context(|| format!("invalid repository response for {repository}"))?;
        repo.into_info()
    }

    async fn read_file(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
    ) -> Result<Option<Vec<u8>>> {
        let Some((url, meta)) = self
            .contents(repository, path)
            .await
            .with_context(|| format!("failed to read {path} in {repository}"))?
        else {
            return Ok(None);
        };

        let bytes = match (meta.encoding.as_deref(), meta.content.as_deref()) {
            (Some("base64"), Some(content)) => decode_content(content)?,
            _ => {
                debug!(%repository, %path, "No inline content, fetching raw");
                self.read_raw(url)
                    .await
                    .with_context(|| format!("failed to read {path} in {repository}"))?
            }
        };
        debug!(%repository, %path, bytes = bytes.len(), "Read file");
        Ok(Some(bytes))
    }

    async fn file_exists(&self, repository: &RepositoryId, path: &RepoPath) -> Result<bool> {
        let found = self
            .contents(repository, path)
            .await
            .with_context(|| format!("failed to probe {path} in {repository}"))?;
        Ok(found.is_some())
    }

    async fn write_file(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
        content: &[u8],
        message: &str,
    ) -> Result<()> {
        let url = self.contents_url(repository, path)?;
        let mut retried = false;

        loop {
            let existing = self
                .contents(repository, path)
                .await
                .with_context(|| format!("failed to read {path} in {repository}"))?;
            let sha = existing.as_ref().map(|(_, meta)| meta.sha.as_str());

            match self.put(&url, content, sha, message).await {
                Ok(()) => {
                    debug!(%repository, %path, bytes = content.len(), "Wrote file");
                    return Ok(());
                }
                Err(HostingError::Conflict(detail)) if !retried => {
                    debug!(%repository, %path, %detail, "Stale sha on write, retrying");
                    retried = true;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to write {path} in {repository}"))
                }
            }
        }
    }

    async fn delete_file(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
        message: &str,
    ) -> Result<bool> {
        let Some((url, meta)) = self
            .contents(repository, path)
            .await
            .with_context(|| format!("failed to read {path} in {repository}"))?
        else {
            return Ok(false);
        };

        let body = DeleteContentsRequest {
            message,
            sha: &meta.sha,
            branch: self.branch.as_deref(),
        };
        match self
            .send(EndpointClass::Write, || {
                self.client.request(Method::DELETE, url.clone()).json(&body)
            })
            .await
        {
            Ok(_) => {
                debug!(%repository, %path, "Deleted file");
                Ok(true)
            }
            Err(HostingError::NotFound(_)) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to delete {path} in {repository}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wrapped_content() {
        let encoded = "aGVsbG8g\nd29ybGQ=\n";
        assert_eq!(decode_content(encoded).unwrap(), b"hello world");
    }

    #[test]
    fn test_decode_invalid_content() {
        assert!(matches!(
            decode_content("***"),
            Err(HostingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_repo_response_into_info() {
        let json = r#"{
            "name": "widgets",
            "owner": {"login": "acme"},
            "default_branch": "trunk",
            "archived": true
        }"#;
        let repo: RepoResponse = serde_json::from_str(json).unwrap();
        let info = repo.into_info().unwrap();
        assert_eq!(info.id.to_string(), "acme/widgets");
        assert_eq!(info.default_branch, "trunk");
        assert!(info.archived);
    }

    #[test]
    fn test_repo_response_defaults() {
        let json = r#"{"name": "w", "owner": {"login": "acme"}}"#;
        let info = serde_json::from_str::<RepoResponse>(json)
            .unwrap()
            .into_info()
            .unwrap();
        assert_eq!(info.default_branch, "main");
        assert!(!info.archived);
    }

    #[test]
    fn test_put_request_omits_missing_sha() {
        let body = PutContentsRequest {
            message: "m",
            content: STANDARD.encode(b"x"),
            sha: None,
            branch: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"message": "m", "content": "eA=="}));
    }

    #[test]
    fn test_contents_url_splits_path() {
        let client = Arc::new(HostingClient::with_base_url("t", "http://localhost:1"));
        let platform = GitHubPlatform::new(client);
        let repo: RepositoryId = "acme/widgets".parse().unwrap();
        let path = RepoPath::new(".github/workflows/ci.yml").unwrap();
        assert_eq!(
            platform.contents_url(&repo, &path).unwrap().as_str(),
            "http://localhost:1/repos/acme/widgets/contents/.github/workflows/ci.yml"
        );
    }
}
