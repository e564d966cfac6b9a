//! GitHub API client for the git database and pull-request endpoints.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::auth::Auth;
use crate::error::{Error, Result};
use crate::types::{
    CommitObject, CreateCommit, CreatePullRequest, GitRef, NewTreeEntry, PullRequest, TreeEntry,
    TreeEntryKind, TreeObject,
};

// === Internal API response types (shared across methods) ===

/// Internal representation of a git ref from the GitHub API.
#[derive(serde::Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    ref_name: String,
    object: ApiRefObject,
}

#[derive(serde::Deserialize)]
struct ApiRefObject {
    sha: String,
}

impl ApiRef {
    fn into_git_ref(self) -> GitRef {
        GitRef {
            ref_name: self.ref_name,
            sha: self.object.sha,
        }
    }
}

/// Internal representation of a commit object from the GitHub API.
#[derive(serde::Deserialize)]
struct ApiCommit {
    sha: String,
    tree: ApiObjectPointer,
    #[serde(default)]
    parents: Vec<ApiObjectPointer>,
}

#[derive(serde::Deserialize)]
struct ApiObjectPointer {
    sha: String,
}

impl ApiCommit {
    fn into_commit(self) -> CommitObject {
        CommitObject {
            sha: self.sha,
            tree_sha: self.tree.sha,
            parent_shas: self.parents.into_iter().map(|p| p.sha).collect(),
        }
    }
}

/// Internal representation of a tree object from the GitHub API.
#[derive(serde::Deserialize)]
struct ApiTree {
    sha: String,
    #[serde(rename = "tree")]
    entries: Vec<ApiTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(serde::Deserialize)]
struct ApiTreeEntry {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: TreeEntryKind,
    sha: String,
}

impl ApiTree {
    fn into_tree(self) -> TreeObject {
        TreeObject {
            sha: self.sha,
            entries: self
                .entries
                .into_iter()
                .map(|e| TreeEntry {
                    path: e.path,
                    mode: e.mode,
                    kind: e.kind,
                    sha: e.sha,
                })
                .collect(),
            truncated: self.truncated,
        }
    }
}

/// Internal representation of a PR from the GitHub API.
#[derive(serde::Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: String,
    draft: bool,
    html_url: String,
    head: ApiBranch,
    base: ApiBranch,
}

/// Internal representation of a branch ref inside a PR response.
#[derive(serde::Deserialize)]
struct ApiBranch {
    #[serde(rename = "ref")]
    ref_name: String,
}

impl ApiPullRequest {
    fn into_pull_request(self) -> PullRequest {
        PullRequest {
            number: self.number,
            title: self.title,
            draft: self.draft,
            head_branch: self.head.ref_name,
            base_branch: self.base.ref_name,
            html_url: self.html_url,
        }
    }
}

/// Error body returned by the GitHub API.
#[derive(serde::Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// GitHub API client.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    /// Token stored as `SecretString` for automatic zeroization on drop.
    token: SecretString,
}

impl GitHubClient {
    /// Default GitHub API URL.
    pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

    /// Create a new GitHub client.
    ///
    /// # Errors
    /// Returns error if no token can be resolved.
    pub fn new(auth: &Auth) -> Result<Self> {
        Self::with_base_url(auth, Self::DEFAULT_API_URL)
    }

    /// Create a new GitHub client with a custom API URL (for GitHub Enterprise).
    ///
    /// # Errors
    /// Returns error if no token can be resolved.
    pub fn with_base_url(auth: &Auth, base_url: impl Into<String>) -> Result<Self> {
        let token = auth.resolve()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("quill-cli"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token,
        })
    }

    /// Make a GET request.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.token.expose_secret()),
            )
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make a POST request.
    async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.token.expose_secret()),
            )
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make a PATCH request.
    async fn patch<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .patch(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.token.expose_secret()),
            )
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle an API response, mapping error statuses to [`Error`] variants.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            let body = response.json().await?;
            return Ok(body);
        }

        let status_code = status.as_u16();
        let rate_limited = status_code == 403
            && response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v == "0");

        let message = error_message(response).await;

        match status_code {
            401 => Err(Error::AuthenticationFailed),
            403 if rate_limited => Err(Error::RateLimited),
            404 => Err(Error::NotFound(message)),
            422 => Err(Error::Unprocessable { message }),
            _ => Err(Error::ApiError {
                status: status_code,
                message,
            }),
        }
    }

    // === Ref Operations ===

    /// Resolve a branch to the commit its ref points at.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the branch does not exist.
    pub async fn get_ref(&self, owner: &str, repo: &str, branch: &str) -> Result<GitRef> {
        let api_ref: ApiRef = self
            .get(&format!("/repos/{owner}/{repo}/git/ref/heads/{branch}"))
            .await?;

        Ok(api_ref.into_git_ref())
    }

    /// Create a new branch ref pointing at an existing commit.
    ///
    /// # Errors
    /// Returns [`Error::ReferenceExists`] on a name collision and
    /// [`Error::NotFound`] when the source commit does not exist.
    pub async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<GitRef> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            #[serde(rename = "ref")]
            ref_name: String,
            sha: &'a str,
        }

        let body = Body {
            ref_name: format!("refs/heads/{branch}"),
            sha,
        };

        let result: Result<ApiRef> = self
            .post(&format!("/repos/{owner}/{repo}/git/refs"), &body)
            .await;

        match result {
            Ok(api_ref) => Ok(api_ref.into_git_ref()),
            Err(Error::Unprocessable { message }) => Err(split_create_ref_rejection(message)),
            Err(e) => Err(e),
        }
    }

    /// Advance a branch ref to a new commit.
    ///
    /// With `force = false` the server rejects non-fast-forward moves.
    ///
    /// # Errors
    /// Returns [`Error::NotFastForward`] when the update is rejected and
    /// [`Error::NotFound`] if the branch does not exist.
    pub async fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> Result<GitRef> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            sha: &'a str,
            force: bool,
        }

        let result: Result<ApiRef> = self
            .patch(
                &format!("/repos/{owner}/{repo}/git/refs/heads/{branch}"),
                &Body { sha, force },
            )
            .await;

        match result {
            Ok(api_ref) => Ok(api_ref.into_git_ref()),
            Err(Error::Unprocessable { message }) => Err(Error::NotFastForward(message)),
            Err(e) => Err(e),
        }
    }

    // === Git Database Operations ===

    /// Fetch a commit object.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the commit does not exist.
    pub async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<CommitObject> {
        let api_commit: ApiCommit = self
            .get(&format!("/repos/{owner}/{repo}/git/commits/{sha}"))
            .await?;

        Ok(api_commit.into_commit())
    }

    /// Fetch a tree object, one level deep.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the tree does not exist.
    pub async fn get_tree(&self, owner: &str, repo: &str, sha: &str) -> Result<TreeObject> {
        let api_tree: ApiTree = self
            .get(&format!("/repos/{owner}/{repo}/git/trees/{sha}"))
            .await?;

        Ok(api_tree.into_tree())
    }

    /// Upload raw content as a blob, returning its content-addressed SHA.
    ///
    /// The payload is base64-encoded, so arbitrary bytes are safe.
    /// Uploading identical content twice yields the same SHA.
    ///
    /// # Errors
    /// Returns error on transport or auth failure.
    pub async fn create_blob(&self, owner: &str, repo: &str, content: &[u8]) -> Result<String> {
        #[derive(serde::Serialize)]
        struct Body {
            content: String,
            encoding: &'static str,
        }

        let created: ApiObjectPointer = self
            .post(
                &format!("/repos/{owner}/{repo}/git/blobs"),
                &Body {
                    content: BASE64.encode(content),
                    encoding: "base64",
                },
            )
            .await?;

        Ok(created.sha)
    }

    /// Create a tree object from a full entry list (no base tree).
    ///
    /// # Errors
    /// Returns error if any referenced object is missing or the request fails.
    pub async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        entries: &[NewTreeEntry],
    ) -> Result<String> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            tree: &'a [NewTreeEntry],
        }

        let created: ApiObjectPointer = self
            .post(
                &format!("/repos/{owner}/{repo}/git/trees"),
                &Body { tree: entries },
            )
            .await?;

        Ok(created.sha)
    }

    /// Create a commit object. Pure creation, no ref is moved.
    ///
    /// # Errors
    /// Returns error on transport failure.
    pub async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        commit: &CreateCommit,
    ) -> Result<CommitObject> {
        let api_commit: ApiCommit = self
            .post(&format!("/repos/{owner}/{repo}/git/commits"), commit)
            .await?;

        Ok(api_commit.into_commit())
    }

    // === PR Operations ===

    /// Create a pull request.
    ///
    /// # Errors
    /// Returns [`Error::Unprocessable`] when GitHub rejects the pair
    /// (e.g., no commits between head and base).
    pub async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let api_pr: ApiPullRequest = self
            .post(&format!("/repos/{owner}/{repo}/pulls"), pr)
            .await?;

        Ok(api_pr.into_pull_request())
    }

    // === Repository Operations ===

    /// Get the repository's default branch name.
    ///
    /// # Errors
    /// Returns error if API call fails.
    pub async fn get_default_branch(&self, owner: &str, repo: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct RepoInfo {
            default_branch: String,
        }

        let info: RepoInfo = self.get(&format!("/repos/{owner}/{repo}")).await?;
        Ok(info.default_branch)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("token", &"[redacted]")
            .finish_non_exhaustive()
    }
}

/// Extract the `message` field from an API error body, falling back to raw text.
async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiErrorBody>(&text).map_or(text, |body| body.message)
}

/// Split the two 422 cases of ref creation apart by message.
///
/// The API uses the same status for a name collision ("Reference already
/// exists") and a missing source object ("Object does not exist").
fn split_create_ref_rejection(message: String) -> Error {
    let lower = message.to_lowercase();
    if lower.contains("already exists") {
        Error::ReferenceExists(message)
    } else if lower.contains("does not exist") {
        Error::NotFound(message)
    } else {
        Error::Unprocessable { message }
    }
}
