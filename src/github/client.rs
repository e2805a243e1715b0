//! GitHub REST implementation of [`HostingApi`].

use super::api::HostingApi;
use super::types::{
    Issue, Milestone, PrQuery, PrState, PrStateFilter, PullRequest, Release, RepoSlug, RunConclusion, RunQuery,
    RunStatus, WorkflowRun,
};
use crate::error::{GitHubError, PreconditionError, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use url::Url;

const API_VERSION: &str = "2022-11-28";

/// Authenticated GitHub REST client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base: Url,
}

impl GitHubClient {
    /// Create a client for `api_url` authenticated with `token`
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        let token = token.ok_or_else(|| PreconditionError::ToolOrAuthMissing {
            what: "API token".to_string(),
            hint: "Set GITHUB_TOKEN or GH_TOKEN with repo and workflow scopes".to_string(),
        })?;

        // Url::join drops the last segment unless the base ends with '/'
        let mut base_str = api_url.trim().to_string();
        if !base_str.ends_with('/') {
            base_str.push('/');
        }
        let base = Url::parse(&base_str).map_err(|e| GitHubError::Transport {
            path: api_url.to_string(),
            reason: format!("invalid API URL: {}", e),
        })?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            PreconditionError::ToolOrAuthMissing {
                what: "valid API token".to_string(),
                hint: "The token contains characters that are not allowed in a header".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("release_conductor/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GitHubError::Transport {
                path: base.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { http, base })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| {
            GitHubError::Transport {
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let mut request = self.http.request(method.clone(), self.url(path)?).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        log::debug!("{} {}", method, path);
        request.send().await.map_err(|e| {
            GitHubError::Transport {
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn ensure_success(
        method: &Method,
        path: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiMessage>(&text)
            .map(|m| m.message)
            .unwrap_or(text);
        Err(GitHubError::Api {
            method: method.to_string(),
            path: path.to_string(),
            status: status.as_u16(),
            message,
        }
        .into())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(Method::GET, path, query, None).await?;
        let response = Self::ensure_success(&Method::GET, path, response).await?;
        response.json::<T>().await.map_err(|e| {
            GitHubError::Decode {
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.send(Method::GET, path, &[], None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(&Method::GET, path, response).await?;
        response.json::<T>().await.map(Some).map_err(|e| {
            GitHubError::Decode {
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl HostingApi for GitHubClient {
    async fn list_issues(&self, repo: &RepoSlug, label: &str) -> Result<Vec<Issue>> {
        let path = format!("repos/{}/{}/issues", repo.owner, repo.name);
        let query = [
            ("labels", label.to_string()),
            ("state", "open".to_string()),
            ("per_page", "100".to_string()),
        ];
        let items: Vec<IssueDto> = self.get_json(&path, &query).await?;

        // The issues endpoint also returns pull requests
        Ok(items
            .into_iter()
            .filter(|item| item.pull_request.is_none())
            .map(|item| Issue {
                number: item.number,
                title: item.title,
                url: item.html_url,
            })
            .collect())
    }

    async fn trigger_automation(
        &self,
        repo: &RepoSlug,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()> {
        let path = format!(
            "repos/{}/{}/actions/workflows/{}/dispatches",
            repo.owner, repo.name, workflow
        );
        let body = serde_json::json!({ "ref": git_ref, "inputs": inputs });
        let response = self.send(Method::POST, &path, &[], Some(&body)).await?;
        Self::ensure_success(&Method::POST, &path, response).await?;
        Ok(())
    }

    async fn get_run(&self, repo: &RepoSlug, run_id: u64) -> Result<WorkflowRun> {
        let path = format!("repos/{}/{}/actions/runs/{}", repo.owner, repo.name, run_id);
        let run: RunDto = self.get_json(&path, &[]).await?;
        Ok(run.into())
    }

    async fn list_runs(&self, repo: &RepoSlug, query: &RunQuery) -> Result<Vec<WorkflowRun>> {
        let path = match &query.workflow {
            Some(workflow) => format!(
                "repos/{}/{}/actions/workflows/{}/runs",
                repo.owner, repo.name, workflow
            ),
            None => format!("repos/{}/{}/actions/runs", repo.owner, repo.name),
        };

        let mut params = vec![("per_page", query.per_page.max(1).to_string())];
        if let Some(branch) = &query.branch {
            params.push(("branch", branch.clone()));
        }
        if let Some(event) = &query.event {
            params.push(("event", event.clone()));
        }

        let page: RunsPage = self.get_json(&path, &params).await?;
        let mut runs: Vec<WorkflowRun> = page.workflow_runs.into_iter().map(Into::into).collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    async fn get_pull_request(&self, repo: &RepoSlug, number: u64) -> Result<PullRequest> {
        let path = format!("repos/{}/{}/pulls/{}", repo.owner, repo.name, number);
        let pull: PullDto = self.get_json(&path, &[]).await?;
        Ok(pull.into())
    }

    async fn list_pull_requests(&self, repo: &RepoSlug, query: &PrQuery) -> Result<Vec<PullRequest>> {
        let params = [
            ("q", pull_search_query(repo, query)),
            ("sort", "created".to_string()),
            ("order", "desc".to_string()),
            ("per_page", query.per_page.max(1).to_string()),
        ];
        let page: PullSearchPage = self.get_json("search/issues", &params).await?;

        // Search matches title words; keep only real substring matches
        let needle = query.search.to_lowercase();
        Ok(page
            .items
            .into_iter()
            .filter(|item| item.title.to_lowercase().contains(&needle))
            .map(Into::into)
            .collect())
    }

    async fn get_release(&self, repo: &RepoSlug, tag: &str) -> Result<Option<Release>> {
        let path = format!("repos/{}/{}/releases/tags/{}", repo.owner, repo.name, tag);
        let release: Option<ReleaseDto> = self.get_optional(&path).await?;
        Ok(release.map(|r| Release {
            tag_name: r.tag_name,
            url: r.html_url,
            draft: r.draft,
            prerelease: r.prerelease,
        }))
    }

    async fn list_milestones(&self, repo: &RepoSlug) -> Result<Vec<Milestone>> {
        let path = format!("repos/{}/{}/milestones", repo.owner, repo.name);
        let params = [("state", "all".to_string()), ("per_page", "100".to_string())];
        let milestones: Vec<MilestoneDto> = self.get_json(&path, &params).await?;
        Ok(milestones
            .into_iter()
            .map(|m| Milestone {
                number: m.number,
                title: m.title,
                state: m.state,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssueDto {
    number: u64,
    title: String,
    html_url: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RunsPage {
    #[serde(default)]
    workflow_runs: Vec<RunDto>,
}

#[derive(Debug, Deserialize)]
struct RunDto {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    html_url: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    head_branch: Option<String>,
    #[serde(default)]
    event: String,
}

impl From<RunDto> for WorkflowRun {
    fn from(dto: RunDto) -> Self {
        WorkflowRun {
            id: dto.id,
            name: dto.name.unwrap_or_else(|| "workflow".to_string()),
            status: dto
                .status
                .as_deref()
                .map(RunStatus::from_api)
                .unwrap_or(RunStatus::Queued),
            conclusion: dto.conclusion.as_deref().map(RunConclusion::from_api),
            url: dto.html_url,
            created_at: dto.created_at,
            head_branch: dto.head_branch,
            event: dto.event,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PullDto {
    number: u64,
    title: String,
    state: String,
    #[serde(default)]
    merged_at: Option<DateTime<Utc>>,
    html_url: String,
}

impl From<PullDto> for PullRequest {
    fn from(dto: PullDto) -> Self {
        let state = match (dto.state.as_str(), dto.merged_at) {
            ("open", _) => PrState::Open,
            (_, Some(_)) => PrState::Merged,
            _ => PrState::Closed,
        };
        PullRequest {
            number: dto.number,
            title: dto.title,
            state,
            merged_at: dto.merged_at,
            url: dto.html_url,
        }
    }
}

/// Search qualifiers selecting pull requests of `repo` whose title holds `query.search`
fn pull_search_query(repo: &RepoSlug, query: &PrQuery) -> String {
    let phrase = query.search.replace('"', "");
    let mut q = format!("repo:{}/{} is:pr in:title \"{}\"", repo.owner, repo.name, phrase);
    if query.state != PrStateFilter::All {
        q.push_str(&format!(" is:{}", query.state.as_str()));
    }
    q
}

#[derive(Debug, Deserialize)]
struct PullSearchPage {
    #[serde(default)]
    items: Vec<SearchItemDto>,
}

#[derive(Debug, Deserialize)]
struct SearchItemDto {
    number: u64,
    title: String,
    state: String,
    html_url: String,
    #[serde(default)]
    pull_request: Option<SearchPullDto>,
}

#[derive(Debug, Deserialize)]
struct SearchPullDto {
    #[serde(default)]
    merged_at: Option<DateTime<Utc>>,
}

impl From<SearchItemDto> for PullRequest {
    fn from(item: SearchItemDto) -> Self {
        PullDto {
            number: item.number,
            title: item.title,
            state: item.state,
            merged_at: item.pull_request.and_then(|pull| pull.merged_at),
            html_url: item.html_url,
        }
        .into()
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseDto {
    tag_name: String,
    html_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct MilestoneDto {
    number: u64,
    title: String,
    state: String,
}
