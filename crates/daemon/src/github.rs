//! GitHub REST API content source
//!
//! Reads files and commit history of one branch of one repository through
//! the public REST API.

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use http::StatusCode;
use reqwest::{Client, Response};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use url::Url;

use common::source::{ChangedFile, Commit, ContentSource, FileStatus, SourceError};

use crate::config::GithubConfig;

const API_VERSION: &str = "2022-11-28";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";
const PER_PAGE: usize = 100;
/// Upper bound on listed commit pages (10k commits)
const MAX_PAGES: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum GithubSetupError {
    #[error("invalid github token header")]
    InvalidToken,
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// One branch of a GitHub repository
#[derive(Debug, Clone)]
pub struct GithubSource {
    client: Client,
    api_url: Url,
    owner: String,
    repo: String,
    branch: String,
}

impl GithubSource {
    pub fn new(config: &GithubConfig) -> Result<Self, GithubSetupError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| GithubSetupError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
        })
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// `{api}/repos/{owner}/{repo}/{segments...}`, each segment percent-encoded
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, SourceError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Unavailable(format!("unusable api url {}", self.api_url)))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url, accept: &'static str) -> Result<Response, SourceError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", url, e)))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(url.path().to_string())),
            status => Err(SourceError::Unavailable(format!("{} returned {}", url, status))),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, SourceError> {
        self.get(url.clone(), ACCEPT_JSON)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Decode(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl ContentSource for GithubSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let mut url = self.endpoint(
            std::iter::once("contents").chain(path.split('/').filter(|s| !s.is_empty())),
        )?;
        url.query_pairs_mut().append_pair("ref", &self.branch);

        let bytes = self
            .get(url.clone(), ACCEPT_RAW)
            .await
            .map_err(|e| match e {
                SourceError::NotFound(_) => SourceError::NotFound(path.to_string()),
                e => e,
            })?
            .bytes()
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }

    async fn list_commits(&self) -> Result<Vec<Commit>, SourceError> {
        let mut commits = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut url = self.endpoint(["commits"])?;
            url.query_pairs_mut()
                .append_pair("sha", &self.branch)
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let entries: Vec<CommitEntry> = self.get_json(url).await?;
            let short = entries.len() < PER_PAGE;
            for entry in entries {
                commits.push(entry.into_commit()?);
            }
            if short {
                return Ok(commits);
            }
        }

        tracing::warn!(
            "commit listing truncated at {} pages of {}",
            MAX_PAGES,
            self.branch
        );
        Ok(commits)
    }

    async fn commit_files(&self, id: &str) -> Result<Vec<ChangedFile>, SourceError> {
        let url = self.endpoint(["commits", id])?;
        let entry: CommitEntry = self.get_json(url).await?;
        Ok(entry.files.into_iter().map(FileEntry::into_changed_file).collect())
    }
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
    commit: CommitDetail,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: Option<GitIdentity>,
}

#[derive(Debug, Deserialize)]
struct GitIdentity {
    name: String,
    date: String,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
    status: String,
    #[serde(default)]
    previous_filename: Option<String>,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

impl CommitEntry {
    fn into_commit(self) -> Result<Commit, SourceError> {
        let author = self
            .commit
            .author
            .ok_or_else(|| SourceError::Decode(format!("commit {} has no author", self.sha)))?;
        let authored_at = OffsetDateTime::parse(&author.date, &Rfc3339).map_err(|e| {
            SourceError::Decode(format!("commit {} date {:?}: {}", self.sha, author.date, e))
        })?;

        Ok(Commit {
            id: self.sha,
            author: author.name,
            authored_at,
        })
    }
}

impl FileEntry {
    fn into_changed_file(self) -> ChangedFile {
        ChangedFile {
            path: self.filename,
            status: self.status.parse().unwrap_or(FileStatus::Modified),
            previous_path: self.previous_filename,
            additions: self.additions,
            deletions: self.deletions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(api_url: &str) -> GithubSource {
        GithubSource::new(&GithubConfig {
            owner: "someone".to_string(),
            repo: "blog".to_string(),
            branch: "main".to_string(),
            token: Some("secret".to_string()),
            api_url: Url::parse(api_url).unwrap(),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let github = source("https://api.github.com");
        let url = github
            .endpoint(["contents", "posts", "hello world.md"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/someone/blog/contents/posts/hello%20world.md"
        );
    }

    #[test]
    fn test_endpoint_keeps_api_prefix() {
        let github = source("https://ghe.example.com/api/v3/");
        let url = github.endpoint(["commits"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/someone/blog/commits"
        );
    }

    #[test]
    fn test_commit_detail_decoding() {
        let entry: CommitEntry = serde_json::from_str(
            r#"{
                "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
                "commit": {
                    "author": {
                        "name": "Monalisa Octocat",
                        "email": "support@github.com",
                        "date": "2011-04-14T16:00:49Z"
                    },
                    "message": "Fix all the bugs"
                },
                "files": [
                    {"filename": "posts/a.md", "status": "added", "additions": 10, "deletions": 0},
                    {"filename": "static/header.html", "status": "modified", "additions": 1, "deletions": 1},
                    {"filename": "posts/b.md", "status": "removed"},
                    {"filename": "posts/new.md", "status": "renamed", "previous_filename": "posts/old.md"}
                ]
            }"#,
        )
        .unwrap();

        let files: Vec<ChangedFile> = entry
            .files
            .into_iter()
            .map(FileEntry::into_changed_file)
            .collect();
        assert_eq!(files.len(), 4);
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[0].additions, 10);
        assert_eq!(files[1].path, "static/header.html");
        assert_eq!(files[2].status, FileStatus::Removed);
        assert_eq!(files[2].previous_path, None);
        assert_eq!(files[3].status, FileStatus::Renamed);
        assert_eq!(files[3].vacated_path(), Some("posts/old.md"));
    }

    #[test]
    fn test_commit_listing_decoding() {
        let entries: Vec<CommitEntry> = serde_json::from_str(
            r#"[{
                "sha": "abc",
                "commit": {"author": {"name": "alice", "date": "2024-03-01T12:30:00+02:00"}}
            }]"#,
        )
        .unwrap();

        let commit = entries.into_iter().next().unwrap().into_commit().unwrap();
        assert_eq!(commit.id, "abc");
        assert_eq!(commit.author, "alice");
        assert_eq!(commit.authored_at.date().to_string(), "2024-03-01");
    }

    #[test]
    fn test_commit_without_author_is_a_decode_error() {
        let entry: CommitEntry =
            serde_json::from_str(r#"{"sha": "abc", "commit": {"author": null}}"#).unwrap();
        assert!(matches!(entry.into_commit(), Err(SourceError::Decode(_))));
    }
}
