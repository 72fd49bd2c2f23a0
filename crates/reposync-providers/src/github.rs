use crate::github_models::{RepoItem, UserItem};
use crate::http::{build_client, send_with_retry, send_with_retry_allow_statuses};
use crate::provider_paging::{next_link, page_of};
use anyhow::{Context, bail};
use reposync_core::model::{Identity, RepositoryDescriptor};
use reposync_core::provider::{ProviderFuture, RepoDirectory};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

const PER_PAGE: u32 = 100;
/// Guards against a server that keeps advertising a next page.
const MAX_PAGES: u32 = 500;

/// Repositories owned by the authenticated GitHub user.
pub struct GitHubDirectory {
    client: Client,
    api_base: String,
}

impl GitHubDirectory {
    pub fn new(api_base: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn first_page_url(&self) -> String {
        format!(
            "{}/user/repos?per_page={PER_PAGE}&page=1&affiliation=owner",
            self.api_base
        )
    }

    fn request(&self, url: &str, token: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(token)
    }

    async fn fetch_page(
        &self,
        url: &str,
        token: &str,
    ) -> anyhow::Result<(Vec<RepoItem>, Option<String>)> {
        let response = send_with_retry(|| Ok(self.request(url, token)))
            .await
            .context("call GitHub list repos")?;
        let next = next_link(response.headers());
        let payload: Vec<RepoItem> = response.json().await.context("decode repos response")?;
        Ok((payload, next))
    }

    async fn list(&self, identity: &Identity) -> anyhow::Result<Vec<RepositoryDescriptor>> {
        let mut url = self.first_page_url();
        let mut repos = Vec::new();
        for _ in 0..MAX_PAGES {
            let (payload, next) = self.fetch_page(&url, &identity.credential).await?;
            debug!(
                page = page_of(&url).unwrap_or(1),
                count = payload.len(),
                "fetched repository page"
            );
            let empty = payload.is_empty();
            repos.extend(payload.into_iter().map(RepoItem::into_descriptor));
            match next {
                Some(next) if !empty => url = next,
                _ => break,
            }
        }
        info!(user = %identity.username, count = repos.len(), "listed GitHub repositories");
        Ok(repos)
    }

    async fn validate(&self, identity: &Identity) -> anyhow::Result<()> {
        if identity.credential.trim().is_empty() {
            bail!("no GitHub token for {}", identity.username);
        }
        let url = format!("{}/user", self.api_base);
        let response = send_with_retry_allow_statuses(
            || Ok(self.request(&url, &identity.credential)),
            &[StatusCode::UNAUTHORIZED],
        )
        .await
        .context("call GitHub user")?;
        if response.status() == StatusCode::UNAUTHORIZED {
            bail!("GitHub rejected the token for {}", identity.username);
        }
        let user: UserItem = response.json().await.context("decode user response")?;
        if !user.login.eq_ignore_ascii_case(&identity.username) {
            bail!(
                "token belongs to {}, not {}",
                user.login,
                identity.username
            );
        }
        Ok(())
    }
}

impl RepoDirectory for GitHubDirectory {
    fn name(&self) -> &'static str {
        "github"
    }

    fn list_repositories<'a>(
        &'a self,
        identity: &'a Identity,
    ) -> ProviderFuture<'a, Vec<RepositoryDescriptor>> {
        Box::pin(self.list(identity))
    }

    fn validate_identity<'a>(&'a self, identity: &'a Identity) -> ProviderFuture<'a, ()> {
        Box::pin(self.validate(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo_json(name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "full_name": format!("octocat/{name}"),
            "ssh_url": format!("git@github.com:octocat/{name}.git"),
            "default_branch": "main",
            "private": false
        })
    }

    #[tokio::test]
    async fn list_follows_link_pagination() {
        let server = MockServer::start().await;
        let next = format!(
            "<{}/user/repos?per_page=100&page=2&affiliation=owner>; rel=\"next\"",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", "1"))
            .and(query_param("affiliation", "owner"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next.as_str())
                    .set_body_json(json!([repo_json("one"), repo_json("two")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("three")])))
            .mount(&server)
            .await;

        let directory = GitHubDirectory::new(server.uri()).unwrap();
        let identity = Identity::new("octocat", "secret");
        let repos = directory.list_repositories(&identity).await.unwrap();
        let names: Vec<&str> = repos.iter().map(|repo| repo.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
        assert_eq!(repos[2].clone_url(), Some("git@github.com:octocat/three.git"));
    }

    #[tokio::test]
    async fn validate_identity_checks_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "Octocat"})))
            .mount(&server)
            .await;

        let directory = GitHubDirectory::new(server.uri()).unwrap();
        directory
            .validate_identity(&Identity::new("octocat", "secret"))
            .await
            .unwrap();
        let err = directory
            .validate_identity(&Identity::new("someone-else", "secret"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("token belongs to Octocat"));
    }

    #[tokio::test]
    async fn validate_identity_reports_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let directory = GitHubDirectory::new(server.uri()).unwrap();
        let err = directory
            .validate_identity(&Identity::new("octocat", "bad"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rejected the token"));

        let err = directory
            .validate_identity(&Identity::new("octocat", " "))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no GitHub token"));
    }
}
