use reposync_core::model::RepositoryDescriptor;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct RepoItem {
    pub(crate) name: String,
    pub(crate) full_name: String,
    #[serde(default)]
    pub(crate) ssh_url: Option<String>,
    #[serde(default)]
    pub(crate) html_url: String,
    pub(crate) default_branch: Option<String>,
    #[serde(default)]
    pub(crate) private: bool,
    pub(crate) archived: Option<bool>,
    #[serde(default)]
    pub(crate) fork: bool,
    #[serde(default)]
    pub(crate) size: u64,
    #[serde(default)]
    pub(crate) created_at: Option<String>,
    #[serde(default)]
    pub(crate) updated_at: Option<String>,
    #[serde(default)]
    pub(crate) pushed_at: Option<String>,
}

impl RepoItem {
    /// SSH clone URL; `updated_at` carries the last push when GitHub reports one.
    pub(crate) fn into_descriptor(self) -> RepositoryDescriptor {
        let mut repo = RepositoryDescriptor::new(self.name, self.ssh_url);
        repo.full_name = self.full_name;
        repo.html_url = self.html_url;
        repo.default_branch = normalize_branch(self.default_branch);
        repo.private = self.private;
        repo.archived = self.archived.unwrap_or(false);
        repo.fork = self.fork;
        repo.size_kb = self.size;
        repo.created_at = self.created_at;
        repo.updated_at = self.pushed_at.or(self.updated_at);
        repo
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserItem {
    pub(crate) login: String,
}

fn normalize_branch(branch: Option<String>) -> String {
    branch
        .map(|branch| branch.trim().to_string())
        .filter(|branch| !branch.is_empty())
        .unwrap_or_else(|| "main".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repo_item_maps_to_descriptor() {
        let value = json!({
            "id": 1,
            "name": "hello",
            "full_name": "octocat/hello",
            "ssh_url": "git@github.com:octocat/hello.git",
            "clone_url": "https://github.com/octocat/hello.git",
            "html_url": "https://github.com/octocat/hello",
            "default_branch": "develop",
            "private": true,
            "archived": true,
            "fork": false,
            "size": 42,
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "pushed_at": "2024-06-01T00:00:00Z"
        });
        let item: RepoItem = serde_json::from_value(value).unwrap();
        let repo = item.into_descriptor();
        assert_eq!(repo.clone_url(), Some("git@github.com:octocat/hello.git"));
        assert_eq!(repo.full_name, "octocat/hello");
        assert_eq!(repo.default_branch, "develop");
        assert!(repo.private);
        assert!(repo.archived);
        assert_eq!(repo.size_kb, 42);
        assert_eq!(repo.updated_at.as_deref(), Some("2024-06-01T00:00:00Z"));
        assert!(!repo.local_exists);
    }

    #[test]
    fn missing_fields_fall_back() {
        let value = json!({
            "name": "empty",
            "full_name": "octocat/empty",
            "default_branch": null,
            "updated_at": "2024-01-01T00:00:00Z"
        });
        let item: RepoItem = serde_json::from_value(value).unwrap();
        let repo = item.into_descriptor();
        assert_eq!(repo.default_branch, "main");
        assert!(!repo.archived);
        assert!(!repo.has_clone_url());
        assert_eq!(repo.updated_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }
}
