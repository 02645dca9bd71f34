use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use std::env;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::GitHubConfig;
use crate::discovery::RemoteDiscovery;

/// GitHub client wrapper with authentication management
pub struct GitHubClient {
    client: Octocrab,
    auth_strategy: AuthStrategy,
}

/// GitHub authentication strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
    /// No credentials, public repositories only
    Anonymous,
}

impl GitHubClient {
    /// Create a new GitHub client with automatic authentication
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let (auth_strategy, token) = Self::detect_authentication(&config.auth_method)?;

        info!("Using authentication strategy: {:?}", auth_strategy);

        let builder = Octocrab::builder();
        let client = match token {
            Some(token) => builder.personal_token(token).build(),
            None => builder.build(),
        }
        .context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            auth_strategy,
        })
    }

    /// Detect and obtain GitHub authentication
    fn detect_authentication(auth_method: &str) -> Result<(AuthStrategy, Option<String>)> {
        match auth_method {
            "auto" => {
                // Try GitHub CLI first, then environment token
                if let Ok(token) = Self::try_github_cli() {
                    Ok((AuthStrategy::GitHubCLI, Some(token)))
                } else if let Ok(token) = Self::try_environment_token() {
                    Ok((AuthStrategy::EnvironmentToken, Some(token)))
                } else {
                    warn!(
                        "No GitHub authentication found, listing public repositories only. \
                         Run `gh auth login` or set GITHUB_TOKEN"
                    );
                    Ok((AuthStrategy::Anonymous, None))
                }
            }
            "gh_cli" => {
                let token = Self::try_github_cli()
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                Ok((AuthStrategy::GitHubCLI, Some(token)))
            }
            "token" => {
                let token = Self::try_environment_token()
                    .context("GITHUB_TOKEN environment variable not found or invalid")?;
                Ok((AuthStrategy::EnvironmentToken, Some(token)))
            }
            "none" => Ok((AuthStrategy::Anonymous, None)),
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    /// Try to get token from GitHub CLI
    fn try_github_cli() -> Result<String> {
        debug!("Attempting GitHub CLI authentication");

        let token_output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .context("Failed to run GitHub CLI (gh)")?;

        if !token_output.status.success() {
            return Err(anyhow!(
                "Failed to retrieve token from GitHub CLI: {}",
                String::from_utf8_lossy(&token_output.stderr).trim()
            ));
        }

        let token = String::from_utf8(token_output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(anyhow!("GitHub CLI returned empty token"));
        }

        debug!("Successfully obtained token from GitHub CLI");
        Ok(token)
    }

    /// Try to get token from environment variable
    fn try_environment_token() -> Result<String> {
        debug!("Attempting environment variable authentication");

        let token = env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;

        if token.trim().is_empty() {
            return Err(anyhow!("GITHUB_TOKEN is empty"));
        }

        Ok(token.trim().to_string())
    }

    /// List up to `limit` repository names for a specific organization
    pub async fn list_organization_repositories(&self, org: &str, limit: usize) -> Result<Vec<String>> {
        debug!("Fetching repositories for organization: {}", org);

        let mut names = Vec::new();
        let mut page = 1u32;

        while names.len() < limit {
            let page_repos = self
                .client
                .orgs(org)
                .list_repos()
                .per_page(100)
                .page(page)
                .send()
                .await
                .with_context(|| {
                    format!("Failed to fetch repositories for organization {} page {}", org, page)
                })?;

            let items = page_repos.items;
            if items.is_empty() {
                break;
            }

            let remaining = limit - names.len();
            names.extend(items.into_iter().take(remaining).map(|repo| repo.name));
            page += 1;
        }

        info!("found {} remote repos", names.len());
        Ok(names)
    }
}

#[async_trait]
impl RemoteDiscovery for GitHubClient {
    async fn list_organization_repositories(&self, org: &str, limit: usize) -> Result<Vec<String>> {
        GitHubClient::list_organization_repositories(self, org, limit).await
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}
