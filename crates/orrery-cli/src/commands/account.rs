//! Account command implementation.

use anyhow::Result;
use console::style;

use orrery_hal::{Credential, CredentialMatcher, CredentialScope};

use super::common::{self, SessionArgs};

/// Fields of an account to save.
pub struct NewAccount {
    pub id: String,
    pub token: String,
    pub endpoint: String,
    pub name: Option<String>,
    pub hub: Option<String>,
    pub group: Option<String>,
    pub project: Option<String>,
}

impl NewAccount {
    fn into_credential(self) -> Credential {
        let mut credential = Credential::new(self.id, self.token, self.endpoint).with_scope(
            CredentialScope {
                hub: self.hub,
                group: self.group,
                project: self.project,
            },
        );
        credential.name = self.name;
        credential
    }
}

/// List the accounts of the session.
pub async fn list(args: &SessionArgs) -> Result<()> {
    let session = common::open(args).await?;
    let summaries = session.provider.registry().summaries();

    if summaries.is_empty() {
        println!("No saved accounts. Add one with 'orrery account save'.");
        return Ok(());
    }

    println!("{} Accounts:\n", style("Orrery").cyan().bold());
    for summary in summaries {
        println!(
            "  {} {}",
            style(&summary.id).bold(),
            summary.name.as_deref().unwrap_or("")
        );
        println!("    Endpoint: {}", summary.endpoint_url);
        if !summary.scope.is_unscoped() {
            println!("    Instance: {}", summary.scope);
        }
    }
    Ok(())
}

/// Save an account to the credential file.
pub async fn save(args: &SessionArgs, account: NewAccount, overwrite: bool) -> Result<()> {
    let session = common::open(args).await?;
    let store = session.store()?;
    let credential = account.into_credential();

    if !overwrite && session.provider.registry().get(&credential.id).is_some() {
        anyhow::bail!(
            "Account '{}' already exists. Use --overwrite to replace it.",
            credential.id
        );
    }

    session.provider.save_account(store, &credential).await?;
    println!(
        "{} Saved account {} to {}",
        style("✓").green().bold(),
        style(&credential.id).bold(),
        store.path().display()
    );
    Ok(())
}

/// Delete saved accounts.
pub async fn delete(
    args: &SessionArgs,
    id: Option<String>,
    hub: Option<String>,
    group: Option<String>,
    project: Option<String>,
    all: bool,
) -> Result<()> {
    let matcher = matcher(id, hub, group, project);
    if !all && matcher == CredentialMatcher::any() {
        anyhow::bail!("Refusing to delete every account without --all");
    }

    let session = common::open(args).await?;
    let store = session.store()?;
    let removed = session.provider.delete_accounts(store, &matcher).await?;
    println!(
        "{} Deleted {} account{}",
        style("✓").green().bold(),
        removed,
        if removed == 1 { "" } else { "s" }
    );
    Ok(())
}

fn matcher(
    id: Option<String>,
    hub: Option<String>,
    group: Option<String>,
    project: Option<String>,
) -> CredentialMatcher {
    let mut matcher = match id {
        Some(id) => CredentialMatcher::id(id),
        None => CredentialMatcher::any(),
    };
    if let Some(hub) = hub {
        matcher = matcher.hub(hub);
    }
    if let Some(group) = group {
        matcher = matcher.group(group);
    }
    if let Some(project) = project {
        matcher = matcher.project(project);
    }
    matcher
}
