//! # `gcloud auth`
//!
//! Credential management: activating service account keys, printing the
//! current token, listing and revoking stored accounts.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use gcloud::auth;
use gcloud::config::Property;

use crate::common::{Ctx, print_json, print_table};

#[derive(Subcommand, Debug)]
pub enum AuthCmd {
    /// Authorize access with a service account key file
    ActivateServiceAccount {
        /// Path to the JSON key file
        #[arg(long)]
        key_file: PathBuf,
    },
    /// Print an access token for the active credentials
    PrintAccessToken,
    /// List accounts with stored credentials
    List,
    /// Remove stored credentials for an account
    Revoke {
        /// Account to revoke; defaults to the active account
        account: Option<String>,
    },
}

pub async fn run(ctx: &Ctx, cmd: AuthCmd) -> Result<()> {
    match cmd {
        AuthCmd::ActivateServiceAccount { key_file } => {
            let account = auth::activate_service_account(&ctx.store, &key_file)?;
            eprintln!("Activated service account credentials for: [{account}]");
            Ok(())
        }
        AuthCmd::PrintAccessToken => {
            let token = auth::get_access_token().await?;
            println!("{token}");
            Ok(())
        }
        AuthCmd::List => list(ctx),
        AuthCmd::Revoke { account } => {
            let account = auth::revoke(&ctx.store, account.as_deref())?;
            eprintln!("Revoked credentials for: [{account}]");
            Ok(())
        }
    }
}

fn list(ctx: &Ctx) -> Result<()> {
    let active = ctx.store.get(&Property::parse("account")?)?;
    let accounts = ctx.store.credentialed_accounts()?;
    if ctx.json_output() {
        let items: Vec<_> = accounts
            .iter()
            .map(|account| {
                json!({
                    "account": account,
                    "status": if active.as_deref() == Some(account.as_str()) { "ACTIVE" } else { "" },
                })
            })
            .collect();
        return print_json(&items);
    }
    if accounts.is_empty() {
        eprintln!("No credentialed accounts.");
        eprintln!("To login, run: $ gcloud auth activate-service-account --key-file=KEY_FILE");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = accounts
        .iter()
        .map(|account| {
            let marker = if active.as_deref() == Some(account.as_str()) {
                "*"
            } else {
                ""
            };
            vec![marker.to_string(), account.clone()]
        })
        .collect();
    print_table(&["ACTIVE", "ACCOUNT"], &rows);
    Ok(())
}
