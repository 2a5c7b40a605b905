//! Token minting for development and operations.
//!
//! Signs a bearer token locally with the server's HMAC secret, so the secret
//! must match the server's `auth.jwt_secret`.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::time::Duration;
use taskgate_core::config::AuthConfig;
use taskgate_core::middleware::Authenticator;
use taskgate_core::rbac::{Identity, UserId};

use super::config;
use super::user::parse_role;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Sign a token for an existing user
    Mint {
        /// User id the token speaks for
        #[arg(short, long)]
        user_id: i64,

        /// Role name (owner, admin, viewer) or numeric id
        #[arg(short, long)]
        role: String,

        /// Organization id
        #[arg(short = 'g', long)]
        org: i64,

        #[arg(short, long)]
        email: Option<String>,

        /// HMAC secret shared with the server
        #[arg(long, env = "TASKGATE__AUTH__JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Issuer claim, if the server expects one
        #[arg(long, env = "TASKGATE__AUTH__ISSUER")]
        issuer: Option<String>,

        /// Lifetime in seconds
        #[arg(long, default_value = "3600")]
        ttl: u64,

        /// Store the token in the CLI configuration
        #[arg(long)]
        save: bool,
    },
}

pub async fn execute(cmd: TokenCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        TokenCommands::Mint {
            user_id,
            role,
            org,
            email,
            secret,
            issuer,
            ttl,
            save,
        } => {
            let role = parse_role(&role)?;

            let mut auth = AuthConfig::new(secret);
            auth.issuer = issuer;
            auth.token_ttl = Duration::from_secs(ttl);
            let authenticator = Authenticator::new(&auth).context("Invalid signing configuration")?;

            let mut identity = Identity::with_role(UserId(user_id), role, org);
            if let Some(email) = email {
                identity = identity.with_email(email);
            }
            let token = authenticator.generate_token(&identity)?;
            let expires = i64::try_from(ttl)
                .ok()
                .and_then(|ttl| chrono::Utc::now().timestamp().checked_add(ttl))
                .and_then(|exp| chrono::DateTime::from_timestamp(exp, 0))
                .map(|exp| exp.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());

            if save {
                let mut cfg = config::load_config()?;
                cfg.set(config::ConfigKey::Token, token.clone());
                config::save_config(&cfg)?;
            }

            match format {
                OutputFormat::Table => {
                    println!("{}", token);
                    output::print_detail("Role", role.name());
                    output::print_detail("Expires", &expires);
                    if save {
                        output::print_success("Token saved to CLI configuration");
                    }
                }
                _ => output::print_serialized(
                    &serde_json::json!({
                        "token": token,
                        "userId": user_id,
                        "roleId": role.id(),
                        "organizationId": org,
                        "expiresAt": expires,
                    }),
                    format,
                )?,
            }
        }
    }

    Ok(())
}
