//! Taskmate auth CLI - operator tooling for credentials and session tokens
//!
//! Reads the same environment as the API server so tokens issued here are
//! accepted there and vice versa.

use std::num::NonZeroU32;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use taskmate_auth::{
    AdminResolver, AuthConfig, BootstrapAdmin, TokenIssuer, TokenVerifier, DEFAULT_SECRET,
    DEFAULT_TOKEN_TTL_HOURS, MAX_TOKEN_TTL_HOURS,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Taskmate - manage password credentials and session tokens
#[derive(Parser, Debug)]
#[command(name = "taskmate")]
#[command(about = "Taskmate - manage password credentials and session tokens")]
#[command(version)]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    auth: AuthArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Authentication settings shared with the API server
#[derive(Args, Debug)]
struct AuthArgs {
    /// Token signing secret
    #[arg(long, env = "AUTH_SECRET", default_value = DEFAULT_SECRET, hide_env_values = true, global = true)]
    secret: String,

    /// Token lifetime in hours
    #[arg(
        long,
        env = "AUTH_TOKEN_HOURS",
        default_value_t = DEFAULT_TOKEN_TTL_HOURS,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_HOURS),
        global = true
    )]
    token_hours: i64,

    /// Comma separated admin emails
    #[arg(long, env = "ADMIN_EMAILS", default_value = "", global = true)]
    admin_emails: String,

    /// Bootstrap admin email (empty disables the bootstrap login)
    #[arg(long, env = "ADMIN_EMAIL", default_value = "", global = true)]
    admin_email: String,

    /// Bootstrap admin password
    #[arg(long, env = "ADMIN_PASSWORD", default_value = "", hide_env_values = true, global = true)]
    admin_password: String,

    /// Bootstrap admin display name
    #[arg(long, env = "ADMIN_NAME", global = true)]
    admin_name: Option<String>,

    /// PBKDF2 iteration count for new credentials
    #[arg(long, env = "PBKDF2_ITERATIONS", default_value = "150000", global = true)]
    pbkdf2_iterations: NonZeroU32,
}

impl AuthArgs {
    fn into_config(self) -> Result<AuthConfig> {
        let mut config = AuthConfig::new(&self.secret)
            .with_token_ttl_hours(self.token_hours)
            .context("Invalid AUTH_TOKEN_HOURS")?
            .with_admin_emails_csv(&self.admin_emails)
            .with_password_iterations(self.pbkdf2_iterations);

        if let Some(admin) = BootstrapAdmin::new(
            &self.admin_email,
            self.admin_password,
            self.admin_name.as_deref(),
        ) {
            config = config.with_bootstrap_admin(admin);
        }

        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hash a password into a storable `salt$digest` credential
    HashPassword {
        /// Plaintext password
        #[arg(long)]
        password: String,
    },

    /// Check a password against a stored credential
    #[command(long_about = r#"
Check a password against a stored credential. Prints "valid" or "invalid"
and exits with status 1 when the password does not match.

EXAMPLES:
  taskmate verify-password --password hunter2 \
    --hash 'MDEyMzQ1Njc4OWFiY2RlZg$YyuZS6MpQobNldJ2rlOjv72RN1l-JANYrmdlvE-g5kg'
    "#)]
    VerifyPassword {
        /// Plaintext password
        #[arg(long)]
        password: String,

        /// Stored credential
        #[arg(long)]
        hash: String,
    },

    /// Issue a signed session token
    #[command(long_about = r#"
Issue a signed session token for an account. The token is valid for
AUTH_TOKEN_HOURS and is signed with AUTH_SECRET.

EXAMPLES:
  AUTH_SECRET=prod-secret taskmate issue-token --subject-id 7 --email a@b.com

ENVIRONMENT VARIABLES:
  AUTH_SECRET        Token signing secret
  AUTH_TOKEN_HOURS   Token lifetime in hours (default: 24)
    "#)]
    IssueToken {
        /// Account id carried in the `sub` claim
        #[arg(long)]
        subject_id: i64,

        /// Account email carried in the `email` claim
        #[arg(long)]
        email: String,
    },

    /// Verify a session token and print the identity it carries
    VerifyToken {
        /// Token to verify
        #[arg(long)]
        token: String,
    },
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn run(command: Commands, config: AuthConfig) -> Result<ExitCode> {
    match command {
        Commands::HashPassword { password } => {
            let hasher = config.password_hasher();
            debug!(iterations = hasher.iterations().get(), "Hashing password");
            let credential = hasher.hash(&password).context("Failed to hash password")?;
            println!("{}", credential);
            Ok(ExitCode::SUCCESS)
        }
        Commands::VerifyPassword { password, hash } => {
            if config.password_hasher().verify(&password, &hash) {
                println!("valid");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("invalid");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::IssueToken { subject_id, email } => {
            let issuer = TokenIssuer::new(&config);
            let token = issuer
                .issue(subject_id, &email)
                .context("Failed to issue token")?;
            info!(
                subject_id,
                ttl_hours = issuer.ttl().num_hours(),
                "Issued session token"
            );
            println!("{}", token);
            Ok(ExitCode::SUCCESS)
        }
        Commands::VerifyToken { token } => {
            let verifier = TokenVerifier::new(&config);
            match verifier.verify(token.trim()) {
                Ok(identity) => {
                    let resolver = AdminResolver::new(Arc::new(config));
                    println!("subject_id: {}", identity.subject_id);
                    println!("email: {}", identity.email);
                    println!("admin: {}", resolver.is_admin(&identity));
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) if e.is_token_rejection() => {
                    warn!("Token rejected: {}", e);
                    println!("invalid: {}", e);
                    Ok(ExitCode::FAILURE)
                }
                Err(e) => Err(anyhow::Error::from(e).context("Failed to verify token")),
            }
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = cli.auth.into_config()?;
    if config.is_default_secret() {
        warn!("⚠️  AUTH_SECRET is the built-in default, set it before deploying");
    }
    debug!(?config, "Loaded auth configuration");

    run(cli.command, config)
}
