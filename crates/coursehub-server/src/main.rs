//! coursehub server
//!
//! Runs revocation-list housekeeping and exposes the session and enrollment
//! operations as subcommands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use coursehub_core::Config;
use coursehub_core::db::unix_timestamp;
use coursehub_server::auth::{Claims, JwtManager, Role};
use coursehub_server::notifications::{LogNotifier, Notifier};
use coursehub_server::server::{EnrollmentService, SessionService};
use coursehub_server::storage::CourseDatabase;

#[derive(Parser, Debug)]
#[command(name = "coursehub-server")]
#[command(
    version,
    about = "coursehub server - sessions, enrollment progress and certificates"
)]
struct Cli {
    /// Path to a JSON config file (layered over the global settings.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// JWT secret key.
    #[arg(
        long,
        global = true,
        env = "COURSEHUB_JWT_SECRET",
        default_value = "dev-secret-change-me",
        hide_env_values = true
    )]
    jwt_secret: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    /// OTLP endpoint for traces and metrics, e.g. `http://localhost:4317`.
    #[cfg(feature = "metrics")]
    #[arg(long, global = true, env = "COURSEHUB_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run housekeeping until interrupted
    Serve,
    /// Drop expired revocation records once and exit
    Prune,
    /// Create an account and print its first token pair
    Register {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "COURSEHUB_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "member")]
        role: Role,
    },
    /// Log in and print a token pair
    Login {
        username: String,
        #[arg(long, env = "COURSEHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Exchange a refresh token for a new access token
    Refresh { refresh_token: String },
    /// Revoke an access or refresh token
    Logout { token: String },
    /// Print the claims of an access token
    Whoami(TokenArg),
    /// Disable an account (admin only)
    DisableUser {
        #[command(flatten)]
        auth: TokenArg,
        user_id: String,
    },
    /// Create a course owned by the caller (lecturer or admin)
    CreateCourse {
        #[command(flatten)]
        auth: TokenArg,
        title: String,
    },
    /// Add a unit to a course
    AddUnit {
        #[command(flatten)]
        auth: TokenArg,
        course_id: String,
        title: String,
        #[arg(long, default_value_t = 0)]
        position: i64,
    },
    /// Activate or deactivate a course
    SetCourseActive {
        #[command(flatten)]
        auth: TokenArg,
        course_id: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Enroll the caller in a course
    Enroll {
        #[command(flatten)]
        auth: TokenArg,
        course_id: String,
    },
    /// Mark a unit watched (or unwatched) for the caller
    Watch {
        #[command(flatten)]
        auth: TokenArg,
        unit_id: String,
        #[arg(long)]
        unwatched: bool,
    },
    /// List the caller's enrollments
    Enrollments(TokenArg),
    /// Print the caller's certificate for a course
    Certificate {
        #[command(flatten)]
        auth: TokenArg,
        course_id: String,
    },
}

#[derive(Debug, clap::Args)]
struct TokenArg {
    /// Access token of the caller.
    #[arg(long, env = "COURSEHUB_TOKEN", hide_env_values = true)]
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    coursehub_core::tracing_init::init_tracing("coursehub_server=info", cli.log_json);

    #[cfg(feature = "metrics")]
    let metrics_guard = match &cli.otlp_endpoint {
        Some(endpoint) => Some(coursehub_core::metrics::init_metrics(endpoint)?),
        None => None,
    };

    let mut config = coursehub_core::config::load_config(cli.config.as_deref())?;
    if let Some(path) = &cli.db_path {
        config.database.path = Some(path.clone());
    }
    config.validate()?;

    let db_path = match &config.database.path {
        Some(path) => path.clone(),
        None => coursehub_core::config::database_path()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?,
    };
    info!(path = %db_path.display(), "Opening course database");
    let db = CourseDatabase::open(&db_path).await?;

    let jwt = Arc::new(JwtManager::new(
        cli.jwt_secret.as_bytes(),
        config.tokens.access_ttl_secs,
        config.tokens.refresh_ttl_secs,
    ));
    let notifier = build_notifier(&config);
    let sessions = SessionService::new(db.clone(), Arc::clone(&jwt), Arc::clone(&notifier))
        .with_refresh_rotation(config.tokens.rotate_refresh_tokens);
    let enrollments = EnrollmentService::new(db.clone(), notifier)
        .with_max_retries(config.enrollment.max_progress_retries);

    let result = run(cli.command, &config, &db, &sessions, &enrollments).await;

    #[cfg(feature = "metrics")]
    if let Some(guard) = metrics_guard {
        if let Err(e) = guard.shutdown() {
            warn!(error = %e, "Metrics shutdown failed");
        }
    }

    result
}

async fn run(
    command: Commands,
    config: &Config,
    db: &CourseDatabase,
    sessions: &SessionService,
    enrollments: &EnrollmentService,
) -> anyhow::Result<()> {
    let now = unix_timestamp();

    match command {
        Commands::Serve => serve(sessions, config.housekeeping.prune_interval_secs).await?,
        Commands::Prune => {
            let removed = sessions.revocations().prune_expired(now).await?;
            emit(&serde_json::json!({ "removed": removed }))?;
        }
        Commands::Register {
            username,
            email,
            password,
            role,
        } => emit(&sessions.register(&username, &email, &password, role, now).await?)?,
        Commands::Login { username, password } => {
            emit(&sessions.login(&username, &password, now).await?)?;
        }
        Commands::Refresh { refresh_token } => emit(&sessions.refresh(&refresh_token, now).await?)?,
        Commands::Logout { token } => {
            sessions.logout(&token, now).await?;
            emit(&serde_json::json!({ "revoked": true }))?;
        }
        Commands::Whoami(auth) => emit(&sessions.authenticate(&auth.token, now).await?)?,
        Commands::DisableUser { auth, user_id } => {
            admin(sessions, &auth, now).await?;
            sessions.disable_user(&user_id, now).await?;
            emit(&serde_json::json!({ "disabled": user_id }))?;
        }
        Commands::CreateCourse { auth, title } => {
            let claims = author(sessions, &auth, now).await?;
            let id = uuid::Uuid::new_v4().to_string();
            emit(&db.create_course(&id, &title, &claims.sub).await?)?;
        }
        Commands::AddUnit {
            auth,
            course_id,
            title,
            position,
        } => {
            author(sessions, &auth, now).await?;
            let id = uuid::Uuid::new_v4().to_string();
            emit(&db.create_unit(&id, &course_id, &title, position).await?)?;
        }
        Commands::SetCourseActive {
            auth,
            course_id,
            active,
        } => {
            author(sessions, &auth, now).await?;
            if !db.set_course_active(&course_id, active).await? {
                anyhow::bail!("Course {course_id} not found");
            }
            emit(&serde_json::json!({ "course_id": course_id, "active": active }))?;
        }
        Commands::Enroll { auth, course_id } => {
            let claims = sessions.authenticate(&auth.token, now).await?;
            emit(&enrollments.enroll(&claims.sub, &course_id, now).await?)?;
        }
        Commands::Watch {
            auth,
            unit_id,
            unwatched,
        } => {
            let claims = sessions.authenticate(&auth.token, now).await?;
            let enrollment = enrollments
                .mark_unit_watched(&claims.sub, &unit_id, !unwatched, now)
                .await?;
            emit(&enrollment)?;
        }
        Commands::Enrollments(auth) => {
            let claims = sessions.authenticate(&auth.token, now).await?;
            emit(&enrollments.list_enrollments(&claims.sub).await?)?;
        }
        Commands::Certificate { auth, course_id } => {
            let claims = sessions.authenticate(&auth.token, now).await?;
            emit(&enrollments.certificate(&claims.sub, &course_id).await?)?;
        }
    }

    Ok(())
}

/// Prune the revocation list on a fixed interval until Ctrl-C.
async fn serve(sessions: &SessionService, interval_secs: u64) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_secs, "Starting coursehub housekeeping"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sessions.revocations().prune_expired(unix_timestamp()).await {
                    Ok(removed) if removed > 0 => {
                        info!(removed, "Background revocation prune completed");
                    }
                    Err(e) => {
                        warn!(error = %e, "Background revocation prune failed");
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!("coursehub stopped");
    Ok(())
}

/// Authenticate a caller that may author catalog content.
async fn author(sessions: &SessionService, auth: &TokenArg, now: i64) -> anyhow::Result<Claims> {
    let claims = sessions.authenticate(&auth.token, now).await?;
    if claims.role == Role::Member {
        anyhow::bail!("Only lecturers and admins can edit the catalog");
    }
    Ok(claims)
}

/// Authenticate a caller that may manage accounts.
async fn admin(sessions: &SessionService, auth: &TokenArg, now: i64) -> anyhow::Result<Claims> {
    let claims = sessions.authenticate(&auth.token, now).await?;
    if claims.role != Role::Admin {
        anyhow::bail!("Only admins can disable accounts");
    }
    Ok(claims)
}

fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    #[cfg(feature = "webhook-notifications")]
    if let Some(url) = &config.notifications.webhook_url {
        match coursehub_server::notifications::WebhookNotifier::connect(url) {
            Ok(webhook) => {
                info!(url = %webhook.url(), "Notifications go to webhook");
                return Arc::new(webhook);
            }
            Err(e) => warn!(error = %e, "Webhook unavailable; logging notifications only"),
        }
    }

    #[cfg(not(feature = "webhook-notifications"))]
    if config.notifications.webhook_url.is_some() {
        warn!("webhook_url is set but this build lacks webhook-notifications; logging only");
    }

    Arc::new(LogNotifier)
}

#[allow(clippy::print_stdout)]
fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
