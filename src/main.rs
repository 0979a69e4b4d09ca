use chrono::Utc;
use log::{error, info, warn};
use std::process::ExitCode;
use std::sync::Arc;

use trusty_ballot::config::Config;
use trusty_ballot::memory::{Fixture, MemoryBackend, MemoryCookieStore};
use trusty_ballot::models::{Credentials, Role};
use trusty_ballot::{AuthStore, ResultsOutcome, SessionAdmin, VoteCoordinator};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fixture = match config.load_fixture() {
        Ok(Some(fixture)) => fixture,
        Ok(None) => Fixture::demo(Utc::now()),
        Err(e) => {
            error!("Failed to load fixture: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let backend = Arc::new(MemoryBackend::new(fixture, config.result_shape));

    let auth = Arc::new(AuthStore::new(
        backend.clone(),
        Arc::new(MemoryCookieStore::default()),
    ));
    auth.initialize();
    let identity = match auth.login(&Credentials::new(&config.email, &config.password)).await {
        Ok(identity) => identity,
        Err(e) => {
            error!("Login failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Landing on {}", identity.role.landing_route());

    // Admins land on the dashboard counters
    if identity.role == Role::Admin {
        let admin = SessionAdmin::new(backend.clone(), backend.clone(), auth.clone());
        match admin.stats().await {
            Ok(stats) => println!(
                "{} session(s) created, {} active, {} registered user(s)\n",
                stats.total_sessions, stats.active_sessions, stats.total_users
            ),
            Err(e) => warn!("Failed to load dashboard counters: {}", e),
        }
    }

    let coordinator = VoteCoordinator::new(backend.clone(), backend.clone(), backend.clone());
    let views = match coordinator.refresh_sessions(&identity.user_id).await {
        Ok(views) => views,
        Err(e) => {
            error!("Failed to load sessions: {}", e);
            return ExitCode::FAILURE;
        }
    };
    for view in &views {
        println!(
            "#{} {} [{}]{}",
            view.session.id,
            view.session.title,
            view.session.status,
            if view.has_voted { " (voted)" } else { "" }
        );
    }

    if let Some(cast) = &config.cast {
        match views.iter().find(|v| v.session.id == cast.session_id) {
            Some(view) => match coordinator
                .cast_vote(&view.session, &identity.user_id, Some(&cast.option))
                .await
            {
                Ok(()) => println!("Vote for '{}' recorded in session #{}", cast.option, cast.session_id),
                Err(e) => println!("Vote not recorded: {}", e),
            },
            None => warn!("No session #{} to vote in", cast.session_id),
        }
    }

    for view in coordinator.sessions() {
        match coordinator.load_results(&view.session).await {
            Ok(ResultsOutcome::Ready { tally, .. }) => {
                println!("\n== {} ==\n{}", view.session.title, tally.summary());
            }
            Ok(ResultsOutcome::Pending) => {
                println!("\n== {} ==\nResults pending until the session ends.", view.session.title);
            }
            Ok(ResultsOutcome::Unavailable) => {
                println!("\n== {} ==\nResults are not available yet.", view.session.title);
            }
            Ok(ResultsOutcome::NotStarted) => {}
            Err(e) => warn!("Failed to load results for session {}: {}", view.session.id, e),
        }
    }

    auth.logout().await;
    ExitCode::SUCCESS
}
