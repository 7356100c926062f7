//! Terminal demo of the todo list screen.
//!
//! Runs the "Buy milk" walkthrough against the in-memory identity provider
//! and document store: sign in, add an item, mark it done, delete it, then
//! log out and dismiss the next sign-in.
//!
//! ```text
//! cargo run -p todolist --features demo
//! ```

use std::sync::Arc;
use std::time::Duration;
use synclist_core::identity::{PrincipalId, Session, SignInOutcome};
use synclist_testing::mocks::{InMemoryDocumentStore, MockAuthProvider};
use todolist::{AppConfig, MenuItem, ScreenPhase, TodoScreen};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STEP_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::default();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    synclist_runtime::metrics::register_metrics();

    println!("=== Todo List ===\n");

    let session = Session::new(PrincipalId::new("demo-user")).with_email("demo@example.com");
    let auth = MockAuthProvider::new().with_sign_in(SignInOutcome::Success(session));
    let documents = InMemoryDocumentStore::new();
    let mut screen = TodoScreen::new(&config, Arc::new(auth), Arc::new(documents));
    let mut stdout = std::io::stdout();

    println!("Signing in...");
    screen.start().await?;
    screen
        .wait_until(STEP_TIMEOUT, |s| s.screen.phase == ScreenPhase::Authenticated)
        .await?;
    screen.render(&mut stdout)?;

    println!("\nAdding 'Buy milk'...");
    screen.type_text("Buy milk");
    screen.submit().await?;
    screen
        .wait_until(STEP_TIMEOUT, |s| s.sync.items.len() == 1)
        .await?;
    screen.render(&mut stdout)?;

    println!("\nTapping 'Buy milk'...");
    screen.tap_label(0).await?;
    screen
        .wait_until(STEP_TIMEOUT, |s| s.sync.items.first().is_some_and(|i| i.item.is_done))
        .await?;
    screen.render(&mut stdout)?;

    println!("\nDeleting 'Buy milk'...");
    screen.tap_delete(0).await?;
    screen
        .wait_until(STEP_TIMEOUT, |s| s.sync.items.is_empty())
        .await?;
    screen.render(&mut stdout)?;

    println!("\nLogging out...");
    screen.select_menu(MenuItem::Logout).await?;
    screen
        .wait_until(STEP_TIMEOUT, |s| s.screen.phase == ScreenPhase::Terminated)
        .await?;
    println!("Sign-in dismissed, screen closed.");
    println!("Redraws: {}", screen.presentation().redraws());

    screen.shutdown().await?;

    println!("\n=== Demo Complete ===");
    Ok(())
}
