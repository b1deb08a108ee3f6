use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcq_deck::config::load_settings;
use mcq_deck::content::{StoreConfigResolver, store_from_config};
use mcq_deck::error::Result as AppResult;
use mcq_deck::practice::{PrefetchSchedule, QuestionLoader};
use mcq_deck::session::{SessionContext, SessionManagerHandle};
use mcq_deck::state::AppState;
use mcq_deck::web::run_server;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mcq_deck=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_settings = load_settings()?;
    tracing::info!("Configuration loaded: {:?}", app_settings);

    let store = store_from_config(&app_settings.content)?;
    let practice = Arc::new(app_settings.practice.clone());

    let context = SessionContext {
        loader: QuestionLoader::new(Arc::clone(&store), PrefetchSchedule::from_config(&practice)),
        resolver: Arc::new(StoreConfigResolver::new(Arc::clone(&store))),
        practice: Arc::clone(&practice),
    };

    let app_state = AppState {
        session_manager: SessionManagerHandle::spawn(32, context),
        store,
        practice,
    };

    let static_root = if app_settings.content.serve_static {
        app_settings.content.file_root.clone()
    } else {
        None
    };

    run_server(app_state, app_settings.server, static_root).await?;

    Ok(())
}
