use axum::{Router, response::Json, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vetora_auth_axum::{AuthUser, MaybeAuthUser, VETORA_ROUTE_PREFIX, init, vetora_auth_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing("demo_server");

    init().await?;

    let app = Router::new()
        .route("/", get(index))
        .route("/protected", get(protected))
        .nest(VETORA_ROUTE_PREFIX.as_str(), vetora_auth_router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP server listening on {}", addr);

    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

/// Public page: works for anonymous and signed-in callers alike.
async fn index(MaybeAuthUser(user): MaybeAuthUser) -> Json<Value> {
    match user {
        Some(user) => Json(json!({
            "message": format!("Hello, {}!", user.display_name),
            "role": user.role,
        })),
        None => Json(json!({
            "message": "Hello, anonymous visitor!",
        })),
    }
}

/// Requires a valid bearer token; rejects with 401 otherwise.
async fn protected(auth_user: AuthUser) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to the protected area, {}", auth_user.display_name),
        "userId": auth_user.id,
        "role": auth_user.role,
    }))
}

fn init_tracing(app_name: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            format!(
                "vetora_auth_axum=trace,vetora_auth=trace,{app_name}=trace,info"
            )
            .into()
        }

        #[cfg(not(debug_assertions))]
        {
            "info".into()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("You can increase verbosity by setting the RUST_LOG environment variable.");
}
