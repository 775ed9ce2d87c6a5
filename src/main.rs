use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloudops::{api, cli, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cloudops=debug,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Approval { command }) => {
            let state = AppState::connect(cfg).await;
            handle_approval_command(&state, command).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState::connect(cfg).await);

    let app = api::router()
        .with_state(state.clone())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.frontend_origin))
        .layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("cloudops API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// The dashboard origin is configurable; localhost is always allowed for dev.
fn cors_layer(frontend_origin: &str) -> CorsLayer {
    use axum::http::{HeaderName, Method};
    use tower_http::cors::AllowOrigin;

    let allowed = frontend_origin.to_string();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == allowed
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ])
        .allow_credentials(true)
}

/// Injects a unique X-Request-Id into every response so clients can correlate
/// errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn handle_approval_command(
    state: &AppState,
    cmd: cli::ApprovalCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::ApprovalCommands::List => {
            let requests = state.approvals.list_pending().await?;
            if requests.is_empty() {
                println!("No pending requests.");
                return Ok(());
            }
            println!(
                "{:<38} {:<12} {:<20} {:<14} REQUESTED BY",
                "ID", "ACTION", "INSTANCE", "REGION"
            );
            for r in requests {
                println!(
                    "{:<38} {:<12} {:<20} {:<14} {}",
                    r.request_id, r.action, r.instance_id, r.region, r.requested_by
                );
            }
        }
        cli::ApprovalCommands::Approve { request_id } => {
            if state.approvals.approve(&request_id).await? {
                println!("Request {} approved.", request_id);
            } else {
                println!("Request {} not found or not pending.", request_id);
            }
        }
        cli::ApprovalCommands::Reject { request_id } => {
            if state.approvals.reject(&request_id).await? {
                println!("Request {} rejected.", request_id);
            } else {
                println!("Request {} not found or not pending.", request_id);
            }
        }
    }
    Ok(())
}
