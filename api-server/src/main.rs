mod auth;
mod config;
mod handlers;
mod response;
mod types;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use crate::config::{AppState, ServerConfig};
use crate::handlers::{
    connect_session, gameplay_finished, gameplay_payload, get_rule, health, play_url, replay_url,
    session,
};

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/api/emulator/play", web::get().to(play_url))
        .route("/api/emulator/replay", web::get().to(replay_url))
        .route("/api/rules/{rule_id}", web::get().to(get_rule))
        .route("/api/gameplay/payload", web::post().to(gameplay_payload))
        .route("/api/gameplay/finished", web::post().to(gameplay_finished))
        .route("/api/session", web::get().to(session))
        .route("/api/session/connect", web::post().to(connect_session));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        "starting rives arcade api: bind_addr={} node_url={} chain_id={} contest_id={:?} wallet={} max_tape_bytes={} auth_required={}",
        config.bind_addr,
        config.host.node_url,
        config.host.chain_id,
        config.host.contest_id,
        config.host.wallet_rpc_url.is_some(),
        config.max_tape_bytes,
        config.api_key.is_some()
    );

    let state = AppState::new(&config);
    let _watch = state.arcade.spawn_wallet_watch();
    let _listener = state.arcade.spawn_wallet_listener();

    let json_limit = config.json_limit;
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::JsonConfig::default().limit(json_limit))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(config.bind_addr)?
    .run()
    .await
}
