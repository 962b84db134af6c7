use actix_cors::Cors;
use actix_web::{web, App, HttpServer, middleware::{Logger, DefaultHeaders}, cookie::Key};
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use eventsite::{
    config::Config,
    models::remote_operations::RemoteClient,
    routes,
    AppState,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::convert::TryFrom;

#[derive(Parser, Debug)]
#[command(name = "eventsite_server", author, version, about = "Starts the event site server.")]
struct Cli {
    /// Path to the .env configuration file. Defaults to `.env` when present.
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(cli.env_file.as_deref())
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let remote = Arc::new(
        RemoteClient::new(&config.api_url, config.remote_timeout())
            .expect("FATAL: Failed to build the remote collection client."),
    );
    log::info!("Using remote collection service at {}", remote.base_url());

    let app_state = web::Data::new(AppState::new(remote));
    app_state.activate().await;

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .expect("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        let cors = {
            let allowed_origins_str = &config.allowed_origins;
            let cors = if allowed_origins_str.trim() == "*" {
                Cors::default().allow_any_origin()
            } else {
                allowed_origins_str
                    .split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            };
            cors.allowed_methods(vec!["GET", "POST", "DELETE"])
                .allowed_headers(vec![actix_web::http::header::ACCEPT, actix_web::http::header::CONTENT_TYPE])
                .supports_credentials()
                .max_age(3600)
        };

        let mut app = App::new()
            .wrap(session_mw)
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block"))
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(app_state.clone())
            .configure(|cfg| routes::config_site(cfg, &config));

        // The built front end, registered last so it never shadows a route.
        if let Some(static_path) = &config.static_path {
            app = app.service(actix_files::Files::new("/", static_path).index_file("index.html"));
        }
        app
    })
    .bind(server_address)?
    .run()
    .await
}
