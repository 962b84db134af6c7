use crate::config::Config;
use crate::middleware::AdminSessionGate;
use actix_web::web;

pub mod admin;
pub mod public;
pub mod upload;

/// Every site route. The login and admin scopes expect a session middleware
/// around the app.
pub fn config_site(cfg: &mut web::ServiceConfig, config: &Config) {
    cfg.configure(public::config_api)
        .service(web::scope(&config.login_path()).configure(admin::config_login))
        .service(
            web::scope(&config.admin_path())
                .wrap(AdminSessionGate)
                .configure(admin::config_dashboard),
        );
}
