// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::common::config::Config;
use crate::oauth::OAuthRegistry;
use crate::services::{MailQueue, SessionCache, TokenService};
use crate::users::UserStore;

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub http: Client,
    pub config: Config,
    pub user_store: Arc<UserStore>,
    pub token_service: Arc<TokenService>,
    pub session_cache: Arc<SessionCache>,
    pub mail_queue: Arc<MailQueue>,
    pub oauth_registry: Arc<OAuthRegistry>,
}
