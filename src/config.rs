//! CLI arguments and server configuration defaults.

use clap::Parser;

pub const UPLOAD_DIR: &str = "Upload";
pub const AUTH_REALM: &str = "LocalWeb";
pub const DEFAULT_AUTH_USER: &str = "localweb";
pub const DEFAULT_AUTH_PASS: &str = "localweb";
pub const DEFAULT_TLS_CERT: &str = "certs/cert.pem";
pub const DEFAULT_TLS_KEY: &str = "certs/key.pem";
pub const DEFAULT_MAX_TREE_DEPTH: usize = 32;
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied";
pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully";
pub const EMPTY_LISTING_MESSAGE: &str = "No files or directories found.";

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "localweb", version, about = "LocalWeb file sharing server")]
pub struct Args {
    #[arg(
        short = 'd',
        long,
        env = "LOCALWEB_DIR",
        default_value = ".localweb/share",
        help = "Directory to share"
    )]
    pub dir: String,
    #[arg(
        short = 'u',
        long,
        env = "LOCALWEB_USER",
        default_value = DEFAULT_AUTH_USER,
        help = "Basic auth username"
    )]
    pub user: String,
    #[arg(
        long,
        env = "LOCALWEB_PASSWORD",
        default_value = DEFAULT_AUTH_PASS,
        help = "Basic auth password"
    )]
    pub password: String,
    #[arg(
        short = 'b',
        long,
        env = "LOCALWEB_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP/HTTPS"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "LOCALWEB_HTTP_PORT",
        default_value_t = 8080,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(
        short = 'P',
        long,
        env = "LOCALWEB_HTTPS_PORT",
        default_value_t = 8443,
        help = "HTTPS port"
    )]
    pub https_port: u16,
    #[arg(
        short = 'c',
        long,
        env = "LOCALWEB_TLS_CERT",
        default_value = DEFAULT_TLS_CERT,
        help = "TLS cert path"
    )]
    pub tls_cert: String,
    #[arg(
        short = 'k',
        long,
        env = "LOCALWEB_TLS_KEY",
        default_value = DEFAULT_TLS_KEY,
        help = "TLS key path"
    )]
    pub tls_key: String,
    #[arg(long, env = "LOCALWEB_NO_TLS", help = "Only serve plain HTTP")]
    pub no_tls: bool,
    #[arg(long, env = "LOCALWEB_ACCESS_LOG", help = "Append access log lines to this file")]
    pub access_log: Option<String>,
    #[arg(
        long,
        env = "LOCALWEB_MAX_TREE_DEPTH",
        default_value_t = DEFAULT_MAX_TREE_DEPTH,
        help = "Max directory depth walked for tree views"
    )]
    pub max_tree_depth: usize,
}
