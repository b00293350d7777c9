//! Server configuration, from flags or environment.

use std::net::SocketAddr;

use clap::Parser;

/// Configuration for the server binary. Every option can come from the
/// environment, which is how deployments are expected to set them.
#[derive(Parser, Debug)]
#[command(
    name = "taskreport-server",
    about = "Task management API with scheduled email report subscriptions"
)]
pub struct ServerConfig {
    /// Database connection string, e.g. `sqlite:./taskreport.db?mode=rwc`.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Address the HTTP server binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind_addr: SocketAddr,

    /// Secret used to sign bearer tokens. Falls back to an insecure
    /// development default when empty.
    #[arg(long, env = "JWT_SECRET", default_value = "", hide_default_value = true)]
    pub jwt_secret: String,

    /// Mail API endpoint reports are posted to.
    #[arg(long, env = "MAIL_ENDPOINT")]
    pub mail_endpoint: String,

    /// Sender address for outgoing reports.
    #[arg(long, env = "MAIL_SENDER")]
    pub mail_sender: String,

    /// App-level credential for the mail API.
    #[arg(long, env = "MAIL_TOKEN")]
    pub mail_token: String,

    /// Recipient of /test-email notifications.
    #[arg(long, env = "TEST_MAIL_RECIPIENT", default_value = "ops@localhost")]
    pub test_recipient: String,
}
