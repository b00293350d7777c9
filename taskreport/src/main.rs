use std::error::Error;
use std::sync::Arc;

use clap::Parser;

use taskreport::TaskReportBuilder;
use taskreport::config::ServerConfig;
use taskreport::mailer::HttpMailer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = ServerConfig::parse();
    let mailer = HttpMailer::new(&config.mail_endpoint, &config.mail_sender, &config.mail_token);

    let app = TaskReportBuilder::new(&config.database_url, Arc::new(mailer))
        .with_jwt_secret(&config.jwt_secret)
        .with_test_recipient(&config.test_recipient)
        .build()
        .await?;

    // Regenerate the job set from the subscriptions table before serving.
    app.resync_jobs().await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    log::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.router()).await?;

    Ok(())
}
