use std::fmt::{Debug, Display};

use streaming_platform::core::{get_subscriber, init_subscriber, AppConfig};
use streaming_platform::streaming_web_server::StreamingWebServer;
use tokio::task::JoinError;

use colored::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::new()?;

    let file_appender = tracing_appender::rolling::daily(
        &config.streaming_server_config.log_directory,
        "app",
    );
    let subscriber = get_subscriber("streaming_platform".into(), "info".into(), file_appender);
    init_subscriber(subscriber);

    let streaming_web_server = StreamingWebServer::build(config.clone()).await?;
    let port = streaming_web_server.port();

    let server_task = tokio::spawn(streaming_web_server.run_until_stopped());

    println!("{}", "-----------------------------------------".green());
    println!(
        "🚀 Server started on Addr: {}:{}",
        config.streaming_server_config.host, port
    );
    println!("{}", "-----------------------------------------".green());

    tokio::select! {
        outcome = server_task => report_exit("API server", outcome),
    }

    Ok(())
}

fn report_exit(task_name: &str, outcome: Result<Result<(), impl Debug + Display>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{} has exited", task_name)
        }
        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed",
                task_name
            )
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{}' task failed to complete",
                task_name
            )
        }
    }
}
