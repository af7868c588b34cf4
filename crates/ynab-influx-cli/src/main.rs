use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match ynab_influx_cli::run(std::env::args()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
