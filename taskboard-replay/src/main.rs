use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = taskboard_replay::logging::init() {
        eprintln!("failed to initialize logger: {}", e);
    }

    match taskboard_replay::run(std::env::args().skip(1)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("taskboard-replay: {}", e);
            ExitCode::FAILURE
        }
    }
}
