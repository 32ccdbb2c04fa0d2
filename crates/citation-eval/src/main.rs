mod case;
mod cli;
mod engine;
mod fixture_io;
mod scripted;

use cli::{CliError, CliOptions};
use engine::run_eval;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "citation_eval=info,chat_core=warn".to_string()),
        )
        .init();

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(CliError::HelpRequested) => {
            print_usage();
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    match run_eval(&options).await {
        Ok(summary) => {
            summary.print();
            if summary.has_failures() {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("failed to run citation eval harness: {err}");
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    eprintln!(
        "Usage: cargo run -p citation-eval -- [--case <case_id>] [--update-goldens]\n\
         \n\
         Runs citation fixtures through the extraction pipeline and scripted\n\
         conversations through the chat service, comparing against goldens.\n\
         \n\
         Options:\n\
         - --case <case_id>  Run a single fixture\n\
         - --update-goldens  Rewrite goldens intentionally\n\
         - --help            Show this help text"
    );
}
