use clap::Parser;

#[tokio::main]
async fn main() {
    if let Err(err) = llamma_cli::run(llamma_cli::args::Cli::parse()).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
