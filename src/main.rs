use clap::Parser;

use clawmon_lib::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    clawmon_lib::init_tracing(cli.verbose);

    if let Err(error) = clawmon_lib::run(cli).await {
        eprintln!("clawmon: {error}");
        std::process::exit(1);
    }
    // A blocked stdin read would otherwise hold the runtime open on shutdown.
    std::process::exit(0);
}
