use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = cadenzactl::Cli::parse();
    if let Err(err) = cadenzactl::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
