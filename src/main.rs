use promoflow::app::{execute, USAGE};
use promoflow::errors::EXIT_USAGE;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                             .init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = match execute(&args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[promoflow] {e}");
            if e.exit_code() == EXIT_USAGE {
                eprintln!("{USAGE}");
            }
            e.exit_code()
        }
    };
    std::process::exit(code);
}
