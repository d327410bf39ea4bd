//! `rfsn-server`: the REST/WebSocket thin view as a standalone binary.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "rfsn-server", about = "HTTP/WebSocket thin view over kernel sessions")]
struct Cli {
    /// Address to bind, e.g. `0.0.0.0:8080`.
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: String,
    /// Root directory new sessions' working directories and ledgers are
    /// created under.
    #[arg(long, default_value = "./tmp/server")]
    root: PathBuf,
    /// Enables `host_exec` alongside `sandboxed_exec` for every session
    /// this process creates.
    #[arg(long)]
    dev_mode: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();

    if let Err(e) = std::fs::create_dir_all(&cli.root) {
        eprintln!("failed to create session root {}: {e}", cli.root.display());
        std::process::exit(2);
    }

    let app = kernel_server::AppState::new(cli.root, cli.dev_mode);
    let router = kernel_server::build_router(app);

    let listener = match tokio::net::TcpListener::bind(&cli.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {}: {e}", cli.bind);
            std::process::exit(2);
        }
    };

    tracing::info!(bind = %cli.bind, "rfsn-server listening");
    if let Err(e) = axum::serve(listener, router).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}
