use captains_log::recipe;
use clap::Parser;
use courier_rpc::registry::{Registry, RegistryOptions, TYPE_ROUND_ROBIN};

/// Standalone service registry for courier-rpc servers and clients.
#[derive(Parser, Debug)]
#[command(name = "courier-registry", version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 9999)]
    port: u16,

    /// Multiplier on a replica's heartbeat period before it counts as
    /// dead.
    #[arg(long, default_value_t = 3.0)]
    timeout_factor: f64,

    /// Load balancing strategy.
    #[arg(long, default_value = TYPE_ROUND_ROBIN)]
    balance: String,

    /// Log file path.
    #[arg(long, default_value = "/tmp/courier_registry.log")]
    log_file: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    recipe::raw_file_logger(&args.log_file, log::Level::Info).build().expect("log setup");
    let registry = Registry::new(RegistryOptions {
        timeout_factor: args.timeout_factor,
        load_balance: args.balance,
    })
    .expect("construct registry");
    if let Err(e) = registry.run(args.port).await {
        eprintln!("registry exited: {}", e);
        std::process::exit(1);
    }
}
