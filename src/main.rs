mod commands;

use commands::Context;
use rust_mtar::cli::{Cli, Commands};
use rust_mtar::config::Config;
use rust_mtar::error::Result;
use rust_mtar::logger;
use rust_mtar::tape_ops::QueueRequest;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse_args();

    // Initialize logging system
    logger::init(args.verbose, args.log_json)?;

    debug!("RustMtar CLI starting");

    match run(args).await {
        Ok(_) => {
            info!("Operation completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Operation failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let ctx = Context::new(&args, config);

    match args.command {
        Commands::Find { target } => commands::find::execute(&ctx, target).await,

        Commands::List { target } => commands::list::execute(&ctx, target).await,

        Commands::New { record } => commands::new::execute(&ctx, record).await,

        Commands::Queue {
            tape,
            tar,
            basedir,
            force_update,
            paths,
        } => {
            let request = QueueRequest {
                tape,
                segment: tar,
                base_dir: basedir,
                force_update,
                paths,
            };
            commands::queue::execute(&ctx, request).await
        }

        Commands::Write { tape, tar } => commands::write::execute(&ctx, tape, tar).await,

        Commands::Status => commands::status::execute(&ctx).await,

        Commands::Eject => commands::eject::execute(&ctx).await,
    }
}
