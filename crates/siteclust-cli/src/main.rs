use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use siteclust_cli::cli::{Cli, Commands};

mod commands;

use crate::commands::util::configure_threads;
use crate::commands::{run, summary, validate};

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let result = match &cli.command {
        Some(Commands::Run {
            sites,
            settings,
            profiles,
            site_map,
            out,
            summary_out,
            profiles_out,
            diagnostics_out,
            threads,
        }) => {
            configure_threads(threads);
            info!(
                "Clustering sites from {} with settings {}",
                sites.display(),
                settings.display()
            );
            run::handle(&run::RunArgs {
                sites,
                settings,
                profiles: profiles.as_deref(),
                site_map: site_map.as_deref(),
                out,
                summary_out: summary_out.as_deref(),
                profiles_out: profiles_out.as_deref(),
                diagnostics_out: diagnostics_out.as_deref(),
            })
        }
        Some(Commands::Summary { sites, out, edges }) => {
            info!("Summarizing capacity by cost band for {}", sites.display());
            summary::handle(sites, out, edges.as_deref())
        }
        Some(Commands::Validate { settings }) => validate::handle(settings),
        None => {
            info!("No subcommand provided. Use `siteclust --help` for more information.");
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("command failed: {:?}", err);
        std::process::exit(1);
    }
}
