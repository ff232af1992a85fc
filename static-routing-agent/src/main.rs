use clap::Parser;
use static_routing_agent::config::{Cli, Commands};
use static_routing_agent::http::Readiness;
use static_routing_agent::{Result, agent, http};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Agent(agent_args) => {
            setup_subscriber();

            let readiness = Readiness::default();
            let cancel = CancellationToken::new();
            let mut health_handle = tokio::spawn(http::serve(
                agent_args.health_address,
                readiness.clone(),
                cancel.child_token(),
            ));
            let mut agent_handle = tokio::spawn(agent::start(
                agent_args,
                readiness.token(),
                cancel.child_token(),
            ));
            let mut shutdown_handle = tokio::spawn(async move { shutdown_signal().await });
            // watch for shutdown and errors
            tokio::select! {
                h = &mut health_handle => exit("health", h),
                h = &mut agent_handle => exit("agent", h),
                _ = &mut shutdown_handle => {
                    cancel.cancel();
                    let (health, agent) = tokio::join!(health_handle, agent_handle);
                    exit("health", health);
                    exit("agent", agent);
                },
            };
            info!("Exiting...");
        }
        Commands::Crdgen => static_routing_crds::crd_gen_all()?,
    }
    Ok(())
}

fn setup_subscriber() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "static_routing=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(%e, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(%e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        _ = ctrl_c => {
            info!("captured ctrl_c signal");
        },
        _ = terminate => {
            info!("captured terminate signal");
        },
    }
}

fn exit(task: &str, out: Result<Result<()>, JoinError>) {
    match out {
        Ok(Ok(_)) => {
            info!("{task} exited")
        }
        Ok(Err(e)) => {
            error!("{task} failed with error: {e}")
        }
        Err(e) => {
            error!("{task} task failed to complete: {e}")
        }
    }
}
