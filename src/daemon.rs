//! Host wiring: builds every component from [`Config`], seeds the registry,
//! starts the background loops and runs the console until shutdown.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::device::{AudioRouter, BluetoothCtl, DeviceController, Pactl, discover_endpoints};
use crate::error::Result;
use crate::network::convergence::ConvergenceLoop;
use crate::network::inbound::{Inbound, Listener};
use crate::network::transport::UdpTransport;
use crate::network::{Announcer, Offline, Outbound};
use crate::registry::Registry;
use crate::sync::{
    Actuator, Coordinator, Dispatcher, Reconciler, Request, load_seed_file, seed_discovered,
};
use crate::ui::Command;
use crate::ui::console::{ConsolePresenter, read_commands};

pub async fn run(config: Config) -> Result<()> {
    let controller: Arc<dyn DeviceController> = Arc::new(BluetoothCtl::new());
    let router: Arc<dyn AudioRouter> = Arc::new(Pactl::new());
    run_with(config, controller, router).await
}

/// Runs a host against the given device collaborators.
pub async fn run_with(
    config: Config,
    controller: Arc<dyn DeviceController>,
    router: Arc<dyn AudioRouter>,
) -> Result<()> {
    let local = config.host_id();
    info!(host = %local, "starting");

    let registry = Arc::new(Registry::new());
    let presenter = Arc::new(ConsolePresenter::new());

    let transport = if config.no_network {
        info!("networking disabled, running standalone");
        None
    } else {
        // a host that cannot bind cannot participate
        Some(Arc::new(
            UdpTransport::bind(config.listen_port, config.targets()).await?,
        ))
    };
    let outbound: Arc<dyn Outbound> = match &transport {
        Some(transport) => transport.clone(),
        None => Arc::new(Offline),
    };

    if let Err(e) = controller.power_on().await {
        warn!(error = %e, "failed to power on the adapter");
    }

    let actuator = Actuator::new(controller.clone(), router.clone(), config.retry_policy())
        .with_sinks(config.sink_match.clone(), config.fallback_sink.clone());
    let coordinator = Arc::new(
        Coordinator::new(
            local.clone(),
            registry.clone(),
            actuator,
            presenter.clone(),
            outbound.clone(),
        )
        .with_max_datagram(config.max_datagram)
        .with_claim_intents(config.claim_intents),
    );
    let reconciler = Arc::new(Reconciler::new(
        local.clone(),
        registry.clone(),
        presenter.clone(),
    ));

    let (requests, queue) = mpsc::channel(config.queue_depth.max(1));
    tokio::spawn(Dispatcher::new(queue, coordinator.clone()).run());

    let mut startup = Vec::new();
    if let Some(path) = &config.seed {
        let snapshot = load_seed_file(path)?;
        info!(path = %path.display(), endpoints = snapshot.len(), "loaded seed file");
        startup.extend(reconciler.reconcile(snapshot));
    }
    if !config.no_discovery {
        match discover_endpoints(controller.as_ref()).await {
            Ok(found) => startup.extend(seed_discovered(
                &registry,
                presenter.as_ref(),
                &local,
                &config.exclusion_group,
                found,
            )),
            Err(e) => warn!(error = %e, "paired device discovery failed"),
        }
    }
    let seeded = !registry.is_empty();
    for request in startup {
        if requests.send(request).await.is_err() {
            break;
        }
    }

    if let Some(transport) = transport {
        let inbound = Inbound::new(
            reconciler,
            registry.clone(),
            outbound.clone(),
            requests.clone(),
            config.max_datagram,
        );
        tokio::spawn(Listener::new(transport, inbound).run());

        let convergence = ConvergenceLoop::new(
            registry.clone(),
            outbound.clone(),
            config.ping_interval(),
            config.converge_timeout(),
        );
        let announcer = config.announce_interval().map(|interval| {
            Announcer::new(registry.clone(), outbound.clone(), interval, config.max_datagram)
        });
        tokio::spawn(async move {
            let outcome = convergence.run(seeded).await;
            info!(?outcome, "bootstrap finished");
            if let Some(announcer) = announcer {
                announcer.run().await;
            }
        });
    }

    let (commands_tx, mut commands) = mpsc::channel(16);
    let quit = commands_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = quit.blocking_send(Command::Quit);
    }) {
        error!(error = %e, "failed to install ctrl-c handler");
    }
    tokio::spawn(read_commands(commands_tx));

    let console = Console {
        registry,
        coordinator,
        router,
        presenter,
        requests,
        card_match: config.sink_match.clone(),
    };
    while let Some(command) = commands.recv().await {
        if !console.handle(command).await {
            break;
        }
    }

    info!("shutting down");
    Ok(())
}

/// Turns console commands into ownership requests and router calls.
struct Console {
    registry: Arc<Registry>,
    coordinator: Arc<Coordinator>,
    router: Arc<dyn AudioRouter>,
    presenter: Arc<ConsolePresenter>,
    requests: mpsc::Sender<Request>,
    card_match: String,
}

impl Console {
    /// Returns false once the console should stop.
    async fn handle(&self, command: Command) -> bool {
        let request = match command {
            Command::Quit => return false,
            Command::List => {
                println!("{}", self.presenter.render());
                return true;
            }
            Command::Profile(profile) => {
                if let Err(e) = self.router.set_profile(&self.card_match, profile).await {
                    warn!(%profile, error = %e, "failed to switch audio profile");
                }
                return true;
            }
            Command::Toggle(name) => match self.coordinator.toggle_request(&name) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, "ignoring toggle");
                    return true;
                }
            },
            Command::Claim(name) => Request::Claim { name },
            Command::Release(name) => Request::Release {
                name,
                successor: None,
            },
        };

        if !self.registry.contains(request.name()) {
            warn!(endpoint = request.name(), "unknown endpoint");
            return true;
        }
        self.requests.send(request).await.is_ok()
    }
}
