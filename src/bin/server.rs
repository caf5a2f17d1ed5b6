//! The venue server binary: loads config, wires every component
//! together and runs until a `Shutdown` command or Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{error, info, warn};

use venue::auth::{Authenticator, StaticCredentialStore};
use venue::bus::events::ServerCommand;
use venue::bus::Bus;
use venue::config::Config;
use venue::control;
use venue::coordinator::Coordinator;
use venue::domain::{ConnectionId, OrderIdGenerator, Ticker};
use venue::framing;
use venue::market::price_feed::PriceFeed;
use venue::market::MarketData;
use venue::protocol::BroadcastMessage;
use venue::session::{ChannelKind, SessionChannel, SessionManager};
use venue::transport::tcp::TcpTransport;
use venue::worker::WorkerPool;

#[derive(Parser, Debug)]
#[command(name = "venue-server")]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, default_value = "venue.toml", env = "VENUE_CONFIG")]
    config: String,
}

/// Stand-in for the out-of-scope `read_tickers()` collaborator
/// a fixed catalog used until a real source is wired in.
fn default_catalog() -> Vec<(Ticker, f32)> {
    ["AAPL", "MSFT", "GOOG", "AMZN", "TSLA"]
        .iter()
        .map(|s| (Ticker::new(s), 100.0))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config {}: {err}, using defaults", args.config);
            Config::default()
        }
    };

    let log_handle = venue::logging::init(&config.log);

    info!(config = ?config, "starting venue-server");

    let bus = Bus::new();
    let catalog = default_catalog();
    let worker_count = config.cpu.cores_app.len().max(1);
    let data = Arc::new(MarketData::build(&catalog, worker_count));
    let pool = Arc::new(WorkerPool::new(&config.cpu.cores_app));
    let order_ids = Arc::new(OrderIdGenerator::default());

    let coordinator = Arc::new(Coordinator::new(
        data.clone(),
        bus.market.clone(),
        pool.clone(),
        Duration::from_secs(config.rates.monitor_rate_secs.max(1)),
    ));
    coordinator.install();
    tokio::spawn(coordinator.clone().run_stats_loop());

    let session_manager = SessionManager::new(bus.system.clone());
    session_manager.install(&bus.market);

    // No real credential backing is in scope here (the design treats the
    // credential store as an external collaborator); a static store
    // stands in until one is plugged in.
    let credential_store = Arc::new(StaticCredentialStore::new(vec![("demo", "demo", 1)]));
    let authenticator = Authenticator::new(bus.system.clone(), credential_store);
    authenticator.install();

    let price_feed = Arc::new(Mutex::new(PriceFeed::new(
        data.clone(),
        Duration::from_millis(config.rates.price_feed_rate_ms.max(1)),
    )));

    let broadcast_socket = UdpSocket::bind("0.0.0.0:0").await?;
    broadcast_socket.set_broadcast(true)?;
    let broadcast_addr = format!("255.255.255.255:{}", config.network.port_udp);
    {
        let broadcast_socket = Arc::new(broadcast_socket);
        let market_bus = bus.market.clone();
        let socket = broadcast_socket.clone();
        market_bus.set_price_handler(move |price| {
            let socket = socket.clone();
            let addr = broadcast_addr.clone();
            tokio::spawn(async move {
                let msg = BroadcastMessage {
                    ticker: price.ticker,
                    price: price.price,
                };
                match framing::frame(&msg) {
                    Ok(bytes) => {
                        if let Err(err) = socket.send_to(&bytes, &addr).await {
                            warn!(%err, "broadcast send failed");
                        }
                    }
                    Err(err) => warn!(%err, "failed to frame broadcast message"),
                }
            });
        });
    }

    {
        let price_feed = price_feed.clone();
        let market_bus = bus.market.clone();
        bus.system.subscribe_command(move |command| match command {
            ServerCommand::PriceFeedStart => {
                let market_bus = market_bus.clone();
                price_feed.lock().start(move |price| market_bus.post_price(price));
            }
            ServerCommand::PriceFeedStop => price_feed.lock().stop(),
            _ => {}
        });
    }

    {
        let log_handle = log_handle.clone();
        bus.system.subscribe_command(move |command| match command {
            ServerCommand::LogLevelUp => venue::logging::level_up(&log_handle),
            ServerCommand::LogLevelDown => venue::logging::level_down(&log_handle),
            _ => {}
        });
    }

    spawn_upstream_acceptor(&config, bus.clone(), session_manager.clone(), order_ids.clone());
    spawn_downstream_acceptor(&config, bus.clone(), session_manager.clone(), order_ids.clone());

    let console_bus = bus.system.clone();
    let console_task = tokio::spawn(control::run_console(console_bus));

    bus.system.post_event(venue::bus::events::ServerEvent::Operational);

    let shutdown = shutdown_signal(bus.system.clone());
    tokio::select! {
        _ = console_task => {}
        _ = shutdown => {}
    }

    info!("shutting down");
    bus.system.post_event(venue::bus::events::ServerEvent::ShuttingDown);
    session_manager.close_all().await;
    pool.stop_all();

    Ok(())
}

/// Resolves once a `Shutdown` command is posted on the system bus or the
/// process receives Ctrl-C.
async fn shutdown_signal(system_bus: Arc<venue::bus::SystemBus>) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Mutex::new(Some(tx));
    system_bus.subscribe_command(move |command| {
        if *command == ServerCommand::Shutdown {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(());
            }
        }
    });

    tokio::select! {
        _ = rx => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

fn spawn_upstream_acceptor(
    config: &Config,
    bus: Bus,
    session_manager: Arc<SessionManager>,
    order_ids: Arc<OrderIdGenerator>,
) {
    let addr = format!("{}:{}", config.network.url, config.network.port_tcp_up);
    tokio::spawn(async move {
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(%err, addr, "failed to bind upstream listener");
                return;
            }
        };
        info!(addr, "upstream listener bound");
        let mut next_id: ConnectionId = 0;
        loop {
            let Ok((stream, peer)) = listener.accept().await else {
                continue;
            };
            let Ok(transport) = TcpTransport::new(stream) else {
                continue;
            };
            next_id += 1;
            let connection_id = next_id;
            info!(connection_id, %peer, "upstream connection accepted");
            let channel = SessionChannel::new(
                connection_id,
                ChannelKind::Upstream,
                Box::new(transport),
                bus.system.clone(),
                bus.market.clone(),
                order_ids.clone(),
            );
            session_manager.accept_upstream(channel.clone());
            tokio::spawn(channel.run());
        }
    });
}

fn spawn_downstream_acceptor(
    config: &Config,
    bus: Bus,
    session_manager: Arc<SessionManager>,
    order_ids: Arc<OrderIdGenerator>,
) {
    let addr = format!("{}:{}", config.network.url, config.network.port_tcp_down);
    tokio::spawn(async move {
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(%err, addr, "failed to bind downstream listener");
                return;
            }
        };
        info!(addr, "downstream listener bound");
        let mut next_id: ConnectionId = 1 << 32;
        loop {
            let Ok((stream, peer)) = listener.accept().await else {
                continue;
            };
            let Ok(transport) = TcpTransport::new(stream) else {
                continue;
            };
            next_id += 1;
            let connection_id = next_id;
            info!(connection_id, %peer, "downstream connection accepted");
            let channel = SessionChannel::new(
                connection_id,
                ChannelKind::Downstream,
                Box::new(transport),
                bus.system.clone(),
                bus.market.clone(),
                order_ids.clone(),
            );
            session_manager.accept_downstream(channel.clone());
            tokio::spawn(channel.run());
        }
    });
}
