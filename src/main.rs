use delta_cluster::delta::log::DeltaLog;
use delta_cluster::delta::storage::{ObjectStorage, Storage};
use delta_cluster::delta::table::Record;
use delta_cluster::network::bus::MessageBus;
use delta_cluster::network::types::Endpoint;
use delta_cluster::store::client::StoreClient;
use delta_cluster::store::local::LocalStorage;
use delta_cluster::store::server::StoreServer;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut data_dir = PathBuf::from("./cluster-data");
    let mut server_count: usize = 3;
    let mut tick_ms: u64 = 10;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" => {
                data_dir = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "--servers" => {
                server_count = args[i + 1].parse()?;
                i += 2;
            }
            "--tick-ms" => {
                tick_ms = args[i + 1].parse()?;
                i += 2;
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: {} [--data-dir <path>] [--servers <n>] [--tick-ms <ms>]",
                    args[0]
                );
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    tracing::info!(
        "Starting cluster: {} server(s), data dir {}, tick {} ms",
        server_count,
        data_dir.display(),
        tick_ms
    );

    // 1. Message bus and simulated network:
    let bus = MessageBus::new();
    bus.set_tick_interval(Duration::from_millis(tick_ms));
    bus.start();

    // 2. Store servers, one shard each:
    let mut servers = Vec::new();
    let mut server_endpoints = Vec::new();
    for i in 0..server_count {
        let endpoint = Endpoint::new("localhost", 9101 + i as u16);
        let storage = LocalStorage::new(data_dir.join(format!("server-{}", i)))?;
        servers.push(StoreServer::new(
            format!("server-{}", i),
            storage,
            bus.clone(),
            endpoint.clone(),
        ));
        server_endpoints.push(endpoint);
    }

    // 3. Client and storage facade:
    let client = StoreClient::new(
        bus.clone(),
        Endpoint::new("localhost", 9001),
        server_endpoints,
    );
    let storage: Arc<dyn Storage> = Arc::new(ObjectStorage::new(client));

    // 4. Object store sanity check:
    storage
        .write_object("demo/greeting", b"Hello, World!".to_vec())
        .await?;
    let greeting = storage.read_object("demo/greeting").await?;
    tracing::info!(
        "Object round trip: {}",
        String::from_utf8_lossy(&greeting)
    );

    // 5. Table workflow: insert, commit, then demonstrate a conflict.
    let log = DeltaLog::new(storage.clone(), "tables/customers");

    let tx = log.start_transaction().await?;
    tx.insert(&[
        customer("C001", "John Doe", "North"),
        customer("C002", "Alice Smith", "South"),
    ])
    .await?;
    let version = tx.commit("INSERT").await?;
    tracing::info!("Committed version {}", version);

    let tx1 = log.start_transaction().await?;
    let tx2 = log.start_transaction().await?;
    tx1.insert(&[customer("C003", "Bob Johnson", "East")]).await?;
    tx2.insert(&[customer("C004", "Emma Wilson", "West")]).await?;
    let version = tx1.commit("INSERT").await?;
    tracing::info!("First writer committed version {}", version);
    match tx2.commit("INSERT").await {
        Ok(version) => tracing::warn!("Second writer unexpectedly committed {}", version),
        Err(e) => tracing::info!("Second writer rejected as expected: {}", e),
    }

    let reader = log.start_transaction().await?;
    let records = reader.read_all().await?;
    tracing::info!(
        "Table at version {} holds {} record(s)",
        log.latest_version().await,
        records.len()
    );

    bus.stop().await;
    Ok(())
}

fn customer(id: &str, name: &str, region: &str) -> Record {
    HashMap::from([
        ("id".to_string(), id.to_string()),
        ("name".to_string(), name.to_string()),
        ("region".to_string(), region.to_string()),
    ])
}
