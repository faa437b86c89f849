use rollbook::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment: dotenv, data directory, logging
    setup_environment()?;

    // 2. Configuration
    let config = Config::from_env();
    tracing::info!(
        port = config.http_port,
        database = %config.database_path(),
        policy = ?config.overtime_policy,
        environment = %config.environment,
        "Rollbook starting"
    );

    // 3. State: database pool, employee manager, change ledger
    let state = ServerState::initialize(&config).await?;

    // 4. Serve until ctrl-c
    let server = Server::with_state(config, state);
    server.run().await?;

    Ok(())
}
