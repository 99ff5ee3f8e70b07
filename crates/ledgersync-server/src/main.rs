use ledgersync_server::{ServerBuilder, init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match ledgersync_config::Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            shutdown_tracing();
            std::process::exit(1);
        }
    };

    match ServerBuilder::new(config).build().await {
        Ok(server) => {
            if let Err(err) = server.run().await {
                eprintln!("server error: {err}");
            }
        }
        Err(err) => eprintln!("failed to build server: {err}"),
    }

    shutdown_tracing();
}
