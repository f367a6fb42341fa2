use sotto_base::log;
use sotto_base::log_fatal;
use sotto_com::{SttServer, RTSTT_PATH};
use sotto_stt::{SileroVadPool, SttConfig, SttService, WebrtcChunkVad, WhisperPool};
use std::sync::Arc;

const DEFAULT_ADDR: &str = "0.0.0.0:8766";

fn usage() -> ! {
    eprintln!("usage: sotto_server [--debug] [--addr HOST:PORT]");
    std::process::exit(2);
}

#[tokio::main]
async fn main() {
    let mut debug = false;
    let mut addr = DEFAULT_ADDR.to_string();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--debug" => debug = true,
            "--addr" => addr = args.next().unwrap_or_else(|| usage()),
            _ => usage(),
        }
    }

    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    sotto_base::init_stdout_logger_at(level);

    let data_dir = std::env::var("SOTTO_DATA").unwrap_or_else(|_| "./".to_string());
    log::info!("data directory: {}", data_dir);

    let config = match SttConfig::load(&data_dir) {
        Ok(config) => config,
        Err(e) => log_fatal!("failed to load config: {}", e),
    };

    let fast_vad = match WebrtcChunkVad::new(&config) {
        Ok(gate) => Arc::new(gate),
        Err(e) => log_fatal!("failed to set up fast vad: {}", e),
    };
    let window_vad = Arc::new(SileroVadPool::new(&config));
    let transcriber = match WhisperPool::new(&config, &data_dir) {
        Ok(pool) => Arc::new(pool),
        Err(e) => log_fatal!("failed to set up transcriber: {}", e),
    };

    let service = match SttService::new(config, fast_vad, window_vad, transcriber) {
        Ok(service) => Arc::new(service),
        Err(e) => log_fatal!("failed to build service: {}", e),
    };

    // Blocks until every worker has loaded and warmed its model.
    log::info!("loading models");
    if let Err(e) = service.start() {
        log_fatal!("startup failed: {}", e);
    }

    let server = match SttServer::bind(addr.as_str(), Arc::clone(&service)).await {
        Ok(server) => server,
        Err(e) => log_fatal!("failed to bind {}: {}", addr, e),
    };
    log::info!("listening on ws://{}{}", server.local_addr(), RTSTT_PATH);

    tokio::signal::ctrl_c().await.ok();
    log::info!("shutting down");
    drop(server);
    service.close();
}
