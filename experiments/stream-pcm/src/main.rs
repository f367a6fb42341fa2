use sotto_base::log;
use sotto_com::{Client, ServerMessage};
use std::time::Duration;

const DEFAULT_URL: &str = "ws://localhost:8766/rtstt";
// 30 ms at 16 kHz, 16-bit mono
const CHUNK_BYTES: usize = 960;
const CHUNK_PERIOD: Duration = Duration::from_millis(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sotto_base::init_stdout_logger();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: stream_pcm <file.pcm> [ws-url]");
        eprintln!("  file.pcm is raw 16-bit little-endian mono PCM at 16 kHz");
        std::process::exit(2);
    };
    let url = std::env::args().nth(2).unwrap_or_else(|| DEFAULT_URL.to_string());

    let audio = std::fs::read(&path)?;
    log::info!("streaming {} ({} bytes) to {}", path, audio.len(), url);

    let mut client = Client::connect(&url).await?;

    // Pace the file like a live microphone.
    let mut ticker = tokio::time::interval(CHUNK_PERIOD);
    for chunk in audio.chunks_exact(CHUNK_BYTES) {
        ticker.tick().await;
        client.send_chunk(chunk).await?;
    }
    client.send_eof().await?;

    while let Some(event) = client.next_event().await? {
        match event {
            ServerMessage::StartSpeaking => println!("[start speaking]"),
            ServerMessage::StopSpeaking => println!("[stop speaking]"),
            ServerMessage::Text { text } => println!("{}", text),
        }
    }
    log::info!("session ended");
    Ok(())
}
