//! REST API server example
//!
//! Runs the conversion service behind its HTTP API.
//!
//! ```text
//! cargo run --example conversion_server                  # codec from PATH ("compress")
//! cargo run --example conversion_server -- config.json   # settings from a JSON file
//! cargo run --example conversion_server -- --passthrough # copy codec, no executable needed
//! ```
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:5000/swagger-ui
//! - Convert a file via POST http://localhost:5000/api/process
//! - Download the result once via GET http://localhost:5000/api/download/<name>
//! - Stream events via GET http://localhost:5000/api/events

use ppconv::{Config, ConversionService, CopyCodec, run_with_shutdown};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let passthrough = args.iter().any(|a| a == "--passthrough");

    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => Config::from_json_file(Path::new(path))?,
        None => Config::default(),
    };

    let service = if passthrough {
        ConversionService::new(config.clone(), Arc::new(CopyCodec::new())).await?
    } else {
        ConversionService::with_default_codec(config.clone()).await?
    };
    let service = Arc::new(service);
    let address = config.api.bind_address;

    println!("Starting ppconv REST API server (codec: {})", service.codec_name());
    println!("Swagger UI: http://{}/swagger-ui", address);
    println!("Events stream: http://{}/api/events", address);
    println!();
    println!("Example commands:");
    println!("  # Compress a bitmap");
    println!("  curl -F file=@photo.bmp -F mode=compress http://{}/api/process", address);
    println!();
    println!("  # Download the result (once) using downloadUrl from the response");
    println!("  curl -OJ http://{}/api/download/processed_<token>.pp", address);

    let api_handle = service.spawn_api_server();

    run_with_shutdown((*service).clone()).await?;
    api_handle.abort();

    Ok(())
}
