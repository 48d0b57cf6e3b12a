//! External codec invocation
//!
//! The codec is an opaque executable with a fixed contract:
//!
//! ```text
//! <executable> <compress|decompress> <inputPath> <outputPath>
//! ```
//!
//! It signals success with exit code 0 **and** a non-empty file at `outputPath`.
//! Whatever it writes to stderr is advisory.
//!
//! ## Architecture
//!
//! The core abstraction is the [`Codec`] trait, so the pipeline never depends
//! on a subprocess directly:
//!
//! - [`CliCodec`]: runs the external executable with a bounded wait
//! - [`CopyCodec`]: in-process stand-in that copies input to output byte for byte
//!
//! ## Usage
//!
//! ```no_run
//! use ppconv::codec::{CliCodec, Codec};
//! use ppconv::ConversionMode;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let codec = CliCodec::from_path("compress")
//!         .expect("codec binary not found")
//!         .with_timeout(Duration::from_secs(30));
//!
//!     let outcome = codec
//!         .invoke(ConversionMode::Compress, Path::new("in.bmp"), Path::new("out.pp"))
//!         .await?;
//!     println!("exit ok: {}", outcome.exit_succeeded);
//!     Ok(())
//! }
//! ```

mod cli;
mod copy;
mod traits;

pub use cli::CliCodec;
pub use copy::CopyCodec;
pub use traits::{Codec, CodecOutcome};
