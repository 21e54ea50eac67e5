//! Configuration management for the cube streamer.
//!
//! Options come from command-line arguments via clap, environment variables
//! with the `CUBE_` prefix, or defaults.
//!
//! # Environment Variables
//!
//! - `CUBE_HOST` - Server bind address (default: 0.0.0.0)
//! - `CUBE_PORT` - Server port (default: 3002)
//! - `CUBE_CACHE_TILES` - Tile cache capacity per open image (default: 1024)
//! - `CUBE_CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use clap::Parser;

use crate::tile::{DEFAULT_CACHE_CAPACITY, MAX_TILE_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3002;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Cube Streamer - a region-streaming server for large astronomical images.
///
/// Streams resolution-matched image regions to browser viewers over a
/// websocket, with lossy fixed-precision compression and server-side tile
/// caching.
#[derive(Parser, Debug, Clone)]
#[command(name = "cube-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "CUBE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "CUBE_PORT")]
    pub port: u16,

    /// Tile cache capacity per open image, in 256x256 tiles.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "CUBE_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Allowed CORS origins, comma separated. Omit to allow any origin.
    #[arg(long, env = "CUBE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose (debug) logging.
    #[arg(short, long, default_value_t = false, env = "CUBE_VERBOSE")]
    pub verbose: bool,
}

impl Config {
    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_tiles > MAX_TILE_CACHE_CAPACITY {
            return Err(format!(
                "cache-tiles {} exceeds the maximum of {}",
                self.cache_tiles, MAX_TILE_CACHE_CAPACITY
            ));
        }
        if self.port == 0 {
            return Err("port must be non-zero".to_string());
        }
        Ok(())
    }
}
