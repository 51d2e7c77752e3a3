//! Constants for the SOL/USD price pollers
//!
//! Compile-time defaults for every poller and source. Runtime overrides are
//! read from the environment in the `config` module.

/// How often to poll the price source (in milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// HTTP request timeout when fetching prices (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Upper bound for a single poll cycle's fetch (in milliseconds)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = REQUEST_TIMEOUT_SECS * 1000;

/// Solana JSON-RPC endpoint
pub const SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Pyth SOL/USD price account on Solana mainnet
pub const PYTH_SOL_USD_PRICE_ACCOUNT: &str = "H6ARHf6YXhGYeQfUzQNGk6rDNnLBQKrenN712K4AQJEG";

/// Pyth Hermes price service base URL
pub const HERMES_API_URL: &str = "https://hermes.pyth.network";

/// Hermes endpoint for the latest price updates
pub const HERMES_LATEST_PRICE_ENDPOINT: &str = "/v2/updates/price/latest";

/// Pyth SOL/USD feed id
pub const PYTH_SOL_USD_FEED_ID: &str =
    "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";

/// Maximum accepted age of a Hermes price update (in seconds)
pub const DEFAULT_MAX_PRICE_AGE_SECS: u64 = 60;

/// Jupiter price API endpoint
pub const JUPITER_PRICE_URL: &str = "https://api.jup.ag/price/v3";

/// Wrapped SOL mint address
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "sol-price-feed/0.1.0";

/// Upper bound on the display precision a source may request
pub const MAX_DISPLAY_DECIMALS: u32 = 20;
