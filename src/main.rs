//! readthru - read-through product cache
//!
//! Drives the cached product service and the product repository against the
//! configured store (in-memory, RocksDB, or an external memcached server).

// Use jemalloc for better multi-threaded performance
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::Parser;
use readthru::cli::{self, Cli};
use tokio::runtime::Builder;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let mut stdout = std::io::stdout().lock();
        cli::execute(cli, &mut stdout).await
    })
}
