//! etcdxtl CLI
//!
//! Extended utilities that work on etcd db files directly.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use etcdxtl::{Config, Dumper, OutputFormat, Registry};
use tracing_subscriber::{fmt, EnvFilter};

/// etcdxtl
#[derive(Parser, Debug)]
#[command(name = "etcdxtl")]
#[command(about = "etcdxtl is an extend utils interact with etcd db")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dump keys and values from an etcd db file directly
    #[command(after_help = DUMP_KV_EXAMPLES)]
    DumpKv(DumpKvArgs),
}

const DUMP_KV_EXAMPLES: &str = "\
Supported kinds: v1 ConfigMap, Secret, Namespace, ServiceAccount and
coordination.k8s.io/v1 Lease. Records of other kinds are logged and skipped.

Examples:
  # dump configmap default/app-config
  etcdxtl dump-kv --db-path=db --key=/registry/configmaps/default/app-config

  # dump configmap default/app-config and all its history (if any)
  etcdxtl dump-kv --db-path=db --key=/registry/configmaps/default/app-config --history

  # dump secrets in default as json
  etcdxtl dump-kv --db-path=db --key=/registry/secrets/default/ --prefix --out=json

  # dump leases in kube-node-lease and all their history (if any)
  etcdxtl dump-kv --db-path=db --key=/registry/leases/kube-node-lease/ --prefix --history";

#[derive(clap::Args, Debug)]
struct DumpKvArgs {
    /// Path of the etcd db file
    #[arg(long, default_value = "")]
    db_path: PathBuf,

    /// Key to dump
    #[arg(long, default_value = "")]
    key: String,

    /// Treat the key as a prefix
    #[arg(long)]
    prefix: bool,

    /// Also dump historical versions
    #[arg(long)]
    history: bool,

    /// Output format, yaml or json
    #[arg(long = "out", default_value = "yaml")]
    out_format: OutputFormat,

    /// Directory to write dumped objects into
    #[arg(long, default_value = "/tmp")]
    output_dir: PathBuf,

    /// How long to wait for the db file lock, in milliseconds (at least 1)
    #[arg(long, default_value = "10000")]
    lock_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,etcdxtl=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::DumpKv(dump) => dump_kv(dump),
    };

    if let Err(e) = result {
        tracing::error!("dump kv return err: {}", e);
        std::process::exit(1);
    }
}

fn dump_kv(args: DumpKvArgs) -> etcdxtl::Result<()> {
    let config = Config::builder()
        .db_path(args.db_path)
        .key(args.key)
        .prefix(args.prefix)
        .history(args.history)
        .out_format(args.out_format)
        .output_dir(args.output_dir)
        .lock_timeout_ms(args.lock_timeout_ms)
        .build();
    config.validate()?;

    match serde_json::to_string(&config) {
        Ok(flags) => tracing::info!("dump kv with flag: {}", flags),
        Err(e) => tracing::debug!("could not render flags: {}", e),
    }

    let registry = Registry::with_builtin_kinds();
    let dumper = Dumper::new(config, &registry)?;
    let summary = dumper.run()?;

    tracing::info!(
        "etcdxtl v{}: wrote {} file(s) to {}",
        etcdxtl::VERSION,
        summary.emitted(),
        dumper.config().output_dir.display()
    );
    Ok(())
}
