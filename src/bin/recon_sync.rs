use clap::Parser;
use recon_sync::{Connection, ReconcileSyncer, SyncError, SyncerConfig};
use std::path::Path;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
struct Opts {
    /// configuration file path.
    #[clap(short, long, default_value = "config.toml")]
    conf: String,
    /// log file path, if not specified, all log information will be output to stdout.
    #[clap(long)]
    log_path: Option<String>,
    /// run only one pass and exit.
    #[clap(long)]
    once: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts: Opts = Opts::parse();
    let collector = tracing_subscriber::fmt();
    let (non_blocking, _guard) = match opts.log_path {
        Some(ref path) => {
            let path = Path::new(path);
            let dir_name = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or("log path should contains a file name")?;
            let file_appender = tracing_appender::rolling::daily(dir_name, file_name);
            tracing_appender::non_blocking(file_appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    collector.with_writer(non_blocking).init();

    let conf = SyncerConfig::from_file(&opts.conf)?;
    info!(
        conf = %opts.conf,
        interval = ?conf.get_interval(),
        "Use the following config to reconcile."
    );

    // mappings are validated before any database is touched.
    let syncer = ReconcileSyncer::from_config(&conf, || {
        let conn = Connection::new(&conf)?;
        conn.check_permissions()?;
        Ok((conn.column_store(), conn.search_index()))
    });
    let syncer = match syncer {
        Ok(syncer) => syncer,
        Err(e @ SyncError::PermissionError { .. }) => {
            error!(?e, "Check permission failed.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    let interval = conf.get_interval();
    info!(mappings = syncer.mappings().len(), "Mappings validated.");

    if opts.once {
        let report = syncer.sync_configured()?;
        info!(?report, "Reconcile once complete.");
        return Ok(());
    }

    loop {
        match syncer.sync_configured() {
            Ok(report) => info!(?report, "Reconcile pass complete."),
            Err(e) => error!(?e, "Reconcile pass failed, retry in next interval."),
        }
        info!(?interval, "Wait for a while.....");
        std::thread::sleep(interval);
    }
}
