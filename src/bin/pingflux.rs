use clap::Parser;
use pingflux::{
    AddressFamily,
    config::read_config_file,
    iface,
    influx::InfluxClient,
    point::PointWriter,
    probe::{http::HttpProbe, ping::PingProbe},
    supervisor::{RestartPolicy, Supervisor},
};
use tracing::{debug, error, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Be verbose
    #[arg(short, long)]
    verbose: bool,

    /// Debugging output (implies verbose)
    #[arg(short, long)]
    debug: bool,

    /// Lookup interface addresses and exit (for diagnostic purposes)
    #[arg(long, value_name = "INTERFACE")]
    lookup: Option<String>,
}

fn init(verbose: bool, debug: bool) {
    let level = if debug {
        LevelFilter::TRACE
    } else if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![("pingflux", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(name) = &args.lookup {
        return lookup_interface(name);
    }

    let config = read_config_file(&args.config)?;
    let verbose = args.verbose || args.debug || config.core.verbose;
    let debug = args.debug || config.core.debug;
    init(verbose, debug);
    trace!("started with args: {args:?}");

    let influx = InfluxClient::new(&config.influxdb)?;
    influx.ping().await?;
    debug!("influxdb reachable, starting probes");

    let writer = PointWriter::new(influx, &config);

    let mut tasks = vec![];
    for family in [AddressFamily::V4, AddressFamily::V6] {
        let hosts = config.ping.hosts(family);
        if hosts.is_empty() {
            continue;
        }

        let probe = PingProbe::new(
            family,
            hosts.to_vec(),
            config.ping.srcaddr(family).cloned(),
            writer.clone(),
        );
        let supervisor = Supervisor::new(
            format!("{family}-pinger"),
            RestartPolicy::fixed(config.ping.restart_delay()),
        );
        tasks.push(tokio::spawn(async move {
            supervisor
                .run(move || {
                    let probe = probe.clone();
                    async move { probe.run().await }
                })
                .await;
        }));
    }

    if !config.http.urls.is_empty() {
        let http = HttpProbe::new(&config.http, writer.clone())?;
        tasks.push(tokio::spawn(http.run()));
    }

    for task in tasks {
        if let Err(e) = task.await {
            error!("{e}");
        }
    }

    Ok(())
}

fn lookup_interface(name: &str) -> anyhow::Result<()> {
    for family in [AddressFamily::V4, AddressFamily::V6] {
        match iface::lookup_addr(name, family) {
            Ok(ip) => println!("{family} addr {ip}"),
            Err(e) => eprintln!("{e:#}"),
        }
    }
    Ok(())
}
