//! Look up the referrers of an image manifest.
//!
//! ```text
//! referrers --hosts hosts.toml --artifact-type application/vnd.dev.sigstore.bundle \
//!     registry.example.com/library/app@sha256:...
//! ```

use std::io::Write as _;

use camino::Utf8PathBuf;
use clap::Parser;
use distribution::{ImageIndex, Reference};
use eyre::{Context as _, eyre};
use referrers::{HostsConfig, Resolver, default_hosts};
use registry_client::{Credentials, RegistryClient, Secret};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Find the artifacts which refer to an image manifest")]
struct Args {
    /// Image reference, including the manifest digest: `<host>/<repository>@<digest>`.
    reference: Reference,

    /// TOML file listing the registry's mirrors and origin.
    #[arg(long, value_name = "FILE")]
    hosts: Option<Utf8PathBuf>,

    /// Only return referrers with this artifact type. May be repeated.
    #[arg(long = "artifact-type", value_name = "TYPE")]
    artifact_types: Vec<String>,

    /// Bearer token for the registry.
    #[arg(long, env = "REGISTRY_TOKEN", conflicts_with = "username", hide_env_values = true)]
    token: Option<String>,

    /// Username for basic authentication.
    #[arg(long, env = "REGISTRY_USERNAME")]
    username: Option<String>,

    /// Password for basic authentication.
    #[arg(long, env = "REGISTRY_PASSWORD", requires = "username", hide_env_values = true)]
    password: Option<String>,

    /// Write the referrers index here instead of stdout.
    #[arg(long, short, value_name = "FILE")]
    output: Option<Utf8PathBuf>,

    /// Print one line per referrer instead of the raw index.
    #[arg(long)]
    summary: bool,
}

impl Args {
    fn credentials(&self) -> Credentials {
        match (&self.token, &self.username) {
            (Some(token), _) => Credentials::bearer(token.as_str()),
            (None, Some(username)) => Credentials::basic(
                username.as_str(),
                self.password.as_deref().map(Secret::from),
            ),
            (None, None) => Credentials::Anonymous,
        }
    }
}

fn summarize(args: &Args, data: &[u8]) -> eyre::Result<String> {
    let index = ImageIndex::from_slice(data).context("parsing referrers index")?;

    let mut out = String::new();
    for descriptor in index.filter_artifact_type(&args.artifact_types) {
        let digest = descriptor
            .digest
            .as_ref()
            .map(|digest| digest.to_string())
            .unwrap_or_else(|| "-".into());
        let artifact_type = descriptor.artifact_type.as_deref().unwrap_or("-");
        out.push_str(&format!(
            "{digest}\t{artifact_type}\t{}\t{}\n",
            descriptor.media_type, descriptor.size
        ));
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let digest = args
        .reference
        .digest()
        .cloned()
        .ok_or_else(|| eyre!("{} does not name a manifest digest", args.reference))?;

    let hosts = match &args.hosts {
        Some(path) => HostsConfig::load(path)?.hosts(&args.reference)?,
        None => default_hosts(&args.reference)?,
    };
    for host in &hosts {
        tracing::debug!(%host, capabilities = %host.capabilities(), "configured host");
    }

    let client = RegistryClient::new(args.reference.clone(), hosts, args.credentials());
    let resolver = Resolver::new(client);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let (content, descriptor) = resolver
        .fetch_referrers(&cancel, &digest, &args.artifact_types)
        .await
        .with_context(|| format!("fetching referrers of {}", args.reference))?;
    tracing::info!(
        size = descriptor.size,
        media_type = %descriptor.media_type,
        "found referrers"
    );

    let data = content
        .bytes_until_cancelled(&cancel)
        .await
        .context("reading referrers index")?;
    let output = if args.summary {
        summarize(&args, &data)?.into_bytes()
    } else {
        data.to_vec()
    };

    match &args.output {
        Some(path) => std::fs::write(path, &output).with_context(|| format!("writing {path}"))?,
        None => std::io::stdout().write_all(&output)?,
    }

    Ok(())
}
