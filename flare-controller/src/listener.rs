//! Tier TLS Listeners
//!
//! One mutually authenticated TLS listener per risk tier, each accepting
//! newline-delimited Alert JSON from sensors. The two tiers are independent
//! tasks; a stalled or failing connection on one tier never blocks the
//! other. Each connection is handled on its own task, and a malformed line
//! rejects that alert only.

use std::fs::File;
use std::io::BufReader as StdBufReader;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use flare_schema::RiskTier;

use crate::config::TierListenerConfig;
use crate::pipeline::process_alert;
use crate::AppState;

/// Bind and run one tier listener until the process stops.
pub async fn run_tier_listener(
    tier: RiskTier,
    config: TierListenerConfig,
    state: AppState,
) -> anyhow::Result<()> {
    let acceptor = build_acceptor(&config)
        .with_context(|| format!("{tier} tier TLS setup"))?;

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("bind {tier} tier listener on {}", config.bind_addr))?;
    tracing::info!("{tier} tier listening on {}", config.bind_addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("{tier} tier accept failed: {e}");
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let tls = match acceptor.accept(stream).await {
                Ok(tls) => tls,
                Err(e) => {
                    tracing::warn!("{tier} tier handshake with {peer} failed: {e}");
                    return;
                }
            };
            tracing::debug!("{tier} tier connection from {peer}");

            let mut lines = BufReader::new(tls).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match process_alert(&state, &line).await {
                        Ok(processed) => tracing::info!(
                            "{tier} tier processed alert {}",
                            processed.alert_id
                        ),
                        Err(e) => {
                            tracing::warn!("{tier} tier alert rejected: {e}")
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("{tier} tier read from {peer} failed: {e}");
                        break;
                    }
                }
            }
            tracing::debug!("{tier} tier connection from {peer} closed");
        });
    }
}

fn build_acceptor(config: &TierListenerConfig) -> anyhow::Result<TlsAcceptor> {
    let mut roots = RootCertStore::empty();
    for cert in read_certs(&config.ca_path)? {
        roots.add(cert)?;
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .context("client certificate verifier")?;

    let server_config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(read_certs(&config.cert_path)?, read_key(&config.key_path)?)
        .context("server certificate")?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn read_certs(path: &str) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("open {path}"))?;
    rustls_pemfile::certs(&mut StdBufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parse {path}"))
}

fn read_key(path: &str) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("open {path}"))?;
    rustls_pemfile::private_key(&mut StdBufReader::new(file))
        .with_context(|| format!("parse {path}"))?
        .with_context(|| format!("no private key in {path}"))
}
