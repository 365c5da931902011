#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::time::Duration;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Parser as _;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Decode, DecodePem, Encode, EncodePem};
use x509_cert::request::CertReq;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use scep_client::{
    Client, ClientIdentity, FingerprintPin, InsecureAcceptAll, TransactionState,
};

use cli::{Cli, Command, ConnectionArgs};

mod cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scep_client=info".into()),
        )
        .init();

    if let Err(error) = run(cli).await {
        tracing::error!(error = format!("{error:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let identity = load_identity(&cli.connection)?;
    let client = build_client(&cli.connection, identity)?;

    match cli.command {
        Command::Caps => {
            let capabilities = client.capabilities().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(
                    &serde_json::json!({ "capabilities": capabilities })
                )?
            );
        }
        Command::CaCert => {
            for certificate in client.ca_certificates().await? {
                print!("{}", certificate.to_pem(LineEnding::LF)?);
            }
        }
        Command::Rollover => {
            for certificate in client.rollover_certificates().await? {
                print!("{}", certificate.to_pem(LineEnding::LF)?);
            }
        }
        Command::Enroll(args) => {
            let csr = load_csr(&args.csr)?;
            let mut transaction = client.enroll(csr).await?;
            let mut state = transaction.send().await?.clone();

            let mut polls = 0;
            while matches!(state, TransactionState::Pending) {
                if polls >= args.max_polls {
                    bail!("enrollment still pending after {polls} polls, giving up");
                }
                polls += 1;
                tracing::info!(polls, "Enrollment pending, polling again");
                tokio::time::sleep(Duration::from_secs(args.poll_interval)).await;
                state = transaction.poll().await?.clone();
            }

            match state {
                TransactionState::Issued(store) => {
                    for certificate in store.certificates {
                        print!("{}", certificate.to_pem(LineEnding::LF)?);
                    }
                }
                TransactionState::NonExistent(fail_info) => {
                    bail!("CA rejected the enrollment: {fail_info}")
                }
                TransactionState::Pending => {}
            }
        }
        Command::Cert { serial } => {
            let serial_bytes = hex::decode(serial.trim_start_matches("0x"))
                .context("serial number is not valid hex")?;
            let serial = SerialNumber::new(&serial_bytes).context("invalid serial number")?;
            for certificate in client.certificate(serial).await? {
                print!("{}", certificate.to_pem(LineEnding::LF)?);
            }
        }
        Command::Crl => match client.crl().await? {
            Some(crl) => println!("{}", BASE64.encode(crl.to_der()?)),
            None => tracing::info!("The CA did not return a CRL"),
        },
    }

    Ok(())
}

fn load_identity(args: &ConnectionArgs) -> anyhow::Result<ClientIdentity> {
    let certificate_pem = std::fs::read(&args.cert)
        .with_context(|| format!("Failed to read certificate from {:?}", args.cert))?;
    let certificate = Certificate::from_pem(&certificate_pem)
        .context("identity certificate is not a PEM X.509 certificate")?;

    let key_pem = std::fs::read_to_string(&args.key)
        .with_context(|| format!("Failed to read private key from {:?}", args.key))?;
    let key = match RsaPrivateKey::from_pkcs8_pem(&key_pem) {
        Ok(key) => key,
        Err(_) => RsaPrivateKey::from_pkcs1_pem(&key_pem)
            .context("private key is neither PKCS#8 nor PKCS#1 PEM")?,
    };

    Ok(ClientIdentity::new(certificate, key)?)
}

fn build_client(args: &ConnectionArgs, identity: ClientIdentity) -> anyhow::Result<Client> {
    let client = if args.insecure_trust_any {
        Client::new(&args.url, identity, InsecureAcceptAll)?
    } else if args.trust_fingerprints.is_empty() {
        // No pin configured: report the fingerprint so the user can pin it,
        // and reject.
        Client::new(&args.url, identity, |certificate: &Certificate| {
            let fingerprint = certificate
                .to_der()
                .map(|der| hex::encode(Sha256::digest(der)))
                .unwrap_or_default();
            eprintln!(
                "Untrusted CA certificate (sha256 {fingerprint}); \
                 pass --trust-fingerprint {fingerprint} to pin it"
            );
            false
        })?
    } else {
        let mut pins = Vec::new();
        for fingerprint in &args.trust_fingerprints {
            let bytes = hex::decode(fingerprint).context("fingerprint is not valid hex")?;
            let bytes: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .context("fingerprint must be 32 bytes of hex")?;
            pins.push(bytes);
        }
        Client::new(&args.url, identity, FingerprintPin::new(pins))?
    };

    Ok(match &args.profile {
        Some(profile) => client.with_profile(profile.clone()),
        None => client,
    })
}

fn load_csr(path: &std::path::Path) -> anyhow::Result<CertReq> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read CSR from {path:?}"))?;
    if bytes.starts_with(b"-----BEGIN") {
        Ok(CertReq::from_pem(&bytes).context("CSR is not a PEM PKCS#10 request")?)
    } else {
        Ok(CertReq::from_der(&bytes).context("CSR is not a DER PKCS#10 request")?)
    }
}
