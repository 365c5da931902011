use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "scep", version, about = "SCEP client: enroll, renew and query X.509 certificates")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// CA endpoint URL, e.g. http://ca.example.com/cgi-bin/pkiclient.exe
    #[arg(long)]
    pub url: String,

    /// Client identity certificate (PEM)
    #[arg(long)]
    pub cert: PathBuf,

    /// Client RSA private key (PKCS#8 or PKCS#1 PEM)
    #[arg(long)]
    pub key: PathBuf,

    /// CA profile string, forwarded with every operation
    #[arg(long)]
    pub profile: Option<String>,

    /// SHA-256 fingerprint of a CA certificate to trust (hex, repeatable)
    #[arg(long = "trust-fingerprint")]
    pub trust_fingerprints: Vec<String>,

    /// Trust whatever CA certificate the server presents
    #[arg(long)]
    pub insecure_trust_any: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Query the CA capability set
    Caps,
    /// Fetch the CA (and RA) certificate chain
    CaCert,
    /// Fetch the next-generation CA chain ahead of a CA rollover
    Rollover,
    /// Submit a CSR and poll until the CA answers
    Enroll(EnrollArgs),
    /// Look up an issued certificate by its serial number
    Cert {
        /// Serial number, hex encoded
        #[arg(long)]
        serial: String,
    },
    /// Fetch the CA's CRL
    Crl,
}

#[derive(Args)]
pub struct EnrollArgs {
    /// PKCS#10 certificate signing request (PEM or DER)
    #[arg(long)]
    pub csr: PathBuf,

    /// Seconds to wait between polls while the CA answers PENDING
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Give up after this many polls
    #[arg(long, default_value_t = 20)]
    pub max_polls: u32,
}
