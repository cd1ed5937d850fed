//! End-to-end demo: a policy author grants access, a data source publishes
//! a few kits among decoys, and the recipient bootstraps and reads them.

use std::path::PathBuf;
use std::time::SystemTime;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use umbral_reader::config::Config;
use umbral_reader::grant::PolicyAuthor;
use umbral_reader::keystore::{EphemeralKeys, KeyFile, KeySource};
use umbral_reader::message_kit::DataSource;
use umbral_reader::network::LocalNetwork;
use umbral_reader::pre::{new_standard_params, KeyPair};
use umbral_reader::{decrypting_msg, generate_mayank, PolicyPayload, Result};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Policy label
    #[arg(long, default_value = "heart-data")]
    label: String,

    /// Message the data source encrypts
    #[arg(long, default_value = "resting heart rate: 61")]
    message: String,

    #[arg(long, default_value = "2")]
    threshold: usize,

    #[arg(long, default_value = "3")]
    shares: usize,

    /// Kits from unrelated data sources placed before the real one
    #[arg(long, default_value = "2")]
    decoys: usize,

    /// JSON reader configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where the recipient's keys are written
    #[arg(long, default_value = "mayank-keys.json")]
    keys: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn run(args: &Args) -> Result<Option<Vec<u8>>> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let params = new_standard_params();

    let keys = KeyFile::new(&args.keys);
    let (decrypting, signing) = EphemeralKeys.load(&params)?;
    keys.save(&decrypting, &signing)?;

    let author = PolicyAuthor::new(&params);
    let grant = author.grant(
        decrypting.public_key(),
        args.label.as_bytes(),
        args.threshold,
        args.shares,
    )?;
    author.metadata(&grant).save(&config.metadata_path)?;
    let mut network = LocalNetwork::new(args.shares)?;
    network.enact(&grant, decrypting.public_key())?;

    let enrico = DataSource::new(&grant.policy_pubkey);
    let mut kits = Vec::with_capacity(args.decoys + 1);
    for i in 0..args.decoys {
        let stranger = KeyPair::new(&params);
        let decoy = DataSource::new(stranger.public_key())
            .encrypt_message(&format!("decoy {}", i), SystemTime::now())?;
        kits.push(decoy.to_bytes());
    }
    kits.push(
        enrico
            .encrypt_message(&args.message, SystemTime::now())?
            .to_bytes(),
    );
    let payload = PolicyPayload {
        kits,
        data_source: enrico.verifying_key().to_bytes(),
    };

    let (mayank, policy_pubkey, author_vk, _) = generate_mayank(&config, &keys, network)?;
    decrypting_msg(&payload, &policy_pubkey, &mayank, &author_vk)
}

fn main() {
    let args = Args::parse();

    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .init();

    match run(&args) {
        Ok(Some(msg)) => println!("{}", String::from_utf8_lossy(&msg)),
        Ok(None) => {
            eprintln!("No kit could be decrypted");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
