use std::path::PathBuf;

use bitcoin::{Network, OutPoint};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lnrescue_key_deriv::{Bip32Mode, DerivationPath};
use lnrescue_primitives::keys::KeyFamily;
use lnrescue_recovery::zombie::FeePayer;

#[derive(Parser, Debug)]
#[command(
    name = "lnrescue",
    about = "Recover funds locked in Lightning channels from a seed or HSM secret",
    version
)]
pub(crate) struct Cli {
    #[arg(long, short = 'c', help = "the TOML config file")]
    pub(crate) config: Option<PathBuf>,

    #[arg(long, short = 'v', global = true, help = "log at debug level unless RUST_LOG is set")]
    pub(crate) verbose: bool,

    #[clap(flatten)]
    pub(crate) overrides: ConfigOverrides,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Flags that take precedence over the config file.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ConfigOverrides {
    #[arg(long, global = true, help = "the network the channels live on")]
    pub(crate) network: Option<Network>,

    #[arg(long, global = true, env = "LNRESCUE_ESPLORA_URL", help = "the esplora API url")]
    pub(crate) esplora_url: Option<String>,

    #[arg(long, global = true, help = "where result files are written")]
    pub(crate) results_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "how many indices a key family is scanned for")]
    pub(crate) key_scan_limit: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    DeriveKey(DeriveKeyArgs),

    ForceClose(ForceCloseArgs),

    ScbClose(ScbCloseArgs),

    SweepTimeLock(SweepTimeLockArgs),

    #[command(subcommand, about = "Close a channel neither party has state for")]
    Zombie(ZombieCommands),
}

impl Commands {
    /// The name the subcommand is invoked with.
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Commands::DeriveKey(_) => "derive-key",
            Commands::ForceClose(_) => "force-close",
            Commands::ScbClose(_) => "scb-close",
            Commands::SweepTimeLock(_) => "sweep-time-lock",
            Commands::Zombie(ZombieCommands::PrepareKeys(_)) => "zombie-prepare-keys",
            Commands::Zombie(ZombieCommands::MakeOffer(_)) => "zombie-make-offer",
            Commands::Zombie(ZombieCommands::SignOffer(_)) => "zombie-sign-offer",
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum ZombieCommands {
    PrepareKeys(PrepareKeysArgs),

    MakeOffer(MakeOfferArgs),

    SignOffer(SignOfferArgs),
}

/// Where keys come from. Exactly one source must be given.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub(crate) struct SecretSource {
    #[arg(
        long,
        env = "LNRESCUE_ROOT_KEY",
        hide_env_values = true,
        help = "the extended root key (xprv/tprv)"
    )]
    pub(crate) root_key: Option<String>,

    #[arg(long, help = "the hex wallet seed the root key is generated from")]
    pub(crate) seed_hex: Option<String>,

    #[arg(
        long,
        env = "LNRESCUE_HSM_SECRET",
        hide_env_values = true,
        help = "the hex 32 byte HSM secret"
    )]
    pub(crate) hsm_secret: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SecretArgs {
    #[clap(flatten)]
    pub(crate) source: SecretSource,

    #[arg(
        long,
        value_enum,
        default_value_t = Bip32ModeArg::Lnd,
        help = "how BIP32 children are derived from a root key"
    )]
    pub(crate) bip32_mode: Bip32ModeArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Bip32ModeArg {
    /// Plain BIP32.
    Standard,

    /// The derivation of lnd wallets, including its non-standard key padding.
    Lnd,
}

impl From<Bip32ModeArg> for Bip32Mode {
    fn from(mode: Bip32ModeArg) -> Self {
        match mode {
            Bip32ModeArg::Standard => Bip32Mode::Standard,
            Bip32ModeArg::Lnd => Bip32Mode::LndCompat,
        }
    }
}

fn parse_family(s: &str) -> Result<KeyFamily, String> {
    let number = s.parse::<u32>().map_err(|e| e.to_string())?;
    KeyFamily::try_from(number).map_err(|e| e.to_string())
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Derive a key and print it with its address and importable descriptor")]
pub(crate) struct DeriveKeyArgs {
    #[clap(flatten)]
    pub(crate) secret: SecretArgs,

    #[arg(long, value_parser = parse_family, help = "the key family number")]
    pub(crate) family: Option<KeyFamily>,

    #[arg(long, default_value_t = 0, help = "the index within the family")]
    pub(crate) index: u32,

    #[arg(
        long,
        conflicts_with = "family",
        help = "a full derivation path like m/1017'/0'/6'/0/0 (BIP32 only)"
    )]
    pub(crate) path: Option<DerivationPath>,

    #[arg(long, help = "the peer node key HSM channel keys are derived for")]
    pub(crate) peer: Option<secp256k1::PublicKey>,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Sign and optionally publish the latest commitment of every open channel")]
pub(crate) struct ForceCloseArgs {
    #[clap(flatten)]
    pub(crate) secret: SecretArgs,

    #[arg(long, help = "the JSON channel dump")]
    pub(crate) channel_dump: PathBuf,

    #[arg(long, help = "only close this channel")]
    pub(crate) chan_point: Option<OutPoint>,

    #[arg(long, help = "publish the signed commitments")]
    pub(crate) publish: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Sign and optionally publish the commitments cached in channel backups")]
pub(crate) struct ScbCloseArgs {
    #[clap(flatten)]
    pub(crate) secret: SecretArgs,

    #[arg(long, help = "the JSON channel dump holding the backups")]
    pub(crate) channel_dump: PathBuf,

    #[arg(long, help = "publish the signed commitments")]
    pub(crate) publish: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Sweep the time-locked outputs of published force closes")]
pub(crate) struct SweepTimeLockArgs {
    #[clap(flatten)]
    pub(crate) secret: SecretArgs,

    #[arg(long = "results", required = true, help = "force close result files")]
    pub(crate) results: Vec<PathBuf>,

    #[arg(long, help = "the address receiving the swept funds")]
    pub(crate) sweep_addr: String,

    #[arg(long, default_value_t = 2, help = "the fee rate in sat/vB")]
    pub(crate) fee_rate: u64,

    #[arg(long, help = "publish the sweep transaction")]
    pub(crate) publish: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Publish this node's candidate multisig keys for a match")]
pub(crate) struct PrepareKeysArgs {
    #[clap(flatten)]
    pub(crate) secret: SecretArgs,

    #[arg(long, help = "the match file")]
    pub(crate) match_file: PathBuf,

    #[arg(long, help = "the address this node wants to be paid to")]
    pub(crate) payout_addr: String,

    #[arg(long, help = "how many multisig keys to publish (defaults to the config value)")]
    pub(crate) num_keys: Option<u32>,

    #[arg(long, help = "where to write the prepared keys file")]
    pub(crate) output: PathBuf,
}

/// The terms both parties must agree on.
#[derive(Args, Debug, Clone)]
pub(crate) struct TermsArgs {
    #[arg(long, help = "the maker's balance in satoshis before fees")]
    pub(crate) maker_amount: u64,

    #[arg(long, default_value_t = 2, help = "the fee rate in sat/vB")]
    pub(crate) fee_rate: u64,

    #[arg(long, default_value_t = FeePayer::Even, help = "who pays the fee: maker, taker or even")]
    pub(crate) fee_payer: FeePayer,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Build and sign the closing offer from both prepared keys files")]
pub(crate) struct MakeOfferArgs {
    #[clap(flatten)]
    pub(crate) secret: SecretArgs,

    #[arg(long, help = "this node's prepared keys file")]
    pub(crate) our_keys: PathBuf,

    #[arg(long, help = "the other node's prepared keys file")]
    pub(crate) their_keys: PathBuf,

    #[clap(flatten)]
    pub(crate) terms: TermsArgs,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Check and countersign an offer, printing the final transaction")]
pub(crate) struct SignOfferArgs {
    #[clap(flatten)]
    pub(crate) secret: SecretArgs,

    #[arg(long, help = "this node's prepared keys file")]
    pub(crate) our_keys: PathBuf,

    #[arg(long, help = "the other node's prepared keys file")]
    pub(crate) their_keys: PathBuf,

    #[arg(long, help = "the base64 PSBT received from the maker")]
    pub(crate) offer: String,

    #[clap(flatten)]
    pub(crate) terms: TermsArgs,

    #[arg(long, help = "publish the signed transaction")]
    pub(crate) publish: bool,
}
