use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use clarity_codec::{ClarityValue, StacksAddress};
use shc_core::{
    BloodType, ContentHash, ContractConfig, Network, PatientRecord, RecordUpdate, RequestBuilder,
    TransactionRequest,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shc")]
#[command(about = "Secure health record contract client CLI")]
struct Cli {
    /// Contract deployer address (defaults to SHC_CONTRACT_ADDRESS or the
    /// testnet deployment)
    #[arg(long, global = true)]
    contract_address: Option<String>,

    /// Contract name (defaults to SHC_CONTRACT_NAME or "PatientRecord")
    #[arg(long, global = true)]
    contract_name: Option<String>,

    /// Target network: mainnet or testnet (defaults to SHC_NETWORK or
    /// testnet)
    #[arg(long, global = true)]
    network: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a read-only patient record lookup
    BuildRead {
        /// Patient identifier
        patient_id: String,
    },
    /// Build a patient registration call
    BuildRegister {
        /// Patient identifier
        patient_id: String,
        /// Patient name
        name: String,
        /// Date of birth (YYYY-MM-DD)
        birth_date: String,
        /// Blood type (A+, A-, B+, B-, AB+, AB-, O+, O-, Unknown)
        blood_type: String,
    },
    /// Build a record update call pointing at new off-chain content
    BuildUpdate {
        /// Patient identifier
        patient_id: String,
        /// Content hash of the off-chain record (64 lowercase hex chars)
        content_hash: String,
    },
    /// Decode hex-encoded Clarity argument values
    DecodeArgs {
        /// One or more hex-encoded values
        hex_args: Vec<String>,
    },
    /// Validate a c32check Stacks address
    CheckAddress {
        /// The address to check
        address: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Arc::new(resolve_config(&cli)?);
    let builder = RequestBuilder::new(config);

    match cli.command {
        Commands::BuildRead { patient_id } => {
            let request = builder.read_record(&patient_id)?;
            print_request(&request);
        }
        Commands::BuildRegister {
            patient_id,
            name,
            birth_date,
            blood_type,
        } => {
            let record = PatientRecord {
                patient_id,
                name,
                date_of_birth: parse_birth_date(&birth_date)?,
                blood_type: BloodType::from_str(&blood_type)?,
            };
            let request = builder.register_patient(&record)?;
            print_request(&request);
        }
        Commands::BuildUpdate {
            patient_id,
            content_hash,
        } => {
            let update = RecordUpdate {
                patient_id,
                content_hash: ContentHash::new(&content_hash)?,
            };
            let request = builder.update_record(&update)?;
            print_request(&request);
        }
        Commands::DecodeArgs { hex_args } => {
            for (position, hex_arg) in hex_args.iter().enumerate() {
                match ClarityValue::from_hex(hex_arg) {
                    Ok(value) => println!("[{position}] {value}"),
                    Err(e) => eprintln!("[{position}] error: {e}"),
                }
            }
        }
        Commands::CheckAddress { address } => match address.parse::<StacksAddress>() {
            Ok(parsed) => {
                let network = if parsed.is_mainnet() { "mainnet" } else { "testnet" };
                println!("OK: {parsed} (version {}, {network})", parsed.version());
            }
            Err(e) => {
                eprintln!("Invalid address: {e}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<ContractConfig, Box<dyn std::error::Error>> {
    let address = cli
        .contract_address
        .clone()
        .or_else(|| std::env::var("SHC_CONTRACT_ADDRESS").ok());
    let name = cli
        .contract_name
        .clone()
        .or_else(|| std::env::var("SHC_CONTRACT_NAME").ok());
    let network = cli
        .network
        .clone()
        .or_else(|| std::env::var("SHC_NETWORK").ok());

    if address.is_none() && name.is_none() && network.is_none() {
        return Ok(ContractConfig::testnet_default()?);
    }

    let default = ContractConfig::testnet_default()?;
    let address = match address {
        Some(s) => s.parse::<StacksAddress>()?,
        None => *default.address(),
    };
    let name = name.unwrap_or_else(|| default.name().to_string());
    let network = match network {
        Some(s) => s.parse::<Network>()?,
        None => default.network(),
    };

    Ok(ContractConfig::new(address, &name, network)?)
}

fn parse_birth_date(input: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or("calendar epoch out of range")?;
    let days = (date - epoch).num_days();
    u64::try_from(days).map_err(|_| format!("birth date {input} precedes the Unix epoch").into())
}

fn print_request(request: &TransactionRequest) {
    println!("Contract:  {}", request.contract());
    println!("Function:  {}", request.function_name());
    println!("Network:   {}", request.network());
    println!("Arguments:");
    for (position, arg) in request.args().iter().enumerate() {
        println!("  [{position}] {arg}");
        println!("      hex: {}", arg.to_hex());
    }
    println!("Payload:   {}", hex::encode(request.wire_payload()));
}
