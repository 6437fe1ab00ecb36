use std::{path::PathBuf, sync::Arc};

use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use spend_card_engine::{
    prepare_redemption, preview, sign_and_store, Card, CardId, CardService, DelegationIssuer,
    DelegationStore, EngineConfig, JsonFileCardStore, LocalKeySigner, MemoryDirectory,
    PreparedRedemption, RedemptionIntent,
};
use spend_card_ledger::ReferenceLedger;
use spend_card_types::{build_scope, parse_amount, unix_now, AccountRef, ExecutionLedger};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Issue and inspect spend cards (periodic native-token spending delegations).
///
/// Cards are kept as one JSON file each under `--store-dir`. Nothing here talks to a chain:
/// `calldata` prints the transaction a delegatee would send, `simulate` runs it against an
/// in-process reference ledger.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Engine configuration (environment binding and timeouts).
    #[arg(long, env = "SPEND_CARD_CONFIG", default_value = "spend-card.json")]
    config: PathBuf,

    /// Directory holding card records.
    #[arg(long, env = "SPEND_CARD_STORE", default_value = "cards")]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a delegation from the treasury to a delegatee and store it as a card.
    Issue {
        /// Treasury owner key (hex string, 0x...).
        #[arg(long, env = "SPEND_CARD_KEY", hide_env_values = true)]
        key: String,

        /// Treasury smart account (delegator).
        #[arg(long)]
        treasury: AccountRef,

        /// Card holder (delegatee).
        #[arg(long)]
        delegatee: AccountRef,

        /// Allowance per period, in ether (eg 0.5).
        #[arg(long)]
        amount: String,

        /// Period length in seconds.
        #[arg(long)]
        period: u64,

        /// First period start (unix seconds). Defaults to now.
        #[arg(long)]
        start: Option<u64>,

        /// Restrict recipients (comma separated).
        #[arg(long, value_delimiter = ',')]
        allow: Vec<AccountRef>,
    },

    /// Print a card.
    Show { card_id: CardId },

    /// List the cards held by an account.
    List {
        #[arg(long)]
        delegatee: AccountRef,
    },

    /// Show the period window of a card at an instant.
    Preview {
        card_id: CardId,

        /// Unix seconds. Defaults to now.
        #[arg(long)]
        at: Option<u64>,
    },

    /// Run the local checks and print the `redeemDelegations` transaction.
    Calldata {
        card_id: CardId,

        #[arg(long)]
        recipient: AccountRef,

        /// Amount in ether.
        #[arg(long)]
        amount: String,

        #[arg(long)]
        at: Option<u64>,
    },

    /// Redeem against a funded in-process reference ledger.
    Simulate {
        card_id: CardId,

        #[arg(long)]
        recipient: AccountRef,

        /// Amount in ether.
        #[arg(long)]
        amount: String,

        /// Owner EOA of the treasury account.
        #[arg(long)]
        owner: Address,

        /// Treasury balance to start from, in ether.
        #[arg(long, default_value = "1000")]
        fund: String,

        #[arg(long)]
        at: Option<u64>,

        /// Amounts of earlier redemptions to replay first in the same period (comma separated).
        #[arg(long, value_delimiter = ',')]
        prior: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_json_file(&cli.config)
        .with_context(|| format!("failed loading config {}", cli.config.display()))?;
    let store: Arc<dyn DelegationStore> = Arc::new(JsonFileCardStore::new(&cli.store_dir));

    let output = match cli.command {
        Command::Issue {
            key,
            treasury,
            delegatee,
            amount,
            period,
            start,
            allow,
        } => {
            let signer = load_key(&key)?;
            let scope =
                build_scope(parse_amount(&amount)?, period, start)?.with_allow_list(allow);
            let issuer = DelegationIssuer::new(&config);
            let issued =
                sign_and_store(&issuer, store.as_ref(), &signer, treasury, delegatee, scope)
                    .await?;
            info!(card_id = %issued.card_id, signer = %signer.address(), "card stored");
            json!({ "card_id": issued.card_id.to_string() })
        }
        Command::Show { card_id } => card_json(&store.get_card(card_id).await?),
        Command::List { delegatee } => {
            let cards = store.list_cards_by_delegatee(delegatee).await?;
            Value::Array(cards.iter().map(card_json).collect())
        }
        Command::Preview { card_id, at } => {
            let card = store.get_card(card_id).await?;
            let at = at.unwrap_or_else(unix_now);
            let shown = preview(card.capability().scope(), at)?;
            json!({
                "card_id": card_id.to_string(),
                "at": at,
                "period_index": shown.window.index,
                "period_start": shown.window.start,
                "period_end": shown.window.end,
                "allowance_wei": shown.window.allowance.to_string(),
                "next_reset": rfc3339(shown.next_reset),
            })
        }
        Command::Calldata {
            card_id,
            recipient,
            amount,
            at,
        } => {
            let intent = RedemptionIntent {
                card_id,
                recipient,
                amount: parse_amount(&amount)?,
            };
            let prepared = prepare_redemption(
                store.as_ref(),
                &config.environment,
                &intent,
                at.unwrap_or_else(unix_now),
            )
            .await?;
            calldata_json(&prepared)
        }
        Command::Simulate {
            card_id,
            recipient,
            amount,
            owner,
            fund,
            at,
            prior,
        } => {
            let card = store.get_card(card_id).await?;
            let at = at.unwrap_or_else(unix_now);
            let ledger = ReferenceLedger::new(config.environment.clone())
                .with_clock(Arc::new(move || at));
            let treasury = card.capability().delegator();
            ledger.register_account(treasury, owner).await;
            ledger.fund(treasury, parse_amount(&fund)?).await;
            let ledger: Arc<dyn ExecutionLedger> = Arc::new(ledger);
            let service =
                CardService::new(&config, store, ledger, Arc::new(MemoryDirectory::new()));

            for earlier in &prior {
                let intent = RedemptionIntent {
                    card_id,
                    recipient,
                    amount: parse_amount(earlier)?,
                };
                service
                    .redeem(&intent, at)
                    .await
                    .with_context(|| format!("prior redemption of {earlier} ether failed"))?;
            }

            let intent = RedemptionIntent {
                card_id,
                recipient,
                amount: parse_amount(&amount)?,
            };
            match service.redeem(&intent, at).await {
                Ok(receipt) => json!({
                    "outcome": "executed",
                    "tx_hash": receipt.tx_hash.to_string(),
                    "amount_wei": receipt.amount.to_string(),
                    "period_index": receipt.window.index,
                    "treasury_balance_wei": service.treasury_balance(treasury).await?.to_string(),
                }),
                Err(e) => json!({
                    "outcome": "rejected",
                    "reason": e.to_string(),
                    "treasury_balance_wei": service.treasury_balance(treasury).await?.to_string(),
                }),
            }
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed serialising output")?
    );
    Ok(())
}

fn load_key(raw: &str) -> Result<LocalKeySigner> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let secret = hex::decode(hex_part).map_err(|e| anyhow!("key is not valid hex: {e}"))?;
    if secret.len() != 32 {
        return Err(anyhow!("key must be 32 bytes, got {}", secret.len()));
    }
    LocalKeySigner::from_slice(&secret).map_err(|e| anyhow!("invalid secp256k1 key: {e}"))
}

/// Transaction the delegatee would send. Addresses are rendered lower-case like every account.
fn calldata_json(prepared: &PreparedRedemption) -> Value {
    let submission = &prepared.submission;
    json!({
        "from": AccountRef::from(submission.sender).to_string(),
        "to": AccountRef::from(submission.to).to_string(),
        "value": "0",
        "data": format!("0x{}", hex::encode(&submission.calldata)),
        "period_index": prepared.window.index,
        "period_start": prepared.window.start,
    })
}

fn rfc3339(unix: u64) -> String {
    i64::try_from(unix)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| unix.to_string())
}

fn card_json(card: &Card) -> Value {
    let capability = card.capability();
    let scope = capability.scope();
    json!({
        "id": card.id().to_string(),
        "issued_to": card.issued_to().to_string(),
        "delegator": capability.delegator().to_string(),
        "delegatee": capability.delegatee().to_string(),
        "period_amount_wei": scope.period_amount().to_string(),
        "period_duration": scope.period_duration(),
        "start_date": scope.start_date(),
        "allow_list": scope.allow_list().iter().map(AccountRef::to_string).collect::<Vec<_>>(),
        "created_at": rfc3339(card.created_at()),
    })
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use spend_card_engine::MemoryCardStore;
    use spend_card_types::{Environment, SpendingScope};

    use super::*;

    const T0: u64 = 1_700_000_000;

    fn config() -> EngineConfig {
        EngineConfig::new(Environment {
            chain_id: 11_155_111,
            delegation_manager: "0xABCDEFabcdefABCDEFabcdefABCDEFabcdefABCD".parse().unwrap(),
            native_token_period_transfer_enforcer: Address::repeat_byte(0xe1),
            allowed_targets_enforcer: Address::repeat_byte(0xe2),
        })
    }

    #[test]
    fn key_accepts_prefixed_hex() {
        let key = format!("0x{}", "01".repeat(32));
        let signer = load_key(&key).unwrap();
        assert_eq!(signer.address(), load_key(&"01".repeat(32)).unwrap().address());
    }

    #[test]
    fn key_rejects_bad_hex_and_length() {
        let err = load_key("0xzz").err().expect("expected error");
        assert!(err.to_string().starts_with("key is not valid hex"));
        let err = load_key(&"01".repeat(31)).err().expect("expected error");
        assert!(err.to_string().contains("32 bytes"));
    }

    #[tokio::test]
    async fn calldata_renders_lowercase_accounts() {
        let config = config();
        let store = MemoryCardStore::new();
        let signer = load_key(&"07".repeat(32)).unwrap();
        let delegatee: AccountRef = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB".parse().unwrap();
        let scope = SpendingScope::new(U256::from(100u64), 60, T0, []).unwrap();
        let issued = sign_and_store(
            &DelegationIssuer::new(&config),
            &store,
            &signer,
            AccountRef::new(Address::repeat_byte(0xaa)),
            delegatee,
            scope,
        )
        .await
        .unwrap();

        let intent = RedemptionIntent {
            card_id: issued.card_id,
            recipient: AccountRef::new(Address::repeat_byte(0x11)),
            amount: U256::from(10u64),
        };
        let prepared = prepare_redemption(&store, &config.environment, &intent, T0 + 1)
            .await
            .unwrap();
        let json = calldata_json(&prepared);
        assert_eq!(json["from"], "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
        assert_eq!(json["to"], "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
        assert!(json["data"].as_str().unwrap().starts_with("0x"));
    }
}
