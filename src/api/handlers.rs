use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use log::warn;

use std::sync::Mutex;

use super::schema::{
    AccountResponse, BalanceResponse, CreateAccountRequest, ErrorResponse, FaucetClaimRequest,
    MineRequest, MineResponse, RegisterMinerRequest, TransactionRequest, TransactionResponse,
    ValidateResponse,
};
use crate::blockchain::account::AccountError;
use crate::blockchain::{
    Block, Blockchain, BlockchainError, ChainStats, CompetitionOutcome, FaucetEligibility,
    FaucetInfo, Miner, SchedulerConfig, SchedulerReport, SchedulerStatus, Transaction,
};

/// Shared ledger; every handler goes through this one lock
pub type LedgerData = web::Data<Mutex<Blockchain>>;

fn error_status(err: &BlockchainError) -> StatusCode {
    match err {
        BlockchainError::AccountError(AccountError::DuplicateAlias(_))
        | BlockchainError::AccountError(AccountError::DuplicateAddress(_))
        | BlockchainError::SchedulerAlreadyRunning => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn error_response(err: &BlockchainError) -> HttpResponse {
    let remaining_ms = match err {
        BlockchainError::FaucetIneligible { remaining_ms, .. } => *remaining_ms,
        _ => None,
    };

    HttpResponse::build(error_status(err)).json(ErrorResponse {
        error: err.to_string(),
        remaining_ms,
    })
}

fn ledger_result<T>(result: Result<T, BlockchainError>) -> Result<T, HttpResponse> {
    result.map_err(|err| error_response(&err))
}

/// Runs `f` with the ledger locked, on the blocking pool
///
/// Mining holds the lock for a whole proof-of-work search, so waiting for it
/// must not park an actix worker.
async fn with_ledger<F, R>(ledger: &LedgerData, f: F) -> Result<R, HttpResponse>
where
    F: FnOnce(&mut Blockchain) -> R + Send + 'static,
    R: Send + 'static,
{
    let shared = ledger.clone();
    let result = web::block(move || {
        let mut ledger = shared.lock().ok()?;
        Some(f(&mut *ledger))
    })
    .await;

    match result {
        Ok(Some(value)) => Ok(value),
        Ok(None) => {
            warn!("Ledger lock is poisoned");
            Err(HttpResponse::InternalServerError().json(ErrorResponse::new("Ledger state is unavailable")))
        }
        Err(err) => Err(HttpResponse::InternalServerError()
            .json(ErrorResponse::new(format!("Ledger task failed: {}", err)))),
    }
}

/// Get chain statistics
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Chain statistics", body = ChainStats)
    )
)]
pub async fn get_chain_stats(ledger: LedgerData) -> impl Responder {
    match with_ledger(&ledger, |ledger| ledger.stats()).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(response) => response,
    }
}

/// List all blocks
#[utoipa::path(
    get,
    path = "/api/v1/blocks",
    responses(
        (status = 200, description = "All blocks, genesis first", body = Vec<Block>)
    )
)]
pub async fn get_blocks(ledger: LedgerData) -> impl Responder {
    match with_ledger(&ledger, |ledger| ledger.blocks().to_vec()).await {
        Ok(blocks) => HttpResponse::Ok().json(blocks),
        Err(response) => response,
    }
}

/// Get a block by height
#[utoipa::path(
    get,
    path = "/api/v1/blocks/{index}",
    params(
        ("index" = usize, Path, description = "Zero-based block height")
    ),
    responses(
        (status = 200, description = "Block found", body = Block),
        (status = 404, description = "No block at this height", body = ErrorResponse)
    )
)]
pub async fn get_block(ledger: LedgerData, index: web::Path<usize>) -> impl Responder {
    let index = index.into_inner();
    let lookup = with_ledger(&ledger, move |ledger| (ledger.block(index).cloned(), ledger.height())).await;

    match lookup {
        Ok((Some(block), _)) => HttpResponse::Ok().json(block),
        Ok((None, height)) => HttpResponse::NotFound().json(ErrorResponse::new(format!(
            "Block {} not found (height {})",
            index, height
        ))),
        Err(response) => response,
    }
}

/// Check if the blockchain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = ValidateResponse)
    )
)]
pub async fn validate_chain(ledger: LedgerData) -> impl Responder {
    let validation = with_ledger(&ledger, |ledger| ValidateResponse {
        valid: ledger.is_chain_valid(),
        height: ledger.height(),
    })
    .await;

    match validation {
        Ok(validation) => HttpResponse::Ok().json(validation),
        Err(response) => response,
    }
}

/// Create an account
///
/// Registers the given address, or generates a new one
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 409, description = "Alias or address already registered", body = ErrorResponse)
    )
)]
pub async fn create_account(
    ledger: LedgerData,
    account_req: web::Json<CreateAccountRequest>,
) -> impl Responder {
    let CreateAccountRequest { alias, address } = account_req.into_inner();

    let created = with_ledger(&ledger, move |ledger| {
        let alias = alias.as_deref();
        let account = match address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => ledger.import_account(address, alias)?,
            _ => ledger.create_account(alias)?,
        };
        let balance = ledger.get_balance(account.address.as_str());
        Ok::<_, BlockchainError>(AccountResponse::new(account, balance))
    })
    .await;

    match created.and_then(ledger_result) {
        Ok(account) => HttpResponse::Created().json(account),
        Err(response) => response,
    }
}

/// List all accounts
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    responses(
        (status = 200, description = "Accounts with derived balances", body = Vec<AccountResponse>)
    )
)]
pub async fn list_accounts(ledger: LedgerData) -> impl Responder {
    let accounts = with_ledger(&ledger, |ledger| {
        ledger
            .accounts_with_balances()
            .into_iter()
            .map(|(account, balance)| AccountResponse::new(account, balance))
            .collect::<Vec<_>>()
    })
    .await;

    match accounts {
        Ok(accounts) => HttpResponse::Ok().json(accounts),
        Err(response) => response,
    }
}

/// Get a balance
///
/// Unknown accounts report 0
#[utoipa::path(
    get,
    path = "/api/v1/balance/{account}",
    params(
        ("account" = String, Path, description = "Alias or address")
    ),
    responses(
        (status = 200, description = "Derived balance", body = BalanceResponse)
    )
)]
pub async fn get_balance(ledger: LedgerData, account: web::Path<String>) -> impl Responder {
    let query = account.into_inner();

    let balance = with_ledger(&ledger, move |ledger| BalanceResponse {
        address: ledger.resolve_address(&query).0,
        balance: ledger.get_balance(&query),
        query,
    })
    .await;

    match balance {
        Ok(balance) => HttpResponse::Ok().json(balance),
        Err(response) => response,
    }
}

/// Submit a transfer
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction queued", body = TransactionResponse),
        (status = 400, description = "Invalid transaction", body = ErrorResponse)
    )
)]
pub async fn new_transaction(
    ledger: LedgerData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let TransactionRequest { from, to, amount } = transaction_req.into_inner();
    if !(amount > 0.0) {
        return error_response(&BlockchainError::InvalidAmount(amount));
    }

    let queued = with_ledger(&ledger, move |ledger| {
        let transaction = ledger.create_transfer(&from, &to, amount)?;
        Ok::<_, BlockchainError>(TransactionResponse {
            message: format!("Transaction will be added to block {}", ledger.height()),
            transaction,
        })
    })
    .await;

    match queued.and_then(ledger_result) {
        Ok(response) => HttpResponse::Created().json(response),
        Err(response) => response,
    }
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(ledger: LedgerData) -> impl Responder {
    match with_ledger(&ledger, |ledger| ledger.pending_transactions().to_vec()).await {
        Ok(pending) => HttpResponse::Ok().json(pending),
        Err(response) => response,
    }
}

/// Mine a new block
///
/// Mines every pending transaction; the proof-of-work search runs on the blocking pool
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Unknown miner or empty pending pool", body = ErrorResponse)
    )
)]
pub async fn mine_block(ledger: LedgerData, mine_req: web::Json<MineRequest>) -> impl Responder {
    let miner = mine_req.into_inner().miner;

    let mined = with_ledger(&ledger, move |ledger| {
        if ledger.pending_count() == 0 {
            return Err(BlockchainError::NoPendingTransactions);
        }
        let block = ledger.mine_pending_transactions(&miner)?;
        Ok::<_, BlockchainError>(MineResponse {
            message: "New Block Mined".to_string(),
            height: ledger.height(),
            block,
        })
    })
    .await;

    match mined.and_then(ledger_result) {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(response) => response,
    }
}

/// Get faucet information
#[utoipa::path(
    get,
    path = "/api/v1/faucet",
    responses(
        (status = 200, description = "Faucet amount, reserve and cooldown", body = FaucetInfo)
    )
)]
pub async fn get_faucet_info(ledger: LedgerData) -> impl Responder {
    match with_ledger(&ledger, |ledger| ledger.faucet_info()).await {
        Ok(info) => HttpResponse::Ok().json(info),
        Err(response) => response,
    }
}

/// Check faucet eligibility
#[utoipa::path(
    get,
    path = "/api/v1/faucet/{account}",
    params(
        ("account" = String, Path, description = "Alias or address")
    ),
    responses(
        (status = 200, description = "Eligibility and, if rejected, the reason", body = FaucetEligibility)
    )
)]
pub async fn get_faucet_eligibility(ledger: LedgerData, account: web::Path<String>) -> impl Responder {
    let account = account.into_inner();
    match with_ledger(&ledger, move |ledger| ledger.can_claim(&account)).await {
        Ok(eligibility) => HttpResponse::Ok().json(eligibility),
        Err(response) => response,
    }
}

/// Claim tokens from the faucet
///
/// The payout is queued and credited once mined
#[utoipa::path(
    post,
    path = "/api/v1/faucet/claim",
    request_body = FaucetClaimRequest,
    responses(
        (status = 201, description = "Faucet payout queued", body = TransactionResponse),
        (status = 400, description = "Ineligible claimant or empty faucet", body = ErrorResponse)
    )
)]
pub async fn claim_faucet(ledger: LedgerData, claim_req: web::Json<FaucetClaimRequest>) -> impl Responder {
    let claimant = claim_req.into_inner().address;

    match with_ledger(&ledger, move |ledger| ledger.claim(&claimant)).await.and_then(ledger_result) {
        Ok(transaction) => HttpResponse::Created().json(TransactionResponse {
            message: format!("Faucet payout of {} queued", transaction.amount),
            transaction,
        }),
        Err(response) => response,
    }
}

/// Start auto-mining
#[utoipa::path(
    post,
    path = "/api/v1/scheduler/start",
    request_body = SchedulerConfig,
    responses(
        (status = 200, description = "Auto-mining started", body = SchedulerStatus),
        (status = 400, description = "No miners registered", body = ErrorResponse),
        (status = 409, description = "Already running", body = ErrorResponse)
    )
)]
pub async fn start_scheduler(ledger: LedgerData, config: web::Json<SchedulerConfig>) -> impl Responder {
    let config = config.into_inner();

    let started = with_ledger(&ledger, move |ledger| {
        ledger.start_scheduler(config)?;
        Ok::<_, BlockchainError>(ledger.scheduler_status())
    })
    .await;

    match started.and_then(ledger_result) {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(response) => response,
    }
}

/// Stop auto-mining
#[utoipa::path(
    post,
    path = "/api/v1/scheduler/stop",
    responses(
        (status = 200, description = "Statistics accumulated while running, null if it was already stopped", body = SchedulerReport)
    )
)]
pub async fn stop_scheduler(ledger: LedgerData) -> impl Responder {
    match with_ledger(&ledger, |ledger| ledger.stop_scheduler()).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(response) => response,
    }
}

/// Register a miner
#[utoipa::path(
    post,
    path = "/api/v1/scheduler/miners",
    request_body = RegisterMinerRequest,
    responses(
        (status = 201, description = "Miner registered or updated", body = Miner),
        (status = 400, description = "Not a registered account", body = ErrorResponse)
    )
)]
pub async fn register_miner(
    ledger: LedgerData,
    miner_req: web::Json<RegisterMinerRequest>,
) -> impl Responder {
    let RegisterMinerRequest { address, hash_power } = miner_req.into_inner();

    let registered = with_ledger(&ledger, move |ledger| ledger.register_miner(&address, hash_power)).await;

    match registered.and_then(ledger_result) {
        Ok(miner) => HttpResponse::Created().json(miner),
        Err(response) => response,
    }
}

/// Deregister a miner
#[utoipa::path(
    delete,
    path = "/api/v1/scheduler/miners/{account}",
    params(
        ("account" = String, Path, description = "Miner alias or address")
    ),
    responses(
        (status = 200, description = "Miner removed", body = Miner),
        (status = 400, description = "Not a registered miner", body = ErrorResponse)
    )
)]
pub async fn deregister_miner(ledger: LedgerData, account: web::Path<String>) -> impl Responder {
    let account = account.into_inner();

    let removed = with_ledger(&ledger, move |ledger| ledger.deregister_miner(&account)).await;

    match removed.and_then(ledger_result) {
        Ok(miner) => HttpResponse::Ok().json(miner),
        Err(response) => response,
    }
}

/// Get scheduler status
#[utoipa::path(
    get,
    path = "/api/v1/scheduler",
    responses(
        (status = 200, description = "Scheduler state, miners and statistics", body = SchedulerStatus)
    )
)]
pub async fn get_scheduler_status(ledger: LedgerData) -> impl Responder {
    match with_ledger(&ledger, |ledger| ledger.scheduler_status()).await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(response) => response,
    }
}

/// Run a mining competition now
#[utoipa::path(
    post,
    path = "/api/v1/scheduler/compete",
    responses(
        (status = 200, description = "Winner and mined block", body = CompetitionOutcome),
        (status = 400, description = "No miners or no pending transactions", body = ErrorResponse)
    )
)]
pub async fn run_competition(ledger: LedgerData) -> impl Responder {
    match with_ledger(&ledger, |ledger| ledger.run_competition()).await.and_then(ledger_result) {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(response) => response,
    }
}
