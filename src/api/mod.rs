// API module
//
// HTTP layer over the ledger engine

pub mod handlers;
pub mod routes;
pub mod schema;

use utoipa::OpenApi;

use crate::blockchain;

// Re-export main components for easier access
pub use handlers::LedgerData;
pub use routes::configure_routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_chain_stats,
        handlers::get_blocks,
        handlers::get_block,
        handlers::validate_chain,
        handlers::create_account,
        handlers::list_accounts,
        handlers::get_balance,
        handlers::new_transaction,
        handlers::get_pending_transactions,
        handlers::mine_block,
        handlers::get_faucet_info,
        handlers::get_faucet_eligibility,
        handlers::claim_faucet,
        handlers::start_scheduler,
        handlers::stop_scheduler,
        handlers::register_miner,
        handlers::deregister_miner,
        handlers::get_scheduler_status,
        handlers::run_competition
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::TransactionKind,
            blockchain::Address,
            blockchain::ChainStats,
            blockchain::FaucetInfo,
            blockchain::FaucetEligibility,
            blockchain::Miner,
            blockchain::SchedulerConfig,
            blockchain::SchedulerStatus,
            blockchain::SchedulerReport,
            blockchain::CompetitionOutcome,
            schema::ErrorResponse,
            schema::ValidateResponse,
            schema::CreateAccountRequest,
            schema::AccountResponse,
            schema::BalanceResponse,
            schema::TransactionRequest,
            schema::TransactionResponse,
            schema::MineRequest,
            schema::MineResponse,
            schema::FaucetClaimRequest,
            schema::RegisterMinerRequest
        )
    ),
    tags(
        (name = "ledger", description = "Token ledger API endpoints")
    ),
    info(
        title = "Token Ledger API",
        version = "1.0.0",
        description = "Proof-of-work token ledger with a faucet and simulated auto-mining",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/blocks/{index}"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/scheduler/miners/{account}"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/faucet/claim"));
    }
}
