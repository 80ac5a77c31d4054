use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain_stats))
            .route("/blocks", web::get().to(handlers::get_blocks))
            .route("/blocks/{index}", web::get().to(handlers::get_block))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/accounts", web::get().to(handlers::list_accounts))
            .route("/accounts", web::post().to(handlers::create_account))
            .route("/balance/{account}", web::get().to(handlers::get_balance))
            .route("/transactions", web::post().to(handlers::new_transaction))
            .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
            .route("/mine", web::post().to(handlers::mine_block))
            .route("/faucet", web::get().to(handlers::get_faucet_info))
            .route("/faucet/claim", web::post().to(handlers::claim_faucet))
            .route("/faucet/{account}", web::get().to(handlers::get_faucet_eligibility))
            .route("/scheduler", web::get().to(handlers::get_scheduler_status))
            .route("/scheduler/start", web::post().to(handlers::start_scheduler))
            .route("/scheduler/stop", web::post().to(handlers::stop_scheduler))
            .route("/scheduler/compete", web::post().to(handlers::run_competition))
            .route("/scheduler/miners", web::post().to(handlers::register_miner))
            .route("/scheduler/miners/{account}", web::delete().to(handlers::deregister_miner))
    );
}
