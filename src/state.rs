use crate::services::ledger_service::LedgerService;

#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerService,
}
