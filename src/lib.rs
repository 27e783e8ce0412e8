#[macro_use]
pub mod math {
    #[macro_use]
    pub mod rational;
    pub mod traits;
}
pub mod exact_lp {
    pub mod entity_store;
    pub mod exact_lp;
    pub mod exact_lp_error;
    pub mod exact_lp_settings;
    pub mod exact_column;
    pub mod exact_row;
    pub mod linking;
    pub mod change_tracking;
    pub mod pseudo_objective;
    #[cfg(debug_assertions)]
    pub mod consistency_auditor;
}
pub mod lp_backend {
    pub mod lp_backend;
    pub mod memory_backend;
}
pub mod floating {
    pub mod floating_relaxation;
}
