/// Values at or beyond this magnitude are treated as infinite by the floating-point LP.
pub const DEFAULT_LP_INFINITY: f64 = 1e20;

#[derive(Clone, Debug)]
pub struct ExactLpSettings {
    /// Threshold from which the floating-point companion rounds values to an infinity marker.
    pub infinity: f64,

    /// Verify the complete link structure after every structural change. Expensive; enabled
    /// by default when the crate is built with the `check-links` feature.
    pub check_links: bool,
}

impl Default for ExactLpSettings {
    fn default() -> Self {
        Self {
            infinity: DEFAULT_LP_INFINITY,
            check_links: cfg!(feature = "check-links"),
        }
    }
}
