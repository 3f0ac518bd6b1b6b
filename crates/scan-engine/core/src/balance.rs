/// States that show the wallet balance next to an input the user still has
/// to fill in.
pub trait BalanceProjection {
    /// Replaces the embedded balance, if the state has one. Never changes
    /// which state the flow is in.
    fn project_balance(&mut self, balance_msat: u64);
}
