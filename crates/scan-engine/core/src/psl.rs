/// Public suffix list lookups, used to show users a domain they can trust.
#[cfg_attr(test, mockall::automock)]
pub trait PublicSuffixList: Send + Sync {
    /// The registrable domain of `host`, e.g. `service.co.uk` for
    /// `auth.service.co.uk`. `None` when it cannot be determined.
    fn registrable_domain(&self, host: &str) -> Option<String>;
}
