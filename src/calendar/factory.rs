use super::google::GoogleCalendarProvider;
use super::outlook::OutlookCalendarProvider;
use super::token::TokenSet;
use super::{CalendarProvider, ProviderKind};
use crate::config::ProviderConfig;
use crate::error::AppResult;

const SUPPORTED_PROVIDERS: [&str; ProviderKind::ALL.len()] = {
    let mut names = [""; ProviderKind::ALL.len()];
    let mut i = 0;
    while i < names.len() {
        names[i] = ProviderKind::ALL[i].as_str();
        i += 1;
    }
    names
};

/// Builds the provider variant matching a stored provider tag
pub struct ProviderFactory;

impl ProviderFactory {
    /// Pure construction, no network I/O
    pub fn create_provider(
        provider: &str,
        tokens: TokenSet,
        config: &ProviderConfig,
    ) -> AppResult<Box<dyn CalendarProvider>> {
        let provider: Box<dyn CalendarProvider> = match provider.parse::<ProviderKind>()? {
            ProviderKind::Google => Box::new(GoogleCalendarProvider::new(tokens, config.clone())),
            ProviderKind::Outlook => {
                Box::new(OutlookCalendarProvider::new(tokens, config.clone()))
            }
        };
        Ok(provider)
    }

    pub fn is_provider_supported(provider: &str) -> bool {
        provider.parse::<ProviderKind>().is_ok()
    }

    pub fn list_supported_providers() -> &'static [&'static str] {
        &SUPPORTED_PROVIDERS
    }
}
