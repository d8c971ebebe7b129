//! Page classification
//!
//! Decides which known UI variant the site is currently presenting. Each
//! variant must hit a quorum of two independent structural signals; a single
//! marker is too fragile against the site's habit of reshuffling its markup.
//! Unknown is a terminal answer, not an error to retry: if no signal set
//! matches, retrying cannot change the outcome and the page state needs to be
//! captured for a human instead.

use crate::variant::{BookingListStrategy, TeeSheetStrategy, VariantStrategy};
use std::sync::Arc;
use teatime_core::PageVariant;
use teatime_browser::page::Page;
use tracing::{debug, info};

/// Signals hit before a variant is accepted.
const SIGNAL_QUORUM: u32 = 2;

/// Login form markers, checked after the bookable variants.
const LOGIN_USERNAME: &str = "#Username";
const LOGIN_SIGN_IN: &str = "#signIn";

/// Result of classifying one page load.
pub struct Classification {
    pub variant: PageVariant,
    /// Strategy to drive the page with; present only for bookable variants.
    pub strategy: Option<Arc<dyn VariantStrategy>>,
}

/// Classifier over the known variant strategies, checked in order.
pub struct PageClassifier {
    strategies: Vec<Arc<dyn VariantStrategy>>,
}

impl PageClassifier {
    pub fn new(strategies: Vec<Arc<dyn VariantStrategy>>) -> Self {
        Self { strategies }
    }

    /// The two variants the live site is known to render.
    pub fn with_default_strategies() -> Self {
        Self::new(vec![
            Arc::new(TeeSheetStrategy),
            Arc::new(BookingListStrategy),
        ])
    }

    /// Classify the current page. Read-only: no clicks, no navigation.
    pub async fn classify(&self, page: &dyn Page) -> Classification {
        for strategy in &self.strategies {
            let signals = strategy.matched_signals(page).await;
            debug!(
                "Variant {} matched {} signal(s)",
                strategy.variant(),
                signals
            );
            if signals >= SIGNAL_QUORUM {
                info!("Classified page as {}", strategy.variant());
                return Classification {
                    variant: strategy.variant(),
                    strategy: Some(Arc::clone(strategy)),
                };
            }
        }

        let mut login_signals = 0;
        if page.element_exists(LOGIN_USERNAME).await {
            login_signals += 1;
        }
        if page.element_exists(LOGIN_SIGN_IN).await {
            login_signals += 1;
        }
        if let Ok(url) = page.current_url().await {
            if url.to_lowercase().contains("login") {
                login_signals += 1;
            }
        }
        if login_signals >= SIGNAL_QUORUM {
            info!("Classified page as login");
            return Classification {
                variant: PageVariant::Login,
                strategy: None,
            };
        }

        info!("Page matched no known variant");
        Classification {
            variant: PageVariant::Unknown,
            strategy: None,
        }
    }
}
