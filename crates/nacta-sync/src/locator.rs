//! Strategy-fallback search for the download trigger.

use std::time::Duration;

use tracing::{debug, info};

use crate::browser::{BrowserSession, ElementHandle};
use crate::error::{SyncError, SyncResult};
use crate::types::LocatorStrategy;

/// The element a strategy matched, and which strategy matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedTrigger {
    pub element: ElementHandle,
    pub strategy_index: usize,
    pub description: String,
}

/// Try each strategy in order and return the first clickable, displayed match.
///
/// Each strategy gets one wait of at most `per_attempt`. A timeout, a driver
/// error, or a hidden element moves on to the next strategy; strategies are
/// never revisited. Exhausting the list is [`SyncError::TriggerNotFound`].
pub async fn find_trigger(
    session: &mut dyn BrowserSession,
    strategies: &[LocatorStrategy],
    per_attempt: Duration,
) -> SyncResult<LocatedTrigger> {
    for (index, strategy) in strategies.iter().enumerate() {
        let element = match session.wait_clickable(&strategy.query, per_attempt).await {
            Ok(element) => element,
            Err(e) => {
                debug!(strategy = %strategy.description, "locator strategy failed: {e}");
                continue;
            }
        };

        match session.is_displayed(element).await {
            Ok(true) => {
                info!("Found button: {}", strategy.description);
                return Ok(LocatedTrigger {
                    element,
                    strategy_index: index,
                    description: strategy.description.clone(),
                });
            }
            Ok(false) => debug!(strategy = %strategy.description, "match is not displayed"),
            Err(e) => debug!(strategy = %strategy.description, "visibility check failed: {e}"),
        }
    }

    Err(SyncError::TriggerNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserLauncher, SessionOptions};
    use crate::config::BrowserSettings;
    use crate::testing::{ElementBehavior, PageScript, ScriptedLauncher};

    const URL: &str = "https://example.test/";

    fn strategies() -> Vec<LocatorStrategy> {
        vec![
            LocatorStrategy::xpath("//a", "A"),
            LocatorStrategy::xpath("//b", "B"),
            LocatorStrategy::xpath("//c", "C"),
        ]
    }

    async fn session_for(script: PageScript) -> (ScriptedLauncher, Box<dyn BrowserSession>) {
        let launcher = ScriptedLauncher::new().with_page(URL, script);
        let options = SessionOptions {
            browser: BrowserSettings::default(),
            download_dir: std::env::temp_dir(),
            page_load_timeout: Duration::from_secs(1),
        };
        let mut session = launcher.launch(&options).await.unwrap();
        session.navigate(URL).await.unwrap();
        (launcher, session)
    }

    #[tokio::test]
    async fn test_second_strategy_wins_and_third_is_never_tried() {
        let script = PageScript::default()
            .element("//a", ElementBehavior::Timeout)
            .element("//b", ElementBehavior::Clickable)
            .element("//c", ElementBehavior::Clickable);
        let (launcher, mut session) = session_for(script).await;

        let found = find_trigger(session.as_mut(), &strategies(), Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(found.strategy_index, 1);
        assert_eq!(found.description, "B");
        assert_eq!(launcher.log().queries, vec!["//a", "//b"]);
    }

    #[tokio::test]
    async fn test_hidden_and_erroring_matches_are_skipped() {
        let script = PageScript::default()
            .element("//a", ElementBehavior::Hidden)
            .element("//b", ElementBehavior::Error("invalid xpath".into()))
            .element("//c", ElementBehavior::Clickable);
        let (launcher, mut session) = session_for(script).await;

        let found = find_trigger(session.as_mut(), &strategies(), Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(found.strategy_index, 2);
        assert_eq!(launcher.log().queries, vec!["//a", "//b", "//c"]);
    }

    #[tokio::test]
    async fn test_exhausted_strategies_report_sentinel() {
        let (launcher, mut session) = session_for(PageScript::default()).await;

        let err = find_trigger(session.as_mut(), &strategies(), Duration::from_millis(10))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "download trigger not found");
        assert_eq!(launcher.log().queries.len(), 3);
        assert_eq!(launcher.log().clicks, 0);
    }

    #[tokio::test]
    async fn test_empty_strategy_list() {
        let (_launcher, mut session) = session_for(PageScript::default()).await;
        let err = find_trigger(session.as_mut(), &[], Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::TriggerNotFound));
    }
}
