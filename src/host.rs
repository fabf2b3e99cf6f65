//! Host shell seams: navigation and the agent detail view.
//!
//! The detail view never reaches into the shell. It hands over a
//! [`DetailActions`] value with two one-shot callback slots, and the shell
//! takes each slot at most once.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::DEFAULT_COMPLETION_ROUTE;
use crate::error::{LoadError, NavigationError, Result};
use crate::notify::OnboardingNotifier;
use crate::records::{AgentRecordLoader, PersistedAgentRecord};

/// Moves the user to another view.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn go_to(&self, route: &str) -> std::result::Result<(), NavigationError>;
}

/// Snapshot of the shell's navigation history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NavigationState {
    pub current: Option<String>,
    pub history: Vec<String>,
}

/// Routes kept by [`ShellNavigator::new`].
pub const NAVIGATION_HISTORY_CAPACITY: usize = 100;

/// In-process navigator that records the most recent routes it is sent to.
///
/// Only absolute routes (`/...`) are accepted.
pub struct ShellNavigator {
    history: RwLock<VecDeque<String>>,
    capacity: usize,
}

impl ShellNavigator {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(NAVIGATION_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            history: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        })
    }

    /// Recorded routes, oldest first.
    pub async fn history(&self) -> Vec<String> {
        self.history.read().await.iter().cloned().collect()
    }

    pub async fn current(&self) -> Option<String> {
        self.history.read().await.back().cloned()
    }

    pub async fn state(&self) -> NavigationState {
        let history = self.history().await;
        NavigationState {
            current: history.last().cloned(),
            history,
        }
    }
}

#[async_trait]
impl Navigator for ShellNavigator {
    async fn go_to(&self, route: &str) -> std::result::Result<(), NavigationError> {
        if !route.starts_with('/') {
            warn!(route, "Rejected relative route");
            return Err(NavigationError::Rejected {
                route: route.to_string(),
                reason: "route must be absolute".into(),
            });
        }
        info!(route, "Navigating");
        let mut history = self.history.write().await;
        history.push_back(route.to_string());
        while history.len() > self.capacity {
            history.pop_front();
        }
        Ok(())
    }
}

/// A deferred detail-view action.
pub type DetailAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// The two actions the detail view exposes to the shell. Each slot yields
/// its callback once; later takes return `None`.
pub struct DetailActions {
    send_onboarding: Mutex<Option<DetailAction>>,
    back_to_dashboard: Mutex<Option<DetailAction>>,
}

impl DetailActions {
    pub fn new(send_onboarding: DetailAction, back_to_dashboard: DetailAction) -> Self {
        Self {
            send_onboarding: Mutex::new(Some(send_onboarding)),
            back_to_dashboard: Mutex::new(Some(back_to_dashboard)),
        }
    }

    pub fn take_send_onboarding(&self) -> Option<DetailAction> {
        self.send_onboarding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn take_back_to_dashboard(&self) -> Option<DetailAction> {
        self.back_to_dashboard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Agent detail view: loads one agent and offers the onboarding/back actions.
pub struct AgentDetailView {
    loader: Arc<AgentRecordLoader>,
    notifier: Arc<OnboardingNotifier>,
    navigator: Arc<dyn Navigator>,
    dashboard_route: String,
}

impl AgentDetailView {
    pub fn new(
        loader: Arc<AgentRecordLoader>,
        notifier: Arc<OnboardingNotifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            loader,
            notifier,
            navigator,
            dashboard_route: DEFAULT_COMPLETION_ROUTE.to_string(),
        }
    }

    pub fn loader(&self) -> &AgentRecordLoader {
        &self.loader
    }

    /// Load `agent_id` and build the view's actions around the loaded record.
    pub async fn open(&self, agent_id: &str) -> std::result::Result<DetailActions, LoadError> {
        let record = self.loader.load(agent_id).await?;
        Ok(self.actions_for(record))
    }

    fn actions_for(&self, record: PersistedAgentRecord) -> DetailActions {
        let notifier = Arc::clone(&self.notifier);
        let send: DetailAction = Box::new(move || {
            Box::pin(async move {
                notifier.send(&record).await?;
                Ok(())
            })
        });

        let navigator = Arc::clone(&self.navigator);
        let route = self.dashboard_route.clone();
        let back: DetailAction = Box::new(move || {
            Box::pin(async move {
                navigator.go_to(&route).await?;
                Ok(())
            })
        });

        DetailActions::new(send, back)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::{DatabaseError, DeliveryError};
    use crate::notify::{EmailDelivery, OutboundEmail, ToastKind, ToastLog, Toaster};
    use crate::records::model::{AGENTS_TABLE, AgentRow};
    use crate::store::traits::{Filter, RelationalStore, Row};

    struct OneAgentStore;

    #[async_trait]
    impl RelationalStore for OneAgentStore {
        async fn fetch_one(&self, table: &str, filter: &Filter) -> std::result::Result<Row, DatabaseError> {
            if table == AGENTS_TABLE && filter.value == "agent-1" {
                let mut agent = AgentRow::new("agent-1");
                agent.name = Some("Acme".into());
                agent.email = Some("a@b.com".into());
                let value = serde_json::to_value(agent).unwrap();
                return Ok(value.as_object().cloned().unwrap());
            }
            Err(DatabaseError::NotFound {
                entity: table.into(),
                id: filter.value.clone(),
            })
        }

        async fn fetch_many(&self, _table: &str, _filter: &Filter) -> std::result::Result<Vec<Row>, DatabaseError> {
            Ok(Vec::new())
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl EmailDelivery for AcceptAll {
        async fn deliver(&self, _email: &OutboundEmail) -> std::result::Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn view() -> (Arc<ShellNavigator>, Arc<ToastLog>, AgentDetailView) {
        let toasts = Arc::new(ToastLog::default());
        let loader = Arc::new(AgentRecordLoader::new(
            Arc::new(OneAgentStore),
            Arc::clone(&toasts) as Arc<dyn Toaster>,
        ));
        let notifier = Arc::new(OnboardingNotifier::new(
            Arc::new(AcceptAll),
            Arc::clone(&toasts) as Arc<dyn Toaster>,
            "http://localhost:8080",
        ));
        let navigator = ShellNavigator::new();
        let view = AgentDetailView::new(loader, notifier, Arc::clone(&navigator) as Arc<dyn Navigator>);
        (navigator, toasts, view)
    }

    #[tokio::test]
    async fn navigator_records_absolute_routes_only() {
        let nav = ShellNavigator::new();
        nav.go_to("/dashboard").await.unwrap();
        assert!(nav.go_to("dashboard").await.is_err());
        assert_eq!(nav.history().await, vec!["/dashboard".to_string()]);
        assert_eq!(nav.current().await.as_deref(), Some("/dashboard"));
    }

    #[tokio::test]
    async fn navigator_keeps_most_recent_within_capacity() {
        let nav = ShellNavigator::with_capacity(2);
        for route in ["/a", "/b", "/c"] {
            nav.go_to(route).await.unwrap();
        }

        let state = nav.state().await;
        assert_eq!(state.history, vec!["/b".to_string(), "/c".to_string()]);
        assert_eq!(state.current.as_deref(), Some("/c"));
    }

    #[tokio::test]
    async fn slots_yield_callbacks_once() {
        let (navigator, toasts, view) = view();
        let actions = view.open("agent-1").await.unwrap();

        let send = actions.take_send_onboarding().unwrap();
        assert!(actions.take_send_onboarding().is_none());
        send().await.unwrap();
        assert_eq!(toasts.count(ToastKind::Success), 1);

        let back = actions.take_back_to_dashboard().unwrap();
        assert!(actions.take_back_to_dashboard().is_none());
        back().await.unwrap();
        assert_eq!(navigator.history().await, vec![DEFAULT_COMPLETION_ROUTE.to_string()]);
    }

    #[tokio::test]
    async fn open_missing_agent_offers_no_actions() {
        let (_navigator, toasts, view) = view();
        let err = view.open("missing-id").await.err().unwrap();
        assert!(matches!(err, LoadError::NotFound { .. }));
        assert_eq!(toasts.count(ToastKind::Error), 1);
    }
}
