//! Group catalog: a de-paginated view of every compute group.

use std::collections::BTreeMap;
use std::future::Future;

use tracing::{debug, warn};

use crate::error::{ConfigurationError, ProviderError, ReconcileResult};
use crate::gateway::ProviderGateway;
use crate::model::GroupSnapshot;
use crate::records::{GroupPage, GroupQuery};

/// Default upper bound on pages followed for one listing.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// A paginated provider response that can be folded into one response.
pub trait Paginated {
    /// Continuation token of this page. Empty tokens end the listing.
    fn next_token(&self) -> Option<&str>;

    /// Fold a later page into this one: list fields are appended in page
    /// order, scalar fields take the later page's value.
    fn absorb(&mut self, page: Self);
}

impl Paginated for GroupPage {
    fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref().filter(|t| !t.is_empty())
    }

    fn absorb(&mut self, page: Self) {
        self.auto_scaling_groups.extend(page.auto_scaling_groups);
        self.next_token = page.next_token;
        self.request_id = page.request_id;
    }
}

/// Follow continuation tokens until the provider stops returning one.
///
/// `fetch` receives the cursor to send (`None` for the first page). Fails
/// with `PageLimitExceeded` rather than looping forever on a provider that
/// keeps handing out tokens.
pub async fn collect_pages<P, F, Fut>(
    operation: &'static str,
    max_pages: usize,
    mut fetch: F,
) -> Result<P, ProviderError>
where
    P: Paginated,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<P, ProviderError>>,
{
    let max_pages = max_pages.max(1);
    let mut merged = fetch(None).await?;
    let mut pages = 1;

    while let Some(token) = merged.next_token().map(str::to_string) {
        if pages >= max_pages {
            return Err(ProviderError::PageLimitExceeded {
                operation,
                max_pages,
            });
        }
        let page = fetch(Some(token)).await?;
        merged.absorb(page);
        pages += 1;
    }

    debug!(operation, pages, "Pagination complete");
    Ok(merged)
}

/// Fetches every compute group with its tags and instances.
pub struct GroupCatalog<'a> {
    gateway: &'a dyn ProviderGateway,
    max_pages: usize,
}

impl<'a> GroupCatalog<'a> {
    pub fn new(gateway: &'a dyn ProviderGateway, max_pages: usize) -> Self {
        Self { gateway, max_pages }
    }

    /// Fetch all groups matching `query`, keyed by group name.
    ///
    /// The catalog drives the cursor itself, so a query that already carries
    /// one is rejected.
    pub async fn fetch_all(
        &self,
        query: &GroupQuery,
    ) -> ReconcileResult<BTreeMap<String, GroupSnapshot>> {
        if query.next_token.is_some() {
            return Err(ConfigurationError::CallerSuppliedCursor.into());
        }

        let gateway = self.gateway;
        let response: GroupPage = collect_pages("list_groups", self.max_pages, |token| {
            let mut page_query = query.clone();
            page_query.next_token = token;
            async move { gateway.list_groups(&page_query).await }
        })
        .await?;

        let mut groups = BTreeMap::new();
        for record in response.auto_scaling_groups {
            let snapshot = GroupSnapshot::from(record);
            if let Some(previous) = groups.insert(snapshot.name.clone(), snapshot) {
                warn!(group = %previous.name, "Group listed more than once, keeping the later entry");
            }
        }

        debug!(group_count = groups.len(), "Fetched group catalog");
        Ok(groups)
    }
}
