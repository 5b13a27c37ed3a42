//! Page by page retrieval of a filings query.

use chrono::{DateTime, FixedOffset, Local, Utc};
use std::collections::VecDeque;

use super::core::Xbrl;
use super::error::{Result, XbrlError};
use super::options::{FilingQuery, ScopeFlags};
use super::page::{FilingsPage, ReconcileState};
use super::query::{Params, plan};
use super::resource::RequestInfo;
use super::warning::WarningPolicy;

/// Iterates the pages of a filings query.
///
/// Each parameter set of the query plan is requested in turn, following
/// the `next` links of its pages. Retrieval stops when the result size cap
/// is reached; the page that reaches it is truncated so that exactly the
/// cap number of filings are returned over all pages.
///
/// Every record of one pager carries the same `request_time`, the time the
/// pager was created.
#[derive(Debug)]
pub struct FilingsPager {
    client: Xbrl,
    flags: ScopeFlags,
    max_size: Option<usize>,
    param_sets: VecDeque<Params>,
    next_url: Option<String>,
    received: usize,
    query_time: DateTime<FixedOffset>,
    state: ReconcileState,
    done: bool,
}

impl FilingsPager {
    /// Plans the requests of `query`. No request is made yet.
    pub(crate) fn new(client: Xbrl, query: &FilingQuery) -> Result<Self> {
        let plan = plan(query, client.config())?;
        let query_time = if client.config().utc_time {
            Utc::now().fixed_offset()
        } else {
            Local::now().fixed_offset()
        };
        Ok(Self {
            client,
            flags: query.flags,
            max_size: query.max_size,
            param_sets: plan.param_sets.into(),
            next_url: None,
            received: 0,
            query_time,
            state: ReconcileState::default(),
            done: query.max_size == Some(0),
        })
    }

    /// Number of filings returned so far.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn query_time(&self) -> DateTime<FixedOffset> {
        self.query_time
    }

    /// Fetches the next page. `Ok(None)` when the query is exhausted.
    ///
    /// # Errors
    ///
    /// Request and response errors of the client. With
    /// [`WarningPolicy::Error`], the first warning of a page is returned as
    /// `XbrlError::Warning`.
    pub async fn next_page(&mut self) -> Result<Option<FilingsPage>> {
        while !self.done {
            let (url, params) = match self.next_url.take() {
                Some(url) => (url, Vec::new()),
                None => match self.param_sets.pop_front() {
                    Some(params) => (self.client.config().entry_point_url.clone(), params),
                    None => {
                        self.done = true;
                        break;
                    }
                },
            };

            let (json, response_url) = match self.client.get_json(&url, &params).await {
                Ok(result) => result,
                Err(err) => {
                    self.done = true;
                    return Err(err);
                }
            };
            let request = RequestInfo {
                url: response_url,
                time: self.query_time,
            };
            let mut page = match FilingsPage::parse(
                &json,
                self.flags,
                request,
                self.client.settings(),
                &mut self.state,
            ) {
                Ok(page) => page,
                Err(err) => {
                    self.done = true;
                    return Err(err);
                }
            };

            // warnings of filings beyond the cap go with them
            if let Some(cap) = self.max_size {
                page.truncate(cap.saturating_sub(self.received));
            }

            if self.client.config().warning_policy == WarningPolicy::Error {
                if let Some(warning) = page.warnings.first() {
                    self.done = true;
                    return Err(XbrlError::Warning(warning.clone()));
                }
            }

            if page.filing_list.is_empty() {
                // exhausted parameter set, continue with the next one
                continue;
            }

            if let Some(cap) = self.max_size {
                if self.received + page.filing_count() >= cap {
                    self.done = true;
                }
            }
            if !self.done {
                self.next_url = page.links.next_url.clone();
            }
            self.received += page.filing_count();
            return Ok(Some(page));
        }
        Ok(None)
    }

    /// Turns the pager into a stream of pages.
    #[cfg(feature = "stream")]
    pub fn into_stream(self) -> impl futures_util::Stream<Item = Result<FilingsPage>> {
        futures_util::stream::try_unfold(self, |mut pager| async move {
            Ok(pager.next_page().await?.map(|page| (page, pager)))
        })
    }
}
