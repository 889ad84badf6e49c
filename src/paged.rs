//! Paged actions.
//!
//! A [`PagedAction`] produces one [`Action`] per page of a listing endpoint
//! from a route whose parameters include a single page slot. Actions are
//! created lazily and cached by page number, so asking for the same page twice
//! returns the same action.

use crate::action::{Action, Decoder};
use crate::route::{CompiledRoute, Route};
use crate::{Client, Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// One route parameter of a paged action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageParam {
    /// A fixed value.
    Fixed(String),
    /// The page slot, replaced with the page number.
    Page,
    /// An omitted optional placeholder.
    Absent,
}

impl PageParam {
    pub fn fixed(value: impl Into<String>) -> Self {
        Self::Fixed(value.into())
    }
}

impl From<&str> for PageParam {
    fn from(value: &str) -> Self {
        Self::Fixed(value.to_string())
    }
}

/// A page cursor over an action cache.
///
/// # Examples
///
/// ```no_run
/// use imgur_rest::{routes::gallery, Client, PageParam};
///
/// # fn example() -> Result<(), imgur_rest::Error> {
/// let client = Client::builder().client_id("my-client-id").build()?;
/// let mut pages = client.paged(
///     gallery::GET_GALLERY,
///     vec!["hot".into(), "viral".into(), PageParam::Page],
///     |res| res.data::<Vec<serde_json::Value>>(),
/// )?;
///
/// let first = pages.next()?.complete()?;
/// let second = pages.next()?.complete()?;
/// println!("{} + {} posts", first.len(), second.len());
/// # Ok(())
/// # }
/// ```
pub struct PagedAction<T> {
    client: Client,
    route: Route,
    params: Vec<PageParam>,
    decoder: Decoder<T>,
    pages: BTreeMap<u32, Action<T>>,
    page: u32,
}

impl<T: Send + 'static> PagedAction<T> {
    pub(crate) fn new(
        client: Client,
        route: Route,
        params: Vec<PageParam>,
        decoder: Decoder<T>,
    ) -> Result<Self> {
        let page_slots = params.iter().filter(|p| **p == PageParam::Page).count();
        if page_slots != 1 {
            return Err(Error::Configuration(format!(
                "Paged route [{}] needs exactly one page parameter, found {}",
                route.pattern(),
                page_slots
            )));
        }

        let paged = Self {
            client,
            route,
            params,
            decoder,
            pages: BTreeMap::new(),
            page: 0,
        };
        // Fail on a parameter mismatch now rather than on the first page.
        paged.compile(0)?;
        Ok(paged)
    }

    /// Moves the cursor to `page` before any page is requested.
    pub fn starting_at(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// The cursor position: the page [`PagedAction::next`] returns next.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// The action for the current page. The cursor does not move.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the route fails to compile.
    pub fn current(&mut self) -> Result<&Action<T>> {
        self.get(self.page)
    }

    /// The action for `page`, created on first use. The cursor does not move.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the route fails to compile.
    pub fn get(&mut self, page: u32) -> Result<&Action<T>> {
        if !self.pages.contains_key(&page) {
            let route = self.compile(page)?;
            let action = Action::new(self.client.clone(), route, None, self.decoder.clone());
            self.pages.insert(page, action);
        }
        self.pages
            .get(&page)
            .ok_or_else(|| Error::Configuration(format!("page {page} was not cached")))
    }

    /// The action for the current page, then advances the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the route fails to compile or the
    /// cursor is already at the last representable page.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<&Action<T>> {
        let page = self.page;
        self.page = page
            .checked_add(1)
            .ok_or_else(|| Error::Configuration("page cursor overflow".to_string()))?;
        self.get(page)
    }

    /// Moves the cursor back to page 0. Cached actions are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.page = 0;
        self
    }

    /// Moves the cursor forward by `pages`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the cursor would overflow.
    pub fn skip(&mut self, pages: u32) -> Result<&mut Self> {
        self.page = self
            .page
            .checked_add(pages)
            .ok_or_else(|| Error::Configuration("page cursor overflow".to_string()))?;
        Ok(self)
    }

    /// Moves the cursor to `page`.
    pub fn skip_to(&mut self, page: u32) -> &mut Self {
        self.page = page;
        self
    }

    /// Number of pages with a cached action.
    pub fn cached_pages(&self) -> usize {
        self.pages.len()
    }

    fn compile(&self, page: u32) -> Result<CompiledRoute> {
        let page = page.to_string();
        let params: Vec<Option<&str>> = self
            .params
            .iter()
            .map(|param| match param {
                PageParam::Fixed(value) => Some(value.as_str()),
                PageParam::Page => Some(page.as_str()),
                PageParam::Absent => None,
            })
            .collect();
        self.route.compile_optional(&params)
    }
}

impl<T> fmt::Debug for PagedAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedAction")
            .field("route", &self.route.pattern())
            .field("params", &self.params)
            .field("page", &self.page)
            .field("cached_pages", &self.pages.len())
            .finish_non_exhaustive()
    }
}
