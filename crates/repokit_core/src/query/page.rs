//! Paging value objects and the fetch-window strategy behind them.
//!
//! # Invariants
//! - `PageRequest::page_size >= 1`; offsets are unsigned.
//! - `PageResult::total_pages` is `0` for an empty store, otherwise
//!   `ceil(total_elements / page_size)`.
//! - A slice never carries a total; `has_next` comes from one over-fetched row.

use crate::query::descriptor::Cardinality;
use crate::query::error::{QueryError, QueryResult};
use crate::query::predicate::SortSpec;
use serde::Serialize;

/// Caller-owned request for one window of a paged query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    offset: u64,
    page_size: u32,
    sort: SortSpec,
}

impl PageRequest {
    /// Requests zero-based page `page` of `page_size` rows.
    pub fn of(page: u64, page_size: u32) -> QueryResult<Self> {
        Self::of_sorted(page, page_size, SortSpec::unsorted())
    }

    pub fn of_sorted(page: u64, page_size: u32, sort: SortSpec) -> QueryResult<Self> {
        let size = validate_size(page_size)?;
        let offset = page.checked_mul(u64::from(size)).ok_or_else(|| {
            QueryError::binding("PageRequest", format!("page {page} overflows the row offset"))
        })?;
        Ok(Self {
            offset,
            page_size: size,
            sort,
        })
    }

    /// Requests `page_size` rows starting at an arbitrary row offset.
    pub fn with_offset(offset: u64, page_size: u32, sort: SortSpec) -> QueryResult<Self> {
        Ok(Self {
            offset,
            page_size: validate_size(page_size)?,
            sort,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// Zero-based page index of this window.
    pub fn page_number(&self) -> u64 {
        self.offset / u64::from(self.page_size)
    }

    /// The following window with the same size and sort.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(u64::from(self.page_size)),
            page_size: self.page_size,
            sort: self.sort.clone(),
        }
    }
}

fn validate_size(page_size: u32) -> QueryResult<u32> {
    if page_size == 0 {
        return Err(QueryError::binding(
            "PageRequest",
            "page size must be at least 1",
        ));
    }
    Ok(page_size)
}

/// Counted page: content plus total metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    content: Vec<T>,
    total_elements: i64,
    total_pages: u64,
    page_number: u64,
    page_size: u32,
    is_first: bool,
    has_next: bool,
    #[serde(skip)]
    request: PageRequest,
}

impl<T> PageResult<T> {
    pub(crate) fn new(content: Vec<T>, request: PageRequest, total_elements: i64) -> Self {
        let size = u64::from(request.page_size);
        let total = u64::try_from(total_elements).unwrap_or(0);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(size) };
        let page_number = request.page_number();
        Self {
            content,
            total_elements,
            total_pages,
            page_number,
            page_size: request.page_size,
            is_first: page_number == 0,
            has_next: page_number.saturating_add(1).saturating_mul(size) < total,
            request,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn total_elements(&self) -> i64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_first(&self) -> bool {
        self.is_first
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// Request for the following page, if there is one.
    pub fn next_request(&self) -> Option<PageRequest> {
        self.has_next.then(|| self.request.next())
    }

    /// Converts every element, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            page_number: self.page_number,
            page_size: self.page_size,
            is_first: self.is_first,
            has_next: self.has_next,
            request: self.request,
        }
    }
}

/// Uncounted slice: content plus a next-page signal only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceResult<T> {
    content: Vec<T>,
    page_number: u64,
    page_size: u32,
    is_first: bool,
    has_next: bool,
    #[serde(skip)]
    request: PageRequest,
}

impl<T> SliceResult<T> {
    pub(crate) fn new(content: Vec<T>, request: PageRequest, has_next: bool) -> Self {
        let page_number = request.page_number();
        Self {
            content,
            page_number,
            page_size: request.page_size,
            is_first: page_number == 0,
            has_next,
            request,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_first(&self) -> bool {
        self.is_first
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn next_request(&self) -> Option<PageRequest> {
        self.has_next.then(|| self.request.next())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SliceResult<U> {
        SliceResult {
            content: self.content.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            is_first: self.is_first,
            has_next: self.has_next,
            request: self.request,
        }
    }
}

/// Trims an over-fetch of up to `page_size + 1` rows back to `page_size`
/// and reports whether the extra row was present.
pub(crate) fn trim_overfetch<R>(rows: &mut Vec<R>, page_size: u32) -> bool {
    let size = page_size as usize;
    let has_next = rows.len() > size;
    rows.truncate(size);
    has_next
}

/// Rows the content query asks the store for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FetchWindow {
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Decides the content window for one execution.
///
/// `top` is the descriptor's `Top<N>` cap; `template_limit` tells whether an
/// explicit template already limits its own rows.
pub(crate) fn content_window(
    descriptor: &str,
    cardinality: Cardinality,
    top: Option<u64>,
    template_limit: bool,
    page: Option<&PageRequest>,
) -> QueryResult<FetchWindow> {
    match (cardinality, page) {
        (Cardinality::One | Cardinality::OneOrNone, Some(_)) => Err(QueryError::binding(
            descriptor,
            format!("{cardinality} queries do not accept a page request"),
        )),
        (Cardinality::One | Cardinality::OneOrNone, None) => Ok(FetchWindow {
            // Two rows are enough to prove non-uniqueness.
            limit: match (top, template_limit) {
                (Some(n), _) => Some(n),
                (None, true) => None,
                (None, false) => Some(2),
            },
            offset: 0,
        }),
        (Cardinality::Many, None) => Ok(FetchWindow {
            limit: top,
            offset: 0,
        }),
        (Cardinality::Many, Some(request)) => {
            let size = u64::from(request.page_size());
            let limit = match top {
                Some(n) => size.min(n.saturating_sub(request.offset())),
                None => size,
            };
            Ok(FetchWindow {
                limit: Some(limit),
                offset: request.offset(),
            })
        }
        (Cardinality::CountedPage, Some(request)) => Ok(FetchWindow {
            limit: Some(u64::from(request.page_size())),
            offset: request.offset(),
        }),
        (Cardinality::UncountedSlice, Some(request)) => Ok(FetchWindow {
            limit: Some(u64::from(request.page_size()) + 1),
            offset: request.offset(),
        }),
        (Cardinality::CountedPage | Cardinality::UncountedSlice, None) => Err(
            QueryError::binding(descriptor, format!("{cardinality} queries require a page request")),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{content_window, trim_overfetch, PageRequest, PageResult};
    use crate::query::descriptor::Cardinality;
    use crate::query::error::QueryError;

    #[test]
    fn page_size_zero_is_rejected() {
        assert!(matches!(
            PageRequest::of(0, 0),
            Err(QueryError::ParameterBinding { .. })
        ));
    }

    #[test]
    fn page_metadata_follows_the_paging_laws() {
        let page = PageResult::new(vec![1, 2, 3], PageRequest::of(0, 3).unwrap(), 5);
        assert_eq!(page.total_pages(), 2);
        assert!(page.is_first());
        assert!(page.has_next());
        assert_eq!(page.next_request().unwrap().offset(), 3);

        let last = PageResult::new(vec![4, 5], PageRequest::of(1, 3).unwrap(), 5);
        assert!(!last.has_next());
        assert!(last.next_request().is_none());

        let empty = PageResult::<i64>::new(Vec::new(), PageRequest::of(0, 3).unwrap(), 0);
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());
    }

    #[test]
    fn overfetch_is_trimmed_to_the_page_size() {
        let mut rows = vec![1, 2, 3, 4];
        assert!(trim_overfetch(&mut rows, 3));
        assert_eq!(rows, vec![1, 2, 3]);

        let mut exact = vec![1, 2, 3];
        assert!(!trim_overfetch(&mut exact, 3));
        assert_eq!(exact.len(), 3);
    }

    #[test]
    fn top_limit_caps_paged_lists() {
        let request = PageRequest::of(1, 2).unwrap();
        let window =
            content_window("Member.findTop3By", Cardinality::Many, Some(3), false, Some(&request))
                .unwrap();
        assert_eq!(window.limit, Some(1));
        assert_eq!(window.offset, 2);
    }

    #[test]
    fn unique_reads_fetch_two_rows_and_paged_reads_need_a_request() {
        let window = content_window("m", Cardinality::One, None, false, None).unwrap();
        assert_eq!(window.limit, Some(2));
        assert!(content_window("m", Cardinality::UncountedSlice, None, false, None).is_err());
    }
}
