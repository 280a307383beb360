//! JSON:API page-number pagination.
//!
//! Clients ask for `?page[number]=2&page[size]=20`. The size defaults to the configured
//! page size and is capped at the configured maximum. Responses carry `links` to the
//! neighbouring pages and a `meta.pagination` block. Asking for a page past the last
//! one is a 404.

use actix_web::HttpRequest;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::RestSettings;
use crate::error::AppError;

pub const PAGE_NUMBER_PARAM: &str = "page[number]";
pub const PAGE_SIZE_PARAM: &str = "page[size]";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(rename = "page[number]")]
    pub number: Option<u64>,
    #[serde(rename = "page[size]")]
    pub size: Option<u64>,
}

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn from_query(query: &PageQuery, settings: &RestSettings) -> Self {
        let max = settings.max_page_size.max(1) as u64;
        let size = query
            .size
            .filter(|size| *size > 0)
            .unwrap_or(settings.page_size as u64)
            .clamp(1, max);
        Self {
            number: query.number.filter(|n| *n > 0).unwrap_or(1),
            size,
        }
    }

    /// Row offset of the first item on the page. Fails with 404 when it does not fit
    /// an `i64`.
    pub fn offset(&self) -> Result<i64, AppError> {
        self.number
            .saturating_sub(1)
            .checked_mul(self.size)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or_else(invalid_page)
    }

    /// Fails with 404 unless the page exists among `count` items. Page 1 always exists.
    pub fn ensure_within(&self, count: u64) -> Result<(), AppError> {
        if self.number > page_count(count, self.size) {
            return Err(invalid_page());
        }
        Ok(())
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".into())
}

/// Number of pages `count` items fill, at least 1.
pub fn page_count(count: u64, size: u64) -> u64 {
    if count == 0 || size == 0 {
        1
    } else {
        (count - 1) / size + 1
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageLinks {
    pub first: Option<String>,
    pub last: Option<String>,
    pub next: Option<String>,
    pub prev: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u64,
    pub pages: u64,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub links: PageLinks,
    pub meta: PageMeta,
}

impl<T: Serialize> Page<T> {
    /// `base_url` is the absolute URL of the collection; page parameters are appended
    /// to it for each link.
    pub fn new(data: Vec<T>, request: PageRequest, count: u64, base_url: &str) -> Self {
        let pages = page_count(count, request.size);
        let link = |number: u64| page_url(base_url, number, request.size);

        Self {
            data,
            links: PageLinks {
                first: link(1),
                last: link(pages),
                next: if request.number < pages {
                    link(request.number + 1)
                } else {
                    None
                },
                prev: if request.number > 1 {
                    link(request.number.min(pages + 1) - 1)
                } else {
                    None
                },
            },
            meta: PageMeta {
                pagination: PaginationMeta {
                    page: request.number,
                    pages,
                    count,
                },
            },
        }
    }
}

fn page_url(base_url: &str, number: u64, size: u64) -> Option<String> {
    let mut url = Url::parse(base_url).ok()?;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != PAGE_NUMBER_PARAM && key != PAGE_SIZE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(PAGE_NUMBER_PARAM, &number.to_string())
        .append_pair(PAGE_SIZE_PARAM, &size.to_string());
    Some(url.to_string())
}

/// Absolute URL of the current request, including its query string.
pub fn request_url(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}{}", info.scheme(), info.host(), req.uri())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rest(page_size: usize) -> RestSettings {
        RestSettings {
            datetime_format: crate::config::DATETIME_FORMAT.to_string(),
            page_size,
            max_page_size: 100,
            default_permission_classes: vec![],
            default_authentication_classes: vec![],
        }
    }

    #[test]
    fn test_page_request_defaults_and_caps() {
        let req = PageRequest::from_query(&PageQuery::default(), &rest(10));
        assert_eq!(req, PageRequest { number: 1, size: 10 });
        assert_eq!(req.offset().unwrap(), 0);

        let query = PageQuery {
            number: Some(3),
            size: Some(500),
        };
        let req = PageRequest::from_query(&query, &rest(10));
        assert_eq!(req, PageRequest { number: 3, size: 100 });
        assert_eq!(req.offset().unwrap(), 200);

        let query = PageQuery {
            number: Some(0),
            size: Some(0),
        };
        assert_eq!(
            PageRequest::from_query(&query, &rest(10)),
            PageRequest { number: 1, size: 10 }
        );
    }

    #[test]
    fn test_page_links() {
        let request = PageRequest { number: 2, size: 10 };
        let page = Page::new(vec![1, 2, 3], request, 25, "http://localhost/users/?sort=id");

        assert_eq!(page.meta.pagination, PaginationMeta { page: 2, pages: 3, count: 25 });
        assert_eq!(
            page.links.next.as_deref(),
            Some("http://localhost/users/?sort=id&page%5Bnumber%5D=3&page%5Bsize%5D=10")
        );
        assert_eq!(
            page.links.prev.as_deref(),
            Some("http://localhost/users/?sort=id&page%5Bnumber%5D=1&page%5Bsize%5D=10")
        );
    }

    #[test]
    fn test_links_replace_existing_page_params() {
        let request = PageRequest { number: 1, size: 5 };
        let page = Page::new(
            Vec::<u8>::new(),
            request,
            0,
            "http://localhost/users/?page%5Bnumber%5D=9",
        );

        assert_eq!(page.meta.pagination.pages, 1);
        assert_eq!(page.links.next, None);
        assert_eq!(page.links.prev, None);
        assert_eq!(
            page.links.first.as_deref(),
            Some("http://localhost/users/?page%5Bnumber%5D=1&page%5Bsize%5D=5")
        );
    }

    #[test]
    fn test_huge_page_numbers_are_not_found() {
        for number in [u64::MAX, 100_000_000_000_000_000] {
            let request = PageRequest { number, size: 100 };
            assert!(matches!(request.offset(), Err(AppError::NotFound(_))));
        }
        let request = PageRequest { number: i64::MAX as u64, size: 1 };
        assert_eq!(request.offset().unwrap(), i64::MAX - 1);
    }

    #[test]
    fn test_pages_past_the_last_are_not_found() {
        let request = PageRequest { number: 3, size: 10 };
        assert!(request.ensure_within(25).is_ok());
        assert!(matches!(request.ensure_within(20), Err(AppError::NotFound(_))));

        let first = PageRequest { number: 1, size: 10 };
        assert!(first.ensure_within(0).is_ok());
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
    }
}
