//! Page-number based windows over an ordered query.

use sea_orm::{ConnectionTrait, DbErr, PaginatorTrait, SelectorTrait};
use serde::Serialize;

/// One page of an ordered listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number
    pub number: u64,
    pub num_pages: u64,
    pub num_items: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<u64>,
    pub previous_page_number: Option<u64>,
    pub page_range: Vec<u64>,
}

impl<T> Page<T> {
    /// Build page `number` of `num_pages` holding `items`.
    pub fn new(items: Vec<T>, number: u64, num_pages: u64, num_items: u64) -> Self {
        let num_pages = num_pages.max(1);
        let has_next = number < num_pages;
        let has_previous = number > 1;

        Self {
            items,
            number,
            num_pages,
            num_items,
            has_next,
            has_previous,
            next_page_number: has_next.then(|| number + 1),
            previous_page_number: has_previous.then(|| number - 1),
            page_range: (1..=num_pages).collect(),
        }
    }

    /// Same page with every item converted by `f`.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            num_items: self.num_items,
            has_next: self.has_next,
            has_previous: self.has_previous,
            next_page_number: self.next_page_number,
            previous_page_number: self.previous_page_number,
            page_range: self.page_range,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Turn the raw `?page=` value into a page number in `1..=num_pages`.
///
/// A missing or non-numeric value selects the first page; a number outside
/// the valid range selects the last one.
pub fn resolve_page_number(requested: Option<&str>, num_pages: u64) -> u64 {
    let num_pages = num_pages.max(1);
    let Some(number) = requested.and_then(|raw| raw.trim().parse::<i64>().ok()) else {
        return 1;
    };

    if number < 1 || number as u64 > num_pages {
        num_pages
    } else {
        number as u64
    }
}

/// Fetch the requested page of `query`, `page_size` rows per page.
pub async fn fetch_page<'db, C, P>(
    db: &'db C,
    query: P,
    page_size: u64,
    requested: Option<&str>,
) -> Result<Page<<P::Selector as SelectorTrait>::Item>, DbErr>
where
    C: ConnectionTrait,
    P: PaginatorTrait<'db, C>,
{
    let paginator = query.paginate(db, page_size.max(1));
    let totals = paginator.num_items_and_pages().await?;
    let number = resolve_page_number(requested, totals.number_of_pages);
    let items = paginator.fetch_page(number - 1).await?;

    Ok(Page::new(
        items,
        number,
        totals.number_of_pages,
        totals.number_of_items,
    ))
}
