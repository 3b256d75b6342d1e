//! Table widget view: global filter, column sort, pagination

use crate::quotes::Quote;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const DEFAULT_PAGE_SIZE: usize = 10;

/// Sortable table columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableColumn {
    Symbol,
    Name,
    Price,
    Change,
    ChangePercent,
    Volume,
    MarketCap,
    High,
    Low,
    Open,
    PreviousClose,
}

/// Table view request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableQuery {
    pub filter: Option<String>,
    pub sort: Option<TableColumn>,
    #[serde(default)]
    pub desc: bool,
    /// 1-based
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// One page of table rows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePage {
    pub rows: Vec<Quote>,
    /// Rows matching the filter, across all pages
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
}

fn numeric(column: TableColumn, q: &Quote) -> f64 {
    match column {
        TableColumn::Price => q.price,
        TableColumn::Change => q.change,
        TableColumn::ChangePercent => q.change_percent,
        TableColumn::Volume => q.volume as f64,
        TableColumn::MarketCap => q.market_cap.unwrap_or(f64::NEG_INFINITY),
        TableColumn::High => q.high,
        TableColumn::Low => q.low,
        TableColumn::Open => q.open,
        TableColumn::PreviousClose => q.previous_close,
        TableColumn::Symbol | TableColumn::Name => 0.0,
    }
}

fn compare(column: TableColumn, a: &Quote, b: &Quote) -> Ordering {
    match column {
        TableColumn::Symbol => a.symbol.cmp(&b.symbol),
        TableColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        _ => numeric(column, a).total_cmp(&numeric(column, b)),
    }
}

/// Filter, sort and paginate table rows
pub fn table_view(rows: &[Quote], query: &TableQuery) -> TablePage {
    let needle = query
        .filter
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_lowercase);

    let mut matched: Vec<Quote> = rows
        .iter()
        .filter(|q| match &needle {
            Some(n) => q.symbol.to_lowercase().contains(n) || q.name.to_lowercase().contains(n),
            None => true,
        })
        .cloned()
        .collect();

    if let Some(column) = query.sort {
        matched.sort_by(|a, b| {
            let ord = compare(column, a, b);
            if query.desc {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let page = query.page.unwrap_or(1).max(1);
    let total = matched.len();
    let page_count = total.div_ceil(page_size);

    let rows = matched
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    TablePage {
        rows,
        total,
        page,
        page_size,
        page_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::mock::quote;

    fn rows() -> Vec<Quote> {
        vec![quote("MSFT", 410.0), quote("AAPL", 190.0), quote("AMZN", 180.0), quote("NVDA", 900.0)]
    }

    fn symbols(page: &TablePage) -> Vec<&str> {
        page.rows.iter().map(|q| q.symbol.as_str()).collect()
    }

    #[test]
    fn test_sort_by_price_descending() {
        let page = table_view(
            &rows(),
            &TableQuery {
                sort: Some(TableColumn::Price),
                desc: true,
                ..Default::default()
            },
        );
        assert_eq!(symbols(&page), vec!["NVDA", "MSFT", "AAPL", "AMZN"]);
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let page = table_view(
            &rows(),
            &TableQuery {
                filter: Some("a".into()),
                sort: Some(TableColumn::Symbol),
                ..Default::default()
            },
        );
        assert_eq!(symbols(&page), vec!["AAPL", "AMZN", "NVDA"]);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_pagination() {
        let query = TableQuery {
            sort: Some(TableColumn::Symbol),
            page: Some(2),
            page_size: Some(3),
            ..Default::default()
        };
        let page = table_view(&rows(), &query);
        assert_eq!(symbols(&page), vec!["NVDA"]);
        assert_eq!(page.total, 4);
        assert_eq!(page.page_count, 2);

        let past_end = table_view(&rows(), &TableQuery { page: Some(9), ..query });
        assert!(past_end.rows.is_empty());
    }

    #[test]
    fn test_huge_page_number_is_empty() {
        let query = TableQuery {
            page: Some(usize::MAX),
            page_size: Some(2),
            ..Default::default()
        };
        let page = table_view(&rows(), &query);
        assert!(page.rows.is_empty());
        assert_eq!(page.page, usize::MAX);
        assert_eq!(page.page_count, 2);

        let page = table_view(
            &rows(),
            &TableQuery {
                page: Some(2),
                page_size: Some(usize::MAX),
                ..Default::default()
            },
        );
        assert!(page.rows.is_empty());
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn test_unsorted_keeps_widget_order() {
        let page = table_view(&rows(), &TableQuery::default());
        assert_eq!(symbols(&page), vec!["MSFT", "AAPL", "AMZN", "NVDA"]);
        assert_eq!(page.page_size, 10);
    }
}
