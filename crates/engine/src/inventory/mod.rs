//! Read-only view of the auction corpus. The ingestion job that populates it
//! is an external collaborator; the engine only ever queries.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct AuctionRow {
    pub id: String,
    pub domain_name: String,
    pub price: f64,
    pub tld: String,
    pub end_time_ms: i64,
    /// Years. `None` or `0` means unknown.
    pub domain_age: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// Auctions closing next come first.
    #[default]
    EndingSoonest,
    /// Most recently listed first (descending end time as a proxy).
    Newest,
}

/// Predicate pushdown: every structured filter a pattern carries is applied
/// here so rows already excluded never reach the regex.
#[derive(Debug, Clone, Default)]
pub struct AuctionQuery {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub tld: Option<String>,
    pub min_stem_length: Option<u16>,
    pub max_stem_length: Option<u16>,
    pub min_age: Option<u16>,
    pub max_age: Option<u16>,
    pub ends_before_ms: Option<i64>,
    /// Case-insensitive "name contains any of these literals" pre-filter.
    pub name_contains_any: Vec<String>,
    pub order_by: OrderBy,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug)]
pub struct InventoryError(pub String);

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inventory: {}", self.0)
    }
}

impl std::error::Error for InventoryError {}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        Self(e.to_string())
    }
}

#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn list_auctions(&self, query: &AuctionQuery) -> Result<Vec<AuctionRow>, InventoryError>;
}

/// The domain name up to its first dot, which is what patterns match against.
pub fn stem(domain_name: &str) -> &str {
    domain_name.split('.').next().unwrap_or(domain_name)
}

/// Lowercase, no leading dot: `.IO` and `io` compare equal.
pub fn normalize_tld(tld: &str) -> String {
    tld.trim_start_matches('.').to_ascii_lowercase()
}

pub struct PgInventorySource {
    pool: PgPool,
}

impl PgInventorySource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_auction(row: &PgRow) -> Result<AuctionRow, sqlx::Error> {
    let end_time: chrono::DateTime<chrono::Utc> = row.try_get("end_time")?;
    Ok(AuctionRow {
        id: row.try_get("id")?,
        domain_name: row.try_get("domain_name")?,
        price: row.try_get("price")?,
        tld: row.try_get("tld")?,
        end_time_ms: end_time.timestamp_millis(),
        domain_age: row.try_get("domain_age")?,
    })
}

#[async_trait]
impl InventorySource for PgInventorySource {
    async fn list_auctions(&self, query: &AuctionQuery) -> Result<Vec<AuctionRow>, InventoryError> {
        let mut sql = String::from(
            "SELECT id, domain_name, price, tld, end_time, domain_age FROM auctions WHERE 1=1",
        );
        let mut binds: Vec<String> = Vec::new();
        let mut n = 0usize;
        let mut next = |binds: &mut Vec<String>, v: String| {
            binds.push(v);
            n += 1;
            n
        };

        if let Some(p) = query.min_price {
            let i = next(&mut binds, p.to_string());
            sql.push_str(&format!(" AND price >= ${i}::double precision"));
        }
        if let Some(p) = query.max_price {
            let i = next(&mut binds, p.to_string());
            sql.push_str(&format!(" AND price <= ${i}::double precision"));
        }
        if let Some(tld) = &query.tld {
            let i = next(&mut binds, normalize_tld(tld));
            sql.push_str(&format!(" AND lower(ltrim(tld, '.')) = ${i}"));
        }
        if let Some(len) = query.min_stem_length {
            let i = next(&mut binds, len.to_string());
            sql.push_str(&format!(
                " AND char_length(split_part(domain_name, '.', 1)) >= ${i}::int"
            ));
        }
        if let Some(len) = query.max_stem_length {
            let i = next(&mut binds, len.to_string());
            sql.push_str(&format!(
                " AND char_length(split_part(domain_name, '.', 1)) <= ${i}::int"
            ));
        }
        if let Some(age) = query.min_age {
            let i = next(&mut binds, age.to_string());
            sql.push_str(&format!(" AND domain_age >= ${i}::int AND domain_age > 0"));
        }
        if let Some(age) = query.max_age {
            let i = next(&mut binds, age.to_string());
            sql.push_str(&format!(" AND domain_age <= ${i}::int AND domain_age > 0"));
        }
        if let Some(ms) = query.ends_before_ms {
            let i = next(&mut binds, ms.to_string());
            sql.push_str(&format!(
                " AND end_time <= to_timestamp(${i}::double precision / 1000)"
            ));
        }
        if !query.name_contains_any.is_empty() {
            let mut parts = Vec::new();
            for token in &query.name_contains_any {
                let i = next(&mut binds, format!("%{token}%"));
                parts.push(format!("domain_name ILIKE ${i}"));
            }
            sql.push_str(&format!(" AND ({})", parts.join(" OR ")));
        }

        sql.push_str(match query.order_by {
            OrderBy::EndingSoonest => " ORDER BY end_time ASC",
            OrderBy::Newest => " ORDER BY end_time DESC",
        });
        sql.push_str(&format!(" OFFSET {} LIMIT {}", query.offset, query.limit));

        let mut q = sqlx::query(&sql);
        for b in &binds {
            q = q.bind(b);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| row_to_auction(r).map_err(Into::into))
            .collect()
    }
}

/// In-memory corpus used by tests and standalone mode.
#[derive(Clone, Default)]
pub struct MemoryInventory {
    rows: Arc<RwLock<Vec<AuctionRow>>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, row: AuctionRow) {
        self.rows.write().expect("inventory lock").push(row);
    }

    pub fn extend(&self, rows: impl IntoIterator<Item = AuctionRow>) {
        self.rows.write().expect("inventory lock").extend(rows);
    }

    pub fn len(&self) -> usize {
        self.rows.read().expect("inventory lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches(query: &AuctionQuery, row: &AuctionRow) -> bool {
        if let Some(p) = query.min_price {
            if row.price < p {
                return false;
            }
        }
        if let Some(p) = query.max_price {
            if row.price > p {
                return false;
            }
        }
        if let Some(tld) = &query.tld {
            if normalize_tld(&row.tld) != normalize_tld(tld) {
                return false;
            }
        }
        let stem_len = stem(&row.domain_name).chars().count();
        if let Some(len) = query.min_stem_length {
            if stem_len < len as usize {
                return false;
            }
        }
        if let Some(len) = query.max_stem_length {
            if stem_len > len as usize {
                return false;
            }
        }
        if query.min_age.is_some() || query.max_age.is_some() {
            let age = match row.domain_age {
                Some(a) if a > 0 => a,
                // Unknown age never satisfies an age-bounded query.
                _ => return false,
            };
            if let Some(min) = query.min_age {
                if age < min as i32 {
                    return false;
                }
            }
            if let Some(max) = query.max_age {
                if age > max as i32 {
                    return false;
                }
            }
        }
        if let Some(ms) = query.ends_before_ms {
            if row.end_time_ms > ms {
                return false;
            }
        }
        if !query.name_contains_any.is_empty() {
            let name = row.domain_name.to_ascii_lowercase();
            if !query
                .name_contains_any
                .iter()
                .any(|t| name.contains(&t.to_ascii_lowercase()))
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl InventorySource for MemoryInventory {
    async fn list_auctions(&self, query: &AuctionQuery) -> Result<Vec<AuctionRow>, InventoryError> {
        let rows = self.rows.read().expect("inventory lock");
        let mut selected: Vec<AuctionRow> = rows
            .iter()
            .filter(|r| Self::matches(query, r))
            .cloned()
            .collect();
        match query.order_by {
            OrderBy::EndingSoonest => selected.sort_by_key(|r| r.end_time_ms),
            OrderBy::Newest => selected.sort_by_key(|r| std::cmp::Reverse(r.end_time_ms)),
        }
        Ok(selected
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn auction(id: &str, name: &str, price: f64, tld: &str) -> AuctionRow {
        AuctionRow {
            id: id.into(),
            domain_name: name.into(),
            price,
            tld: tld.into(),
            end_time_ms: 1_000_000,
            domain_age: None,
        }
    }

    fn query(limit: u64) -> AuctionQuery {
        AuctionQuery {
            limit,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn price_bounds_push_down() {
        let inv = MemoryInventory::new();
        inv.push(auction("a-1", "cheap.com", 10.0, "com"));
        inv.push(auction("a-2", "mid.com", 50.0, "com"));
        inv.push(auction("a-3", "dear.com", 500.0, "com"));

        let mut q = query(10);
        q.min_price = Some(20.0);
        q.max_price = Some(100.0);
        let rows = inv.list_auctions(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a-2");
    }

    #[tokio::test]
    async fn tld_filter_normalizes_case_and_dot() {
        let inv = MemoryInventory::new();
        inv.push(auction("a-1", "cat.io", 5.0, "io"));
        inv.push(auction("a-2", "cat.com", 5.0, "com"));

        let mut q = query(10);
        q.tld = Some(".IO".into());
        let rows = inv.list_auctions(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].domain_name, "cat.io");
    }

    #[tokio::test]
    async fn unknown_age_excluded_from_age_bounded_query() {
        let inv = MemoryInventory::new();
        let mut old = auction("a-1", "aged.com", 5.0, "com");
        old.domain_age = Some(10);
        let mut zero = auction("a-2", "zero.com", 5.0, "com");
        zero.domain_age = Some(0);
        inv.push(old);
        inv.push(zero);
        inv.push(auction("a-3", "unknown.com", 5.0, "com"));

        let mut q = query(10);
        q.min_age = Some(5);
        let rows = inv.list_auctions(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a-1");
    }

    #[tokio::test]
    async fn contains_any_is_case_insensitive_or() {
        let inv = MemoryInventory::new();
        inv.push(auction("a-1", "MyShop.com", 5.0, "com"));
        inv.push(auction("a-2", "store.com", 5.0, "com"));
        inv.push(auction("a-3", "blog.com", 5.0, "com"));

        let mut q = query(10);
        q.name_contains_any = vec!["shop".into(), "store".into()];
        let rows = inv.list_auctions(&q).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn pagination_respects_order() {
        let inv = MemoryInventory::new();
        for i in 0..5 {
            let mut row = auction(&format!("a-{i}"), &format!("name{i}.com"), 5.0, "com");
            row.end_time_ms = 1000 * (i as i64 + 1);
            inv.push(row);
        }

        let mut q = query(2);
        q.offset = 2;
        let rows = inv.list_auctions(&q).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "a-2");
        assert_eq!(rows[1].id, "a-3");
    }

    #[test]
    fn stem_strips_tld() {
        assert_eq!(stem("aidog.com"), "aidog");
        assert_eq!(stem("multi.part.io"), "multi");
        assert_eq!(stem("nodot"), "nodot");
    }

    #[test]
    fn normalize_tld_examples() {
        assert_eq!(normalize_tld(".IO"), "io");
        assert_eq!(normalize_tld("com"), "com");
    }
}
