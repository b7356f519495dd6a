//! Postgres-backed [`Store`].
//!
//! Filters are assembled with `QueryBuilder` so only the provided
//! predicates land in the SQL; every user-supplied term goes through a
//! bind with escaped LIKE wildcards.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AuthorFilter, BookFilter, BookPatch, NewBook, NewOrderLine, Page, StockDecrement, Store,
    StoreError,
};
use crate::entities::{Author, Book, INITIAL_ORDER_STATUS, Order, OrderItem};

const BOOK_COLUMNS: &str = "b.id, b.title, b.author_id, a.name AS author, b.genre, \
     b.publication_date, b.price, b.quantity";

/// [`Store`] over a `sqlx` Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_author(&self, name: &str) -> Result<Author, StoreError> {
        let author = upsert_author_on(&self.pool, name).await?;
        Ok(author)
    }

    async fn author_by_id(&self, id: i64) -> Result<Option<Author>, StoreError> {
        let author = sqlx::query_as::<_, Author>("SELECT id, name FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(author)
    }

    async fn list_authors(&self, filter: &AuthorFilter) -> Result<Vec<Author>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id, name FROM authors");
        if let Some(name) = &filter.name {
            qb.push(" WHERE name ILIKE ").push_bind(like_pattern(name));
        }
        push_page(&mut qb, " ORDER BY id", filter.page);

        let authors = qb.build_query_as::<Author>().fetch_all(&self.pool).await?;
        Ok(authors)
    }

    async fn create_book(&self, new: &NewBook) -> Result<Book, StoreError> {
        let mut tx = self.pool.begin().await?;

        let author = upsert_author_on(&mut *tx, &new.author).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO books (title, author_id, genre, publication_date, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&new.title)
        .bind(author.id)
        .bind(&new.genre)
        .bind(new.publication_date)
        .bind(new.price)
        .bind(new.quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Book {
            id,
            title: new.title.clone(),
            author_id: author.id,
            author: author.name,
            genre: new.genre.clone(),
            publication_date: new.publication_date,
            price: new.price,
            quantity: new.quantity,
        })
    }

    async fn book_by_id(&self, id: i64) -> Result<Option<Book>, StoreError> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books b JOIN authors a ON a.id = b.author_id \
             WHERE b.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn update_book(&self, id: i64, patch: &BookPatch) -> Result<Option<Book>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let author_id = match &patch.author {
            Some(name) => Some(upsert_author_on(&mut *tx, name).await?.id),
            None => None,
        };

        let updated = sqlx::query(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author_id = COALESCE($3, author_id),
                genre = COALESCE($4, genre),
                publication_date = COALESCE($5, publication_date),
                price = COALESCE($6, price),
                quantity = COALESCE($7, quantity)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.title)
        .bind(author_id)
        .bind(&patch.genre)
        .bind(patch.publication_date)
        .bind(patch.price)
        .bind(patch.quantity)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let book = fetch_book_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(book)
    }

    async fn delete_book(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {BOOK_COLUMNS} FROM books b JOIN authors a ON a.id = b.author_id"
        ));

        let mut prefix = " WHERE ";
        if let Some(title) = &filter.title {
            qb.push(prefix)
                .push("b.title ILIKE ")
                .push_bind(like_pattern(title));
            prefix = " AND ";
        }
        if let Some(author) = &filter.author {
            qb.push(prefix)
                .push("a.name ILIKE ")
                .push_bind(like_pattern(author));
            prefix = " AND ";
        }
        if let Some(genre) = &filter.genre {
            qb.push(prefix)
                .push("b.genre ILIKE ")
                .push_bind(like_pattern(genre));
        }
        push_page(&mut qb, " ORDER BY b.id", filter.page);

        let books = qb.build_query_as::<Book>().fetch_all(&self.pool).await?;
        Ok(books)
    }

    async fn insert_order(&self, lines: &[NewOrderLine]) -> Result<Order, StoreError> {
        let total: i64 = lines.iter().map(|l| l.unit_price * l.quantity).sum();

        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (id, total_price, status)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, total_price, invoice_id, status
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(total)
        .bind(INITIAL_ORDER_STATUS)
        .fetch_one(&mut *tx)
        .await?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO order_items (order_id, book_id, quantity, unit_price) ",
        );
        qb.push_values(lines, |mut b, line| {
            b.push_bind(order.id)
                .push_bind(line.book_id)
                .push_bind(line.quantity)
                .push_bind(line.unit_price);
        });
        qb.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, created_at, total_price, invoice_id, status FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn list_orders(&self, page: Page) -> Result<Vec<Order>, StoreError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, created_at, total_price, invoice_id, status
            FROM orders
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn items_for_order(&self, id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, book_id, quantity, unit_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn commit_invoice(
        &self,
        order_id: Uuid,
        invoice_id: &str,
        decrements: &[StockDecrement],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE orders SET invoice_id = $2 WHERE id = $1")
            .bind(order_id)
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        for dec in decrements {
            let result = sqlx::query(
                "UPDATE books SET quantity = quantity - $2 WHERE id = $1 AND quantity >= $2",
            )
            .bind(dec.book_id)
            .bind(dec.quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available = current_quantity(&mut tx, dec.book_id).await?;
                tx.rollback().await?;
                return Err(StoreError::StockConflict {
                    book_id: dec.book_id,
                    available,
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_order_status(&self, order_id: Uuid, status: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn orphaned_orders(&self, min_age: Duration) -> Result<Vec<Order>, StoreError> {
        let cutoff = OffsetDateTime::now_utc() - min_age;
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, created_at, total_price, invoice_id, status
            FROM orders
            WHERE invoice_id IS NULL AND created_at < $1
            ORDER BY created_at
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }
}

/// Conflict-safe author upsert. `DO UPDATE` instead of `DO NOTHING` so
/// `RETURNING` always yields the row.
async fn upsert_author_on<'e, E>(executor: E, name: &str) -> Result<Author, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Author>(
        r#"
        INSERT INTO authors (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, name
        "#,
    )
    .bind(name)
    .fetch_one(executor)
    .await
}

async fn fetch_book_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
) -> Result<Option<Book>, sqlx::Error> {
    sqlx::query_as::<_, Book>(&format!(
        "SELECT {BOOK_COLUMNS} FROM books b JOIN authors a ON a.id = b.author_id WHERE b.id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

async fn current_quantity(
    tx: &mut Transaction<'_, Postgres>,
    book_id: i64,
) -> Result<i64, sqlx::Error> {
    let quantity: Option<i64> = sqlx::query_scalar("SELECT quantity FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(quantity.unwrap_or(0))
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, order_by: &str, page: Page) {
    qb.push(order_by)
        .push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);
}

/// Wrap a search term in `%…%`, escaping LIKE wildcards so user input
/// matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("war"), "%war%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
    }
}
