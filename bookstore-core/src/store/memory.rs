//! In-memory [`Store`] used by tests and local development.
//!
//! Matches the Postgres implementation's observable behavior: same
//! ordering, same upsert semantics, same all-or-nothing invoice commit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AuthorFilter, BookFilter, BookPatch, NewBook, NewOrderLine, Page, StockDecrement, Store,
    StoreError,
};
use crate::entities::{Author, Book, INITIAL_ORDER_STATUS, Order, OrderItem};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    authors: HashMap<i64, Author>,
    books: HashMap<i64, Book>,
    orders: HashMap<Uuid, Order>,
    items: Vec<OrderItem>,
    next_author_id: i64,
    next_book_id: i64,
    next_item_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // No await ever happens while the guard is held.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn upsert_author(&mut self, name: &str) -> Author {
        if let Some(existing) = self.authors.values().find(|a| a.name == name) {
            return existing.clone();
        }
        self.next_author_id += 1;
        let author = Author {
            id: self.next_author_id,
            name: name.to_owned(),
        };
        self.authors.insert(author.id, author.clone());
        author
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> Vec<T> {
    let offset = page.offset.max(0) as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    items.drain(..offset);
    items.truncate(page.limit.max(0) as usize);
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_author(&self, name: &str) -> Result<Author, StoreError> {
        Ok(self.lock().upsert_author(name))
    }

    async fn author_by_id(&self, id: i64) -> Result<Option<Author>, StoreError> {
        Ok(self.lock().authors.get(&id).cloned())
    }

    async fn list_authors(&self, filter: &AuthorFilter) -> Result<Vec<Author>, StoreError> {
        let inner = self.lock();
        let mut authors: Vec<Author> = inner
            .authors
            .values()
            .filter(|a| match &filter.name {
                Some(name) => contains_ci(&a.name, name),
                None => true,
            })
            .cloned()
            .collect();
        authors.sort_by_key(|a| a.id);
        Ok(paginate(authors, filter.page))
    }

    async fn create_book(&self, new: &NewBook) -> Result<Book, StoreError> {
        let mut inner = self.lock();
        let author = inner.upsert_author(&new.author);
        inner.next_book_id += 1;
        let book = Book {
            id: inner.next_book_id,
            title: new.title.clone(),
            author_id: author.id,
            author: author.name,
            genre: new.genre.clone(),
            publication_date: new.publication_date,
            price: new.price,
            quantity: new.quantity,
        };
        inner.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn book_by_id(&self, id: i64) -> Result<Option<Book>, StoreError> {
        Ok(self.lock().books.get(&id).cloned())
    }

    async fn update_book(&self, id: i64, patch: &BookPatch) -> Result<Option<Book>, StoreError> {
        let mut inner = self.lock();
        if !inner.books.contains_key(&id) {
            return Ok(None);
        }
        let author = patch
            .author
            .as_deref()
            .map(|name| inner.upsert_author(name));
        let Some(book) = inner.books.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            book.title = title.clone();
        }
        if let Some(author) = author {
            book.author_id = author.id;
            book.author = author.name;
        }
        if let Some(genre) = &patch.genre {
            book.genre = genre.clone();
        }
        if let Some(date) = patch.publication_date {
            book.publication_date = date;
        }
        if let Some(price) = patch.price {
            book.price = price;
        }
        if let Some(quantity) = patch.quantity {
            book.quantity = quantity;
        }
        Ok(Some(book.clone()))
    }

    async fn delete_book(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let removed = inner.books.remove(&id).is_some();
        if removed {
            // order items cascade with the book, as in the schema
            inner.items.retain(|item| item.book_id != id);
        }
        Ok(removed)
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let inner = self.lock();
        let mut books: Vec<Book> = inner
            .books
            .values()
            .filter(|b| {
                filter
                    .title
                    .as_deref()
                    .is_none_or(|t| contains_ci(&b.title, t))
                    && filter
                        .author
                        .as_deref()
                        .is_none_or(|a| contains_ci(&b.author, a))
                    && filter
                        .genre
                        .as_deref()
                        .is_none_or(|g| contains_ci(&b.genre, g))
            })
            .cloned()
            .collect();
        books.sort_by_key(|b| b.id);
        Ok(paginate(books, filter.page))
    }

    async fn insert_order(&self, lines: &[NewOrderLine]) -> Result<Order, StoreError> {
        let total: i64 = lines.iter().map(|l| l.unit_price * l.quantity).sum();
        let mut inner = self.lock();
        let order = Order {
            id: Uuid::now_v7(),
            created_at: OffsetDateTime::now_utc(),
            total_price: total,
            invoice_id: None,
            status: INITIAL_ORDER_STATUS.to_owned(),
        };
        for line in lines {
            inner.next_item_id += 1;
            let id = inner.next_item_id;
            inner.items.push(OrderItem {
                id,
                order_id: order.id,
                book_id: line.book_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }
        inner.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn list_orders(&self, page: Page) -> Result<Vec<Order>, StoreError> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(orders, page))
    }

    async fn items_for_order(&self, id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
        let inner = self.lock();
        let mut items: Vec<OrderItem> = inner
            .items
            .iter()
            .filter(|item| item.order_id == id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn commit_invoice(
        &self,
        order_id: Uuid,
        invoice_id: &str,
        decrements: &[StockDecrement],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();

        // validate everything before touching anything, like the SQL
        // transaction that rolls back on the first failed decrement
        for dec in decrements {
            let available = inner.books.get(&dec.book_id).map_or(0, |b| b.quantity);
            if available < dec.quantity {
                return Err(StoreError::StockConflict {
                    book_id: dec.book_id,
                    available,
                });
            }
        }

        for dec in decrements {
            if let Some(book) = inner.books.get_mut(&dec.book_id) {
                book.quantity -= dec.quantity;
            }
        }
        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.invoice_id = Some(invoice_id.to_owned());
        }
        Ok(())
    }

    async fn update_order_status(&self, order_id: Uuid, status: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.orders.get_mut(&order_id) {
            Some(order) => {
                order.status = status.to_owned();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn orphaned_orders(&self, min_age: Duration) -> Result<Vec<Order>, StoreError> {
        let cutoff = OffsetDateTime::now_utc() - min_age;
        let inner = self.lock();
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.invoice_id.is_none() && o.created_at < cutoff)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}
