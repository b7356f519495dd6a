//! Order placement and payment-callback processing.
//!
//! The pipeline is deliberately strict about ordering:
//! - validation never mutates anything;
//! - the order row is persisted before the provider is called, so a
//!   gateway failure leaves a recoverable orphan instead of a charge
//!   without an order;
//! - stock moves exactly once, in the same transaction that attaches the
//!   invoice id.

pub mod sweep;

pub use sweep::OrphanSweeper;

use std::sync::Arc;

use bookstore_mono::MonoError;
use bookstore_mono::invoice::{BasketLine, InvoiceRequest, MerchantPaymInfo};
use bookstore_mono::verify::verify_callback;
use bookstore_mono::webhook::CallbackPayload;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::ListingCache;
use crate::gateway::{PaymentGateway, PubkeyCache};
use crate::store::{NewOrderLine, StockDecrement, Store, StoreError};

/// One requested order line as it arrives from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub book_id: i64,
    pub quantity: i64,
}

/// Outcome of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    /// Hosted checkout page the customer is redirected to.
    pub checkout_url: String,
}

/// Placement failures, in the order the checks run.
#[derive(Debug, thiserror::Error)]
pub enum PlaceOrderError {
    #[error("order must contain at least one item")]
    EmptyOrder,

    #[error("book not found")]
    BookNotFound { book_id: i64 },

    #[error("quantity must be greater than 0")]
    InvalidQuantity { book_id: i64, quantity: i64 },

    #[error("available quantity = {available}")]
    InsufficientStock { book_id: i64, available: i64 },

    /// Invoice creation failed; the order is persisted without an
    /// invoice id and will surface in the orphan sweep.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] MonoError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Callback rejections. None of these mutate state.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The signing key could not be fetched from the provider.
    #[error("signing key unavailable: {0}")]
    Pubkey(#[source] MonoError),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("malformed callback payload")]
    MalformedPayload,

    #[error("order not found")]
    OrderNotFound,

    /// The callback names an invoice that was not issued for the
    /// referenced order.
    #[error("invoice mismatch")]
    InvoiceMismatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives placement and callback processing against the [`Store`] and the
/// [`PaymentGateway`].
pub struct OrderService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    pubkey: Arc<PubkeyCache>,
    listings: Arc<ListingCache>,
    webhook_url: String,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        pubkey: Arc<PubkeyCache>,
        listings: Arc<ListingCache>,
        webhook_url: String,
    ) -> Self {
        Self {
            store,
            gateway,
            pubkey,
            listings,
            webhook_url,
        }
    }

    /// Place an order and create the checkout invoice for it.
    ///
    /// Lines are validated in input order, fail-fast: the book must
    /// exist, the quantity must be at least 1 and must not exceed the
    /// current stock. Nothing is written until every line passed.
    pub async fn place_order(
        &self,
        lines: &[OrderLine],
    ) -> Result<PlacedOrder, PlaceOrderError> {
        if lines.is_empty() {
            return Err(PlaceOrderError::EmptyOrder);
        }

        let mut validated = Vec::with_capacity(lines.len());
        let mut basket = Vec::with_capacity(lines.len());
        for line in lines {
            let book = self
                .store
                .book_by_id(line.book_id)
                .await?
                .ok_or(PlaceOrderError::BookNotFound {
                    book_id: line.book_id,
                })?;
            if line.quantity < 1 {
                return Err(PlaceOrderError::InvalidQuantity {
                    book_id: line.book_id,
                    quantity: line.quantity,
                });
            }
            if line.quantity > book.quantity {
                return Err(PlaceOrderError::InsufficientStock {
                    book_id: book.id,
                    available: book.quantity,
                });
            }
            validated.push(NewOrderLine {
                book_id: book.id,
                quantity: line.quantity,
                unit_price: book.price,
            });
            basket.push(BasketLine::piece(
                book.title,
                line.quantity,
                book.price * line.quantity,
            ));
        }

        let order = self.store.insert_order(&validated).await?;

        let request = InvoiceRequest {
            amount: order.total_price,
            merchant_paym_info: MerchantPaymInfo {
                reference: order.id.to_string(),
                basket_order: basket,
            },
            web_hook_url: self.webhook_url.clone(),
        };
        let invoice = match self.gateway.create_invoice(&request).await {
            Ok(invoice) => invoice,
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    error = %e,
                    "invoice creation failed; order left without invoice"
                );
                return Err(PlaceOrderError::Gateway(e));
            }
        };

        let decrements: Vec<StockDecrement> = validated
            .iter()
            .map(|line| StockDecrement {
                book_id: line.book_id,
                quantity: line.quantity,
            })
            .collect();
        match self
            .store
            .commit_invoice(order.id, &invoice.invoice_id, &decrements)
            .await
        {
            Ok(()) => {}
            Err(StoreError::StockConflict { book_id, available }) => {
                error!(
                    order_id = %order.id,
                    invoice_id = %invoice.invoice_id,
                    book_id,
                    available,
                    "stock changed between validation and commit; invoice exists upstream \
                     but the order was not committed"
                );
                return Err(PlaceOrderError::InsufficientStock { book_id, available });
            }
            Err(e) => return Err(e.into()),
        }

        self.listings.clear().await;
        info!(
            order_id = %order.id,
            invoice_id = %invoice.invoice_id,
            total = order.total_price,
            "order placed"
        );
        Ok(PlacedOrder {
            order_id: order.id,
            checkout_url: invoice.page_url,
        })
    }

    /// Apply a provider payment callback.
    ///
    /// The signature is checked over the exact raw bytes before the JSON
    /// is even parsed. The payload's invoice id must match the one stored
    /// for the referenced order, which pins each callback to the invoice
    /// issued for that order. The reported status is applied verbatim,
    /// last write wins.
    pub async fn handle_callback(
        &self,
        x_sign: &str,
        body: &[u8],
    ) -> Result<Uuid, CallbackError> {
        let key = self
            .pubkey
            .get_or_fetch(self.gateway.as_ref())
            .await
            .map_err(CallbackError::Pubkey)?;

        if !verify_callback(&key, x_sign, body) {
            warn!("callback signature mismatch");
            return Err(CallbackError::SignatureMismatch);
        }

        let payload: CallbackPayload =
            serde_json::from_slice(body).map_err(|_| CallbackError::MalformedPayload)?;

        let order_id =
            Uuid::parse_str(&payload.reference).map_err(|_| CallbackError::OrderNotFound)?;
        let order = self
            .store
            .order_by_id(order_id)
            .await?
            .ok_or(CallbackError::OrderNotFound)?;

        if order.invoice_id.as_deref() != Some(payload.invoice_id.as_str()) {
            warn!(
                order_id = %order_id,
                callback_invoice = %payload.invoice_id,
                "callback invoice does not match the one issued for this order"
            );
            return Err(CallbackError::InvoiceMismatch);
        }

        self.store
            .update_order_status(order_id, &payload.status)
            .await?;
        info!(order_id = %order_id, status = %payload.status, "payment status updated");
        Ok(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BookPatch, MemoryStore, NewBook, Page};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use bookstore_mono::invoice::CreatedInvoice;
    use ring::rand::SystemRandom;
    use ring::signature::{self, EcdsaKeyPair, KeyPair};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use time::macros::date;
    use tokio::sync::Mutex;

    // ASN.1 header of an SPKI wrapping an uncompressed P-256 point.
    const P256_SPKI_PREFIX: [u8; 26] = [
        0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
        0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
    ];

    fn signing_key() -> (EcdsaKeyPair, String) {
        let rng = SystemRandom::new();
        let pkcs8 =
            EcdsaKeyPair::generate_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let kp = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            pkcs8.as_ref(),
            &rng,
        )
        .unwrap();
        let mut der = P256_SPKI_PREFIX.to_vec();
        der.extend_from_slice(kp.public_key().as_ref());
        let pem_text = pem::encode(&pem::Pem::new("PUBLIC KEY", der));
        (kp, BASE64.encode(pem_text.as_bytes()))
    }

    fn sign(kp: &EcdsaKeyPair, body: &[u8]) -> String {
        let rng = SystemRandom::new();
        BASE64.encode(kp.sign(&rng, body).unwrap().as_ref())
    }

    enum Mode {
        Succeed,
        FailInvoice,
        FailPubkey,
        // simulates a concurrent sale between validation and commit
        SabotageStock {
            store: Arc<MemoryStore>,
            book_id: i64,
            remaining: i64,
        },
    }

    struct TestGateway {
        pubkey_b64: String,
        mode: Mode,
        requests: Mutex<Vec<InvoiceRequest>>,
        created: AtomicUsize,
    }

    impl TestGateway {
        fn new(pubkey_b64: String, mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                pubkey_b64,
                mode,
                requests: Mutex::new(Vec::new()),
                created: AtomicUsize::new(0),
            })
        }

        fn next_invoice(&self) -> CreatedInvoice {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            CreatedInvoice {
                invoice_id: format!("inv_{n}"),
                page_url: format!("https://pay.test/inv_{n}"),
            }
        }
    }

    #[async_trait::async_trait]
    impl PaymentGateway for TestGateway {
        async fn create_invoice(
            &self,
            req: &InvoiceRequest,
        ) -> Result<CreatedInvoice, MonoError> {
            self.requests.lock().await.push(req.clone());
            match &self.mode {
                Mode::FailInvoice => Err(MonoError::Api {
                    status: reqwest::StatusCode::FORBIDDEN,
                    body: "invalid token".to_owned(),
                }),
                Mode::SabotageStock {
                    store,
                    book_id,
                    remaining,
                } => {
                    let patch = BookPatch {
                        quantity: Some(*remaining),
                        ..Default::default()
                    };
                    store.update_book(*book_id, &patch).await.unwrap();
                    Ok(self.next_invoice())
                }
                _ => Ok(self.next_invoice()),
            }
        }

        async fn fetch_pubkey(&self) -> Result<String, MonoError> {
            if matches!(self.mode, Mode::FailPubkey) {
                return Err(MonoError::Api {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    body: "provider down".to_owned(),
                });
            }
            Ok(self.pubkey_b64.clone())
        }
    }

    fn service(store: Arc<MemoryStore>, gateway: Arc<TestGateway>) -> OrderService {
        OrderService::new(
            store,
            gateway,
            Arc::new(PubkeyCache::new()),
            Arc::new(ListingCache::new(Duration::from_secs(60))),
            "https://shop.test/api/monobank/callback".to_owned(),
        )
    }

    async fn seed_book(store: &MemoryStore, title: &str, price: i64, quantity: i64) -> i64 {
        store
            .create_book(&NewBook {
                title: title.to_owned(),
                author: "Taras Shevchenko".to_owned(),
                genre: "poetry".to_owned(),
                publication_date: date!(1840 - 04 - 18),
                price,
                quantity,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn placement_decrements_stock_and_attaches_invoice() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), Arc::clone(&gateway));

        let book_id = seed_book(&store, "Kobzar", 28_000, 10).await;

        let placed = svc
            .place_order(&[OrderLine {
                book_id,
                quantity: 3,
            }])
            .await
            .unwrap();
        assert_eq!(placed.checkout_url, "https://pay.test/inv_0");

        let book = store.book_by_id(book_id).await.unwrap().unwrap();
        assert_eq!(book.quantity, 7);

        let order = store.order_by_id(placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.total_price, 84_000);
        assert_eq!(order.invoice_id.as_deref(), Some("inv_0"));
        assert_eq!(order.status, "created");

        let request = gateway.requests.lock().await[0].clone();
        assert_eq!(request.amount, 84_000);
        assert_eq!(
            request.merchant_paym_info.reference,
            placed.order_id.to_string()
        );
        assert_eq!(request.merchant_paym_info.basket_order.len(), 1);
        assert_eq!(request.merchant_paym_info.basket_order[0].qty, 3);
        assert_eq!(request.merchant_paym_info.basket_order[0].sum, 84_000);
        assert_eq!(request.merchant_paym_info.basket_order[0].unit, "шт.");
    }

    #[tokio::test]
    async fn total_is_snapshotted_at_placement_time() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), gateway);

        let a = seed_book(&store, "Kobzar", 28_000, 10).await;
        let b = seed_book(&store, "Haidamaky", 19_000, 10).await;

        let placed = svc
            .place_order(&[
                OrderLine {
                    book_id: a,
                    quantity: 2,
                },
                OrderLine {
                    book_id: b,
                    quantity: 1,
                },
            ])
            .await
            .unwrap();

        // raise the catalog price afterwards
        store
            .update_book(
                a,
                &BookPatch {
                    price: Some(99_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let order = store.order_by_id(placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.total_price, 2 * 28_000 + 19_000);
        let items = store.items_for_order(placed.order_id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unit_price, 28_000);
    }

    #[tokio::test]
    async fn missing_book_is_a_noop_failure() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), Arc::clone(&gateway));

        let book_id = seed_book(&store, "Kobzar", 28_000, 10).await;

        let err = svc
            .place_order(&[
                OrderLine {
                    book_id,
                    quantity: 1,
                },
                OrderLine {
                    book_id: 777,
                    quantity: 1,
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlaceOrderError::BookNotFound { book_id: 777 }
        ));

        assert!(store.list_orders(Page::default()).await.unwrap().is_empty());
        assert_eq!(
            store.book_by_id(book_id).await.unwrap().unwrap().quantity,
            10
        );
        assert_eq!(gateway.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_stock() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), gateway);

        let book_id = seed_book(&store, "Kobzar", 28_000, 0).await;

        // quantity check fires even though stock is also insufficient
        let err = svc
            .place_order(&[OrderLine {
                book_id,
                quantity: 0,
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, PlaceOrderError::InvalidQuantity { .. }));
        assert_eq!(err.to_string(), "quantity must be greater than 0");
        assert!(store.list_orders(Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversell_reports_available_quantity() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), Arc::clone(&gateway));

        let book_id = seed_book(&store, "Kobzar", 28_000, 2).await;

        let err = svc
            .place_order(&[OrderLine {
                book_id,
                quantity: 5,
            }])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlaceOrderError::InsufficientStock { available: 2, .. }
        ));
        assert_eq!(err.to_string(), "available quantity = 2");

        assert!(store.list_orders(Page::default()).await.unwrap().is_empty());
        assert_eq!(
            store.book_by_id(book_id).await.unwrap().unwrap().quantity,
            2
        );
        assert_eq!(gateway.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_recoverable_orphan() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::FailInvoice);
        let svc = service(Arc::clone(&store), gateway);

        let book_id = seed_book(&store, "Kobzar", 28_000, 10).await;

        let err = svc
            .place_order(&[OrderLine {
                book_id,
                quantity: 3,
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, PlaceOrderError::Gateway(_)));

        // order persisted, stock untouched
        let orders = store.list_orders(Page::default()).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].invoice_id, None);
        assert_eq!(
            store.book_by_id(book_id).await.unwrap().unwrap().quantity,
            10
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        let orphans = store.orphaned_orders(Duration::ZERO).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, orders[0].id);
    }

    #[tokio::test]
    async fn commit_time_stock_conflict_rolls_back() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let svc_store = Arc::clone(&store);

        let book_id = seed_book(&store, "Kobzar", 28_000, 10).await;
        let gateway = TestGateway::new(
            key,
            Mode::SabotageStock {
                store: Arc::clone(&store),
                book_id,
                remaining: 1,
            },
        );
        let svc = service(svc_store, gateway);

        let err = svc
            .place_order(&[OrderLine {
                book_id,
                quantity: 3,
            }])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlaceOrderError::InsufficientStock { available: 1, .. }
        ));

        // the decrement rolled back; the sabotage value is untouched
        assert_eq!(
            store.book_by_id(book_id).await.unwrap().unwrap().quantity,
            1
        );
        // order exists but was never committed with an invoice
        let orders = store.list_orders(Page::default()).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].invoice_id, None);
    }

    async fn place_one(
        store: &Arc<MemoryStore>,
        svc: &OrderService,
        quantity: i64,
    ) -> (Uuid, String) {
        let book_id = seed_book(store, "Kobzar", 28_000, 10).await;
        let placed = svc
            .place_order(&[OrderLine { book_id, quantity }])
            .await
            .unwrap();
        let order = store.order_by_id(placed.order_id).await.unwrap().unwrap();
        (placed.order_id, order.invoice_id.unwrap())
    }

    fn callback_body(invoice_id: &str, status: &str, reference: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "invoiceId": invoice_id,
            "status": status,
            "amount": 84000,
            "ccy": 980,
            "reference": reference,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn signed_callback_applies_status_verbatim() {
        let store = Arc::new(MemoryStore::new());
        let (kp, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), gateway);

        let (order_id, invoice_id) = place_one(&store, &svc, 3).await;

        let body = callback_body(&invoice_id, "success", &order_id.to_string());
        let x_sign = sign(&kp, &body);
        let applied = svc.handle_callback(&x_sign, &body).await.unwrap();
        assert_eq!(applied, order_id);
        assert_eq!(
            store.order_by_id(order_id).await.unwrap().unwrap().status,
            "success"
        );

        // repeated delivery of the same terminal status is idempotent
        let applied = svc.handle_callback(&x_sign, &body).await.unwrap();
        assert_eq!(applied, order_id);
        assert_eq!(
            store.order_by_id(order_id).await.unwrap().unwrap().status,
            "success"
        );

        // last write wins even when the status moves backwards
        let body = callback_body(&invoice_id, "processing", &order_id.to_string());
        let x_sign = sign(&kp, &body);
        svc.handle_callback(&x_sign, &body).await.unwrap();
        assert_eq!(
            store.order_by_id(order_id).await.unwrap().unwrap().status,
            "processing"
        );
    }

    #[tokio::test]
    async fn forged_callback_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let (foreign_kp, _) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), gateway);

        let (order_id, invoice_id) = place_one(&store, &svc, 3).await;

        let body = callback_body(&invoice_id, "success", &order_id.to_string());
        let x_sign = sign(&foreign_kp, &body);
        let err = svc.handle_callback(&x_sign, &body).await.unwrap_err();
        assert!(matches!(err, CallbackError::SignatureMismatch));
        assert_eq!(
            store.order_by_id(order_id).await.unwrap().unwrap().status,
            "created"
        );
    }

    #[tokio::test]
    async fn callback_for_unknown_order_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (kp, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), gateway);

        let body = callback_body("inv_0", "success", &Uuid::now_v7().to_string());
        let x_sign = sign(&kp, &body);
        let err = svc.handle_callback(&x_sign, &body).await.unwrap_err();
        assert!(matches!(err, CallbackError::OrderNotFound));

        // unparseable reference falls in the same bucket
        let body = callback_body("inv_0", "success", "not-a-uuid");
        let x_sign = sign(&kp, &body);
        let err = svc.handle_callback(&x_sign, &body).await.unwrap_err();
        assert!(matches!(err, CallbackError::OrderNotFound));
    }

    #[tokio::test]
    async fn callback_with_foreign_invoice_id_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (kp, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), gateway);

        let (order_id, _) = place_one(&store, &svc, 3).await;

        let body = callback_body("inv_from_elsewhere", "success", &order_id.to_string());
        let x_sign = sign(&kp, &body);
        let err = svc.handle_callback(&x_sign, &body).await.unwrap_err();
        assert!(matches!(err, CallbackError::InvoiceMismatch));
        assert_eq!(
            store.order_by_id(order_id).await.unwrap().unwrap().status,
            "created"
        );
    }

    #[tokio::test]
    async fn signed_garbage_is_malformed() {
        let store = Arc::new(MemoryStore::new());
        let (kp, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(store, gateway);

        let body = b"not json at all".to_vec();
        let x_sign = sign(&kp, &body);
        let err = svc.handle_callback(&x_sign, &body).await.unwrap_err();
        assert!(matches!(err, CallbackError::MalformedPayload));
    }

    #[tokio::test]
    async fn pubkey_fetch_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        let (kp, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::FailPubkey);
        let svc = service(store, gateway);

        let body = callback_body("inv_0", "success", &Uuid::now_v7().to_string());
        let x_sign = sign(&kp, &body);
        let err = svc.handle_callback(&x_sign, &body).await.unwrap_err();
        assert!(matches!(err, CallbackError::Pubkey(_)));
    }

    #[tokio::test]
    async fn empty_order_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let svc = service(Arc::clone(&store), gateway);

        let err = svc.place_order(&[]).await.unwrap_err();
        assert!(matches!(err, PlaceOrderError::EmptyOrder));
        assert!(store.list_orders(Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn placement_clears_listing_cache() {
        let store = Arc::new(MemoryStore::new());
        let (_, key) = signing_key();
        let gateway = TestGateway::new(key, Mode::Succeed);
        let listings = Arc::new(ListingCache::new(Duration::from_secs(60)));
        let svc = OrderService::new(
            Arc::clone(&store) as Arc<dyn Store>,
            gateway,
            Arc::new(PubkeyCache::new()),
            Arc::clone(&listings),
            "https://shop.test/api/monobank/callback".to_owned(),
        );

        let book_id = seed_book(&store, "Kobzar", 28_000, 10).await;
        listings
            .put("/api/books".to_owned(), Arc::from("cached"))
            .await;

        svc.place_order(&[OrderLine {
            book_id,
            quantity: 1,
        }])
        .await
        .unwrap();

        assert_eq!(listings.get("/api/books").await, None);
    }
}
