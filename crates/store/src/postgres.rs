use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use common::{BookId, CartItemId, Money, OrderId, UserId};
use domain::{
    Book, CartAction, CartItem, CartLine, CartUpsert, CommerceError, ContactDetails,
    DecrementLine, LockedCartLine, Order, OrderDraft, OrderLine, OrderStatus, Quantity,
    ShippingInfo, TransitionRequest, Transitioned, plan_checkout, plan_decrements,
    plan_transition, requested_total,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{CommerceStore, Result, StoreError};

const ORDER_COLUMNS: &str = "id, user_id, total_cents, status, full_name, email, phone_number, \
     shipping_address, billing_address, city, zip_code, payment_method, payment_screenshot, \
     created_at, updated_at";

/// PostgreSQL-backed store.
///
/// Lock order is fixed: order row, then book rows in id order, then cart rows
/// in id order. Every transaction that touches both books and cart rows locks
/// the books first, so cart writes and checkouts for the same book serialize
/// instead of deadlocking.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn load_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<std::result::Result<_, _>>()?;
        let mut lines = lines_for(&mut conn, &ids).await?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                row_to_order(row, lines.remove(&id).unwrap_or_default())
            })
            .collect()
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {err}"))
}

fn to_count(value: i32, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|e| corrupt(what, e))
}

/// Quantities are capped at `i32::MAX` by `Quantity` and stock checks.
fn to_sql_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn row_to_book(row: &PgRow) -> Result<Book> {
    Ok(Book {
        id: BookId::from_uuid(row.try_get("book_id")?),
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_count(row.try_get("stock")?, "books.stock")?,
        cover_url: row.try_get("cover_url")?,
    })
}

/// Locks the given books `FOR UPDATE` in id order.
async fn lock_books(conn: &mut PgConnection, book_ids: &[Uuid]) -> Result<Vec<Book>> {
    sqlx::query(
        r#"
        SELECT id AS book_id, title, author, price_cents, stock, cover_url
        FROM books
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(book_ids)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(row_to_book)
    .collect()
}

/// Locks the user's cart rows in id order and deletes them.
async fn delete_cart_rows(conn: &mut PgConnection, user_id: Uuid) -> Result<u64> {
    let ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM cart_items WHERE user_id = $1 ORDER BY id FOR UPDATE")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

    let result = sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
        .bind(&ids)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

fn row_to_contact(row: &PgRow) -> Result<ContactDetails> {
    Ok(ContactDetails {
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        shipping_address: row.try_get("shipping_address")?,
        billing_address: row.try_get("billing_address")?,
        city: row.try_get("city")?,
        zip_code: row.try_get("zip_code")?,
    })
}

fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let method: String = row.try_get("payment_method")?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        status: status.parse().map_err(|e| corrupt("orders.status", e))?,
        total: Money::from_cents(row.try_get("total_cents")?),
        contact: row_to_contact(row)?,
        payment_method: method.parse().map_err(|e| corrupt("orders.payment_method", e))?,
        payment_screenshot: row.try_get("payment_screenshot")?,
        lines,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn lines_for(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT order_id, book_id, title, quantity, price_cents
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY book_id
        "#,
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for row in rows {
        by_order
            .entry(row.try_get("order_id")?)
            .or_default()
            .push(OrderLine {
                book_id: BookId::from_uuid(row.try_get("book_id")?),
                title: row.try_get("title")?,
                quantity: to_count(row.try_get("quantity")?, "order_items.quantity")?,
                unit_price: Money::from_cents(row.try_get("price_cents")?),
            });
    }
    Ok(by_order)
}

#[async_trait]
impl CommerceStore for PostgresStore {
    #[tracing::instrument(skip(self))]
    async fn book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id AS book_id, title, author, price_cents, stock, cover_url
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(book_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_book).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT ci.id AS cart_item_id, ci.quantity,
                   b.id AS book_id, b.title, b.price_cents, b.stock, b.cover_url
            FROM cart_items ci
            JOIN books b ON b.id = ci.book_id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at DESC, ci.id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartLine {
                    cart_item_id: CartItemId::from_uuid(row.try_get("cart_item_id")?),
                    book_id: BookId::from_uuid(row.try_get("book_id")?),
                    title: row.try_get("title")?,
                    cover_url: row.try_get("cover_url")?,
                    unit_price: Money::from_cents(row.try_get("price_cents")?),
                    stock: to_count(row.try_get("stock")?, "books.stock")?,
                    quantity: to_count(row.try_get("quantity")?, "cart_items.quantity")?,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn add_to_cart(
        &self,
        user_id: UserId,
        book_id: BookId,
        quantity: Quantity,
    ) -> Result<CartUpsert> {
        let mut tx = self.pool.begin().await?;

        // Holding the book lock serializes adds of the same book, so the
        // cart row read below always sees the latest committed quantity.
        let book = lock_books(&mut tx, &[book_id.as_uuid()])
            .await?
            .pop()
            .ok_or(CommerceError::BookNotFound(book_id))?;

        let existing: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND book_id = $2 FOR UPDATE",
        )
        .bind(user_id.as_uuid())
        .bind(book_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let existing = existing
            .map(|q| to_count(q, "cart_items.quantity"))
            .transpose()?;

        let total = requested_total(existing, quantity);
        book.ensure_stock_for(total)?;

        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, book_id, quantity, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT unique_cart_user_book
            DO UPDATE SET quantity = EXCLUDED.quantity
            RETURNING id, quantity, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(book_id.as_uuid())
        .bind(to_sql_int(total))
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CartUpsert {
            item: CartItem {
                id: CartItemId::from_uuid(row.try_get("id")?),
                user_id,
                book_id,
                quantity: to_count(row.try_get("quantity")?, "cart_items.quantity")?,
                created_at: row.try_get("created_at")?,
            },
            title: book.title,
            action: if existing.is_some() {
                CartAction::Updated
            } else {
                CartAction::Added
            },
        })
    }

    #[tracing::instrument(skip(self))]
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<CartItem> {
        let mut tx = self.pool.begin().await?;

        let book_id: Uuid =
            sqlx::query_scalar("SELECT book_id FROM cart_items WHERE id = $1 AND user_id = $2")
                .bind(cart_item_id.as_uuid())
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(CommerceError::CartItemNotFound(cart_item_id))?;

        let book = lock_books(&mut tx, &[book_id])
            .await?
            .pop()
            .ok_or(CommerceError::CartItemNotFound(cart_item_id))?;

        // The row may have been removed while we waited for the book.
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "SELECT created_at FROM cart_items WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(cart_item_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CommerceError::CartItemNotFound(cart_item_id))?;

        book.ensure_stock_for(quantity.get())?;

        sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
            .bind(cart_item_id.as_uuid())
            .bind(to_sql_int(quantity.get()))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CartItem {
            id: cart_item_id,
            user_id,
            book_id: book.id,
            quantity: quantity.get(),
            created_at,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn remove_cart_item(&self, user_id: UserId, cart_item_id: CartItemId) -> Result<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(cart_item_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CommerceError::CartItemNotFound(cart_item_id).into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = delete_cart_rows(&mut tx, user_id.as_uuid()).await?;
        tx.commit().await?;
        Ok(removed)
    }

    #[tracing::instrument(skip(self, draft), fields(payment_method = %draft.payment_method))]
    async fn place_order(&self, user_id: UserId, draft: OrderDraft) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let cart_books: Vec<Uuid> =
            sqlx::query_scalar("SELECT book_id FROM cart_items WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .fetch_all(&mut *tx)
                .await?;
        if cart_books.is_empty() {
            return Err(CommerceError::EmptyCart.into());
        }

        let books: HashMap<Uuid, Book> = lock_books(&mut tx, &cart_books)
            .await?
            .into_iter()
            .map(|book| (book.id.as_uuid(), book))
            .collect();
        let book_ids: Vec<Uuid> = books.keys().copied().collect();

        // Rows added for other books after the first read are left in the cart.
        let rows = sqlx::query(
            r#"
            SELECT id, book_id, quantity
            FROM cart_items
            WHERE user_id = $1 AND book_id = ANY($2)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&book_ids)
        .fetch_all(&mut *tx)
        .await?;
        if rows.is_empty() {
            return Err(CommerceError::EmptyCart.into());
        }

        let reservations: HashMap<Uuid, i64> = sqlx::query(
            r#"
            SELECT oi.book_id, SUM(oi.quantity)::BIGINT AS reserved
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.status IN ('pending', 'pending_verification')
              AND oi.book_id = ANY($1)
            GROUP BY oi.book_id
            "#,
        )
        .bind(&book_ids)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| Ok((row.try_get("book_id")?, row.try_get("reserved")?)))
        .collect::<Result<_>>()?;

        let mut locked = rows
            .iter()
            .map(|row| {
                let book_id: Uuid = row.try_get("book_id")?;
                let book = books
                    .get(&book_id)
                    .ok_or_else(|| corrupt("cart_items.book_id", book_id))?;
                let reserved = reservations.get(&book_id).copied().unwrap_or(0);
                Ok(LockedCartLine {
                    cart_item_id: CartItemId::from_uuid(row.try_get("id")?),
                    book_id: book.id,
                    title: book.title.clone(),
                    unit_price: book.price,
                    quantity: to_count(row.try_get("quantity")?, "cart_items.quantity")?,
                    on_hand: book.stock,
                    reserved: u32::try_from(reserved).unwrap_or(u32::MAX),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        locked.sort_by_key(|line| line.book_id);

        let plan = plan_checkout(&locked)?;
        let order = Order::place(user_id, draft, plan, Utc::now().trunc_subsecs(6));

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, total_cents, status,
                full_name, email, phone_number,
                shipping_address, billing_address, city, zip_code,
                payment_method, payment_screenshot, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(&order.contact.full_name)
        .bind(&order.contact.email)
        .bind(&order.contact.phone_number)
        .bind(&order.contact.shipping_address)
        .bind(&order.contact.billing_address)
        .bind(&order.contact.city)
        .bind(&order.contact.zip_code)
        .bind(order.payment_method.as_str())
        .bind(&order.payment_screenshot)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, book_id, title, quantity, price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id.as_uuid())
            .bind(line.book_id.as_uuid())
            .bind(&line.title)
            .bind(to_sql_int(line.quantity))
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        let ordered: Vec<Uuid> = locked
            .iter()
            .map(|line| line.cart_item_id.as_uuid())
            .collect();
        sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
            .bind(&ordered)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn transition_order(
        &self,
        order_id: OrderId,
        request: TransitionRequest,
    ) -> Result<Transitioned> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CommerceError::OrderNotFound(order_id))?;

        let mut lines = lines_for(&mut tx, &[order_id.as_uuid()]).await?;
        let mut order = row_to_order(&row, lines.remove(&order_id.as_uuid()).unwrap_or_default())?;

        let plan = plan_transition(order_id, order.status, &request)?;
        if !plan.changes_status() {
            tx.rollback().await?;
            return Ok(Transitioned {
                previous: order.status,
                order,
            });
        }

        if plan.decrement_stock {
            let rows = sqlx::query(
                r#"
                SELECT oi.book_id, oi.title, oi.quantity, b.stock
                FROM order_items oi
                JOIN books b ON b.id = oi.book_id
                WHERE oi.order_id = $1
                ORDER BY b.id
                FOR UPDATE OF b
                "#,
            )
            .bind(order_id.as_uuid())
            .fetch_all(&mut *tx)
            .await?;

            let decrements = rows
                .iter()
                .map(|row| {
                    Ok(DecrementLine {
                        book_id: BookId::from_uuid(row.try_get("book_id")?),
                        title: row.try_get("title")?,
                        quantity: to_count(row.try_get("quantity")?, "order_items.quantity")?,
                        on_hand: to_count(row.try_get("stock")?, "books.stock")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            for update in plan_decrements(&decrements)? {
                sqlx::query("UPDATE books SET stock = $2 WHERE id = $1")
                    .bind(update.book_id.as_uuid())
                    .bind(to_sql_int(update.new_stock))
                    .execute(&mut *tx)
                    .await?;
            }
        }

        if plan.clear_owner_cart {
            delete_cart_rows(&mut tx, order.user_id.as_uuid()).await?;
        }

        let updated_at = Utc::now().trunc_subsecs(6);
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(plan.to.as_str())
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        order.status = plan.to;
        order.updated_at = updated_at;
        Ok(Transitioned {
            order,
            previous: plan.from,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    #[tracing::instrument(skip(self))]
    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at DESC, id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    #[tracing::instrument(skip(self))]
    async fn all_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    #[tracing::instrument(skip(self))]
    async fn latest_shipping_info(&self, user_id: UserId) -> Result<Option<ShippingInfo>> {
        let row = sqlx::query(
            r#"
            SELECT full_name, email, phone_number, shipping_address, billing_address,
                   city, zip_code, payment_method
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let method: String = row.try_get("payment_method")?;
            Ok(ShippingInfo {
                contact: row_to_contact(&row)?,
                payment_method: method
                    .parse()
                    .map_err(|e| corrupt("orders.payment_method", e))?,
            })
        })
        .transpose()
    }
}
