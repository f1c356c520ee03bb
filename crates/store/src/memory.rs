use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{BookId, CartItemId, OrderId, UserId};
use domain::{
    Book, CartAction, CartItem, CartLine, CartUpsert, CommerceError, DecrementLine,
    LockedCartLine, Order, OrderDraft, OrderStatus, Quantity, ShippingInfo, TransitionRequest,
    Transitioned, plan_checkout, plan_decrements, plan_transition, requested_total,
};
use tokio::sync::RwLock;

use crate::{CommerceStore, Result};

#[derive(Default)]
struct State {
    books: HashMap<BookId, Book>,
    /// Insertion order; listing reverses it.
    cart: Vec<CartItem>,
    /// Insertion order; listing reverses it.
    orders: Vec<Order>,
}

impl State {
    fn reserved(&self, book_id: BookId) -> u32 {
        self.orders
            .iter()
            .filter(|order| order.status.reserves_stock())
            .map(|order| order.quantity_of(book_id))
            .sum()
    }

    fn book(&self, book_id: BookId) -> Result<&Book> {
        Ok(self
            .books
            .get(&book_id)
            .ok_or(CommerceError::BookNotFound(book_id))?)
    }

    fn newest_orders<'a>(&'a self, keep: impl Fn(&Order) -> bool + 'a) -> Vec<Order> {
        self.orders.iter().rev().filter(|o| keep(*o)).cloned().collect()
    }
}

/// In-memory store for tests and local runs.
///
/// All state sits behind one lock, so each trait method is atomic with
/// respect to every other call, which gives the same guarantees the
/// PostgreSQL row locks give.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog entry.
    pub async fn insert_book(&self, book: Book) {
        self.state.write().await.books.insert(book.id, book);
    }

    /// Changes a book's catalog price. Existing orders keep their snapshot.
    pub async fn set_price(&self, book_id: BookId, price: common::Money) -> Result<()> {
        let mut state = self.state.write().await;
        let book = state
            .books
            .get_mut(&book_id)
            .ok_or(CommerceError::BookNotFound(book_id))?;
        book.price = price;
        Ok(())
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.state.read().await.books.get(&book_id).cloned())
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        let mut lines = Vec::new();
        for item in state.cart.iter().rev().filter(|i| i.user_id == user_id) {
            let book = state.book(item.book_id)?;
            lines.push(CartLine {
                cart_item_id: item.id,
                book_id: book.id,
                title: book.title.clone(),
                cover_url: book.cover_url.clone(),
                unit_price: book.price,
                stock: book.stock,
                quantity: item.quantity,
            });
        }
        Ok(lines)
    }

    async fn add_to_cart(
        &self,
        user_id: UserId,
        book_id: BookId,
        quantity: Quantity,
    ) -> Result<CartUpsert> {
        let mut state = self.state.write().await;
        let book = state.book(book_id)?.clone();

        let existing = state
            .cart
            .iter()
            .position(|i| i.user_id == user_id && i.book_id == book_id);
        let total = requested_total(existing.map(|idx| state.cart[idx].quantity), quantity);
        book.ensure_stock_for(total)?;

        let (item, action) = match existing {
            Some(idx) => {
                state.cart[idx].quantity = total;
                (state.cart[idx].clone(), CartAction::Updated)
            }
            None => {
                let item = CartItem {
                    id: CartItemId::new(),
                    user_id,
                    book_id,
                    quantity: total,
                    created_at: Utc::now(),
                };
                state.cart.push(item.clone());
                (item, CartAction::Added)
            }
        };

        Ok(CartUpsert {
            item,
            title: book.title,
            action,
        })
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<CartItem> {
        let mut state = self.state.write().await;
        let idx = state
            .cart
            .iter()
            .position(|i| i.id == cart_item_id && i.user_id == user_id)
            .ok_or(CommerceError::CartItemNotFound(cart_item_id))?;

        state.book(state.cart[idx].book_id)?.ensure_stock_for(quantity.get())?;
        state.cart[idx].quantity = quantity.get();
        Ok(state.cart[idx].clone())
    }

    async fn remove_cart_item(&self, user_id: UserId, cart_item_id: CartItemId) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.cart.len();
        state
            .cart
            .retain(|i| !(i.id == cart_item_id && i.user_id == user_id));
        if state.cart.len() == before {
            return Err(CommerceError::CartItemNotFound(cart_item_id).into());
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.cart.len();
        state.cart.retain(|i| i.user_id != user_id);
        Ok((before - state.cart.len()) as u64)
    }

    async fn place_order(&self, user_id: UserId, draft: OrderDraft) -> Result<Order> {
        let mut state = self.state.write().await;

        let mut locked = Vec::new();
        for item in state.cart.iter().filter(|i| i.user_id == user_id) {
            let book = state.book(item.book_id)?;
            locked.push(LockedCartLine {
                cart_item_id: item.id,
                book_id: book.id,
                title: book.title.clone(),
                unit_price: book.price,
                quantity: item.quantity,
                on_hand: book.stock,
                reserved: state.reserved(book.id),
            });
        }
        locked.sort_by_key(|line| line.book_id);

        let plan = plan_checkout(&locked)?;
        let order = Order::place(user_id, draft, plan, Utc::now());

        state.orders.push(order.clone());
        state.cart.retain(|i| i.user_id != user_id);
        Ok(order)
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        request: TransitionRequest,
    ) -> Result<Transitioned> {
        let mut state = self.state.write().await;
        let idx = state
            .orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or(CommerceError::OrderNotFound(order_id))?;

        let current = state.orders[idx].status;
        let plan = plan_transition(order_id, current, &request)?;
        if !plan.changes_status() {
            return Ok(Transitioned {
                order: state.orders[idx].clone(),
                previous: current,
            });
        }

        if plan.decrement_stock {
            let mut lines = Vec::with_capacity(state.orders[idx].lines.len());
            for line in &state.orders[idx].lines {
                let book = state.book(line.book_id)?;
                lines.push(DecrementLine {
                    book_id: line.book_id,
                    title: line.title.clone(),
                    quantity: line.quantity,
                    on_hand: book.stock,
                });
            }
            for update in plan_decrements(&lines)? {
                if let Some(book) = state.books.get_mut(&update.book_id) {
                    book.stock = update.new_stock;
                }
            }
        }

        if plan.clear_owner_cart {
            let owner = state.orders[idx].user_id;
            state.cart.retain(|i| i.user_id != owner);
        }

        let order = &mut state.orders[idx];
        order.status = plan.to;
        order.updated_at = Utc::now();
        Ok(Transitioned {
            order: order.clone(),
            previous: plan.from,
        })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self
            .state
            .read()
            .await
            .newest_orders(move |o| o.user_id == user_id))
    }

    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self
            .state
            .read()
            .await
            .newest_orders(move |o| o.status == status))
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.state.read().await.newest_orders(|_| true))
    }

    async fn latest_shipping_info(&self, user_id: UserId) -> Result<Option<ShippingInfo>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .find(|o| o.user_id == user_id)
            .map(|o| ShippingInfo {
                contact: o.contact.clone(),
                payment_method: o.payment_method,
            }))
    }
}
