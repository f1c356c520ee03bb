use async_trait::async_trait;
use common::{BookId, CartItemId, OrderId, UserId};
use domain::{
    Book, CartItem, CartLine, CartUpsert, Order, OrderDraft, OrderStatus, Quantity, ShippingInfo,
    TransitionRequest, Transitioned,
};

use crate::Result;

/// Core trait for store implementations.
///
/// Implementations must be thread-safe (Send + Sync). Rule violations are
/// reported as [`StoreError::Rejected`](crate::StoreError::Rejected) and leave
/// the store untouched.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Looks up a catalog entry.
    async fn book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// Lists the user's cart, newest first, joined with live price and stock.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Adds `quantity` of a book to the user's cart.
    ///
    /// Fails with `BookNotFound`, or `InsufficientStock` when on-hand stock is
    /// below the resulting cart quantity. Grows an existing row rather than
    /// creating a second one.
    async fn add_to_cart(
        &self,
        user_id: UserId,
        book_id: BookId,
        quantity: Quantity,
    ) -> Result<CartUpsert>;

    /// Sets the quantity of one of the user's cart rows.
    ///
    /// Fails with `CartItemNotFound` when the row does not belong to the user.
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<CartItem>;

    /// Deletes one of the user's cart rows. A second call fails with
    /// `CartItemNotFound`.
    async fn remove_cart_item(&self, user_id: UserId, cart_item_id: CartItemId) -> Result<()>;

    /// Deletes every row of the user's cart in one statement. Returns how many
    /// rows were removed.
    async fn clear_cart(&self, user_id: UserId) -> Result<u64>;

    /// Converts the user's cart into an order.
    ///
    /// Locks the cart rows and their books, checks every line against
    /// available stock, snapshots prices, inserts the order and its lines and
    /// drains the cart. Stock is not decremented.
    async fn place_order(&self, user_id: UserId, draft: OrderDraft) -> Result<Order>;

    /// Applies a status change, including its stock side effects, atomically.
    async fn transition_order(
        &self,
        order_id: OrderId,
        request: TransitionRequest,
    ) -> Result<Transitioned>;

    /// Retrieves one order with its lines.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Retrieves a user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Retrieves all orders in a status, newest first.
    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Retrieves every order, newest first.
    async fn all_orders(&self) -> Result<Vec<Order>>;

    /// Returns the contact details of the user's most recent order.
    async fn latest_shipping_info(&self, user_id: UserId) -> Result<Option<ShippingInfo>>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait CommerceStoreExt: CommerceStore {
    /// Retrieves an order only if it belongs to `user_id`.
    async fn order_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .get_order(order_id)
            .await?
            .filter(|order| order.user_id == user_id))
    }

    /// Current on-hand stock for a book.
    async fn stock_of(&self, book_id: BookId) -> Result<Option<u32>> {
        Ok(self.book(book_id).await?.map(|book| book.stock))
    }
}

// Blanket implementation for all CommerceStore implementations
impl<T: CommerceStore + ?Sized> CommerceStoreExt for T {}
