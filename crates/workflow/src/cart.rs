//! Per-user cart operations.

use common::{BookId, CartItemId, Identity};
use domain::{CartItem, CartLine, CartUpsert, Quantity};
use store::CommerceStore;

use crate::Result;

/// Cart operations on behalf of the calling user.
pub struct CartService<S: CommerceStore> {
    store: S,
}

impl<S: CommerceStore> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The caller's cart with live prices and stock, newest first.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn list(&self, identity: &Identity) -> Result<Vec<CartLine>> {
        Ok(self.store.cart_lines(identity.user_id).await?)
    }

    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn add(
        &self,
        identity: &Identity,
        book_id: BookId,
        quantity: Quantity,
    ) -> Result<CartUpsert> {
        let upsert = self
            .store
            .add_to_cart(identity.user_id, book_id, quantity)
            .await?;
        tracing::info!(
            cart_item_id = %upsert.item.id,
            quantity = upsert.item.quantity,
            "cart updated"
        );
        Ok(upsert)
    }

    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn update_quantity(
        &self,
        identity: &Identity,
        cart_item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<CartItem> {
        Ok(self
            .store
            .set_cart_quantity(identity.user_id, cart_item_id, quantity)
            .await?)
    }

    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn remove(&self, identity: &Identity, cart_item_id: CartItemId) -> Result<()> {
        Ok(self
            .store
            .remove_cart_item(identity.user_id, cart_item_id)
            .await?)
    }

    /// Empties the caller's cart; returns how many rows were removed.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn clear(&self, identity: &Identity) -> Result<u64> {
        Ok(self.store.clear_cart(identity.user_id).await?)
    }
}
