//! Input validation shared by the cart and subscription components.

use crate::error::{CartError, Result};
use crate::types::NewCartItem;

/// Longest subscription id accepted.
pub const MAX_SUBSCRIPTION_ID_LEN: usize = 255;

/// Check a subscription id before handing it to a provider.
///
/// Ids must be non-empty, at most [`MAX_SUBSCRIPTION_ID_LEN`] bytes, and made
/// of ASCII letters, digits, `_` and `-`.
pub fn validate_subscription_id(id: &str) -> std::result::Result<(), String> {
    if id.trim().is_empty() {
        return Err("subscription id is empty".to_string());
    }
    if id.len() > MAX_SUBSCRIPTION_ID_LEN {
        return Err(format!(
            "subscription id is {} bytes (max {})",
            id.len(),
            MAX_SUBSCRIPTION_ID_LEN
        ));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(format!("subscription id contains invalid character {c:?}"));
    }
    Ok(())
}

/// Convert a raw quantity into a stored one. Zero and negatives are rejected.
pub fn validate_quantity(quantity: i64) -> Result<u32> {
    if quantity <= 0 {
        return Err(CartError::InvalidQuantity(quantity));
    }
    u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity(quantity))
}

/// Check the non-quantity fields of an item.
pub fn validate_item(item: &NewCartItem) -> Result<()> {
    if item.id.trim().is_empty() {
        return Err(CartError::InvalidItem("item id is empty".to_string()));
    }
    if item.name.trim().is_empty() {
        return Err(CartError::InvalidItem(format!("item {} has an empty name", item.id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_id_rules() {
        assert!(validate_subscription_id("sub_123").is_ok());
        assert!(validate_subscription_id("sub-ABC-9").is_ok());
        assert!(validate_subscription_id("").is_err());
        assert!(validate_subscription_id("   ").is_err());
        assert!(validate_subscription_id("sub 123").is_err());
        assert!(validate_subscription_id("sub/../123").is_err());
        assert!(validate_subscription_id(&"a".repeat(256)).is_err());
        assert!(validate_subscription_id(&"a".repeat(255)).is_ok());
    }

    #[test]
    fn test_quantity_rules() {
        assert_eq!(validate_quantity(1), Ok(1));
        assert_eq!(validate_quantity(0), Err(CartError::InvalidQuantity(0)));
        assert_eq!(validate_quantity(-3), Err(CartError::InvalidQuantity(-3)));
        assert!(validate_quantity(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_item_rules() {
        assert!(validate_item(&NewCartItem::new("sku1", "Widget", 500, 1)).is_ok());
        assert!(matches!(
            validate_item(&NewCartItem::new("", "Widget", 500, 1)),
            Err(CartError::InvalidItem(_))
        ));
        assert!(matches!(
            validate_item(&NewCartItem::new("sku1", " ", 500, 1)),
            Err(CartError::InvalidItem(_))
        ));
    }
}
