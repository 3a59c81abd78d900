//! Property tests for cart invariants.

use checkout_state::{CartError, CartStore, NewCartItem};
use proptest::prelude::*;
use std::collections::HashMap;

fn sku() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["sku1", "sku2", "sku3", "sku4"]).prop_map(String::from)
}

fn item() -> impl Strategy<Value = NewCartItem> {
    (sku(), 1u64..10_000, 1i64..50).prop_map(|(id, price, quantity)| {
        let name = format!("Item {id}");
        NewCartItem::new(id, name, price, quantity)
    })
}

proptest! {
    #[test]
    fn test_total_matches_lines(adds in prop::collection::vec(item(), 0..40)) {
        let mut cart = CartStore::new();
        for add in adds {
            cart.add_item(add).unwrap();
        }

        let expected: u64 = cart
            .items()
            .iter()
            .map(|line| line.unit_price * u64::from(line.quantity))
            .sum();
        prop_assert_eq!(cart.total_cost(), expected);
        prop_assert_eq!(cart.state().total_cost, expected);
    }

    #[test]
    fn test_merge_sums_quantities(adds in prop::collection::vec(item(), 1..40)) {
        let mut expected: HashMap<String, u32> = HashMap::new();
        let mut cart = CartStore::new();

        for add in adds {
            *expected.entry(add.id.clone()).or_default() += add.quantity as u32;
            cart.add_item(add).unwrap();
        }

        // One line per id
        prop_assert_eq!(cart.len(), expected.len());
        for line in cart.items() {
            prop_assert_eq!(line.quantity, expected[&line.id]);
        }
    }

    #[test]
    fn test_invalid_quantity_leaves_cart_unchanged(
        adds in prop::collection::vec(item(), 0..10),
        id in sku(),
        quantity in i64::MIN..=0,
    ) {
        let mut cart = CartStore::new();
        for add in adds {
            cart.add_item(add).unwrap();
        }
        let before = cart.state();

        let result = cart.add_item(NewCartItem::new(id.clone(), "Bad", 100, quantity));
        prop_assert_eq!(result, Err(CartError::InvalidQuantity(quantity)));
        prop_assert!(cart.set_quantity(&id, quantity).is_err());
        prop_assert_eq!(cart.state(), before);
    }

    #[test]
    fn test_remove_by_index_bounds(
        adds in prop::collection::vec(item(), 0..10),
        index in 0usize..20,
    ) {
        let mut cart = CartStore::new();
        for add in adds {
            cart.add_item(add).unwrap();
        }
        let len = cart.len();
        let before = cart.state();

        match cart.remove_by_index(index) {
            Ok(state) => {
                prop_assert!(index < len);
                prop_assert_eq!(state.items.len(), len - 1);
                prop_assert!(!state.items.contains(&before.items[index]));
            }
            Err(err) => {
                prop_assert!(index >= len);
                prop_assert_eq!(err, CartError::IndexOutOfRange { index, len });
                prop_assert_eq!(cart.state(), before);
            }
        }
    }

    #[test]
    fn test_remove_absent_is_noop(adds in prop::collection::vec(item(), 0..10)) {
        let mut cart = CartStore::new();
        for add in adds {
            cart.add_item(add).unwrap();
        }
        let before = cart.state();

        prop_assert_eq!(cart.remove_item("sku-missing"), before);
    }
}
