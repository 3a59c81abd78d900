//! Shopping cart state.
//!
//! A [`CartStore`] holds the line items of one checkout session. Adding an
//! item whose id is already in the cart increases that line's quantity
//! instead of creating a second line.

mod store;

pub use store::CartStore;
