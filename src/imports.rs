//! CSV importers for transactions and address books.

pub use self::transactions::ImportError;

pub mod address;
pub mod transactions;
