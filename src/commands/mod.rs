// Reconciliation
pub mod apply;

// Catalog inspection
pub mod catalog;
