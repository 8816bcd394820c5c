pub mod capability;
pub mod coupon;
pub mod customer;
pub mod negotiation;
pub mod tier;
