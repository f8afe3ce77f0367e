pub mod contact_profile;
pub mod customer;
pub mod domain;
pub mod hosting_service;
pub mod invoice;
pub mod order;
pub mod order_item;
