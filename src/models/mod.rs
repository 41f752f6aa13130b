pub mod brand;
pub mod catalog;
pub mod certification;
pub mod product;
pub mod rbac;
pub mod user;
