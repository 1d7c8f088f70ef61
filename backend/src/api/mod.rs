//! REST routes outside the GraphQL endpoints

pub mod health;
