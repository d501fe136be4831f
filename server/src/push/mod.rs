pub mod fanout;
pub mod routes;
pub mod store;
pub mod transport;
