// src/lib.rs
pub mod data {
    pub mod store;
    pub mod io;
    pub mod dataset;
}
