// data module
pub mod data {
    pub mod event;
    pub mod graph;
    pub mod image;
}

// algorithm module
pub mod algorithm {
    pub mod label;
    pub mod filter;
}

// simulation module
pub mod sim {
    pub mod generator;
}
