pub mod algos;
pub mod config;
pub mod environments;
pub mod error;
pub mod experiment;
pub mod mdps;
pub mod report;
