#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod crossval;
pub mod data;
pub mod error;
pub mod experiment;
pub mod faer_ndarray;
pub mod logistic;
pub mod model;
pub mod partition;
pub mod replicate;
pub mod thresholdout;
