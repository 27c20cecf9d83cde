#![allow(dead_code)]

mod providers;

pub use providers::*;
